//! In-memory host for exercising the zone core end to end.
//!
//! [`MemoryHost`] implements every capability trait of `warden-sync` over plain maps and
//! records what the core broadcast, so tests can assert on world state and on messages.
//! [`Fixture`] pairs it with a [`ZoneLevel`](warden_sync::ZoneLevel).
//!
//! ```rust,ignore
//! let fx = Fixture::new();
//! let arena = fx.pvp_zone(TileRect::new(0, 0, 5, 5));
//! assert_eq!(fx.host.barrier_tiles(fx.level_id()), fx.edges(arena));
//! ```

mod fixture;
mod memory;

pub use fixture::Fixture;
pub use memory::{BARRIER, HostEvent, MemoryHost, REGION_SIZE};

/// Install a test subscriber once. Respects `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
