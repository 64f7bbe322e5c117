//! Barrier synchronisation and player tracking for zoned levels.
//!
//! # Architecture
//!
//! ```text
//!  admin call ─► ZoneLevel ─► ZoneStore (edit + split/merge)
//!                   │
//!                   ├─► BarrierSynchronizer ─► WorldAccess / Broadcaster
//!                   │        │ job settled
//!                   │        ▼
//!                   └─► ZoneTransitionTracker ─► PlayerAccess
//!
//!  tick ─► ZoneRealm ─► every ZoneLevel: drain jobs, drain placements,
//!                                        track players, DotModifier
//! ```
//!
//! The host supplies its world, network, players and entities through the traits in
//! [`host`] bundled as a [`Host`]. Nothing here blocks or sleeps: large barrier diffs are
//! queued and drained a bounded number of operations per tick.

mod barrier;
mod config;
mod dot;
mod error;
pub mod host;
mod level;
mod placement;
mod realm;
mod tracker;
mod world_ops;

pub use barrier::{BARRIER_OBJECT, BarrierSynchronizer, Settled, SyncOutcome, SyncPlan};
pub use config::ZoneConfig;
pub use dot::DotModifier;
pub use error::{SyncError, SyncResult, WorldError};
pub use host::{
    Broadcaster, DotAccumulator, DotEntity, EntityAccess, Host, LevelId, Notice, ObjectId,
    PlayerAccess, PlayerSnapshot, RegionId, WorldAccess, ZoneStatus,
};
pub use level::{LevelTick, ZoneLevel};
pub use realm::ZoneRealm;
pub use tracker::{PlayerZoneState, Transition, ZoneTransitionTracker};
