//! Synchronisation error types.

use thiserror::Error;
use warden_geom::TilePos;
use warden_zone::{ZoneError, ZoneId};

use crate::LevelId;

/// A single world mutation or query failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The region holding the tile is not loaded.
    #[error("region not loaded at {0}")]
    RegionNotLoaded(TilePos),

    /// The tile lies outside the level.
    #[error("tile out of bounds: {0}")]
    OutOfBounds(TilePos),

    /// The host refused the mutation.
    #[error("world rejected change at {pos}: {reason}")]
    Rejected { pos: TilePos, reason: String },
}

/// Barrier synchronisation and level orchestration error type.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Zone edge is larger than the configured cap; nothing was placed.
    #[error("zone {zone} has {edges} edge tiles, cap is {cap}")]
    EdgeCapExceeded { zone: ZoneId, edges: usize, cap: usize },

    /// Requested scan area is larger than the configured cap.
    #[error("area of {area} tiles exceeds the cap of {cap}")]
    AreaTooLarge { area: u64, cap: u64 },

    /// The host does not know the barrier object.
    #[error("barrier object '{0}' is not registered")]
    BarrierObjectMissing(&'static str),

    /// No zone level with this ID.
    #[error("unknown level: {0}")]
    UnknownLevel(LevelId),

    /// Zone store error.
    #[error(transparent)]
    Zone(#[from] ZoneError),

    /// World access error.
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Result type for synchronisation operations.
pub type SyncResult<T> = Result<T, SyncError>;
