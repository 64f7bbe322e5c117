//! Barrier placement and removal on single tiles.

use tracing::{error, trace};
use warden_geom::TilePos;
use warden_zone::{ZoneId, ZoneStore, ZoneType};

use crate::{Host, LevelId, ObjectId};

/// Everything needed to touch barrier tiles on one level.
#[derive(Copy, Clone, Debug)]
pub(crate) struct WorldOps<'a> {
    pub level: LevelId,
    pub store: &'a ZoneStore,
    pub host: Host<'a>,
    pub barrier: ObjectId,
}

impl WorldOps<'_> {
    /// Whether a loaded tile currently holds a barrier.
    pub fn is_barrier(&self, pos: TilePos) -> bool {
        if !self.host.world.is_region_loaded(self.level, pos) {
            return false;
        }
        match self.host.world.object_at(self.level, pos) {
            Ok(object) => object == self.barrier,
            Err(error) => {
                error!(level = %self.level, %pos, %error, "failed to read tile");
                false
            }
        }
    }

    /// Place a barrier unless one is already there. Returns `true` if the world changed.
    pub fn place(&self, pos: TilePos) -> bool {
        if !self.host.world.is_region_loaded(self.level, pos) {
            trace!(level = %self.level, %pos, "region not loaded, placement deferred");
            return false;
        }
        let existing = match self.host.world.object_at(self.level, pos) {
            Ok(object) => object,
            Err(error) => {
                error!(level = %self.level, %pos, %error, "failed to read tile");
                return false;
            }
        };
        if existing == self.barrier {
            return false;
        }
        self.set(pos, self.barrier)
    }

    /// Clear a barrier if one is there. Returns `true` if the world changed.
    pub fn clear(&self, pos: TilePos) -> bool {
        if !self.is_barrier(pos) {
            return false;
        }
        self.set(pos, ObjectId::EMPTY)
    }

    fn set(&self, pos: TilePos, object: ObjectId) -> bool {
        match self.host.world.set_object_at(self.level, pos, object) {
            Ok(()) => {
                self.host.net.object_changed(self.level, pos, object);
                true
            }
            Err(error) => {
                error!(level = %self.level, %pos, %error, "failed to change barrier tile");
                false
            }
        }
    }

    /// Whether any live PvP zone claims `pos` as an edge.
    pub fn claimed(&self, pos: TilePos) -> bool {
        self.store.is_edge_of_any(ZoneType::Pvp, pos)
    }

    /// Whether some live PvP zone other than `zone` claims `pos` as an edge.
    pub fn claimed_by_other(&self, zone: ZoneId, pos: TilePos) -> bool {
        self.store.is_edge_of_other(ZoneType::Pvp, pos, zone)
    }
}
