//! A level wired to a [`MemoryHost`].

use warden_geom::{TilePos, TileRect, TileSet};
use warden_sync::{Host, LevelId, LevelTick, SyncResult, ZoneConfig, ZoneLevel};
use warden_zone::{AuthId, Resolution, ZoneId, ZoneType};

use crate::MemoryHost;

/// One zone level and its host.
#[derive(Debug)]
pub struct Fixture {
    pub host: MemoryHost,
    pub level: ZoneLevel,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ZoneConfig::default())
    }

    /// A fresh level. Initial barrier creation is already done.
    #[must_use]
    pub fn with_config(config: ZoneConfig) -> Self {
        Self::with_level(MemoryHost::new(), ZoneLevel::new(LevelId(1), config))
    }

    /// Wrap an existing level, e.g. one loaded from disk. Initial barriers are not created.
    #[must_use]
    pub fn from_level(host: MemoryHost, level: ZoneLevel) -> Self {
        Self { host, level }
    }

    fn with_level(host: MemoryHost, level: ZoneLevel) -> Self {
        let fixture = Self { host, level };
        fixture.level.create_initial_barriers(fixture.handle());
        fixture
    }

    /// The host bundle for one call.
    pub fn handle(&self) -> Host<'_> {
        Host::new(&self.host)
    }

    #[must_use]
    pub const fn level_id(&self) -> LevelId {
        self.level.id()
    }

    /// Create a PvP zone covering `rect` with its barrier fully applied.
    ///
    /// # Panics
    ///
    /// Panics if the expansion fails.
    pub fn pvp_zone(&self, rect: TileRect) -> ZoneId {
        self.zone(ZoneType::Pvp, None, rect)
    }

    /// Create a protected zone covering `rect`, owned by `owner`.
    ///
    /// # Panics
    ///
    /// Panics if the expansion fails.
    pub fn protected_zone(&self, owner: AuthId, rect: TileRect) -> ZoneId {
        self.zone(ZoneType::Protected, Some(owner), rect)
    }

    fn zone(&self, zone_type: ZoneType, creator: Option<AuthId>, rect: TileRect) -> ZoneId {
        let id = self
            .level
            .create_zone(self.handle(), zone_type, None, creator, None);
        self.expand(id, rect);
        self.flush();
        id
    }

    /// # Panics
    ///
    /// Panics if the zone is unknown or the rectangle degenerate.
    pub fn expand(&self, id: ZoneId, rect: TileRect) -> Option<Resolution> {
        self.level
            .expand_zone(self.handle(), id, rect)
            .expect("expand failed")
    }

    /// # Panics
    ///
    /// Panics if the zone is unknown or the rectangle degenerate.
    pub fn shrink(&self, id: ZoneId, rect: TileRect) -> Option<Resolution> {
        self.level
            .shrink_zone(self.handle(), id, rect)
            .expect("shrink failed")
    }

    /// Apply every queued barrier operation.
    ///
    /// # Panics
    ///
    /// Panics if the barrier object is missing.
    pub fn flush(&self) {
        self.level.flush(self.handle()).expect("flush failed");
    }

    /// One tick with the configured placement budget.
    pub fn tick(&self, now_ms: u64) -> LevelTick {
        let budget = self.level.config().max_placements_per_tick;
        self.level.tick(self.handle(), now_ms, budget)
    }

    pub fn delete(&self, id: ZoneId) -> SyncResult<()> {
        self.level.delete_zone(self.handle(), id)
    }

    /// Edge tiles of one zone.
    #[must_use]
    pub fn edges(&self, id: ZoneId) -> TileSet {
        self.level
            .store()
            .read(id, |zone| zone.edge_tiles())
            .unwrap_or_default()
    }

    /// Union of all PvP zone edges: where barriers belong.
    #[must_use]
    pub fn expected_barriers(&self) -> TileSet {
        let mut expected = TileSet::new();
        for zone in self.level.store().zones_of_type(ZoneType::Pvp) {
            expected.extend_from(&zone.edge_tiles());
        }
        expected
    }

    #[must_use]
    pub fn barriers(&self) -> TileSet {
        self.host.barrier_tiles(self.level_id())
    }

    /// Whether a tile holds a barrier.
    #[must_use]
    pub fn has_barrier(&self, pos: TilePos) -> bool {
        self.barriers().contains(pos)
    }
}
