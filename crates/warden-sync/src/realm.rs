//! All zone levels of a server.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{error, info};
use warden_zone::AuthId;

use crate::{Host, LevelId, LevelTick, RegionId, SyncError, SyncResult, ZoneConfig, ZoneLevel};

/// Zone levels keyed by level ID, ticked together.
///
/// The lazy placement budget is shared: levels are visited in ID order and each one
/// spends from what the previous ones left.
#[derive(Debug, Default)]
pub struct ZoneRealm {
    config: ZoneConfig,
    levels: BTreeMap<LevelId, ZoneLevel>,
}

impl ZoneRealm {
    #[must_use]
    pub fn new(config: ZoneConfig) -> Self {
        Self {
            config,
            levels: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Add a level, replacing any level with the same ID.
    pub fn insert_level(&mut self, level: ZoneLevel) -> Option<ZoneLevel> {
        info!(level = %level.id(), zones = level.store().len(), "zone level registered");
        self.levels.insert(level.id(), level)
    }

    /// Get or create an empty level.
    pub fn level_or_default(&mut self, id: LevelId) -> &ZoneLevel {
        let config = self.config;
        self.levels
            .entry(id)
            .or_insert_with(|| ZoneLevel::new(id, config))
    }

    pub fn level(&self, id: LevelId) -> SyncResult<&ZoneLevel> {
        self.levels.get(&id).ok_or(SyncError::UnknownLevel(id))
    }

    pub fn remove_level(&mut self, id: LevelId) -> Option<ZoneLevel> {
        self.levels.remove(&id)
    }

    pub fn levels(&self) -> impl Iterator<Item = &ZoneLevel> {
        self.levels.values()
    }

    /// Tick every level. Returns each level's report.
    pub fn tick(&self, host: Host<'_>, now_ms: u64) -> Vec<(LevelId, LevelTick)> {
        let mut budget = self.config.max_placements_per_tick;
        self.levels
            .values()
            .map(|level| {
                let tick = level.tick(host, now_ms, budget);
                budget = budget.saturating_sub(tick.placements);
                (level.id(), tick)
            })
            .collect()
    }

    pub fn on_region_loaded(
        &self,
        host: Host<'_>,
        level: LevelId,
        region: RegionId,
    ) -> SyncResult<usize> {
        Ok(self.level(level)?.on_region_loaded(host, region))
    }

    /// Forget a disconnected player on every level.
    pub fn player_left(&self, auth: AuthId) {
        for level in self.levels.values() {
            level.player_left(auth);
        }
    }

    /// Save every level to `dir/<level>.json`. Failures are logged per level.
    pub fn save_all(&self, dir: impl AsRef<Path>) -> usize {
        let dir = dir.as_ref();
        let mut saved = 0;
        for level in self.levels.values() {
            let path = dir.join(format!("{}.json", level.id()));
            match level.save(&path) {
                Ok(()) => saved += 1,
                Err(error) => error!(level = %level.id(), %error, "failed to save zones"),
            }
        }
        saved
    }
}
