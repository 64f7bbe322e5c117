//! Tunables for the zone core.

use serde::{Deserialize, Serialize};
use warden_zone::ZoneDefaults;

/// Zone core configuration.
///
/// Every field has a default, so a partial JSON object is a valid config. Call
/// [`ZoneConfig::validated`] after loading to clamp values into their supported ranges.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Zones with more edge tiles than this get no barrier.
    pub max_edge_tiles: usize,
    /// Barrier operations run inline by the call that submits a diff.
    pub batch_size: usize,
    /// Lazy placement tiles processed per tick, shared by all levels.
    pub max_placements_per_tick: usize,
    /// Deferred barrier operations processed per tick and level.
    pub max_sync_ops_per_tick: usize,
    pub default_damage_multiplier: f32,
    pub default_combat_lock_secs: u32,
    pub reentry_cooldown_ms: u64,
    pub spawn_immunity_secs: f32,
    pub relocation_search_radius: u32,
    /// Lower bound of the scan-area cap for stray sweeps and force-clean.
    pub min_sweep_area: u64,
    /// Creating more zones than this on a level logs a warning.
    pub zone_soft_limit: usize,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            max_edge_tiles: 1000,
            batch_size: 50,
            max_placements_per_tick: 10,
            max_sync_ops_per_tick: 200,
            default_damage_multiplier: 0.05,
            default_combat_lock_secs: 3,
            reentry_cooldown_ms: 30_000,
            spawn_immunity_secs: 5.0,
            relocation_search_radius: 8,
            min_sweep_area: 1000,
            zone_soft_limit: 100,
        }
    }
}

impl ZoneConfig {
    /// Clamp every field into its supported range.
    #[must_use]
    pub fn validated(self) -> Self {
        let defaults = Self::default();
        let unit = |value: f32, fallback: f32, max: f32| {
            if value.is_finite() {
                value.clamp(0.0, max)
            } else {
                fallback
            }
        };
        Self {
            max_edge_tiles: self.max_edge_tiles.clamp(10, 10_000),
            batch_size: self.batch_size.clamp(1, 200),
            max_placements_per_tick: self.max_placements_per_tick.clamp(1, 100),
            max_sync_ops_per_tick: self.max_sync_ops_per_tick.clamp(1, 10_000),
            default_damage_multiplier: unit(
                self.default_damage_multiplier,
                defaults.default_damage_multiplier,
                1.0,
            ),
            default_combat_lock_secs: self.default_combat_lock_secs.min(10),
            reentry_cooldown_ms: self.reentry_cooldown_ms.min(300_000),
            spawn_immunity_secs: unit(self.spawn_immunity_secs, defaults.spawn_immunity_secs, 60.0),
            relocation_search_radius: self.relocation_search_radius.clamp(1, 64),
            min_sweep_area: self.min_sweep_area.max(1),
            zone_soft_limit: self.zone_soft_limit,
        }
    }

    /// Largest area a stray sweep or force-clean may scan.
    #[must_use]
    pub const fn sweep_area_cap(&self) -> u64 {
        let scaled = self.max_edge_tiles as u64 * 4;
        if scaled > self.min_sweep_area {
            scaled
        } else {
            self.min_sweep_area
        }
    }

    /// Defaults handed to the zone store for new PvP zones.
    #[must_use]
    pub const fn zone_defaults(&self) -> ZoneDefaults {
        ZoneDefaults {
            damage_multiplier: self.default_damage_multiplier,
            combat_lock_secs: self.default_combat_lock_secs,
        }
    }
}
