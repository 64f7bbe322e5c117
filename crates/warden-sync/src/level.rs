//! One level's zones, barriers and player tracking.

use std::path::Path;

use parking_lot::Mutex;
use tracing::{error, info, warn};
use warden_geom::{TilePos, TileRect};
use warden_zone::{
    AuthId, Denial, ProtectedRules, PvpRules, Resolution, TeamDirectory, Zone, ZoneId, ZoneStore,
    ZoneType,
};

use crate::{
    BarrierSynchronizer, DotModifier, Host, LevelId, Notice, RegionId, SyncResult, Transition,
    ZoneConfig, ZoneTransitionTracker,
};

#[derive(Debug)]
struct LevelState {
    sync: BarrierSynchronizer,
    tracker: ZoneTransitionTracker,
    initial_barriers_done: bool,
    /// Server time of the latest tick, used by calls made between ticks.
    now_ms: u64,
}

/// The zone core for one level.
///
/// Owns the level's [`ZoneStore`]. All methods take `&self`, so admin commands and the
/// tick loop can share a level; barrier and tracker state sit behind one mutex.
#[derive(Debug)]
pub struct ZoneLevel {
    id: LevelId,
    config: ZoneConfig,
    store: ZoneStore,
    state: Mutex<LevelState>,
}

/// What one level tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelTick {
    pub placements: usize,
    pub transitions: Vec<(AuthId, Transition)>,
    pub dot_scaled: usize,
}

impl ZoneLevel {
    #[must_use]
    pub fn new(id: LevelId, config: ZoneConfig) -> Self {
        Self::with_store(id, config, ZoneStore::new(config.zone_defaults()))
    }

    #[must_use]
    pub fn with_store(id: LevelId, config: ZoneConfig, store: ZoneStore) -> Self {
        Self {
            id,
            config,
            store,
            state: Mutex::new(LevelState {
                sync: BarrierSynchronizer::new(id, config),
                tracker: ZoneTransitionTracker::new(id, config),
                initial_barriers_done: false,
                now_ms: 0,
            }),
        }
    }

    /// Load the level's zones from a save file (missing file: no zones).
    pub fn load(id: LevelId, config: ZoneConfig, path: impl AsRef<Path>) -> SyncResult<Self> {
        let store = ZoneStore::load_from_path(path, config.zone_defaults())?;
        Ok(Self::with_store(id, config, store))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> SyncResult<()> {
        self.store.save_to_path(path)?;
        Ok(())
    }

    #[must_use]
    pub const fn id(&self) -> LevelId {
        self.id
    }

    #[must_use]
    pub const fn store(&self) -> &ZoneStore {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Queued barrier operations and placement tasks.
    #[must_use]
    pub fn pending_work(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.sync.pending_ops(), state.sync.pending_placements())
    }

    pub fn create_zone(
        &self,
        host: Host<'_>,
        zone_type: ZoneType,
        name: Option<&str>,
        creator: Option<AuthId>,
        color_hue: Option<u16>,
    ) -> ZoneId {
        let count = self.store.count_of_type(zone_type);
        if count >= self.config.zone_soft_limit {
            warn!(
                level = %self.id,
                %zone_type,
                count,
                limit = self.config.zone_soft_limit,
                "zone count above soft limit"
            );
        }
        let id = self.store.create(zone_type, name, creator, color_hue);
        self.broadcast_zone(host, id);
        id
    }

    /// Delete a zone: strip its barriers, cancel queued work, release its players.
    pub fn delete_zone(&self, host: Host<'_>, id: ZoneId) -> SyncResult<()> {
        let zone = self.store.remove(id)?;
        let mut state = self.state.lock();
        if zone.zone_type() == ZoneType::Pvp {
            let edges = zone.edge_tiles();
            if let Err(error) = state.sync.remove_barrier(&self.store, host, id, &edges) {
                error!(level = %self.id, zone = %id, %error, "failed to strip barrier of deleted zone");
            }
            let now = state.now_ms;
            state.tracker.reconcile_zones(&self.store, host, &[id], now);
        }
        host.net.zone_removed(self.id, id, zone.zone_type());
        Ok(())
    }

    /// Add a rectangle to a zone. Returns the resolution, `None` if nothing changed.
    pub fn expand_zone(
        &self,
        host: Host<'_>,
        id: ZoneId,
        rect: TileRect,
    ) -> SyncResult<Option<Resolution>> {
        let resolution = self.store.expand(id, rect).inspect_err(|error| {
            warn!(level = %self.id, zone = %id, %error, "expand rejected");
        })?;
        if let Some(resolution) = &resolution {
            self.apply_resolution(host, resolution);
        }
        Ok(resolution)
    }

    /// Remove a rectangle from a zone. Returns the resolution, `None` if nothing changed.
    pub fn shrink_zone(
        &self,
        host: Host<'_>,
        id: ZoneId,
        rect: TileRect,
    ) -> SyncResult<Option<Resolution>> {
        let resolution = self.store.shrink(id, rect).inspect_err(|error| {
            warn!(level = %self.id, zone = %id, %error, "shrink rejected");
        })?;
        if let Some(resolution) = &resolution {
            self.apply_resolution(host, resolution);
        }
        Ok(resolution)
    }

    /// Split a zone into connected parts and sync their barriers.
    pub fn split_zone(&self, host: Host<'_>, id: ZoneId) -> SyncResult<Resolution> {
        let resolution = self.store.split_if_disconnected(id)?;
        self.apply_resolution(host, &resolution);
        Ok(resolution)
    }

    /// Sync barriers, notify clients and reconcile players after a settled edit.
    fn apply_resolution(&self, host: Host<'_>, resolution: &Resolution) {
        let mut state = self.state.lock();
        let state = &mut *state;
        let mut settled = Vec::new();

        for removed in &resolution.removed {
            if removed.zone_type == ZoneType::Pvp {
                let result = if removed.merged_into.is_some() {
                    state.sync.cancel(&self.store, host, removed.id)
                } else {
                    state
                        .sync
                        .remove_barrier(&self.store, host, removed.id, &removed.old_edges)
                };
                if let Err(error) = result {
                    error!(level = %self.id, zone = %removed.id, %error, "failed to clear removed zone");
                }
            }
            host.net.zone_removed(self.id, removed.id, removed.zone_type);
        }

        for change in &resolution.changed {
            if change.zone_type == ZoneType::Pvp {
                let merged: Vec<ZoneId> = resolution
                    .removed
                    .iter()
                    .filter(|removed| removed.merged_into == Some(change.id))
                    .map(|removed| removed.id)
                    .collect();
                match state.sync.update_barrier(&self.store, host, change, &merged) {
                    Ok(outcome) => settled.extend(outcome.settled),
                    Err(error) => {
                        error!(level = %self.id, zone = %change.id, %error, "barrier update failed");
                    }
                }
            }
            self.broadcast_zone(host, change.id);
        }

        let now = state.now_ms;
        for settled in &settled {
            state.tracker.reconcile(&self.store, host, settled, now);
        }
        let deleted: Vec<ZoneId> = resolution
            .removed
            .iter()
            .filter(|removed| removed.zone_type == ZoneType::Pvp && removed.merged_into.is_none())
            .map(|removed| removed.id)
            .collect();
        if !deleted.is_empty() {
            state.tracker.reconcile_zones(&self.store, host, &deleted, now);
        }
    }

    fn broadcast_zone(&self, host: Host<'_>, id: ZoneId) {
        if let Some(zone) = self.store.get(id) {
            host.net.zone_changed(self.id, &zone);
        }
    }

    pub fn rename_zone(&self, host: Host<'_>, id: ZoneId, name: &str) -> SyncResult<()> {
        self.store.rename(id, name)?;
        self.broadcast_zone(host, id);
        Ok(())
    }

    pub fn set_zone_hue(&self, host: Host<'_>, id: ZoneId, hue: u16) -> SyncResult<u16> {
        let hue = self.store.set_color_hue(id, hue)?;
        self.broadcast_zone(host, id);
        Ok(hue)
    }

    pub fn update_protected_rules<R>(
        &self,
        host: Host<'_>,
        id: ZoneId,
        f: impl FnOnce(&mut ProtectedRules) -> R,
    ) -> SyncResult<R> {
        let result = self.store.update_protected_rules(id, f)?;
        self.broadcast_zone(host, id);
        Ok(result)
    }

    pub fn update_pvp_rules(
        &self,
        host: Host<'_>,
        id: ZoneId,
        f: impl FnOnce(&mut PvpRules),
    ) -> SyncResult<PvpRules> {
        let rules = self.store.update_pvp_rules(id, f)?;
        self.broadcast_zone(host, id);
        Ok(rules)
    }

    /// Strip unclaimed barriers in a square around `center`.
    pub fn force_clean_around(
        &self,
        host: Host<'_>,
        center: TilePos,
        radius: u32,
    ) -> SyncResult<usize> {
        self.state
            .lock()
            .sync
            .force_clean_around(&self.store, host, center, radius)
    }

    /// Queue lazy placement for zones with edges in a freshly loaded region.
    pub fn on_region_loaded(&self, host: Host<'_>, region: RegionId) -> usize {
        self.state
            .lock()
            .sync
            .on_region_loaded(&self.store, host, region)
    }

    /// Create barriers for every PvP zone. Runs once per level; later calls do nothing.
    pub fn create_initial_barriers(&self, host: Host<'_>) {
        let mut state = self.state.lock();
        self.initial_barriers(&mut state, host);
    }

    fn initial_barriers(&self, state: &mut LevelState, host: Host<'_>) {
        if state.initial_barriers_done {
            return;
        }
        state.initial_barriers_done = true;
        let zones = self.store.ids_of_type(ZoneType::Pvp);
        info!(level = %self.id, zones = zones.len(), "creating initial barriers");
        for id in zones {
            if let Err(error) = state.sync.create_barrier(&self.store, host, id) {
                error!(level = %self.id, zone = %id, %error, "initial barrier failed");
            }
        }
    }

    /// Advance the level by one tick.
    ///
    /// `placement_budget` is this level's share of the lazy placement budget.
    pub fn tick(&self, host: Host<'_>, now_ms: u64, placement_budget: usize) -> LevelTick {
        let mut state = self.state.lock();
        let state = &mut *state;
        state.now_ms = now_ms;
        self.initial_barriers(state, host);

        let mut tick = LevelTick::default();
        match state.sync.tick(&self.store, host) {
            Ok(settled) => {
                for settled in &settled {
                    let transitions = state.tracker.reconcile(&self.store, host, settled, now_ms);
                    tick.transitions.extend(transitions);
                }
            }
            Err(error) => error!(level = %self.id, %error, "barrier tick failed"),
        }

        match state
            .sync
            .drain_placements(&self.store, host, placement_budget)
        {
            Ok(used) => tick.placements = used,
            Err(error) => error!(level = %self.id, %error, "barrier placement failed"),
        }

        let settling = state.sync.settling_zones();
        for player in host.players.online_players(self.id) {
            let transition = state
                .tracker
                .update_player(&self.store, host, &player, &settling, now_ms);
            if transition != Transition::Stayed {
                tick.transitions.push((player.auth, transition));
            }
        }

        tick.dot_scaled = DotModifier::apply(&self.store, host, self.id);
        tick
    }

    /// Apply all queued barrier work now and reconcile affected players.
    pub fn flush(&self, host: Host<'_>) -> SyncResult<()> {
        let mut state = self.state.lock();
        let state = &mut *state;
        let settled = state.sync.flush(&self.store, host)?;
        let now = state.now_ms;
        for settled in &settled {
            state.tracker.reconcile(&self.store, host, settled, now);
        }
        Ok(())
    }

    pub fn record_combat(&self, auth: AuthId, now_ms: u64) {
        self.state.lock().tracker.record_combat(auth, now_ms);
    }

    pub fn player_left(&self, auth: AuthId) {
        self.state.lock().tracker.player_left(auth);
    }

    #[must_use]
    pub fn current_pvp_zone(&self, auth: AuthId) -> Option<ZoneId> {
        self.state.lock().tracker.current_pvp(auth)
    }

    #[must_use]
    pub fn remaining_combat_lock_secs(&self, auth: AuthId, now_ms: u64) -> u32 {
        self.state
            .lock()
            .tracker
            .remaining_combat_lock_secs(&self.store, auth, now_ms)
    }

    #[must_use]
    pub fn remaining_cooldown_secs(&self, auth: AuthId, now_ms: u64) -> u32 {
        self.state
            .lock()
            .tracker
            .remaining_cooldown_secs(auth, now_ms)
    }

    /// Damage multiplier for a hit between two tiles, `None` unless both share a PvP zone.
    #[must_use]
    pub fn pvp_damage_multiplier(&self, attacker: TilePos, victim: TilePos) -> Option<f32> {
        let zone = self.store.both_in_same_pvp_zone(attacker, victim)?;
        self.store
            .read(zone, |z| z.pvp_rules().map(|rules| rules.damage_multiplier))
            .flatten()
    }

    pub fn check_break(&self, host: Host<'_>, auth: AuthId, pos: TilePos) -> Result<(), Denial> {
        self.check_protected(host, auth, pos, |zone, teams| zone.check_break(auth, teams))
    }

    pub fn check_place(&self, host: Host<'_>, auth: AuthId, pos: TilePos) -> Result<(), Denial> {
        self.check_protected(host, auth, pos, |zone, teams| zone.check_place(auth, teams))
    }

    /// Interaction with the object at `pos`, classified by the host's object traits.
    pub fn check_interact(&self, host: Host<'_>, auth: AuthId, pos: TilePos) -> Result<(), Denial> {
        let traits = host.world.object_traits(self.id, pos);
        self.check_protected(host, auth, pos, |zone, teams| {
            zone.check_interact(auth, traits, teams)
        })
    }

    /// Break and place together, for tools that replace a tile.
    pub fn check_modify_tile(
        &self,
        host: Host<'_>,
        auth: AuthId,
        pos: TilePos,
    ) -> Result<(), Denial> {
        self.check_break(host, auth, pos)?;
        self.check_place(host, auth, pos)
    }

    fn check_protected(
        &self,
        host: Host<'_>,
        auth: AuthId,
        pos: TilePos,
        check: impl FnOnce(&Zone, &dyn TeamDirectory) -> Result<(), Denial>,
    ) -> Result<(), Denial> {
        let Some(id) = self.store.zone_at(ZoneType::Protected, pos) else {
            return Ok(());
        };
        let result = self
            .store
            .read(id, |zone| check(zone, host.teams))
            .unwrap_or(Ok(()));
        if let Err(denial) = &result {
            host.net.notify(auth, &Notice::Denied(denial.clone()));
        }
        result
    }
}
