//! Per-player zone membership.
//!
//! ```text
//!             enter (cooldown elapsed)
//!   Outside ───────────────────────────► InZone(id)
//!      ▲                                     │
//!      │  exit: walked out and not in        │
//!      │  combat, or forced by a shrink,     │
//!      └──────── deletion or merge ──────────┘
//! ```
//!
//! Protected zones only drive a status indicator. PvP zones drive the player's PvP flag,
//! spawn immunity, the combat lock and the re-entry cooldown.

use rustc_hash::FxHashMap;
use tracing::{debug, info};
use warden_geom::{TilePos, nearest_outside};
use warden_zone::{AuthId, PvpRules, ZoneId, ZoneStore, ZoneType};

use crate::{Host, LevelId, Notice, PlayerSnapshot, Settled, ZoneConfig, ZoneStatus};

/// Zone state of one player.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayerZoneState {
    pub current_pvp: Option<ZoneId>,
    pub current_protected: Option<ZoneId>,
    /// Server time of the last PvP exit.
    pub last_exit_ms: Option<u64>,
    /// Server time of the last hit dealt or taken.
    pub last_combat_ms: Option<u64>,
    cooldown_notice: Option<ZoneId>,
    lock_notice: Option<u32>,
}

/// What happened to a player's PvP membership.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Stayed,
    Entered(ZoneId),
    Exited(ZoneId),
    /// Removed by geometry or deletion, regardless of combat.
    ForcedExit { zone: ZoneId, to: TilePos },
    /// Membership moved to another zone covering the player.
    Moved { from: ZoneId, to: ZoneId },
    ExitBlocked { zone: ZoneId, remaining_secs: u32 },
    EntryPending { zone: ZoneId, remaining_secs: u32 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ExitMode {
    Voluntary,
    Forced,
}

/// Zone membership of every player on one level.
#[derive(Debug)]
pub struct ZoneTransitionTracker {
    level: LevelId,
    config: ZoneConfig,
    players: FxHashMap<AuthId, PlayerZoneState>,
}

impl ZoneTransitionTracker {
    #[must_use]
    pub fn new(level: LevelId, config: ZoneConfig) -> Self {
        Self {
            level,
            config,
            players: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn state(&self, auth: AuthId) -> Option<&PlayerZoneState> {
        self.players.get(&auth)
    }

    #[must_use]
    pub fn current_pvp(&self, auth: AuthId) -> Option<ZoneId> {
        self.players.get(&auth).and_then(|state| state.current_pvp)
    }

    /// Forget a disconnected player.
    pub fn player_left(&mut self, auth: AuthId) -> Option<PlayerZoneState> {
        let state = self.players.remove(&auth);
        if state.is_some() {
            debug!(level = %self.level, player = %auth, "dropped zone state");
        }
        state
    }

    pub fn record_combat(&mut self, auth: AuthId, now_ms: u64) {
        self.players.entry(auth).or_default().last_combat_ms = Some(now_ms);
    }

    #[must_use]
    pub fn can_reenter(&self, auth: AuthId, now_ms: u64) -> bool {
        self.remaining_cooldown_ms(auth, now_ms) == 0
    }

    fn remaining_cooldown_ms(&self, auth: AuthId, now_ms: u64) -> u64 {
        self.players
            .get(&auth)
            .map_or(0, |state| cooldown_remaining(&self.config, state, now_ms))
    }

    /// Seconds until re-entry is allowed, rounded up.
    #[must_use]
    pub fn remaining_cooldown_secs(&self, auth: AuthId, now_ms: u64) -> u32 {
        ceil_secs(self.remaining_cooldown_ms(auth, now_ms))
    }

    #[must_use]
    pub fn is_in_combat(&self, store: &ZoneStore, auth: AuthId, now_ms: u64) -> bool {
        self.remaining_combat_lock_ms(store, auth, now_ms) > 0
    }

    fn remaining_combat_lock_ms(&self, store: &ZoneStore, auth: AuthId, now_ms: u64) -> u64 {
        let Some(state) = self.players.get(&auth) else {
            return 0;
        };
        let Some(zone) = state.current_pvp else {
            return 0;
        };
        store
            .read(zone, |z| z.pvp_rules().copied())
            .flatten()
            .map_or(0, |rules| combat_remaining(&rules, state, now_ms))
    }

    /// Seconds of combat lock left in the current zone, rounded up.
    #[must_use]
    pub fn remaining_combat_lock_secs(&self, store: &ZoneStore, auth: AuthId, now_ms: u64) -> u32 {
        ceil_secs(self.remaining_combat_lock_ms(store, auth, now_ms))
    }

    /// Per-tick evaluation of one player.
    ///
    /// A player tracked in a zone listed in `settling` keeps that membership until the
    /// zone's barrier job settles; reconciliation then decides the exit.
    pub fn update_player(
        &mut self,
        store: &ZoneStore,
        host: Host<'_>,
        player: &PlayerSnapshot,
        settling: &[ZoneId],
        now_ms: u64,
    ) -> Transition {
        self.update_protected(store, host, player);
        if self
            .current_pvp(player.auth)
            .is_some_and(|zone| settling.contains(&zone))
        {
            return Transition::Stayed;
        }
        self.evaluate_pvp(store, host, player, now_ms, ExitMode::Voluntary)
    }

    /// Re-evaluate players around zones whose barriers just settled.
    ///
    /// Exits here are forced: the geometry moved, not the player.
    pub fn reconcile(
        &mut self,
        store: &ZoneStore,
        host: Host<'_>,
        settled: &Settled,
        now_ms: u64,
    ) -> Vec<(AuthId, Transition)> {
        self.reconcile_zones(store, host, &settled.affected, now_ms)
    }

    /// Re-evaluate every player tracked in or standing in one of `zones`.
    pub fn reconcile_zones(
        &mut self,
        store: &ZoneStore,
        host: Host<'_>,
        zones: &[ZoneId],
        now_ms: u64,
    ) -> Vec<(AuthId, Transition)> {
        let mut transitions = Vec::new();
        for player in host.players.online_players(self.level) {
            let tracked = self.current_pvp(player.auth);
            let here = store.zone_at(ZoneType::Pvp, player.tile());
            let involved = tracked.is_some_and(|id| zones.contains(&id))
                || here.is_some_and(|id| zones.contains(&id));
            if !involved {
                continue;
            }
            let transition = self.evaluate_pvp(store, host, &player, now_ms, ExitMode::Forced);
            if transition != Transition::Stayed {
                transitions.push((player.auth, transition));
            }
        }
        transitions
    }

    fn update_protected(&mut self, store: &ZoneStore, host: Host<'_>, player: &PlayerSnapshot) {
        let here = store.zone_at(ZoneType::Protected, player.tile());
        let state = self.players.entry(player.auth).or_default();
        if state.current_protected == here {
            return;
        }
        state.current_protected = here;
        let status = here
            .and_then(|id| store.read(id, |zone| zone.protected_status(player.auth, host.teams)))
            .flatten()
            .map_or(ZoneStatus::ProtectedCleared, ZoneStatus::Protected);
        host.net.zone_status(player.auth, &status);
    }

    fn evaluate_pvp(
        &mut self,
        store: &ZoneStore,
        host: Host<'_>,
        player: &PlayerSnapshot,
        now_ms: u64,
        mode: ExitMode,
    ) -> Transition {
        let here = store.pvp_rules_at(player.tile());
        let ctx = Ctx {
            level: self.level,
            config: &self.config,
            store,
            host,
            player,
            now_ms,
        };
        let state = self.players.entry(player.auth).or_default();

        match (state.current_pvp, here) {
            (None, None) => Transition::Stayed,
            (None, Some((zone, rules))) => ctx.try_enter(state, zone, &rules),
            (Some(current), Some((zone, _))) if current == zone => {
                state.lock_notice = None;
                Transition::Stayed
            }
            (Some(current), Some((zone, rules))) => {
                state.current_pvp = Some(zone);
                debug!(level = %ctx.level, player = %player.auth, from = %current, to = %zone, "pvp membership moved");
                ctx.send_pvp_status(zone, &rules);
                Transition::Moved {
                    from: current,
                    to: zone,
                }
            }
            (Some(current), None) => {
                let rules = store.read(current, |z| z.pvp_rules().copied()).flatten();
                match (rules, mode) {
                    (None, _) | (Some(_), ExitMode::Forced) => ctx.force_exit(state, current),
                    (Some(rules), ExitMode::Voluntary) => {
                        let remaining = combat_remaining(&rules, state, now_ms);
                        if remaining > 0 {
                            ctx.block_exit(state, current, remaining)
                        } else {
                            ctx.exit(state, current)
                        }
                    }
                }
            }
        }
    }
}

/// Borrowed context for one player evaluation.
struct Ctx<'a> {
    level: LevelId,
    config: &'a ZoneConfig,
    store: &'a ZoneStore,
    host: Host<'a>,
    player: &'a PlayerSnapshot,
    now_ms: u64,
}

impl Ctx<'_> {
    fn zone_name(&self, zone: ZoneId) -> String {
        self.store
            .read(zone, |z| z.name.clone())
            .unwrap_or_else(|| zone.to_string())
    }

    fn set_pvp(&self, enabled: bool) {
        if self.host.players.forced_pvp(self.level) || self.player.pvp_enabled == enabled {
            return;
        }
        self.host.players.set_pvp(self.player.auth, enabled);
        self.host.net.pvp_flag_changed(self.player.auth, enabled);
    }

    fn send_pvp_status(&self, zone: ZoneId, rules: &PvpRules) {
        let status = ZoneStatus::Pvp {
            zone,
            name: self.zone_name(zone),
            damage_multiplier: rules.damage_multiplier,
        };
        self.host.net.zone_status(self.player.auth, &status);
    }

    fn try_enter(&self, state: &mut PlayerZoneState, zone: ZoneId, rules: &PvpRules) -> Transition {
        let auth = self.player.auth;
        let remaining = cooldown_remaining(self.config, state, self.now_ms);
        if remaining > 0 {
            let remaining_secs = ceil_secs(remaining);
            if state.cooldown_notice != Some(zone) {
                state.cooldown_notice = Some(zone);
                self.host.net.notify(
                    auth,
                    &Notice::ReentryCooldown {
                        zone: self.zone_name(zone),
                        remaining_secs,
                    },
                );
            }
            return Transition::EntryPending {
                zone,
                remaining_secs,
            };
        }

        state.current_pvp = Some(zone);
        state.cooldown_notice = None;
        state.lock_notice = None;
        self.set_pvp(true);
        self.host
            .players
            .grant_spawn_immunity(auth, self.config.spawn_immunity_secs);
        self.host.net.notify(
            auth,
            &Notice::EnteredPvp {
                zone: self.zone_name(zone),
                damage_multiplier: rules.damage_multiplier,
            },
        );
        self.send_pvp_status(zone, rules);
        info!(level = %self.level, player = %auth, zone = %zone, "entered pvp zone");
        Transition::Entered(zone)
    }

    fn leave(&self, state: &mut PlayerZoneState) {
        state.current_pvp = None;
        state.last_exit_ms = Some(self.now_ms);
        state.last_combat_ms = None;
        state.lock_notice = None;
        self.set_pvp(false);
        self.host
            .net
            .zone_status(self.player.auth, &ZoneStatus::PvpCleared);
    }

    fn exit(&self, state: &mut PlayerZoneState, zone: ZoneId) -> Transition {
        self.leave(state);
        self.host.net.notify(
            self.player.auth,
            &Notice::LeftPvp {
                zone: self.zone_name(zone),
            },
        );
        info!(level = %self.level, player = %self.player.auth, zone = %zone, "left pvp zone");
        Transition::Exited(zone)
    }

    fn force_exit(&self, state: &mut PlayerZoneState, zone: ZoneId) -> Transition {
        let from = self.player.tile();
        let radius = self.config.relocation_search_radius;
        let to = self
            .store
            .read(zone, |z| nearest_outside(&z.tiles, from, radius))
            .unwrap_or(from);
        let name = self.zone_name(zone);

        self.leave(state);
        self.host.players.teleport(self.player.auth, self.level, to);
        self.host
            .net
            .notify(self.player.auth, &Notice::ForcedOut { zone: name });
        info!(level = %self.level, player = %self.player.auth, zone = %zone, %to, "forced out of pvp zone");
        Transition::ForcedExit { zone, to }
    }

    fn block_exit(&self, state: &mut PlayerZoneState, zone: ZoneId, remaining_ms: u64) -> Transition {
        let remaining_secs = ceil_secs(remaining_ms);
        if state.lock_notice != Some(remaining_secs) {
            state.lock_notice = Some(remaining_secs);
            self.host.net.notify(
                self.player.auth,
                &Notice::CombatLocked {
                    zone: self.zone_name(zone),
                    remaining_secs,
                },
            );
        }
        Transition::ExitBlocked {
            zone,
            remaining_secs,
        }
    }
}

fn cooldown_remaining(config: &ZoneConfig, state: &PlayerZoneState, now_ms: u64) -> u64 {
    state.last_exit_ms.map_or(0, |exit| {
        config
            .reentry_cooldown_ms
            .saturating_sub(now_ms.saturating_sub(exit))
    })
}

fn combat_remaining(rules: &PvpRules, state: &PlayerZoneState, now_ms: u64) -> u64 {
    if rules.combat_lock_secs == 0 {
        return 0;
    }
    state.last_combat_ms.map_or(0, |hit| {
        rules
            .combat_lock_ms()
            .saturating_sub(now_ms.saturating_sub(hit))
    })
}

fn ceil_secs(ms: u64) -> u32 {
    ms.div_ceil(1000).min(u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_math() {
        let config = ZoneConfig::default();
        let mut state = PlayerZoneState::default();
        assert_eq!(cooldown_remaining(&config, &state, 5_000), 0);

        state.last_exit_ms = Some(10_000);
        assert_eq!(cooldown_remaining(&config, &state, 10_000), 30_000);
        assert_eq!(cooldown_remaining(&config, &state, 39_999), 1);
        assert_eq!(cooldown_remaining(&config, &state, 40_000), 0);
    }

    #[test]
    fn test_combat_math() {
        let rules = PvpRules {
            combat_lock_secs: 3,
            ..PvpRules::default()
        };
        let mut state = PlayerZoneState::default();
        assert_eq!(combat_remaining(&rules, &state, 1_000), 0);

        state.last_combat_ms = Some(1_000);
        assert_eq!(combat_remaining(&rules, &state, 2_500), 1_500);
        assert_eq!(combat_remaining(&rules, &state, 4_000), 0);

        let unlocked = PvpRules {
            combat_lock_secs: 0,
            ..rules
        };
        assert_eq!(combat_remaining(&unlocked, &state, 1_000), 0);
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(0), 0);
        assert_eq!(ceil_secs(1), 1);
        assert_eq!(ceil_secs(1_000), 1);
        assert_eq!(ceil_secs(1_001), 2);
    }

    #[test]
    fn test_record_combat_and_leave() {
        let mut tracker = ZoneTransitionTracker::new(LevelId(0), ZoneConfig::default());
        tracker.record_combat(AuthId(1), 500);
        assert_eq!(tracker.state(AuthId(1)).unwrap().last_combat_ms, Some(500));
        assert!(tracker.can_reenter(AuthId(1), 0));
        assert!(tracker.player_left(AuthId(1)).is_some());
        assert!(tracker.state(AuthId(1)).is_none());
    }
}
