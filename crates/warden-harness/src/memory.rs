//! A host that keeps its world in maps.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;
use warden_geom::{TilePos, TileSet};
use warden_sync::{
    BARRIER_OBJECT, Broadcaster, DotAccumulator, DotEntity, EntityAccess, LevelId, Notice,
    ObjectId, PlayerAccess, PlayerSnapshot, RegionId, WorldAccess, WorldError, ZoneStatus,
};
use warden_zone::{AuthId, ObjectTraits, TeamDirectory, TeamId, Zone, ZoneId, ZoneType};

/// Object ID the host assigns to the barrier.
pub const BARRIER: ObjectId = ObjectId(77);

/// Region edge length in tiles.
pub const REGION_SIZE: i32 = 16;

/// Everything the core sent to the host, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    ObjectChanged {
        level: LevelId,
        pos: TilePos,
        object: ObjectId,
    },
    ZoneChanged {
        level: LevelId,
        zone: ZoneId,
        tiles: usize,
    },
    ZoneRemoved {
        level: LevelId,
        zone: ZoneId,
        zone_type: ZoneType,
    },
    PvpFlag {
        player: AuthId,
        enabled: bool,
    },
    Notice {
        player: AuthId,
        notice: Notice,
    },
    Status {
        player: AuthId,
        status: ZoneStatus,
    },
    Teleport {
        player: AuthId,
        level: LevelId,
        pos: TilePos,
    },
    Immunity {
        player: AuthId,
        secs: f32,
    },
}

#[derive(Clone, Debug)]
struct Player {
    level: LevelId,
    pos: TilePos,
    pvp: bool,
}

#[derive(Debug)]
struct DotStack(f32);

impl DotAccumulator for DotStack {
    fn pending(&self) -> f32 {
        self.0
    }

    fn set_pending(&mut self, value: f32) {
        self.0 = value;
    }
}

#[derive(Debug)]
struct Entity {
    level: LevelId,
    pos: TilePos,
    stacks: Vec<DotStack>,
}

impl DotEntity for Entity {
    fn position(&self) -> (f32, f32) {
        self.pos.world_center()
    }

    fn for_each_accumulator(&mut self, f: &mut dyn FnMut(&mut dyn DotAccumulator)) {
        for stack in &mut self.stacks {
            f(stack);
        }
    }
}

#[derive(Debug, Default)]
struct State {
    objects: FxHashMap<(LevelId, TilePos), ObjectId>,
    traits: FxHashMap<(LevelId, TilePos), ObjectTraits>,
    unloaded: FxHashSet<(LevelId, RegionId)>,
    failing: FxHashSet<(LevelId, TilePos)>,
    players: BTreeMap<AuthId, Player>,
    teams: FxHashMap<AuthId, TeamId>,
    world_owner: Option<AuthId>,
    forced_pvp: bool,
    barrier_registered: bool,
    entities: Vec<Entity>,
    events: Vec<HostEvent>,
}

/// In-memory game host.
///
/// Every region is loaded unless unloaded explicitly. Interior mutability lets the core
/// borrow the host immutably through [`warden_sync::Host`] while tests keep editing it.
#[derive(Debug)]
pub struct MemoryHost {
    state: Mutex<State>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// A host with the barrier object registered.
    #[must_use]
    pub fn new() -> Self {
        let host = Self::without_barrier();
        host.state.lock().barrier_registered = true;
        host
    }

    /// A host whose object registry lacks the barrier.
    #[must_use]
    pub fn without_barrier() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Region holding `pos`.
    #[must_use]
    pub const fn region_at(pos: TilePos) -> RegionId {
        RegionId {
            x: pos.x.div_euclid(REGION_SIZE),
            y: pos.y.div_euclid(REGION_SIZE),
        }
    }

    // ---- world ----

    #[must_use]
    pub fn object(&self, level: LevelId, pos: TilePos) -> ObjectId {
        self.state
            .lock()
            .objects
            .get(&(level, pos))
            .copied()
            .unwrap_or(ObjectId::EMPTY)
    }

    /// Put an object on a tile without going through the core.
    pub fn put_object(&self, level: LevelId, pos: TilePos, object: ObjectId) {
        let mut state = self.state.lock();
        if object == ObjectId::EMPTY {
            state.objects.remove(&(level, pos));
        } else {
            state.objects.insert((level, pos), object);
        }
    }

    pub fn set_traits(&self, level: LevelId, pos: TilePos, traits: ObjectTraits) {
        self.state.lock().traits.insert((level, pos), traits);
    }

    /// Every tile holding a barrier, loaded or not.
    #[must_use]
    pub fn barrier_tiles(&self, level: LevelId) -> TileSet {
        self.state
            .lock()
            .objects
            .iter()
            .filter(|((l, _), object)| *l == level && **object == BARRIER)
            .map(|((_, pos), _)| *pos)
            .collect()
    }

    pub fn unload_region(&self, level: LevelId, region: RegionId) {
        self.state.lock().unloaded.insert((level, region));
    }

    pub fn load_region(&self, level: LevelId, region: RegionId) {
        self.state.lock().unloaded.remove(&(level, region));
    }

    /// Make writes to a tile fail.
    pub fn fail_tile(&self, level: LevelId, pos: TilePos) {
        self.state.lock().failing.insert((level, pos));
    }

    // ---- players ----

    pub fn add_player(&self, level: LevelId, auth: AuthId, pos: TilePos) {
        self.state.lock().players.insert(
            auth,
            Player {
                level,
                pos,
                pvp: false,
            },
        );
    }

    pub fn move_player(&self, auth: AuthId, pos: TilePos) {
        let mut state = self.state.lock();
        if let Some(player) = state.players.get_mut(&auth) {
            player.pos = pos;
        }
    }

    pub fn remove_player(&self, auth: AuthId) {
        self.state.lock().players.remove(&auth);
    }

    #[must_use]
    pub fn position(&self, auth: AuthId) -> Option<TilePos> {
        self.state.lock().players.get(&auth).map(|player| player.pos)
    }

    #[must_use]
    pub fn pvp_enabled(&self, auth: AuthId) -> bool {
        self.state
            .lock()
            .players
            .get(&auth)
            .is_some_and(|player| player.pvp)
    }

    pub fn set_team(&self, auth: AuthId, team: TeamId) {
        self.state.lock().teams.insert(auth, team);
    }

    pub fn set_world_owner(&self, auth: Option<AuthId>) {
        self.state.lock().world_owner = auth;
    }

    pub fn set_forced_pvp(&self, forced: bool) {
        self.state.lock().forced_pvp = forced;
    }

    // ---- entities ----

    /// Add an entity with pending damage-over-time stacks. Returns its index.
    pub fn add_entity(&self, level: LevelId, pos: TilePos, pending: &[f32]) -> usize {
        let mut state = self.state.lock();
        state.entities.push(Entity {
            level,
            pos,
            stacks: pending.iter().copied().map(DotStack).collect(),
        });
        state.entities.len() - 1
    }

    /// Pending damage-over-time of an entity.
    #[must_use]
    pub fn dots(&self, entity: usize) -> Vec<f32> {
        self.state
            .lock()
            .entities
            .get(entity)
            .map(|entity| entity.stacks.iter().map(|stack| stack.0).collect())
            .unwrap_or_default()
    }

    // ---- events ----

    /// Drain recorded events.
    pub fn take_events(&self) -> Vec<HostEvent> {
        std::mem::take(&mut self.state.lock().events)
    }

    /// Notices sent to one player so far, without draining.
    #[must_use]
    pub fn notices(&self, auth: AuthId) -> Vec<Notice> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                HostEvent::Notice { player, notice } if *player == auth => Some(notice.clone()),
                _ => None,
            })
            .collect()
    }

    /// Zone statuses sent to one player so far, without draining.
    #[must_use]
    pub fn statuses(&self, auth: AuthId) -> Vec<ZoneStatus> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                HostEvent::Status { player, status } if *player == auth => Some(status.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: HostEvent) {
        trace!(?event, "host event");
        self.state.lock().events.push(event);
    }

    fn is_loaded(state: &State, level: LevelId, pos: TilePos) -> bool {
        !state.unloaded.contains(&(level, Self::region_at(pos)))
    }
}

impl WorldAccess for MemoryHost {
    fn object_at(&self, level: LevelId, pos: TilePos) -> Result<ObjectId, WorldError> {
        let state = self.state.lock();
        if !Self::is_loaded(&state, level, pos) {
            return Err(WorldError::RegionNotLoaded(pos));
        }
        Ok(state
            .objects
            .get(&(level, pos))
            .copied()
            .unwrap_or(ObjectId::EMPTY))
    }

    fn set_object_at(
        &self,
        level: LevelId,
        pos: TilePos,
        object: ObjectId,
    ) -> Result<(), WorldError> {
        let mut state = self.state.lock();
        if !Self::is_loaded(&state, level, pos) {
            return Err(WorldError::RegionNotLoaded(pos));
        }
        if state.failing.contains(&(level, pos)) {
            return Err(WorldError::Rejected {
                pos,
                reason: "tile is locked".to_string(),
            });
        }
        if object == ObjectId::EMPTY {
            state.objects.remove(&(level, pos));
        } else {
            state.objects.insert((level, pos), object);
        }
        Ok(())
    }

    fn is_region_loaded(&self, level: LevelId, pos: TilePos) -> bool {
        Self::is_loaded(&self.state.lock(), level, pos)
    }

    fn region_of(&self, _level: LevelId, pos: TilePos) -> RegionId {
        Self::region_at(pos)
    }

    fn resolve_object_id(&self, name: &str) -> Option<ObjectId> {
        (name == BARRIER_OBJECT && self.state.lock().barrier_registered).then_some(BARRIER)
    }

    fn object_traits(&self, level: LevelId, pos: TilePos) -> ObjectTraits {
        self.state
            .lock()
            .traits
            .get(&(level, pos))
            .copied()
            .unwrap_or_else(ObjectTraits::empty)
    }
}

impl Broadcaster for MemoryHost {
    fn object_changed(&self, level: LevelId, pos: TilePos, object: ObjectId) {
        self.record(HostEvent::ObjectChanged { level, pos, object });
    }

    fn zone_changed(&self, level: LevelId, zone: &Zone) {
        self.record(HostEvent::ZoneChanged {
            level,
            zone: zone.id,
            tiles: zone.tiles.len(),
        });
    }

    fn zone_removed(&self, level: LevelId, zone: ZoneId, zone_type: ZoneType) {
        self.record(HostEvent::ZoneRemoved {
            level,
            zone,
            zone_type,
        });
    }

    fn pvp_flag_changed(&self, player: AuthId, enabled: bool) {
        self.record(HostEvent::PvpFlag { player, enabled });
    }

    fn notify(&self, player: AuthId, notice: &Notice) {
        self.record(HostEvent::Notice {
            player,
            notice: notice.clone(),
        });
    }

    fn zone_status(&self, player: AuthId, status: &ZoneStatus) {
        self.record(HostEvent::Status {
            player,
            status: status.clone(),
        });
    }
}

impl PlayerAccess for MemoryHost {
    fn online_players(&self, level: LevelId) -> Vec<PlayerSnapshot> {
        self.state
            .lock()
            .players
            .iter()
            .filter(|(_, player)| player.level == level)
            .map(|(auth, player)| PlayerSnapshot {
                pvp_enabled: player.pvp,
                ..PlayerSnapshot::at_tile(*auth, player.pos)
            })
            .collect()
    }

    fn set_pvp(&self, player: AuthId, enabled: bool) {
        let mut state = self.state.lock();
        if let Some(player) = state.players.get_mut(&player) {
            player.pvp = enabled;
        }
    }

    fn teleport(&self, player: AuthId, level: LevelId, pos: TilePos) {
        {
            let mut state = self.state.lock();
            if let Some(p) = state.players.get_mut(&player) {
                p.level = level;
                p.pos = pos;
            }
        }
        self.record(HostEvent::Teleport { player, level, pos });
    }

    fn grant_spawn_immunity(&self, player: AuthId, secs: f32) {
        self.record(HostEvent::Immunity { player, secs });
    }

    fn forced_pvp(&self, _level: LevelId) -> bool {
        self.state.lock().forced_pvp
    }
}

impl EntityAccess for MemoryHost {
    fn for_each_entity(&self, level: LevelId, f: &mut dyn FnMut(&mut dyn DotEntity)) {
        let mut state = self.state.lock();
        for entity in state.entities.iter_mut().filter(|e| e.level == level) {
            f(entity);
        }
    }
}

impl TeamDirectory for MemoryHost {
    fn team_of(&self, auth: AuthId) -> Option<TeamId> {
        self.state.lock().teams.get(&auth).copied()
    }

    fn is_world_owner(&self, auth: AuthId) -> bool {
        self.state.lock().world_owner == Some(auth)
    }
}
