//! Capabilities the zone core needs from the game host.
//!
//! The core never owns world, network or player state. Each concern is a narrow trait; a
//! host integration implements them and passes a [`Host`] bundle into every call.

use warden_geom::TilePos;
use warden_zone::{
    AuthId, Denial, ObjectTraits, ProtectedStatus, TeamDirectory, Zone, ZoneId, ZoneType,
};

use crate::WorldError;

/// Level identifier as known to the host.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug, Default)]
pub struct LevelId(pub u32);

impl core::fmt::Display for LevelId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "level-{}", self.0)
    }
}

/// Coordinates of a lazily loaded region.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct RegionId {
    pub x: i32,
    pub y: i32,
}

/// World object type identifier.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// No object.
    pub const EMPTY: Self = Self(0);
}

/// Tile and object access.
pub trait WorldAccess {
    fn object_at(&self, level: LevelId, pos: TilePos) -> Result<ObjectId, WorldError>;

    fn set_object_at(&self, level: LevelId, pos: TilePos, object: ObjectId)
    -> Result<(), WorldError>;

    fn is_region_loaded(&self, level: LevelId, pos: TilePos) -> bool;

    fn region_of(&self, level: LevelId, pos: TilePos) -> RegionId;

    /// Look up an object type by its registry name.
    fn resolve_object_id(&self, name: &str) -> Option<ObjectId>;

    /// What kind of object sits at a tile, for interaction checks.
    fn object_traits(&self, level: LevelId, pos: TilePos) -> ObjectTraits;
}

/// Messages to clients.
pub trait Broadcaster {
    /// An object was placed or cleared; sent to observers of the tile.
    fn object_changed(&self, level: LevelId, pos: TilePos, object: ObjectId);

    fn zone_changed(&self, level: LevelId, zone: &Zone);

    fn zone_removed(&self, level: LevelId, zone: ZoneId, zone_type: ZoneType);

    fn pvp_flag_changed(&self, player: AuthId, enabled: bool);

    fn notify(&self, player: AuthId, notice: &Notice);

    fn zone_status(&self, player: AuthId, status: &ZoneStatus);
}

/// A connected player as seen this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerSnapshot {
    pub auth: AuthId,
    /// World position in pixels.
    pub x: f32,
    pub y: f32,
    pub pvp_enabled: bool,
}

impl PlayerSnapshot {
    #[must_use]
    pub fn tile(&self) -> TilePos {
        TilePos::from_world(self.x, self.y)
    }

    /// Snapshot of a player standing in the centre of `pos`.
    #[must_use]
    pub fn at_tile(auth: AuthId, pos: TilePos) -> Self {
        let (x, y) = pos.world_center();
        Self {
            auth,
            x,
            y,
            pvp_enabled: false,
        }
    }
}

/// Player state the core may change.
pub trait PlayerAccess {
    fn online_players(&self, level: LevelId) -> Vec<PlayerSnapshot>;

    fn set_pvp(&self, player: AuthId, enabled: bool);

    fn teleport(&self, player: AuthId, level: LevelId, pos: TilePos);

    fn grant_spawn_immunity(&self, player: AuthId, secs: f32);

    /// Whether the world forces PvP on for everyone.
    fn forced_pvp(&self, level: LevelId) -> bool;
}

/// A host-owned damage-over-time accumulator.
pub trait DotAccumulator {
    fn pending(&self) -> f32;

    fn set_pending(&mut self, value: f32);
}

/// An entity that may carry damage-over-time effects.
pub trait DotEntity {
    /// World position in pixels.
    fn position(&self) -> (f32, f32);

    fn for_each_accumulator(&mut self, f: &mut dyn FnMut(&mut dyn DotAccumulator));
}

/// Live entities of a level.
pub trait EntityAccess {
    fn for_each_entity(&self, level: LevelId, f: &mut dyn FnMut(&mut dyn DotEntity));
}

/// Every host capability, borrowed for one call.
#[derive(Copy, Clone)]
pub struct Host<'a> {
    pub world: &'a dyn WorldAccess,
    pub net: &'a dyn Broadcaster,
    pub players: &'a dyn PlayerAccess,
    pub entities: &'a dyn EntityAccess,
    pub teams: &'a dyn TeamDirectory,
}

impl<'a> Host<'a> {
    /// Bundle a host type that implements every capability itself.
    pub fn new<H>(host: &'a H) -> Self
    where
        H: WorldAccess + Broadcaster + PlayerAccess + EntityAccess + TeamDirectory,
    {
        Self {
            world: host,
            net: host,
            players: host,
            entities: host,
            teams: host,
        }
    }
}

impl core::fmt::Debug for Host<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}

/// A chat-style message to one player.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    EnteredPvp { zone: String, damage_multiplier: f32 },
    LeftPvp { zone: String },
    /// Exit refused while in combat.
    CombatLocked { zone: String, remaining_secs: u32 },
    /// Standing in a PvP zone but re-entry is still on cooldown.
    ReentryCooldown { zone: String, remaining_secs: u32 },
    /// Moved out because the zone no longer covers the player.
    ForcedOut { zone: String },
    Denied(Denial),
}

impl Notice {
    /// Localisation key for the message.
    #[must_use]
    pub const fn message_key(&self) -> &'static str {
        match self {
            Self::EnteredPvp { .. } => "zone.pvp.entered",
            Self::LeftPvp { .. } => "zone.pvp.left",
            Self::CombatLocked { .. } => "zone.pvp.combatlock",
            Self::ReentryCooldown { .. } => "zone.pvp.cooldown",
            Self::ForcedOut { .. } => "zone.pvp.forcedout",
            Self::Denied(denial) => denial.message_key(),
        }
    }
}

impl core::fmt::Display for Notice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::EnteredPvp {
                zone,
                damage_multiplier,
            } => write!(
                f,
                "Entered PvP zone '{zone}' (damage {})",
                warden_zone::format_damage_percent(*damage_multiplier)
            ),
            Self::LeftPvp { zone } => write!(f, "Left PvP zone '{zone}'"),
            Self::CombatLocked {
                zone,
                remaining_secs,
            } => write!(
                f,
                "You are in combat and cannot leave '{zone}' for {remaining_secs}s"
            ),
            Self::ReentryCooldown {
                zone,
                remaining_secs,
            } => write!(
                f,
                "You can enter PvP zone '{zone}' again in {remaining_secs}s"
            ),
            Self::ForcedOut { zone } => write!(f, "PvP zone '{zone}' no longer covers your position"),
            Self::Denied(denial) => write!(f, "{denial}"),
        }
    }
}

/// Client-visible zone indicator.
#[derive(Clone, Debug, PartialEq)]
pub enum ZoneStatus {
    Protected(ProtectedStatus),
    ProtectedCleared,
    Pvp {
        zone: ZoneId,
        name: String,
        damage_multiplier: f32,
    },
    PvpCleared,
}
