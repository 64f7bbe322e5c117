//! Interaction categories for protected zones.
//!
//! The host describes an object by its [`ObjectTraits`]; [`ObjectTraits::classify`] maps
//! that onto at most one [`InteractionKind`]. Objects that match no category are treated
//! as unknown and are never allowed for non-elevated players.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Interaction category an allowed team may be granted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    Door,
    Container,
    Station,
    Sign,
    Switch,
    Furniture,
}

impl InteractionKind {
    pub const ALL: [Self; 6] = [
        Self::Door,
        Self::Container,
        Self::Station,
        Self::Sign,
        Self::Switch,
        Self::Furniture,
    ];

    /// Plural name used in player-facing messages.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Door => "doors",
            Self::Container => "containers",
            Self::Station => "crafting stations",
            Self::Sign => "signs",
            Self::Switch => "switches",
            Self::Furniture => "furniture",
        }
    }

    #[must_use]
    pub const fn message_key(self) -> &'static str {
        match self {
            Self::Door => "zone.denied.door",
            Self::Container => "zone.denied.container",
            Self::Station => "zone.denied.station",
            Self::Sign => "zone.denied.sign",
            Self::Switch => "zone.denied.switch",
            Self::Furniture => "zone.denied.furniture",
        }
    }

    const fn flag(self) -> InteractionSet {
        match self {
            Self::Door => InteractionSet::DOORS,
            Self::Container => InteractionSet::CONTAINERS,
            Self::Station => InteractionSet::STATIONS,
            Self::Sign => InteractionSet::SIGNS,
            Self::Switch => InteractionSet::SWITCHES,
            Self::Furniture => InteractionSet::FURNITURE,
        }
    }
}

impl core::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.display_name())
    }
}

bitflags! {
    /// Interaction categories granted to allowed teams.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct InteractionSet: u8 {
        const DOORS = 1 << 0;
        const CONTAINERS = 1 << 1;
        const STATIONS = 1 << 2;
        const SIGNS = 1 << 3;
        const SWITCHES = 1 << 4;
        const FURNITURE = 1 << 5;
    }
}

impl InteractionSet {
    #[must_use]
    pub const fn allows(self, kind: InteractionKind) -> bool {
        self.contains(kind.flag())
    }

    pub fn set_kind(&mut self, kind: InteractionKind, allowed: bool) {
        self.set(kind.flag(), allowed);
    }

    /// Granted categories in declaration order.
    pub fn kinds(self) -> impl Iterator<Item = InteractionKind> {
        InteractionKind::ALL
            .into_iter()
            .filter(move |kind| self.allows(*kind))
    }
}

impl From<InteractionKind> for InteractionSet {
    fn from(kind: InteractionKind) -> Self {
        kind.flag()
    }
}

bitflags! {
    /// What the host knows about an object at a tile.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ObjectTraits: u8 {
        const DOOR = 1 << 0;
        const CRAFTING_STATION = 1 << 1;
        const CONTAINER = 1 << 2;
        const SIGN = 1 << 3;
        const SWITCH = 1 << 4;
        const PRESSURE_PLATE = 1 << 5;
        const FURNITURE = 1 << 6;
    }
}

impl ObjectTraits {
    /// Category used for permission checks, or `None` when unknown.
    ///
    /// The first match wins: door, station, container, sign, switch (including pressure
    /// plates), furniture. A workbench with storage is a station, not a container.
    #[must_use]
    pub const fn classify(self) -> Option<InteractionKind> {
        if self.contains(Self::DOOR) {
            Some(InteractionKind::Door)
        } else if self.contains(Self::CRAFTING_STATION) {
            Some(InteractionKind::Station)
        } else if self.contains(Self::CONTAINER) {
            Some(InteractionKind::Container)
        } else if self.contains(Self::SIGN) {
            Some(InteractionKind::Sign)
        } else if self.intersects(Self::SWITCH.union(Self::PRESSURE_PLATE)) {
            Some(InteractionKind::Switch)
        } else if self.contains(Self::FURNITURE) {
            Some(InteractionKind::Furniture)
        } else {
            None
        }
    }
}
