//! The zone itself.

use serde::{Deserialize, Serialize};
use warden_geom::{TilePos, TileRect, TileSet};

use crate::{AuthId, ProtectedRules, PvpRules, ZoneError, ZoneId, ZoneResult};

/// Which family of rules a zone carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneType {
    Protected,
    Pvp,
}

impl core::fmt::Display for ZoneType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Protected => f.write_str("protected"),
            Self::Pvp => f.write_str("PvP"),
        }
    }
}

/// Type-specific rules.
#[derive(Clone, Debug, PartialEq)]
pub enum ZoneKind {
    Protected(ProtectedRules),
    Pvp(PvpRules),
}

impl ZoneKind {
    #[must_use]
    pub const fn zone_type(&self) -> ZoneType {
        match self {
            Self::Protected(_) => ZoneType::Protected,
            Self::Pvp(_) => ZoneType::Pvp,
        }
    }
}

/// A named set of tiles with rules attached.
#[derive(Clone, Debug, PartialEq)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub creator: Option<AuthId>,
    /// Map overlay colour, 0..=360.
    pub color_hue: u16,
    pub tiles: TileSet,
    pub kind: ZoneKind,
}

impl Zone {
    #[must_use]
    pub const fn zone_type(&self) -> ZoneType {
        self.kind.zone_type()
    }

    #[must_use]
    pub const fn protected_rules(&self) -> Option<&ProtectedRules> {
        match &self.kind {
            ZoneKind::Protected(rules) => Some(rules),
            ZoneKind::Pvp(_) => None,
        }
    }

    #[must_use]
    pub const fn pvp_rules(&self) -> Option<&PvpRules> {
        match &self.kind {
            ZoneKind::Pvp(rules) => Some(rules),
            ZoneKind::Protected(_) => None,
        }
    }

    pub fn protected_rules_mut(&mut self) -> ZoneResult<&mut ProtectedRules> {
        match &mut self.kind {
            ZoneKind::Protected(rules) => Ok(rules),
            ZoneKind::Pvp(_) => Err(ZoneError::WrongType {
                id: self.id,
                expected: ZoneType::Protected,
            }),
        }
    }

    pub fn pvp_rules_mut(&mut self) -> ZoneResult<&mut PvpRules> {
        match &mut self.kind {
            ZoneKind::Pvp(rules) => Ok(rules),
            ZoneKind::Protected(_) => Err(ZoneError::WrongType {
                id: self.id,
                expected: ZoneType::Pvp,
            }),
        }
    }

    pub fn add_tile(&mut self, pos: TilePos) -> bool {
        self.tiles.insert(pos)
    }

    pub fn remove_tile(&mut self, pos: TilePos) -> bool {
        self.tiles.remove(pos)
    }

    #[must_use]
    pub fn contains(&self, pos: TilePos) -> bool {
        self.tiles.contains(pos)
    }

    /// Containment test for a world-space point in pixels.
    #[must_use]
    pub fn contains_world(&self, x: f32, y: f32) -> bool {
        self.tiles.contains(TilePos::from_world(x, y))
    }

    #[must_use]
    pub fn bounds(&self) -> Option<TileRect> {
        self.tiles.bounds()
    }

    #[must_use]
    pub fn edge_tiles(&self) -> TileSet {
        self.tiles.edge_tiles()
    }

    #[must_use]
    pub fn is_edge(&self, pos: TilePos) -> bool {
        self.tiles.is_edge(pos)
    }

    /// Add every tile of `rect`. Returns `true` if anything changed.
    pub fn expand(&mut self, rect: &TileRect) -> bool {
        self.tiles.add_rect(rect)
    }

    /// Remove every tile of `rect`. Returns `true` if anything changed.
    pub fn shrink(&mut self, rect: &TileRect) -> bool {
        self.tiles.remove_rect(rect)
    }

    /// Copy of this zone's identity and rules with a new ID, name and tile set.
    pub(crate) fn split_off(&self, id: ZoneId, name: String, tiles: TileSet) -> Self {
        Self {
            id,
            name,
            creator: self.creator,
            color_hue: self.color_hue,
            tiles,
            kind: self.kind.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pvp_zone() -> Zone {
        Zone {
            id: ZoneId(1),
            name: "Arena".to_string(),
            creator: None,
            color_hue: 0,
            tiles: TileSet::new(),
            kind: ZoneKind::Pvp(PvpRules::default()),
        }
    }

    #[test]
    fn test_expand_shrink_report_changes() {
        let mut zone = pvp_zone();
        let rect = TileRect::new(0, 0, 4, 4);
        assert!(zone.expand(&rect));
        assert!(!zone.expand(&rect));
        assert_eq!(zone.tiles.len(), 16);

        assert!(zone.shrink(&TileRect::new(0, 0, 2, 2)));
        assert!(!zone.shrink(&TileRect::new(100, 100, 2, 2)));
        assert_eq!(zone.tiles.len(), 12);
    }

    #[test]
    fn test_contains_world() {
        let mut zone = pvp_zone();
        zone.add_tile(TilePos::new(2, 3));
        assert!(zone.contains_world(64.0, 96.0));
        assert!(zone.contains_world(95.9, 127.9));
        assert!(!zone.contains_world(96.0, 96.0));
    }

    #[test]
    fn test_wrong_type_access() {
        let mut zone = pvp_zone();
        assert!(zone.pvp_rules_mut().is_ok());
        assert!(matches!(
            zone.protected_rules_mut(),
            Err(ZoneError::WrongType {
                expected: ZoneType::Protected,
                ..
            })
        ));
    }
}
