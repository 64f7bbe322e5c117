//! Zone error types.

use thiserror::Error;
use warden_geom::TileRect;

use crate::{InteractionKind, ZoneId, ZoneType};

/// Zone store error type.
#[derive(Debug, Error)]
pub enum ZoneError {
    /// No zone with this ID exists on the level.
    #[error("zone not found: {0}")]
    NotFound(ZoneId),

    /// The zone exists but has the other type.
    #[error("zone {id} is not a {expected} zone")]
    WrongType { id: ZoneId, expected: ZoneType },

    /// Rectangle with zero or negative width or height.
    #[error("degenerate rectangle: {0:?}")]
    DegenerateRect(TileRect),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Save file could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for zone operations.
pub type ZoneResult<T> = Result<T, ZoneError>;

/// Why a protected zone refused an action.
///
/// Displayed to the player as-is; [`Denial::message_key`] names the localisation entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("You cannot break objects in protected zone '{zone}'")]
    Break { zone: String },

    #[error("You cannot place objects in protected zone '{zone}'")]
    Place { zone: String },

    /// `kind` is `None` for objects that do not fall into any known category.
    #[error("You cannot use {} in protected zone '{zone}'", .kind.map_or("this object", InteractionKind::display_name))]
    Interact {
        zone: String,
        kind: Option<InteractionKind>,
    },
}

impl Denial {
    /// Localisation key for the denial message.
    #[must_use]
    pub const fn message_key(&self) -> &'static str {
        match self {
            Self::Break { .. } => "zone.denied.break",
            Self::Place { .. } => "zone.denied.place",
            Self::Interact { kind: Some(kind), .. } => kind.message_key(),
            Self::Interact { kind: None, .. } => "zone.denied.interact",
        }
    }

    /// The restriction source. Only protected zones gate actions.
    #[must_use]
    pub const fn zone_type(&self) -> ZoneType {
        ZoneType::Protected
    }

    /// Name of the zone that refused the action.
    #[must_use]
    pub fn zone_name(&self) -> &str {
        match self {
            Self::Break { zone } | Self::Place { zone } | Self::Interact { zone, .. } => zone,
        }
    }
}
