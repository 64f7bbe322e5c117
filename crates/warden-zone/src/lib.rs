//! Typed zones and the per-level zone store.
//!
//! # Model
//!
//! A [`Zone`] is a named [`TileSet`](warden_geom::TileSet) with an owner and a
//! [`ZoneKind`]:
//!
//! - **Protected**: building and interaction are gated by [`ProtectedRules`]
//! - **PvP**: combat rules ([`PvpRules`]) and a barrier drawn along the edge
//!
//! # Topology
//!
//! After every edit the store restores two invariants before releasing its lock:
//!
//! 1. Every zone is one 4-connected region (islands are split off into new zones).
//! 2. Same-type zones that touch or overlap are merged into one.
//!
//! The returned [`Resolution`] carries the edge tiles from before and after the edit so
//! barrier synchronisation can apply a diff instead of rebuilding.
//!
//! ```ignore
//! let store = ZoneStore::new(ZoneDefaults::default());
//! let id = store.create(ZoneType::Pvp, Some("Arena"), Some(admin), None);
//! let resolution = store.expand(id, TileRect::new(0, 0, 10, 10))?;
//! ```

mod error;
mod ids;
mod interaction;
mod permissions;
mod persist;
mod resolver;
mod rules;
mod store;
mod zone;

pub use error::{Denial, ZoneError, ZoneResult};
pub use ids::{AuthId, TeamId, ZoneId};
pub use interaction::{InteractionKind, InteractionSet, ObjectTraits};
pub use permissions::{Access, PermissionSummary, ProtectedStatus, TeamDirectory};
pub use persist::{LevelSave, ZoneRecord};
pub use resolver::{RemovedZone, Resolution, ZoneChange};
pub use rules::{ProtectedRules, PvpRules, ZoneDefaults, format_damage_percent};
pub use store::ZoneStore;
pub use zone::{Zone, ZoneKind, ZoneType};
