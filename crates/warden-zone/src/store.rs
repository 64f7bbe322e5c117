//! Per-level zone registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use warden_geom::{TilePos, TileRect, TileSet};

use crate::{
    AuthId, ProtectedRules, PvpRules, Resolution, Zone, ZoneDefaults, ZoneError, ZoneId,
    ZoneKind, ZoneResult, ZoneType,
};

/// Hue step between consecutive zones when no colour is given.
const HUE_STEP: u32 = 137;
const MAX_HUE: u16 = 360;

/// State behind the store lock.
#[derive(Debug)]
pub(crate) struct ZoneRegistry {
    pub(crate) zones: BTreeMap<ZoneId, Zone>,
    pub(crate) next_id: u32,
    pub(crate) defaults: ZoneDefaults,
}

impl ZoneRegistry {
    pub(crate) fn get(&self, id: ZoneId) -> ZoneResult<&Zone> {
        self.zones.get(&id).ok_or(ZoneError::NotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: ZoneId) -> ZoneResult<&mut Zone> {
        self.zones.get_mut(&id).ok_or(ZoneError::NotFound(id))
    }

    /// Next free ID. `u32::MAX` is never handed out; once the counter reaches it, the
    /// lowest unused ID is reused.
    pub(crate) fn alloc_id(&mut self) -> ZoneId {
        self.alloc_id_excluding(&[])
    }

    /// `count` distinct IDs for zones inserted together.
    pub(crate) fn alloc_ids(&mut self, count: usize) -> Vec<ZoneId> {
        let mut ids = Vec::with_capacity(count);
        while ids.len() < count {
            let id = self.alloc_id_excluding(&ids);
            ids.push(id);
        }
        ids
    }

    fn alloc_id_excluding(&mut self, pending: &[ZoneId]) -> ZoneId {
        if let Some(next) = self.next_id.checked_add(1) {
            let id = ZoneId(self.next_id);
            self.next_id = next;
            return id;
        }
        let id = (1..u32::MAX)
            .map(ZoneId)
            .find(|id| !self.zones.contains_key(id) && !pending.contains(id))
            .unwrap_or_default();
        warn!(zone = %id, "zone ID counter exhausted, reusing a free ID");
        id
    }

    pub(crate) fn name_taken(&self, name: &str) -> bool {
        self.zones.values().any(|zone| zone.name == name)
    }
}

/// First "New Zone N" name for which `taken` is false.
pub(crate) fn next_free_name(taken: impl Fn(&str) -> bool) -> String {
    (1_u32..)
        .map(|n| format!("New Zone {n}"))
        .find(|name| !taken(name))
        .unwrap_or_default()
}

/// Zones of one level.
///
/// Cheap to clone; all clones share the same registry. Every mutation that touches tiles
/// runs the split/merge resolution while still holding the write lock, so readers never
/// observe a disconnected zone or two touching zones of the same type.
#[derive(Clone, Debug)]
pub struct ZoneStore {
    inner: Arc<RwLock<ZoneRegistry>>,
}

impl Default for ZoneStore {
    fn default() -> Self {
        Self::new(ZoneDefaults::default())
    }
}

impl ZoneStore {
    #[must_use]
    pub fn new(defaults: ZoneDefaults) -> Self {
        Self::from_registry(ZoneRegistry {
            zones: BTreeMap::new(),
            next_id: 1,
            defaults,
        })
    }

    pub(crate) fn from_registry(registry: ZoneRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    pub(crate) fn registry(&self) -> parking_lot::RwLockReadGuard<'_, ZoneRegistry> {
        self.inner.read()
    }

    #[must_use]
    pub fn defaults(&self) -> ZoneDefaults {
        self.inner.read().defaults
    }

    /// The ID the next created zone will get.
    #[must_use]
    pub fn next_unique_id(&self) -> u32 {
        self.inner.read().next_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().zones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().zones.is_empty()
    }

    #[must_use]
    pub fn count_of_type(&self, zone_type: ZoneType) -> usize {
        self.inner
            .read()
            .zones
            .values()
            .filter(|zone| zone.zone_type() == zone_type)
            .count()
    }

    /// Create an empty zone.
    ///
    /// Without a name the zone is called "New Zone N" with the smallest free N. The hue is
    /// clamped to 0..=360; without one a hue is derived from the ID. Protected zones are
    /// owned by their creator with the owner's team allowed and every permission off. PvP
    /// zones start from the store defaults.
    pub fn create(
        &self,
        zone_type: ZoneType,
        name: Option<&str>,
        creator: Option<AuthId>,
        color_hue: Option<u16>,
    ) -> ZoneId {
        let mut registry = self.inner.write();
        let id = registry.alloc_id();
        let name = match name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => next_free_name(|candidate| registry.name_taken(candidate)),
        };
        let color_hue = color_hue.map_or_else(
            || (id.0.wrapping_mul(HUE_STEP) % u32::from(MAX_HUE)) as u16,
            |hue| hue.min(MAX_HUE),
        );
        let kind = match zone_type {
            ZoneType::Protected => ZoneKind::Protected(ProtectedRules::owned_by(creator)),
            ZoneType::Pvp => ZoneKind::Pvp(PvpRules::from_defaults(registry.defaults)),
        };

        info!(zone = %id, %zone_type, name = %name, "zone created");
        registry.zones.insert(
            id,
            Zone {
                id,
                name,
                creator,
                color_hue,
                tiles: TileSet::new(),
                kind,
            },
        );
        id
    }

    /// Remove a zone outright. Returns the removed zone.
    pub fn remove(&self, id: ZoneId) -> ZoneResult<Zone> {
        let zone = self
            .inner
            .write()
            .zones
            .remove(&id)
            .ok_or(ZoneError::NotFound(id))?;
        info!(zone = %id, name = %zone.name, "zone removed");
        Ok(zone)
    }

    /// Snapshot of a zone.
    #[must_use]
    pub fn get(&self, id: ZoneId) -> Option<Zone> {
        self.inner.read().zones.get(&id).cloned()
    }

    /// Run `f` against a zone without cloning it.
    pub fn read<R>(&self, id: ZoneId, f: impl FnOnce(&Zone) -> R) -> Option<R> {
        self.inner.read().zones.get(&id).map(f)
    }

    #[must_use]
    pub fn contains_zone(&self, id: ZoneId) -> bool {
        self.inner.read().zones.contains_key(&id)
    }

    #[must_use]
    pub fn zone_type(&self, id: ZoneId) -> Option<ZoneType> {
        self.read(id, Zone::zone_type)
    }

    /// IDs of every zone of a type, ascending.
    #[must_use]
    pub fn ids_of_type(&self, zone_type: ZoneType) -> Vec<ZoneId> {
        self.inner
            .read()
            .zones
            .values()
            .filter(|zone| zone.zone_type() == zone_type)
            .map(|zone| zone.id)
            .collect()
    }

    #[must_use]
    pub fn zones_of_type(&self, zone_type: ZoneType) -> Vec<Zone> {
        self.inner
            .read()
            .zones
            .values()
            .filter(|zone| zone.zone_type() == zone_type)
            .cloned()
            .collect()
    }

    /// Lowest-ID zone of the type containing the tile.
    #[must_use]
    pub fn zone_at(&self, zone_type: ZoneType, pos: TilePos) -> Option<ZoneId> {
        self.inner
            .read()
            .zones
            .values()
            .find(|zone| zone.zone_type() == zone_type && zone.contains(pos))
            .map(|zone| zone.id)
    }

    #[must_use]
    pub fn pvp_rules_at(&self, pos: TilePos) -> Option<(ZoneId, PvpRules)> {
        self.inner
            .read()
            .zones
            .values()
            .find_map(|zone| match &zone.kind {
                ZoneKind::Pvp(rules) if zone.contains(pos) => Some((zone.id, *rules)),
                _ => None,
            })
    }

    /// PvP zone under a world-space point in pixels.
    #[must_use]
    pub fn pvp_zone_at_world(&self, x: f32, y: f32) -> Option<(ZoneId, PvpRules)> {
        self.pvp_rules_at(TilePos::from_world(x, y))
    }

    /// The PvP zone containing both tiles, if one does.
    #[must_use]
    pub fn both_in_same_pvp_zone(&self, a: TilePos, b: TilePos) -> Option<ZoneId> {
        self.inner
            .read()
            .zones
            .values()
            .find(|zone| zone.zone_type() == ZoneType::Pvp && zone.contains(a) && zone.contains(b))
            .map(|zone| zone.id)
    }

    /// Whether `pos` is an edge tile of any zone of `zone_type` other than `except`.
    #[must_use]
    pub fn is_edge_of_other(&self, zone_type: ZoneType, pos: TilePos, except: ZoneId) -> bool {
        self.inner
            .read()
            .zones
            .values()
            .any(|zone| zone.id != except && zone.zone_type() == zone_type && zone.is_edge(pos))
    }

    /// Whether `pos` is an edge tile of any zone of `zone_type`.
    #[must_use]
    pub fn is_edge_of_any(&self, zone_type: ZoneType, pos: TilePos) -> bool {
        self.inner
            .read()
            .zones
            .values()
            .any(|zone| zone.zone_type() == zone_type && zone.is_edge(pos))
    }

    /// Whether `pos` is currently an edge tile of zone `id`.
    #[must_use]
    pub fn is_edge_of(&self, id: ZoneId, pos: TilePos) -> bool {
        self.read(id, |zone| zone.is_edge(pos)).unwrap_or(false)
    }

    /// Name for a new zone that no zone on this level uses yet.
    #[must_use]
    pub fn unique_name(&self) -> String {
        let registry = self.inner.read();
        next_free_name(|candidate| registry.name_taken(candidate))
    }

    pub fn rename(&self, id: ZoneId, name: &str) -> ZoneResult<()> {
        let mut registry = self.inner.write();
        let zone = registry.get_mut(id)?;
        debug!(zone = %id, from = %zone.name, to = %name, "zone renamed");
        zone.name = name.to_string();
        Ok(())
    }

    /// Set the overlay hue, clamped to 0..=360. Returns the stored value.
    pub fn set_color_hue(&self, id: ZoneId, hue: u16) -> ZoneResult<u16> {
        let mut registry = self.inner.write();
        let zone = registry.get_mut(id)?;
        zone.color_hue = hue.min(MAX_HUE);
        Ok(zone.color_hue)
    }

    pub fn update_protected_rules<R>(
        &self,
        id: ZoneId,
        f: impl FnOnce(&mut ProtectedRules) -> R,
    ) -> ZoneResult<R> {
        let mut registry = self.inner.write();
        let rules = registry.get_mut(id)?.protected_rules_mut()?;
        Ok(f(rules))
    }

    /// Edit PvP rules. Returns the rules after the edit.
    pub fn update_pvp_rules(
        &self,
        id: ZoneId,
        f: impl FnOnce(&mut PvpRules),
    ) -> ZoneResult<PvpRules> {
        let mut registry = self.inner.write();
        let rules = registry.get_mut(id)?.pvp_rules_mut()?;
        f(rules);
        Ok(*rules)
    }

    /// Add a rectangle to a zone and restore the topology invariants.
    ///
    /// Returns `None` when no tile was added.
    pub fn expand(&self, id: ZoneId, rect: TileRect) -> ZoneResult<Option<Resolution>> {
        self.edit_tiles(id, rect, Zone::expand)
    }

    /// Remove a rectangle from a zone and restore the topology invariants.
    ///
    /// A zone left without tiles is deleted and reported in [`Resolution::removed`].
    /// Returns `None` when no tile was removed.
    pub fn shrink(&self, id: ZoneId, rect: TileRect) -> ZoneResult<Option<Resolution>> {
        self.edit_tiles(id, rect, Zone::shrink)
    }

    fn edit_tiles(
        &self,
        id: ZoneId,
        rect: TileRect,
        edit: impl FnOnce(&mut Zone, &TileRect) -> bool,
    ) -> ZoneResult<Option<Resolution>> {
        if rect.is_degenerate() {
            return Err(ZoneError::DegenerateRect(rect));
        }
        let mut registry = self.inner.write();
        let zone = registry.get_mut(id)?;
        let old_edges = zone.edge_tiles();
        if !edit(zone, &rect) {
            return Ok(None);
        }
        registry.resolve_after_change(id, old_edges).map(Some)
    }

    /// Edit a zone's tiles directly, then resolve against `old_edges` taken before.
    pub fn edit_with<R>(
        &self,
        id: ZoneId,
        f: impl FnOnce(&mut TileSet) -> R,
    ) -> ZoneResult<(R, Resolution)> {
        let mut registry = self.inner.write();
        let zone = registry.get_mut(id)?;
        let old_edges = zone.edge_tiles();
        let result = f(&mut zone.tiles);
        let resolution = registry.resolve_after_change(id, old_edges)?;
        Ok((result, resolution))
    }

    /// Split a zone into one zone per connected region.
    pub fn split_if_disconnected(&self, id: ZoneId) -> ZoneResult<Resolution> {
        let mut registry = self.inner.write();
        let old_edges = registry.get(id)?.edge_tiles();
        let changed = registry.split(id, old_edges)?;
        Ok(Resolution {
            changed,
            removed: Vec::new(),
            survivor: Some(id),
        })
    }

    /// Run merge and split for a zone whose tiles changed, given its edges from before.
    pub fn resolve_after_change(&self, id: ZoneId, old_edges: TileSet) -> ZoneResult<Resolution> {
        self.inner.write().resolve_after_change(id, old_edges)
    }
}
