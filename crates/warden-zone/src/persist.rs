//! JSON persistence of a level's zones.
//!
//! Saves are written to a sibling temp file and renamed into place. Loading is forgiving:
//! the file is read field by field, so a missing or unreadable field takes its default
//! and a record that is not an object is skipped. Zones without a usable ID or with a
//! duplicate ID get fresh ones, and the ID counter is advanced past every loaded ID.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use warden_geom::{TilePos, TileSet};

use crate::store::{ZoneRegistry, next_free_name};
use crate::{
    AuthId, ProtectedRules, PvpRules, Zone, ZoneDefaults, ZoneId, ZoneKind, ZoneResult,
    ZoneStore,
};

/// One saved zone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "R: Deserialize<'de> + Default"))]
pub struct ZoneRecord<R> {
    pub unique_id: u32,
    pub name: String,
    pub creator: Option<AuthId>,
    pub color_hue: u16,
    pub tiles: TileSet,
    pub rules: R,
}

/// Everything stored for one level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelSave {
    pub next_unique_id: u32,
    pub protected_zones: Vec<ZoneRecord<ProtectedRules>>,
    pub pvp_zones: Vec<ZoneRecord<PvpRules>>,
}

impl<R> ZoneRecord<R> {
    fn from_zone(zone: &Zone, rules: R) -> Self {
        Self {
            unique_id: zone.id.0,
            name: zone.name.clone(),
            creator: zone.creator,
            color_hue: zone.color_hue,
            tiles: zone.tiles.clone(),
            rules,
        }
    }

    fn into_zone(self, id: ZoneId, kind: ZoneKind) -> Zone {
        Zone {
            id,
            name: self.name,
            creator: self.creator,
            color_hue: self.color_hue.min(360),
            tiles: self.tiles,
            kind,
        }
    }
}

impl ZoneStore {
    /// Snapshot for saving, empty zones included.
    #[must_use]
    pub fn to_save(&self) -> LevelSave {
        let registry = self.registry();
        let mut save = LevelSave {
            next_unique_id: registry.next_id,
            ..LevelSave::default()
        };
        for zone in registry.zones.values() {
            match &zone.kind {
                ZoneKind::Protected(rules) => save
                    .protected_zones
                    .push(ZoneRecord::from_zone(zone, rules.clone())),
                ZoneKind::Pvp(rules) => save.pvp_zones.push(ZoneRecord::from_zone(zone, *rules)),
            }
        }
        save
    }

    /// Rebuild a store from a save, repairing what a hand edit may have broken.
    #[must_use]
    pub fn from_save(save: LevelSave, defaults: ZoneDefaults) -> Self {
        let mut seen = BTreeSet::new();
        let mut loaded: Vec<(Option<ZoneId>, Zone)> = Vec::new();

        let records = save
            .protected_zones
            .into_iter()
            .map(|record| {
                let (record, rules) = split_rules(record);
                (record, ZoneKind::Protected(rules))
            })
            .chain(save.pvp_zones.into_iter().map(|record| {
                let (record, rules) = split_rules(record);
                (record, ZoneKind::Pvp(rules.sanitized(defaults)))
            }));

        for (record, kind) in records {
            let unique_id = record.unique_id;
            let usable = unique_id != 0 && unique_id != u32::MAX;
            let id = (usable && seen.insert(unique_id)).then_some(ZoneId(unique_id));
            if id.is_none() {
                warn!(unique_id, name = %record.name, "saved zone has a missing, reserved or duplicate ID");
            }
            loaded.push((id, record.into_zone(id.unwrap_or_default(), kind)));
        }

        let max_id = seen.last().copied().unwrap_or(0);
        let mut registry = ZoneRegistry {
            zones: BTreeMap::new(),
            next_id: save.next_unique_id.max(max_id.saturating_add(1)).max(1),
            defaults,
        };
        if registry.next_id != save.next_unique_id {
            info!(
                saved = save.next_unique_id,
                next = registry.next_id,
                "advanced zone ID counter past loaded zones"
            );
        }

        // Zones keeping their saved ID go in first so fresh IDs never collide with them.
        loaded.sort_by_key(|(id, _)| id.is_none());
        for (id, mut zone) in loaded {
            zone.id = match id {
                Some(id) => id,
                None => registry.alloc_id(),
            };
            if zone.name.trim().is_empty() {
                zone.name = next_free_name(|candidate| registry.name_taken(candidate));
            }
            registry.zones.insert(zone.id, zone);
        }

        normalize(&mut registry);
        Self::from_registry(registry)
    }

    /// Write the level's zones as pretty JSON.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> ZoneResult<()> {
        let path = path.as_ref();
        let save = self.to_save();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(std::fs::File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, &save)?;
            writer.flush()?;
        }
        std::fs::rename(&tmp, path)?;

        info!(
            path = %path.display(),
            protected = save.protected_zones.len(),
            pvp = save.pvp_zones.len(),
            "saved zones"
        );
        Ok(())
    }

    /// Load a level's zones. A missing file yields an empty store.
    pub fn load_from_path(path: impl AsRef<Path>, defaults: ZoneDefaults) -> ZoneResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "no zone save found, starting empty");
            return Ok(Self::new(defaults));
        }
        let reader = BufReader::new(std::fs::File::open(path)?);
        let value: Value = serde_json::from_reader(reader)?;
        let save = LevelSave::from_value(&value)?;
        let store = Self::from_save(save, defaults);
        info!(path = %path.display(), zones = store.len(), "loaded zones");
        Ok(store)
    }
}

impl LevelSave {
    /// Read a parsed save file leniently.
    ///
    /// Only a top level that is not an object is an error. Anything below it that does
    /// not parse is logged and replaced by its default.
    pub fn from_value(value: &Value) -> ZoneResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(serde_json::Error::custom("zone save is not a JSON object").into());
        };
        Ok(Self {
            next_unique_id: field(object, "next_unique_id").unwrap_or(0),
            protected_zones: records(object, "protected_zones"),
            pvp_zones: records(object, "pvp_zones"),
        })
    }
}

/// A field that parses as `T`, `None` when missing or unreadable.
fn field<T: DeserializeOwned>(object: &Map<String, Value>, key: &str) -> Option<T> {
    let value = object.get(key)?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(field = key, %error, "unreadable saved field, using default");
            None
        }
    }
}

fn records<R>(object: &Map<String, Value>, key: &str) -> Vec<ZoneRecord<R>>
where
    R: Serialize + DeserializeOwned + Default,
{
    let Some(value) = object.get(key) else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        warn!(field = key, "saved zone list is not an array, ignoring it");
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let parsed = record(item);
            if parsed.is_none() {
                warn!(field = key, "skipping saved zone that is not an object");
            }
            parsed
        })
        .collect()
}

fn record<R>(value: &Value) -> Option<ZoneRecord<R>>
where
    R: Serialize + DeserializeOwned + Default,
{
    let object = value.as_object()?;
    Some(ZoneRecord {
        unique_id: field(object, "unique_id").unwrap_or(0),
        name: field(object, "name").unwrap_or_default(),
        creator: field::<Option<AuthId>>(object, "creator").flatten(),
        color_hue: field::<u64>(object, "color_hue").map_or(0, |hue| hue.min(360) as u16),
        tiles: object.get("tiles").map(tiles).unwrap_or_default(),
        rules: object.get("rules").map(rules).unwrap_or_default(),
    })
}

/// Tiles of a saved zone; unreadable entries are dropped.
fn tiles(value: &Value) -> TileSet {
    let Some(items) = value.as_array() else {
        warn!("saved tiles are not an array, zone loads empty");
        return TileSet::new();
    };
    let mut tiles = TileSet::with_capacity(items.len());
    let mut skipped = 0_usize;
    for item in items {
        match TilePos::deserialize(item) {
            Ok(pos) => {
                tiles.insert(pos);
            }
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "dropped unreadable saved tiles");
    }
    tiles
}

/// Rules layered over the defaults one field at a time, so a bad field keeps its default.
fn rules<R>(value: &Value) -> R
where
    R: Serialize + DeserializeOwned + Default,
{
    let Some(saved) = value.as_object() else {
        warn!("saved rules are not an object, using defaults");
        return R::default();
    };
    let mut merged = match serde_json::to_value(R::default()) {
        Ok(defaults @ Value::Object(_)) => defaults,
        _ => return R::default(),
    };
    for (key, value) in saved {
        let Some(object) = merged.as_object_mut() else {
            break;
        };
        let previous = object.insert(key.clone(), value.clone());
        if let Err(error) = R::deserialize(&merged) {
            warn!(field = %key, %error, "unreadable saved rule, using default");
            if let Some(object) = merged.as_object_mut() {
                match previous {
                    Some(previous) => object.insert(key.clone(), previous),
                    None => object.remove(key),
                };
            }
        }
    }
    R::deserialize(&merged).unwrap_or_default()
}

/// Separate the rules so both record kinds flow through one loop.
fn split_rules<R>(record: ZoneRecord<R>) -> (ZoneRecord<()>, R) {
    let ZoneRecord {
        unique_id,
        name,
        creator,
        color_hue,
        tiles,
        rules,
    } = record;
    let record = ZoneRecord {
        unique_id,
        name,
        creator,
        color_hue,
        tiles,
        rules: (),
    };
    (record, rules)
}

/// Restore connectivity and non-overlap for zones that arrive broken.
fn normalize(registry: &mut ZoneRegistry) {
    let ids: Vec<ZoneId> = registry.zones.keys().copied().collect();
    for id in ids {
        let Some(zone) = registry.zones.get(&id).filter(|zone| !zone.tiles.is_empty()) else {
            continue;
        };
        let edges = zone.edge_tiles();
        match registry.resolve_after_change(id, edges) {
            Ok(resolution) if resolution.changed.len() > 1 || !resolution.removed.is_empty() => {
                warn!(
                    zone = %id,
                    split = resolution.changed.len().saturating_sub(1),
                    merged = resolution.removed.len(),
                    "repaired saved zone topology"
                );
            }
            Ok(_) => {}
            Err(error) => warn!(zone = %id, %error, "could not normalise saved zone"),
        }
    }
}

#[cfg(test)]
mod tests {
    use warden_geom::{TilePos, TileRect};

    use super::*;
    use crate::{InteractionKind, TeamId, ZoneType};

    fn sample_store() -> (ZoneStore, ZoneId, ZoneId) {
        let store = ZoneStore::default();
        let base = store.create(ZoneType::Protected, Some("Base"), Some(AuthId(1)), Some(90));
        store.expand(base, TileRect::new(0, 0, 4, 4)).unwrap();
        store
            .update_protected_rules(base, |rules| {
                rules.allow_team(TeamId(3));
                rules.can_place = true;
                rules.interactions.set_kind(InteractionKind::Sign, true);
            })
            .unwrap();

        let arena = store.create(ZoneType::Pvp, Some("Arena"), None, None);
        store.expand(arena, TileRect::new(10, 10, 3, 3)).unwrap();
        store
            .update_pvp_rules(arena, |rules| rules.dot_damage_multiplier = 0.5)
            .unwrap();
        (store, base, arena)
    }

    #[test]
    fn test_save_and_reload_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones").join("level.json");
        let (store, base, arena) = sample_store();
        store.save_to_path(&path).unwrap();

        let loaded = ZoneStore::load_from_path(&path, ZoneDefaults::default()).unwrap();
        assert_eq!(loaded.get(base), store.get(base));
        assert_eq!(loaded.get(arena), store.get(arena));
        assert_eq!(loaded.next_unique_id(), store.next_unique_id());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            ZoneStore::load_from_path(dir.path().join("none.json"), ZoneDefaults::default())
                .unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let json = r#"{
            "pvp_zones": [{ "unique_id": 4, "tiles": [{"x": 0, "y": 0}], "rules": {} }]
        }"#;
        let save = LevelSave::from_value(&serde_json::from_str(json).unwrap()).unwrap();
        let store = ZoneStore::from_save(save, ZoneDefaults::default());

        let zone = store.get(ZoneId(4)).unwrap();
        assert_eq!(zone.pvp_rules(), Some(&PvpRules::default()));
        assert_eq!(zone.name, "New Zone 1");
        assert_eq!(store.next_unique_id(), 5);
    }

    #[test]
    fn test_duplicate_and_zero_ids_reassigned() {
        let record = |id, x| ZoneRecord {
            unique_id: id,
            name: format!("zone {x}"),
            tiles: TileSet::from_rect(&TileRect::new(x, 0, 1, 1)),
            ..ZoneRecord::<PvpRules>::default()
        };
        let save = LevelSave {
            next_unique_id: 2,
            protected_zones: Vec::new(),
            pvp_zones: vec![record(7, 0), record(7, 10), record(0, 20)],
        };
        let store = ZoneStore::from_save(save, ZoneDefaults::default());

        assert_eq!(store.len(), 3);
        assert_eq!(store.zone_at(ZoneType::Pvp, TilePos::new(0, 0)), Some(ZoneId(7)));
        let others = [
            store.zone_at(ZoneType::Pvp, TilePos::new(10, 0)).unwrap(),
            store.zone_at(ZoneType::Pvp, TilePos::new(20, 0)).unwrap(),
        ];
        assert!(others.iter().all(|id| id.0 > 7));
        assert_ne!(others[0], others[1]);
        assert_eq!(store.next_unique_id(), 10);
    }

    #[test]
    fn test_broken_topology_repaired() {
        let mut tiles = TileSet::from_rect(&TileRect::new(0, 0, 3, 3));
        tiles.add_rect(&TileRect::new(10, 0, 2, 2));
        let save = LevelSave {
            next_unique_id: 2,
            protected_zones: Vec::new(),
            pvp_zones: vec![ZoneRecord {
                unique_id: 1,
                tiles,
                ..ZoneRecord::default()
            }],
        };
        let store = ZoneStore::from_save(save, ZoneDefaults::default());
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(ZoneId(1)).unwrap().tiles.len(), 9);
    }

    #[test]
    fn test_empty_zones_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.json");
        let (store, base, _) = sample_store();
        let staged = store.create(ZoneType::Pvp, Some("Staged"), None, Some(200));
        store.save_to_path(&path).unwrap();

        let loaded = ZoneStore::load_from_path(&path, ZoneDefaults::default()).unwrap();
        assert_eq!(loaded.len(), 3);
        let zone = loaded.get(staged).unwrap();
        assert!(zone.tiles.is_empty());
        assert_eq!(zone.name, "Staged");
        assert_eq!(zone.color_hue, 200);
        assert_eq!(loaded.get(base), store.get(base));
        assert!(loaded.next_unique_id() > staged.0);
    }

    // ====================================================================
    // Lenient loading
    // ====================================================================

    #[test]
    fn test_bad_field_keeps_other_zones() {
        let json = serde_json::json!({
            "next_unique_id": "seven",
            "pvp_zones": [
                { "unique_id": 1, "name": "Broken", "color_hue": 70000,
                  "tiles": [{"x": 0, "y": 0}] },
                { "unique_id": 2, "name": "Fine", "color_hue": 40,
                  "tiles": [{"x": 10, "y": 0}] },
                "not a zone"
            ]
        });
        let save = LevelSave::from_value(&json).unwrap();
        let store = ZoneStore::from_save(save, ZoneDefaults::default());

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(ZoneId(1)).unwrap().color_hue, 360);
        let fine = store.get(ZoneId(2)).unwrap();
        assert_eq!(fine.name, "Fine");
        assert_eq!(fine.color_hue, 40);
        assert_eq!(store.next_unique_id(), 3);
    }

    #[test]
    fn test_bad_rule_field_keeps_other_rules() {
        let json = serde_json::json!({
            "pvp_zones": [{
                "unique_id": 3,
                "tiles": [{"x": 0, "y": 0}],
                "rules": { "combat_lock_secs": "ten", "dot_damage_multiplier": 0.5 }
            }]
        });
        let store =
            ZoneStore::from_save(LevelSave::from_value(&json).unwrap(), ZoneDefaults::default());

        let rules = store.get(ZoneId(3)).unwrap().pvp_rules().copied().unwrap();
        assert_eq!(rules.combat_lock_secs, PvpRules::default().combat_lock_secs);
        assert_eq!(rules.dot_damage_multiplier, 0.5);
    }

    #[test]
    fn test_unreadable_tiles_dropped() {
        let json = serde_json::json!({
            "protected_zones": [{
                "unique_id": 1,
                "tiles": [{"x": 0, "y": 0}, {"x": "one"}, {"x": 1, "y": 0}],
                "rules": "nothing"
            }]
        });
        let store =
            ZoneStore::from_save(LevelSave::from_value(&json).unwrap(), ZoneDefaults::default());

        let zone = store.get(ZoneId(1)).unwrap();
        assert_eq!(zone.tiles.len(), 2);
        assert_eq!(zone.protected_rules(), Some(&ProtectedRules::default()));
    }

    #[test]
    fn test_non_object_save_is_an_error() {
        assert!(LevelSave::from_value(&serde_json::json!([1, 2, 3])).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(ZoneStore::load_from_path(&path, ZoneDefaults::default()).is_err());
    }

    // ====================================================================
    // ID counter limits
    // ====================================================================

    #[test]
    fn test_max_id_reassigned() {
        let record = |id, x| ZoneRecord {
            unique_id: id,
            tiles: TileSet::from_rect(&TileRect::new(x, 0, 1, 1)),
            ..ZoneRecord::<PvpRules>::default()
        };
        let save = LevelSave {
            next_unique_id: 0,
            protected_zones: Vec::new(),
            pvp_zones: vec![record(u32::MAX, 0), record(5, 10)],
        };
        let store = ZoneStore::from_save(save, ZoneDefaults::default());

        assert_eq!(store.zone_at(ZoneType::Pvp, TilePos::new(0, 0)), Some(ZoneId(6)));
        assert_eq!(store.zone_at(ZoneType::Pvp, TilePos::new(10, 0)), Some(ZoneId(5)));
        assert_eq!(store.next_unique_id(), 7);
    }

    #[test]
    fn test_exhausted_counter_reuses_free_ids() {
        let mut tiles = TileSet::from_rect(&TileRect::new(0, 0, 2, 2));
        tiles.add_rect(&TileRect::new(10, 0, 2, 2));
        tiles.add_rect(&TileRect::new(20, 0, 2, 2));
        let save = LevelSave {
            next_unique_id: u32::MAX,
            protected_zones: Vec::new(),
            pvp_zones: vec![ZoneRecord {
                unique_id: 1,
                tiles,
                ..ZoneRecord::default()
            }],
        };
        let store = ZoneStore::from_save(save, ZoneDefaults::default());

        let mut ids: Vec<ZoneId> = [0, 10, 20]
            .into_iter()
            .map(|x| store.zone_at(ZoneType::Pvp, TilePos::new(x, 0)).unwrap())
            .collect();
        ids.sort();
        assert_eq!(ids, vec![ZoneId(1), ZoneId(2), ZoneId(3)]);

        let created = store.create(ZoneType::Protected, None, None, None);
        assert_eq!(created, ZoneId(4));
        assert_eq!(store.next_unique_id(), u32::MAX);
    }
}
