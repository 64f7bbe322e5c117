//! Split and merge resolution.
//!
//! Runs under the store's write lock after any tile edit:
//!
//! ```text
//!   edited zone ──► touching same-type zones? ──no──► split pass
//!                          │
//!                         yes
//!                          ▼
//!              largest wins (ties: lowest ID), absorbs the rest
//!                          ▼
//!                     split pass on the winner
//! ```
//!
//! The split pass keeps the largest component under the original ID (ties: the component
//! holding the smallest tile) and turns every other component into a new zone with the
//! same rules.

use smallvec::SmallVec;
use tracing::{debug, info};
use warden_geom::{TileSet, connected_components};

use crate::store::{ZoneRegistry, next_free_name};
use crate::{Zone, ZoneId, ZoneResult, ZoneType};

/// A zone whose tiles changed, or that was created by a split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneChange {
    pub id: ZoneId,
    pub zone_type: ZoneType,
    pub created: bool,
    /// Edge tiles that had barriers before the edit, as far as this zone is concerned.
    pub old_edges: TileSet,
    pub new_edges: TileSet,
}

/// A zone that no longer exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedZone {
    pub id: ZoneId,
    pub zone_type: ZoneType,
    pub name: String,
    pub old_edges: TileSet,
    /// Set when the zone was absorbed by a merge. Its old edges are then already part of
    /// the winner's [`ZoneChange::old_edges`] and must not be stripped separately.
    pub merged_into: Option<ZoneId>,
}

/// Outcome of an edit after merge and split.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub changed: Vec<ZoneChange>,
    pub removed: Vec<RemovedZone>,
    /// The zone now holding the edited zone's main region, `None` if it was emptied.
    pub survivor: Option<ZoneId>,
}

impl Resolution {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    /// IDs of zones created by splits.
    pub fn created(&self) -> impl Iterator<Item = ZoneId> + '_ {
        self.changed
            .iter()
            .filter(|change| change.created)
            .map(|change| change.id)
    }
}

impl ZoneRegistry {
    pub(crate) fn resolve_after_change(
        &mut self,
        target: ZoneId,
        old_edges: TileSet,
    ) -> ZoneResult<Resolution> {
        let zone = self.get(target)?;
        let zone_type = zone.zone_type();

        if zone.tiles.is_empty() {
            let name = zone.name.clone();
            self.zones.remove(&target);
            info!(zone = %target, %name, "zone emptied and removed");
            return Ok(Resolution {
                changed: Vec::new(),
                removed: vec![RemovedZone {
                    id: target,
                    zone_type,
                    name,
                    old_edges,
                    merged_into: None,
                }],
                survivor: None,
            });
        }

        let touching: SmallVec<[ZoneId; 4]> = self
            .zones
            .values()
            .filter(|other| {
                other.id != target
                    && other.zone_type() == zone_type
                    && other.tiles.touches(&zone.tiles)
            })
            .map(|other| other.id)
            .collect();

        if touching.is_empty() {
            let changed = self.split(target, old_edges)?;
            return Ok(Resolution {
                changed,
                removed: Vec::new(),
                survivor: Some(target),
            });
        }

        let winner = self.merge_winner(target, &touching);
        let mut combined_old = old_edges.clone();
        for id in &touching {
            combined_old.extend_from(&self.get(*id)?.edge_tiles());
        }

        let mut removed = Vec::with_capacity(touching.len());
        let mut absorbed = TileSet::new();
        for id in core::iter::once(target).chain(touching.iter().copied()) {
            if id == winner {
                continue;
            }
            let Some(loser) = self.zones.remove(&id) else {
                continue;
            };
            let loser_edges = if id == target {
                old_edges.clone()
            } else {
                loser.edge_tiles()
            };
            absorbed.extend_from(&loser.tiles);
            removed.push(RemovedZone {
                id,
                zone_type,
                name: loser.name,
                old_edges: loser_edges,
                merged_into: Some(winner),
            });
        }

        let merged = self.get_mut(winner)?;
        merged.tiles.extend_from(&absorbed);
        info!(
            zone = %winner,
            absorbed = removed.len(),
            tiles = merged.tiles.len(),
            "zones merged"
        );

        let changed = self.split(winner, combined_old)?;
        Ok(Resolution {
            changed,
            removed,
            survivor: Some(winner),
        })
    }

    /// Largest zone of the merge set; the lowest ID breaks ties.
    fn merge_winner(&self, target: ZoneId, touching: &[ZoneId]) -> ZoneId {
        let size = |id: ZoneId| self.zones.get(&id).map_or(0, |zone| zone.tiles.len());
        core::iter::once(target)
            .chain(touching.iter().copied())
            .max_by(|a, b| size(*a).cmp(&size(*b)).then(b.cmp(a)))
            .unwrap_or(target)
    }

    /// Split `id` into connected regions. The first change is always `id` itself.
    pub(crate) fn split(&mut self, id: ZoneId, old_edges: TileSet) -> ZoneResult<Vec<ZoneChange>> {
        let source = self.get(id)?;
        let zone_type = source.zone_type();
        let mut components = connected_components(&source.tiles).into_iter();
        let Some(main) = components.next() else {
            return Ok(Vec::new());
        };

        let rest: Vec<TileSet> = components.collect();
        if rest.is_empty() {
            return Ok(vec![ZoneChange {
                id,
                zone_type,
                created: false,
                new_edges: source.edge_tiles(),
                old_edges,
            }]);
        }

        let ids = self.alloc_ids(rest.len());
        let source = self.get(id)?;
        let mut islands: Vec<Zone> = Vec::with_capacity(rest.len());
        for (island_id, tiles) in ids.into_iter().zip(rest) {
            let name = next_free_name(|candidate| {
                self.name_taken(candidate) || islands.iter().any(|zone| zone.name == candidate)
            });
            islands.push(source.split_off(island_id, name, tiles));
        }

        info!(zone = %id, islands = islands.len(), "zone split into disconnected regions");

        let mut changes = Vec::with_capacity(islands.len() + 1);
        let zone = self.get_mut(id)?;
        zone.tiles = main;
        changes.push(ZoneChange {
            id,
            zone_type,
            created: false,
            new_edges: zone.edge_tiles(),
            old_edges: old_edges.clone(),
        });

        for island in islands {
            debug!(zone = %island.id, from = %id, tiles = island.tiles.len(), "split-off zone");
            changes.push(ZoneChange {
                id: island.id,
                zone_type,
                created: true,
                old_edges: old_edges
                    .iter()
                    .filter(|pos| island.tiles.contains(*pos))
                    .collect(),
                new_edges: island.edge_tiles(),
            });
            self.zones.insert(island.id, island);
        }
        Ok(changes)
    }
}
