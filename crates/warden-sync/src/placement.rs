//! Lazy barrier placement for regions that load after a zone was edited.
//!
//! A task covers one zone in one region. Its tile list is computed when the task is first
//! processed, not when it is queued, so a zone edited in between is placed as it is now.

use std::collections::VecDeque;

use tracing::debug;
use warden_geom::TilePos;
use warden_zone::{ZoneId, ZoneKind};

use crate::RegionId;
use crate::world_ops::WorldOps;

#[derive(Debug)]
struct PlacementTask {
    zone: ZoneId,
    region: RegionId,
    pending: Option<VecDeque<TilePos>>,
}

impl PlacementTask {
    fn init(&mut self, ops: &WorldOps<'_>) -> &mut VecDeque<TilePos> {
        let (zone, region) = (self.zone, self.region);
        self.pending.get_or_insert_with(|| {
            let edges = ops
                .store
                .read(zone, |z| match z.kind {
                    ZoneKind::Pvp(_) => Some(z.edge_tiles()),
                    ZoneKind::Protected(_) => None,
                })
                .flatten();
            let Some(edges) = edges else {
                return VecDeque::new();
            };
            let mut tiles: Vec<TilePos> = edges
                .iter()
                .filter(|pos| ops.host.world.region_of(ops.level, *pos) == region)
                .collect();
            tiles.sort_unstable();
            tiles.into()
        })
    }

    /// Process up to `max` tiles. Returns how many were consumed.
    fn process_up_to(&mut self, max: usize, ops: &WorldOps<'_>) -> usize {
        let zone = self.zone;
        let pending = self.init(ops);
        let mut did = 0;
        while did < max {
            let Some(pos) = pending.pop_front() else {
                break;
            };
            if !ops.store.contains_zone(zone) {
                pending.clear();
                break;
            }
            if ops.claimed(pos) {
                ops.place(pos);
            }
            did += 1;
        }
        did
    }

    fn is_complete(&self) -> bool {
        self.pending.as_ref().is_some_and(VecDeque::is_empty)
    }
}

/// FIFO of placement tasks for one level.
#[derive(Debug, Default)]
pub(crate) struct PlacementQueue {
    tasks: VecDeque<PlacementTask>,
}

impl PlacementQueue {
    /// Queue a task unless an identical one is still waiting to start.
    pub fn queue(&mut self, zone: ZoneId, region: RegionId) -> bool {
        let duplicate = self
            .tasks
            .iter()
            .any(|task| task.zone == zone && task.region == region && task.pending.is_none());
        if duplicate {
            return false;
        }
        debug!(zone = %zone, region_x = region.x, region_y = region.y, "queued barrier placement");
        self.tasks.push_back(PlacementTask {
            zone,
            region,
            pending: None,
        });
        true
    }

    /// Drop every task of a zone. Returns how many were dropped.
    pub fn cancel(&mut self, zone: ZoneId) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.zone != zone);
        before - self.tasks.len()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Process up to `budget` tiles across queued tasks. Returns tiles consumed.
    pub fn drain(&mut self, ops: &WorldOps<'_>, budget: usize) -> usize {
        let mut processed = 0;
        while processed < budget {
            let Some(task) = self.tasks.front_mut() else {
                break;
            };
            let did = task.process_up_to(budget - processed, ops);
            processed += did;
            if task.is_complete() {
                self.tasks.pop_front();
            } else if did == 0 {
                break;
            }
        }
        processed
    }
}
