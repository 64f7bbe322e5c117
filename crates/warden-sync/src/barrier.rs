//! Barrier synchronisation.
//!
//! Projects PvP zone edges onto barrier objects in the world.
//!
//! ```text
//!   ZoneChange ──plan──► SyncJob [Remove.., Add..] ──► job queue (FIFO)
//!                                                        │
//!            submit call: first `batch_size` ops ◄───────┤
//!            every tick:  `max_sync_ops_per_tick` ops ◄──┘
//!                                                        │
//!                          job empty ──► Settled ──► player reconciliation
//! ```
//!
//! Diffs are planned against the zone store before any world mutation. Every operation is
//! re-checked when it runs against the live PvP edges: an addition only lands on a tile
//! some zone still claims, a removal only clears a tile nobody claims. A split or merge
//! between planning and running therefore cannot strand or orphan a barrier. Tiles in unloaded
//! regions are skipped and picked up by the lazy [placement queue](crate::placement) when
//! their region loads.

use std::collections::VecDeque;
use std::sync::OnceLock;

use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};
use warden_geom::{TilePos, TileRect, TileSet};
use warden_zone::{Zone, ZoneChange, ZoneId, ZoneKind, ZoneStore, ZoneType};

use crate::placement::PlacementQueue;
use crate::world_ops::WorldOps;
use crate::{Host, LevelId, ObjectId, RegionId, SyncError, SyncResult, WorldAccess, ZoneConfig};

/// Registry name of the barrier object.
pub const BARRIER_OBJECT: &str = "pvpzonebarrier";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SyncOp {
    Remove(TilePos),
    Add(TilePos),
}

#[derive(Debug)]
struct SyncJob {
    zone: ZoneId,
    ops: VecDeque<SyncOp>,
    reconcile: bool,
    affected: SmallVec<[ZoneId; 2]>,
}

/// A barrier job finished; players around these zones need reconciling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settled {
    pub zone: ZoneId,
    /// The zone plus any zones merged into it by the same edit.
    pub affected: SmallVec<[ZoneId; 2]>,
}

/// A planned edge diff.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_remove: Vec<TilePos>,
    pub to_add: Vec<TilePos>,
    /// Barrier tiles found by the sweep that no live zone claims. Included in `to_remove`.
    pub strays: usize,
    /// Additions dropped because the diff exceeded the edge cap.
    pub skipped_additions: usize,
}

impl SyncPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Result of submitting barrier work.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub plan: SyncPlan,
    /// Jobs that completed during the call.
    pub settled: Vec<Settled>,
}

/// Per-level barrier state: the job queue and the lazy placement queue.
#[derive(Debug)]
pub struct BarrierSynchronizer {
    level: LevelId,
    config: ZoneConfig,
    barrier: OnceLock<ObjectId>,
    jobs: VecDeque<SyncJob>,
    placements: PlacementQueue,
}

impl BarrierSynchronizer {
    #[must_use]
    pub fn new(level: LevelId, config: ZoneConfig) -> Self {
        Self {
            level,
            config,
            barrier: OnceLock::new(),
            jobs: VecDeque::new(),
            placements: PlacementQueue::default(),
        }
    }

    /// Barrier object ID, resolved on first success and cached.
    pub fn barrier_object(&self, world: &dyn WorldAccess) -> SyncResult<ObjectId> {
        if let Some(id) = self.barrier.get() {
            return Ok(*id);
        }
        let id = world
            .resolve_object_id(BARRIER_OBJECT)
            .ok_or(SyncError::BarrierObjectMissing(BARRIER_OBJECT))?;
        Ok(*self.barrier.get_or_init(|| id))
    }

    fn ops<'a>(&self, store: &'a ZoneStore, host: Host<'a>) -> SyncResult<WorldOps<'a>> {
        Ok(WorldOps {
            level: self.level,
            store,
            host,
            barrier: self.barrier_object(host.world)?,
        })
    }

    /// Queued barrier operations not yet applied.
    #[must_use]
    pub fn pending_ops(&self) -> usize {
        self.jobs.iter().map(|job| job.ops.len()).sum()
    }

    /// Zones whose players wait on a queued barrier job before reconciliation.
    #[must_use]
    pub fn settling_zones(&self) -> Vec<ZoneId> {
        let mut zones: Vec<ZoneId> = self
            .jobs
            .iter()
            .filter(|job| job.reconcile)
            .flat_map(|job| job.affected.iter().copied())
            .collect();
        zones.sort_unstable();
        zones.dedup();
        zones
    }

    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn pending_placements(&self) -> usize {
        self.placements.len()
    }

    /// No queued jobs and no queued placements.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty() && self.placements.is_empty()
    }

    /// Place barriers on every edge tile of a PvP zone.
    ///
    /// Aborts without touching the world when the edge is larger than `max_edge_tiles`.
    pub fn create_barrier(
        &mut self,
        store: &ZoneStore,
        host: Host<'_>,
        zone: ZoneId,
    ) -> SyncResult<SyncOutcome> {
        let Some(edges) = store.read(zone, pvp_edges).flatten() else {
            return Ok(SyncOutcome::default());
        };
        if edges.len() > self.config.max_edge_tiles {
            warn!(
                level = %self.level,
                zone = %zone,
                edges = edges.len(),
                cap = self.config.max_edge_tiles,
                "zone edge exceeds cap, barrier not created"
            );
            return Err(SyncError::EdgeCapExceeded {
                zone,
                edges: edges.len(),
                cap: self.config.max_edge_tiles,
            });
        }
        self.barrier_object(host.world)?;

        let plan = SyncPlan {
            to_add: edges.sorted(),
            ..SyncPlan::default()
        };
        debug!(level = %self.level, zone = %zone, tiles = plan.to_add.len(), "creating barrier");
        self.submit(store, host, zone, plan, false, SmallVec::new())
    }

    /// Apply the edge diff of a settled zone change.
    ///
    /// `affected` lists zones merged into this one; their members are reconciled too.
    pub fn update_barrier(
        &mut self,
        store: &ZoneStore,
        host: Host<'_>,
        change: &ZoneChange,
        affected: &[ZoneId],
    ) -> SyncResult<SyncOutcome> {
        let ops = self.ops(store, host)?;
        let plan = self.plan_update(&ops, change.id, &change.old_edges, &change.new_edges);
        if plan.strays > 0 || plan.skipped_additions > 0 {
            debug!(
                level = %self.level,
                zone = %change.id,
                strays = plan.strays,
                skipped = plan.skipped_additions,
                "barrier diff adjusted"
            );
        }
        let mut affected_ids: SmallVec<[ZoneId; 2]> = SmallVec::new();
        affected_ids.push(change.id);
        affected_ids.extend(affected.iter().copied().filter(|id| *id != change.id));
        self.submit(store, host, change.id, plan, true, affected_ids)
    }

    /// Compute removals and additions for one zone without touching the world.
    fn plan_update(
        &self,
        ops: &WorldOps<'_>,
        zone: ZoneId,
        old_edges: &TileSet,
        new_edges: &TileSet,
    ) -> SyncPlan {
        let mut to_remove: Vec<TilePos> = old_edges
            .difference(new_edges)
            .iter()
            .filter(|pos| !ops.claimed_by_other(zone, *pos))
            .collect();
        let mut to_add: Vec<TilePos> = new_edges.difference(old_edges).sorted();

        let strays = self.sweep_strays(ops, zone, new_edges, old_edges);
        let stray_count = strays.len();
        to_remove.extend(strays);
        to_remove.sort_unstable();

        let cap = self.config.max_edge_tiles;
        let skipped_additions = to_add.len().saturating_sub(cap);
        if skipped_additions > 0 {
            warn!(
                level = %self.level,
                zone = %zone,
                skipped = skipped_additions,
                cap,
                "barrier additions beyond cap skipped"
            );
            to_add.truncate(cap);
        }

        SyncPlan {
            to_remove,
            to_add,
            strays: stray_count,
            skipped_additions,
        }
    }

    /// Barrier tiles around the zone that no live PvP zone claims.
    fn sweep_strays(
        &self,
        ops: &WorldOps<'_>,
        zone: ZoneId,
        new_edges: &TileSet,
        old_edges: &TileSet,
    ) -> Vec<TilePos> {
        let Some(bounds) = new_edges.bounds() else {
            return Vec::new();
        };
        let rect = bounds.inflate(1);
        let cap = self.config.sweep_area_cap();
        if rect.area() > cap {
            warn!(level = %self.level, zone = %zone, area = rect.area(), cap, "stray sweep skipped, area too large");
            return Vec::new();
        }
        rect.tiles()
            .filter(|pos| !new_edges.contains(*pos) && !old_edges.contains(*pos))
            .filter(|pos| ops.is_barrier(*pos) && !ops.claimed_by_other(zone, *pos))
            .collect()
    }

    fn submit(
        &mut self,
        store: &ZoneStore,
        host: Host<'_>,
        zone: ZoneId,
        plan: SyncPlan,
        reconcile: bool,
        affected: SmallVec<[ZoneId; 2]>,
    ) -> SyncResult<SyncOutcome> {
        let ops = plan
            .to_remove
            .iter()
            .copied()
            .map(SyncOp::Remove)
            .chain(plan.to_add.iter().copied().map(SyncOp::Add))
            .collect();
        self.jobs.push_back(SyncJob {
            zone,
            ops,
            reconcile,
            affected,
        });
        let settled = self.run(store, host, self.config.batch_size)?;
        Ok(SyncOutcome { plan, settled })
    }

    /// Strip barriers from a deleted zone's edges immediately.
    ///
    /// Runs the zone's queued operations first and drops its placement tasks. Tiles
    /// claimed by another live PvP zone keep their barrier.
    pub fn remove_barrier(
        &mut self,
        store: &ZoneStore,
        host: Host<'_>,
        zone: ZoneId,
        edges: &TileSet,
    ) -> SyncResult<usize> {
        let ops = self.ops(store, host)?;
        let mut removed = self.cancel_zone(&ops, zone);
        for pos in edges.sorted() {
            if !ops.claimed_by_other(zone, pos) && ops.clear(pos) {
                removed += 1;
            }
        }
        info!(level = %self.level, zone = %zone, removed, "barrier removed");
        Ok(removed)
    }

    /// Cancel a zone absorbed by a merge. Its queued operations run now.
    pub fn cancel(&mut self, store: &ZoneStore, host: Host<'_>, zone: ZoneId) -> SyncResult<usize> {
        let ops = self.ops(store, host)?;
        Ok(self.cancel_zone(&ops, zone))
    }

    fn cancel_zone(&mut self, ops: &WorldOps<'_>, zone: ZoneId) -> usize {
        let mut removed = 0;
        let mut cancelled = 0;
        self.jobs.retain(|job| {
            if job.zone != zone {
                return true;
            }
            cancelled += 1;
            for op in &job.ops {
                if apply(ops, *op) && matches!(op, SyncOp::Remove(_)) {
                    removed += 1;
                }
            }
            false
        });
        let tasks = self.placements.cancel(zone);
        if cancelled > 0 || tasks > 0 {
            debug!(level = %self.level, zone = %zone, jobs = cancelled, tasks, removed, "cancelled queued barrier work");
        }
        removed
    }

    /// Strip every barrier in a square around `center` that no live PvP zone claims.
    pub fn force_clean_around(
        &self,
        store: &ZoneStore,
        host: Host<'_>,
        center: TilePos,
        radius: u32,
    ) -> SyncResult<usize> {
        let radius = radius.min(i32::MAX as u32 / 2) as i32;
        let rect = TileRect::around(center, radius);
        let cap = self.config.sweep_area_cap();
        if rect.area() > cap {
            warn!(level = %self.level, %center, radius, area = rect.area(), cap, "force-clean area too large");
            return Err(SyncError::AreaTooLarge {
                area: rect.area(),
                cap,
            });
        }

        let ops = self.ops(store, host)?;
        let removed = rect
            .tiles()
            .filter(|pos| ops.is_barrier(*pos) && !store.is_edge_of_any(ZoneType::Pvp, *pos))
            .filter(|pos| ops.clear(*pos))
            .count();
        info!(level = %self.level, %center, radius, removed, "force-clean finished");
        Ok(removed)
    }

    /// Apply up to `max_sync_ops_per_tick` queued operations.
    pub fn tick(&mut self, store: &ZoneStore, host: Host<'_>) -> SyncResult<Vec<Settled>> {
        if self.jobs.is_empty() {
            return Ok(Vec::new());
        }
        self.run(store, host, self.config.max_sync_ops_per_tick)
    }

    /// Apply every queued operation and placement now.
    pub fn flush(&mut self, store: &ZoneStore, host: Host<'_>) -> SyncResult<Vec<Settled>> {
        let settled = self.run(store, host, usize::MAX)?;
        if !self.placements.is_empty() {
            let ops = self.ops(store, host)?;
            self.placements.drain(&ops, usize::MAX);
        }
        Ok(settled)
    }

    fn run(&mut self, store: &ZoneStore, host: Host<'_>, budget: usize) -> SyncResult<Vec<Settled>> {
        let ops = self.ops(store, host)?;
        let mut settled = Vec::new();
        let mut done = 0_usize;

        while done < budget {
            let Some(job) = self.jobs.front_mut() else {
                break;
            };
            while done < budget {
                let Some(op) = job.ops.pop_front() else {
                    break;
                };
                apply(&ops, op);
                done += 1;
            }
            if !job.ops.is_empty() {
                break;
            }
            if let Some(job) = self.jobs.pop_front() {
                trace!(level = %self.level, zone = %job.zone, "barrier job settled");
                if job.reconcile {
                    settled.push(Settled {
                        zone: job.zone,
                        affected: job.affected,
                    });
                }
            }
        }

        if done > 0 {
            debug!(level = %self.level, ops = done, remaining = self.pending_ops(), "barrier batch applied");
        }
        Ok(settled)
    }

    /// Queue lazy placement of a zone's edge within a region.
    pub fn queue_placement(&mut self, zone: ZoneId, region: RegionId) -> bool {
        self.placements.queue(zone, region)
    }

    /// Queue placement for every PvP zone with an edge tile in a freshly loaded region.
    pub fn on_region_loaded(&mut self, store: &ZoneStore, host: Host<'_>, region: RegionId) -> usize {
        let mut queued = 0;
        for zone in store.zones_of_type(ZoneType::Pvp) {
            let intersects = zone
                .edge_tiles()
                .iter()
                .any(|pos| host.world.region_of(self.level, pos) == region);
            if intersects && self.placements.queue(zone.id, region) {
                queued += 1;
            }
        }
        queued
    }

    /// Process up to `budget` lazy placement tiles. Returns tiles consumed.
    pub fn drain_placements(
        &mut self,
        store: &ZoneStore,
        host: Host<'_>,
        budget: usize,
    ) -> SyncResult<usize> {
        if self.placements.is_empty() || budget == 0 {
            return Ok(0);
        }
        let ops = self.ops(store, host)?;
        Ok(self.placements.drain(&ops, budget))
    }
}

fn pvp_edges(zone: &Zone) -> Option<TileSet> {
    match zone.kind {
        ZoneKind::Pvp(_) => Some(zone.edge_tiles()),
        ZoneKind::Protected(_) => None,
    }
}

/// Run one queued operation. Returns `true` if the world changed.
fn apply(ops: &WorldOps<'_>, op: SyncOp) -> bool {
    match op {
        SyncOp::Add(pos) => ops.claimed(pos) && ops.place(pos),
        SyncOp::Remove(pos) => !ops.claimed(pos) && ops.clear(pos),
    }
}
