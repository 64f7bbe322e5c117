//! Barrier synchronisation against the in-memory world.

use pretty_assertions::assert_eq;
use warden_geom::{TilePos, TileRect};
use warden_harness::{BARRIER, Fixture, HostEvent, MemoryHost};
use warden_sync::{
    BarrierSynchronizer, Host, LevelId, Notice, RegionId, SyncError, Transition, ZoneConfig,
    ZoneLevel, ZoneRealm,
};
use warden_zone::{AuthId, ZoneChange, ZoneStore, ZoneType};

fn small_batches() -> ZoneConfig {
    ZoneConfig {
        batch_size: 10,
        max_sync_ops_per_tick: 20,
        ..ZoneConfig::default()
    }
}

const EAST: RegionId = RegionId { x: 1, y: 0 };

// ============================================================================
// Create and update
// ============================================================================

#[test]
fn test_new_zone_gets_barrier_on_every_edge() {
    let fx = Fixture::new();
    let id = fx.pvp_zone(TileRect::new(0, 0, 5, 5));

    assert_eq!(fx.barriers(), fx.edges(id));
    assert_eq!(fx.barriers().len(), 16);

    let placed = fx
        .host
        .take_events()
        .into_iter()
        .filter(|event| matches!(event, HostEvent::ObjectChanged { object, .. } if *object == BARRIER))
        .count();
    assert_eq!(placed, 16);
}

#[test]
fn test_update_with_unchanged_edges_is_empty() {
    let host = MemoryHost::new();
    let store = ZoneStore::default();
    let id = store.create(ZoneType::Pvp, None, None, None);
    store.expand(id, TileRect::new(0, 0, 6, 4)).unwrap();

    let mut sync = BarrierSynchronizer::new(LevelId(1), ZoneConfig::default());
    sync.create_barrier(&store, Host::new(&host), id).unwrap();
    let edges = store.read(id, |zone| zone.edge_tiles()).unwrap();
    assert_eq!(host.barrier_tiles(LevelId(1)), edges);

    let change = ZoneChange {
        id,
        zone_type: ZoneType::Pvp,
        created: false,
        old_edges: edges.clone(),
        new_edges: edges,
    };
    let outcome = sync
        .update_barrier(&store, Host::new(&host), &change, &[])
        .unwrap();

    assert!(outcome.plan.is_empty());
    assert_eq!(outcome.plan.strays, 0);
    assert_eq!(outcome.settled.len(), 1);
    assert!(sync.is_idle());
}

#[test]
fn test_stray_barrier_next_to_zone_is_swept() {
    let fx = Fixture::new();
    let id = fx.pvp_zone(TileRect::new(0, 0, 5, 5));
    let stray = TilePos::new(5, 2);
    fx.host.put_object(fx.level_id(), stray, BARRIER);

    fx.expand(id, TileRect::new(0, 5, 5, 1));
    fx.flush();

    assert!(!fx.has_barrier(stray));
    assert_eq!(fx.barriers(), fx.expected_barriers());
}

#[test]
fn test_sweep_keeps_neighbouring_zone_barriers() {
    let fx = Fixture::new();
    let a = fx.pvp_zone(TileRect::new(0, 0, 3, 3));
    // Diagonal to `a` after the expansion: inside its sweep, but never touching.
    let b = fx.pvp_zone(TileRect::new(3, 4, 3, 3));

    fx.expand(a, TileRect::new(0, 3, 3, 1));
    fx.flush();

    assert_eq!(fx.level.store().count_of_type(ZoneType::Pvp), 2);
    for pos in fx.edges(b).iter() {
        assert!(fx.has_barrier(pos), "barrier of neighbour missing at {pos}");
    }
    assert_eq!(fx.barriers(), fx.expected_barriers());
}

#[test]
fn test_edge_cap_blocks_creation() {
    let host = MemoryHost::new();
    let store = ZoneStore::default();
    let id = store.create(ZoneType::Pvp, None, None, None);
    store.expand(id, TileRect::new(0, 0, 5, 5)).unwrap();

    let config = ZoneConfig {
        max_edge_tiles: 10,
        ..ZoneConfig::default()
    };
    let mut sync = BarrierSynchronizer::new(LevelId(1), config);
    let result = sync.create_barrier(&store, Host::new(&host), id);

    assert!(matches!(
        result,
        Err(SyncError::EdgeCapExceeded {
            edges: 16,
            cap: 10,
            ..
        })
    ));
    assert!(host.barrier_tiles(LevelId(1)).is_empty());
}

#[test]
fn test_edge_cap_truncates_additions() {
    let fx = Fixture::with_config(ZoneConfig {
        max_edge_tiles: 10,
        ..ZoneConfig::default()
    });
    fx.pvp_zone(TileRect::new(0, 0, 5, 5));

    assert_eq!(fx.barriers().len(), 10);
}

#[test]
fn test_failing_tile_does_not_abort_zone() {
    let fx = Fixture::new();
    let locked = TilePos::new(0, 0);
    fx.host.fail_tile(fx.level_id(), locked);

    let id = fx.pvp_zone(TileRect::new(0, 0, 5, 5));

    assert!(!fx.has_barrier(locked));
    assert_eq!(fx.barriers().len(), fx.edges(id).len() - 1);
}

#[test]
fn test_missing_barrier_object() {
    let host = MemoryHost::without_barrier();
    let sync = BarrierSynchronizer::new(LevelId(1), ZoneConfig::default());
    assert!(matches!(
        sync.barrier_object(&host),
        Err(SyncError::BarrierObjectMissing("pvpzonebarrier"))
    ));

    let fx = Fixture::from_level(host, ZoneLevel::new(LevelId(1), ZoneConfig::default()));
    let id = fx
        .level
        .create_zone(fx.handle(), ZoneType::Pvp, None, None, None);
    // The edit itself succeeds; only the barrier sync fails.
    assert!(fx.level.expand_zone(fx.handle(), id, TileRect::new(0, 0, 3, 3)).is_ok());
    assert!(fx.level.flush(fx.handle()).is_err());
    assert!(fx.barriers().is_empty());
}

// ============================================================================
// Deferred jobs
// ============================================================================

#[test]
fn test_large_diff_drains_over_ticks() {
    let fx = Fixture::with_config(small_batches());
    let id = fx
        .level
        .create_zone(fx.handle(), ZoneType::Pvp, None, None, None);
    fx.expand(id, TileRect::new(0, 0, 10, 10));

    // 36 edge tiles: one inline batch, then the tick budget.
    assert_eq!(fx.barriers().len(), 10);
    assert_eq!(fx.level.pending_work().0, 26);

    fx.tick(0);
    assert_eq!(fx.barriers().len(), 30);

    fx.tick(50);
    assert_eq!(fx.level.pending_work().0, 0);
    assert_eq!(fx.barriers(), fx.expected_barriers());
}

#[test]
fn test_players_reconciled_only_after_job_settles() {
    let fx = Fixture::with_config(small_batches());
    let id = fx.pvp_zone(TileRect::new(0, 0, 20, 20));
    fx.level
        .update_pvp_rules(fx.handle(), id, |rules| rules.combat_lock_secs = 10)
        .unwrap();

    let auth = AuthId(1);
    fx.host.add_player(fx.level_id(), auth, TilePos::new(10, 10));
    fx.tick(1_000);
    assert_eq!(fx.level.current_pvp_zone(auth), Some(id));
    fx.level.record_combat(auth, 1_000);

    fx.shrink(id, TileRect::new(0, 0, 20, 12));
    assert!(fx.level.pending_work().0 > 0);

    let mut now = 1_000;
    let mut last = Vec::new();
    while fx.level.pending_work().0 > 0 {
        // Geometry not settled yet: membership holds until the job settles.
        assert_eq!(fx.level.current_pvp_zone(auth), Some(id));
        assert!(fx.host.pvp_enabled(auth));
        now += 500;
        last = fx.tick(now).transitions;
    }

    assert!(
        last.iter()
            .any(|(who, t)| *who == auth && matches!(t, Transition::ForcedExit { zone, .. } if *zone == id))
    );
    assert_eq!(fx.level.current_pvp_zone(auth), None);
    assert!(!fx.host.pvp_enabled(auth));
    assert_eq!(fx.barriers(), fx.expected_barriers());
}

#[test]
fn test_exit_during_pending_shrink_is_forced() {
    let fx = Fixture::with_config(small_batches());
    let id = fx.pvp_zone(TileRect::new(0, 0, 20, 20));

    let auth = AuthId(1);
    fx.host.add_player(fx.level_id(), auth, TilePos::new(10, 15));
    fx.tick(1_000);
    assert_eq!(fx.level.current_pvp_zone(auth), Some(id));
    fx.host.take_events();

    fx.shrink(id, TileRect::new(0, 12, 20, 8));
    assert!(fx.level.pending_work().0 > 0);

    let mut now = 1_000;
    let mut transitions = Vec::new();
    while fx.level.pending_work().0 > 0 {
        assert_eq!(fx.level.current_pvp_zone(auth), Some(id));
        now += 500;
        transitions.extend(fx.tick(now).transitions);
    }

    assert!(transitions.iter().all(|(_, t)| !matches!(t, Transition::Exited(_))));
    assert!(
        transitions
            .iter()
            .any(|(who, t)| *who == auth && matches!(t, Transition::ForcedExit { zone, .. } if *zone == id))
    );
    let notices = fx.host.notices(auth);
    assert!(notices.iter().any(|n| matches!(n, Notice::ForcedOut { .. })));
    assert!(!notices.iter().any(|n| matches!(n, Notice::LeftPvp { .. })));
}

// ============================================================================
// Lazy placement
// ============================================================================

#[test]
fn test_unloaded_region_placed_when_loaded() {
    let fx = Fixture::new();
    fx.host.unload_region(fx.level_id(), EAST);

    // Spans tile x 10..=19: regions 0 and 1.
    let id = fx.pvp_zone(TileRect::new(10, 2, 10, 4));
    let expected = fx.edges(id);
    assert!(fx.barriers().len() < expected.len());
    assert!(
        fx.barriers()
            .iter()
            .all(|pos| MemoryHost::region_at(pos) != EAST)
    );

    fx.host.load_region(fx.level_id(), EAST);
    assert_eq!(fx.level.on_region_loaded(fx.handle(), EAST), 1);
    // Not started yet: a second load event is folded in.
    assert_eq!(fx.level.on_region_loaded(fx.handle(), EAST), 0);
    assert_eq!(fx.level.pending_work().1, 1);

    let tick = fx.tick(0);
    assert_eq!(tick.placements, 10);
    assert_eq!(fx.level.pending_work().1, 0);
    assert_eq!(fx.barriers(), expected);
}

#[test]
fn test_region_without_zone_edges_queues_nothing() {
    let fx = Fixture::new();
    fx.pvp_zone(TileRect::new(0, 0, 4, 4));

    assert_eq!(
        fx.level
            .on_region_loaded(fx.handle(), RegionId { x: 5, y: 5 }),
        0
    );
}

#[test]
fn test_realm_shares_placement_budget() {
    let host = MemoryHost::new();
    let config = ZoneConfig::default();
    let mut realm = ZoneRealm::new(config);
    realm.insert_level(ZoneLevel::new(LevelId(1), config));
    realm.insert_level(ZoneLevel::new(LevelId(2), config));

    for id in [LevelId(1), LevelId(2)] {
        let level = realm.level(id).unwrap();
        level.create_initial_barriers(Host::new(&host));
        host.unload_region(id, EAST);
        let zone = level.create_zone(Host::new(&host), ZoneType::Pvp, None, None, None);
        level
            .expand_zone(Host::new(&host), zone, TileRect::new(10, 2, 10, 4))
            .unwrap();
        level.flush(Host::new(&host)).unwrap();
        host.load_region(id, EAST);
        assert_eq!(realm.on_region_loaded(Host::new(&host), id, EAST).unwrap(), 1);
    }

    let report = realm.tick(Host::new(&host), 0);
    assert_eq!(report.len(), 2);
    assert_eq!(report[0].1.placements, 10);
    assert_eq!(report[1].1.placements, 0);

    let report = realm.tick(Host::new(&host), 50);
    assert_eq!(report[1].1.placements, 10);
    assert_eq!(host.barrier_tiles(LevelId(1)), host.barrier_tiles(LevelId(2)));

    assert!(matches!(
        realm.level(LevelId(9)),
        Err(SyncError::UnknownLevel(LevelId(9)))
    ));
}

// ============================================================================
// Deletion and repair
// ============================================================================

#[test]
fn test_delete_strips_barrier_and_cancels_work() {
    let fx = Fixture::with_config(small_batches());
    fx.host.unload_region(fx.level_id(), EAST);
    let id = fx
        .level
        .create_zone(fx.handle(), ZoneType::Pvp, None, None, None);
    fx.expand(id, TileRect::new(0, 0, 20, 10));
    fx.host.load_region(fx.level_id(), EAST);
    fx.level.on_region_loaded(fx.handle(), EAST);
    assert_ne!(fx.level.pending_work(), (0, 0));

    fx.delete(id).unwrap();

    assert_eq!(fx.level.pending_work(), (0, 0));
    assert!(fx.barriers().is_empty());
    fx.tick(0);
    assert!(fx.barriers().is_empty());
    assert!(fx.host.take_events().contains(&HostEvent::ZoneRemoved {
        level: fx.level_id(),
        zone: id,
        zone_type: ZoneType::Pvp,
    }));
}

#[test]
fn test_delete_unknown_zone_fails() {
    let fx = Fixture::new();
    let id = fx.pvp_zone(TileRect::new(0, 0, 2, 2));
    fx.delete(id).unwrap();
    assert!(fx.delete(id).is_err());
}

#[test]
fn test_force_clean_strips_only_unclaimed() {
    let fx = Fixture::new();
    let id = fx.pvp_zone(TileRect::new(45, 45, 4, 4));
    for pos in [TilePos::new(50, 50), TilePos::new(51, 50)] {
        fx.host.put_object(fx.level_id(), pos, BARRIER);
    }

    let removed = fx
        .level
        .force_clean_around(fx.handle(), TilePos::new(50, 50), 3)
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(fx.barriers(), fx.edges(id));
}

#[test]
fn test_force_clean_rejects_huge_area() {
    let fx = Fixture::new();
    let result = fx
        .level
        .force_clean_around(fx.handle(), TilePos::new(0, 0), 100);
    assert!(matches!(result, Err(SyncError::AreaTooLarge { .. })));
}

// ============================================================================
// Initial barriers
// ============================================================================

#[test]
fn test_initial_barriers_created_once() {
    let store = ZoneStore::default();
    let id = store.create(ZoneType::Pvp, None, None, None);
    store.expand(id, TileRect::new(0, 0, 4, 4)).unwrap();
    let level = ZoneLevel::with_store(LevelId(3), ZoneConfig::default(), store);
    let fx = Fixture::from_level(MemoryHost::new(), level);
    assert!(fx.barriers().is_empty());

    fx.tick(0);
    assert_eq!(fx.barriers(), fx.edges(id));

    let corner = TilePos::new(0, 0);
    fx.host.put_object(fx.level_id(), corner, warden_sync::ObjectId::EMPTY);
    fx.level.create_initial_barriers(fx.handle());
    fx.tick(50);
    assert!(!fx.has_barrier(corner));
}
