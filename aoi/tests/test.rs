use aoi::shapes::{Pos, Rect, Size};
use aoi::{
    AoiError, BlockState, Filter, FindBehavior, Map, MapConfig, NodeId, NodeState, SearchResult,
    UnitId, UnitRef, UnitState,
};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::rc::Rc;

fn map_512() -> Map {
    Map::make(Pos::new(0.0, 0.0), Size::new(512.0, 512.0), 4).unwrap()
}

fn id_set(result: &SearchResult) -> HashSet<UnitId> {
    result.ids().into_iter().collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_search_follows_moving_unit() {
    init_tracing();
    let mut map = map_512();
    let a = UnitRef::new(1, 10.0, 10.0);
    let b = UnitRef::new(2, 500.0, 500.0);
    map.add_unit(&a).unwrap();
    map.add_unit(&b).unwrap();

    let mut result = SearchResult::new();
    map.search_from_pos(&Pos::new(10.0, 10.0), &mut result, 5.0);
    assert_eq!(result.ids(), vec![1]);

    map.move_unit(&a, Pos::new(500.0, 490.0)).unwrap();
    let mut result = SearchResult::new();
    map.search_from_pos(&Pos::new(500.0, 500.0), &mut result, 20.0);
    assert_eq!(id_set(&result), HashSet::from([1, 2]));
}

#[test]
fn test_unit_finds_itself_after_insertion() {
    // Every unit placed in bounds is found by a zero range search on its spot
    let mut map = map_512();
    let mut rng = StdRng::seed_from_u64(7);
    let mut units = Vec::new();
    for id in 0..200 {
        let unit = UnitRef::new(id, rng.gen_range(0.0..=512.0), rng.gen_range(0.0..=512.0));
        map.add_unit(&unit).unwrap();
        units.push(unit);
    }
    let mut result = SearchResult::new();
    for unit in &units {
        map.search_from_pos(&unit.pos(), &mut result, 0.0);
        assert!(result.contains(unit), "unit {} not found", unit.id());
    }
}

#[test]
fn test_circle_filter_with_exclusion() {
    let mut map = map_512();
    let x = UnitRef::new(9, 100.0, 100.0);
    let y = UnitRef::new(10, 120.0, 110.0);
    let far = UnitRef::new(11, 300.0, 100.0);
    for unit in [&x, &y, &far] {
        map.add_unit(unit).unwrap();
    }

    let mut filter = Filter::circle(Pos::new(100.0, 100.0), 50.0);
    filter.add(Rc::new(Filter::exclude_id(9)));
    let filter = Rc::new(filter);
    let mut result = SearchResult::new();
    map.search_from_rect(&Rect::new(0.0, 0.0, 512.0, 512.0), &mut result, Some(filter));
    assert_eq!(result.ids(), vec![10]);

    let mut result = SearchResult::new();
    map.search_from_unit(&x, &mut result, 50.0);
    assert_eq!(result.ids(), vec![10]);
}

#[test]
fn test_rect_search_returns_leaf_order() {
    let mut map = map_512();
    let positions = [(400.0, 400.0), (20.0, 20.0), (400.0, 20.0), (20.0, 400.0)];
    for (i, (x, y)) in positions.iter().enumerate() {
        map.add_unit(&UnitRef::new(i as UnitId, *x, *y)).unwrap();
    }
    let mut result = SearchResult::new();
    map.search_from_rect(&Rect::new(0.0, 0.0, 512.0, 512.0), &mut result, None);
    assert_eq!(result.ids(), vec![1, 2, 3, 0]);

    let mut result = SearchResult::new();
    map.search_from_rect(&Rect::new(0.0, 0.0, 100.0, 512.0), &mut result, None);
    assert_eq!(result.ids(), vec![1, 3]);
}

#[test]
fn test_blocks() {
    let mut map = map_512();
    map.set_block(3, 3, BlockState::Blocked).unwrap();
    assert_eq!(map.get_block(3, 3), Ok(BlockState::Blocked));
    assert_eq!(map.get_block(3, 4), Ok(BlockState::Walkable));

    // Units are not affected by blocks
    let unit = UnitRef::new(1, 3.0 * 32.0 + 1.0, 3.0 * 32.0 + 1.0);
    map.add_unit(&unit).unwrap();
    let leaf = map.node(unit.node().unwrap()).unwrap();
    assert!(leaf.state().contains(NodeState::NO_WALK));
}

#[test]
fn test_map_edges() {
    let mut map = map_512();
    let corner = UnitRef::new(1, 512.0, 512.0);
    let origin = UnitRef::new(2, 0.0, 0.0);
    map.add_unit(&corner).unwrap();
    map.add_unit(&origin).unwrap();

    let outside = UnitRef::new(3, 513.0, 512.0);
    assert_eq!(
        map.add_unit(&outside),
        Err(AoiError::OutOfBounds { x: 513.0, y: 512.0 })
    );
    let below = UnitRef::new(4, 10.0, -1.0);
    assert!(map.add_unit(&below).is_err());
    assert_eq!(map.state().unit_count, 2);
    assert!(map.check_consistency().is_empty());
}

#[test]
fn test_cached_search_skips_walk() {
    let mut map = map_512();
    let mut rng = StdRng::seed_from_u64(11);
    for id in 0..100 {
        let unit = UnitRef::new(id, rng.gen_range(0.0..512.0), rng.gen_range(0.0..512.0));
        map.add_unit(&unit).unwrap();
    }

    let center = Pos::new(256.0, 256.0);
    let mut result = SearchResult::new();
    map.search_from_pos(&center, &mut result, 100.0);
    let first = map.take_search_stats();
    let checksum = result.checksum();
    let ids = result.ids();
    assert_eq!(first.full_walks, 1);
    assert!(first.node_visits > 0);

    map.search_from_pos(&center, &mut result, 100.0);
    let second = map.take_search_stats();
    assert_eq!(result.checksum(), checksum);
    assert_eq!(result.ids(), ids);
    assert_eq!(second.cache_hits, 1);
    assert_eq!(second.full_walks, 0);
    assert_eq!(second.node_visits, 0);
}

#[test]
fn test_snapshot_refresh_after_local_move() {
    let mut map = map_512();
    let a = UnitRef::new(1, 100.0, 100.0);
    map.add_unit(&a).unwrap();

    let mut result = SearchResult::new();
    map.search_from_pos(&Pos::new(90.0, 90.0), &mut result, 15.0);
    assert_eq!(result.ids(), vec![1]);
    map.take_search_stats();

    // Same cell, now out of range
    map.move_unit(&a, Pos::new(127.0, 127.0)).unwrap();
    map.search_from_pos(&Pos::new(90.0, 90.0), &mut result, 15.0);
    let stats = map.take_search_stats();
    assert_eq!(stats.snapshot_refreshes, 1);
    assert_eq!(stats.full_walks, 0);
    assert!(result.is_empty());

    // Back in range, across a cell boundary
    map.move_unit(&a, Pos::new(95.0, 95.0)).unwrap();
    map.search_from_pos(&Pos::new(90.0, 90.0), &mut result, 15.0);
    let stats = map.take_search_stats();
    assert_eq!(stats.full_walks, 1);
    assert_eq!(result.ids(), vec![1]);
}

#[test]
fn test_radius_refresh_invalidates_cached_search() {
    let mut map = map_512();
    let far = UnitRef::with_radius(1, 300.0, 300.0, 20.0);
    let b = UnitRef::new(2, 120.0, 100.0);
    map.add_unit(&far).unwrap();
    map.add_unit(&b).unwrap();

    let mut result = SearchResult::new();
    map.search_from_pos(&Pos::new(100.0, 100.0), &mut result, 10.0);
    assert!(result.is_empty());
    map.take_search_stats();

    // Grows into range without leaving its cell or raising the hint
    b.set_radius(15.0);
    map.refresh_unit(&b);
    assert_eq!(map.max_radius(), 20.0);
    map.search_from_pos(&Pos::new(100.0, 100.0), &mut result, 10.0);
    let stats = map.take_search_stats();
    assert_eq!(stats.snapshot_refreshes, 1);
    assert_eq!(stats.cache_hits, 0);
    assert_eq!(result.ids(), vec![2]);

    let mut fresh = SearchResult::new();
    map.search_from_pos(&Pos::new(100.0, 100.0), &mut fresh, 10.0);
    assert_eq!(fresh.ids(), result.ids());
}

#[test]
fn test_explicit_refresh_marks_result_current() {
    let mut map = map_512();
    let a = UnitRef::new(1, 100.0, 100.0);
    map.add_unit(&a).unwrap();

    let mut result = SearchResult::new();
    map.search_from_pos(&Pos::new(90.0, 90.0), &mut result, 15.0);
    assert_eq!(result.ids(), vec![1]);

    map.move_unit(&a, Pos::new(127.0, 127.0)).unwrap();
    assert_eq!(result.refresh_from_snapshot(&mut map), 0);
    map.take_search_stats();

    map.search_from_pos(&Pos::new(90.0, 90.0), &mut result, 15.0);
    let stats = map.take_search_stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.snapshot_refreshes, 0);
    assert!(result.is_empty());
}

#[test]
fn test_clean_then_search_is_idempotent() {
    let mut map = map_512();
    let mut rng = StdRng::seed_from_u64(3);
    for id in 0..50 {
        let unit = UnitRef::new(id, rng.gen_range(0.0..512.0), rng.gen_range(0.0..512.0));
        map.add_unit(&unit).unwrap();
    }
    let mut result = SearchResult::new();
    map.search_from_rect(&Rect::new(100.0, 100.0, 200.0, 150.0), &mut result, None);
    let before = id_set(&result);

    result.clean();
    result.clean();
    map.search_from_rect(&Rect::new(100.0, 100.0, 200.0, 150.0), &mut result, None);
    assert_eq!(id_set(&result), before);
    assert_eq!(map.search_stats().full_walks, 2);
}

#[test]
fn test_add_update_remove_restores_counters() {
    let mut map = map_512();
    let stay = UnitRef::new(100, 300.0, 300.0);
    map.add_unit(&stay).unwrap();
    let before = map.state();

    let mut rng = StdRng::seed_from_u64(5);
    let unit = UnitRef::new(1, 50.0, 50.0);
    map.add_unit(&unit).unwrap();
    for _ in 0..20 {
        let pos = Pos::new(rng.gen_range(0.0..512.0), rng.gen_range(0.0..512.0));
        map.move_unit(&unit, pos).unwrap();
    }
    map.remove_unit(&unit).unwrap();

    assert_eq!(map.state(), before);
    assert!(unit.node().is_none());
    assert_eq!(unit.ref_count(), 1);
}

#[test]
fn test_code_round_trip_within_one_cell() {
    let map = map_512();
    let cell = map.node_size(map.divide());
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..1000 {
        let pos = Pos::new(rng.gen_range(0.0..=512.0), rng.gen_range(0.0..=512.0));
        let code = map.gen_code(&pos).unwrap();
        let origin = map.gen_pos(&code);
        assert!(pos.x - origin.x >= 0.0 && pos.x - origin.x <= cell.w);
        assert!(pos.y - origin.y >= 0.0 && pos.y - origin.y <= cell.h);
    }
}

#[test]
fn test_random_operations_keep_map_consistent() {
    let mut map = map_512();
    let mut rng = StdRng::seed_from_u64(99);
    let mut live: Vec<UnitRef> = Vec::new();
    let mut next_id = 0;
    for _ in 0..2000 {
        match rng.gen_range(0..10) {
            0..=3 => {
                let unit = map.make_unit(next_id, rng.gen_range(0.0..512.0), rng.gen_range(0.0..512.0));
                next_id += 1;
                map.add_unit(&unit).unwrap();
                live.push(unit);
            }
            4..=7 if !live.is_empty() => {
                let unit = &live[rng.gen_range(0..live.len())];
                let pos = Pos::new(rng.gen_range(0.0..512.0), rng.gen_range(0.0..512.0));
                map.move_unit(unit, pos).unwrap();
            }
            _ if !live.is_empty() => {
                let unit = live.swap_remove(rng.gen_range(0..live.len()));
                if rng.gen_bool(0.5) {
                    unit.insert_state(UnitState::DEAD);
                    map.update_unit(&unit).unwrap();
                    map.free_unit(unit);
                } else {
                    map.free_unit(unit);
                }
            }
            _ => {}
        }
    }
    assert_eq!(map.state().unit_count, live.len() as u64);
    let errors = map.check_consistency();
    assert!(errors.is_empty(), "{errors:?}");

    // Every live unit is found by a whole-map search exactly once
    let mut result = SearchResult::new();
    map.search_from_rect(&map.bounds(), &mut result, None);
    assert_eq!(result.len(), live.len());
    assert_eq!(id_set(&result).len(), live.len());
}

#[test]
fn test_random_graph_operations_keep_edges_consistent() {
    // Edges never outlive either endpoint, whatever order nodes come and go in
    let mut map = Map::make(Pos::new(0.0, 0.0), Size::new(128.0, 128.0), 3).unwrap();
    let mut rng = StdRng::seed_from_u64(41);
    let mut pinned: Vec<NodeId> = Vec::new();
    let mut live: Vec<UnitRef> = Vec::new();
    let mut next_id = 0;
    let mut edges = 0;

    for step in 0..3000 {
        if step == 1500 {
            map.generate();
        }
        pinned.retain(|id| map.node(*id).is_some());
        match rng.gen_range(0..12) {
            0..=2 => {
                let code = map.cell_code(rng.gen_range(0..8), rng.gen_range(0..8));
                pinned.push(map.pin_node(&code, 3));
            }
            3..=5 if pinned.len() >= 2 => {
                let from = pinned[rng.gen_range(0..pinned.len())];
                let to = pinned[rng.gen_range(0..pinned.len())];
                map.add_neighbor(from, to).unwrap();
                assert!(map.node(from).unwrap().walkable_neighbors().contains(&to));
                assert!(map.node(to).unwrap().neighbors().contains(&from));
                edges += 1;
            }
            6 if !pinned.is_empty() => {
                let from = pinned[rng.gen_range(0..pinned.len())];
                let to = pinned[rng.gen_range(0..pinned.len())];
                map.remove_neighbor(from, to);
                assert!(!map.node(from).unwrap().walkable_neighbors().contains(&to));
            }
            7 if !pinned.is_empty() => {
                let id = pinned.swap_remove(rng.gen_range(0..pinned.len()));
                map.set_node_static(id, false).unwrap();
            }
            8 => {
                // Unpins whatever cell is there, generated ones included
                let code = map.cell_code(rng.gen_range(0..8), rng.gen_range(0..8));
                if let Some(id) = map.get_node(&code, 3, FindBehavior::Accurate) {
                    map.set_node_static(id, false).unwrap();
                }
            }
            9 | 10 => {
                let unit = map.make_unit(next_id, rng.gen_range(0.0..128.0), rng.gen_range(0.0..128.0));
                next_id += 1;
                map.add_unit(&unit).unwrap();
                live.push(unit);
            }
            _ if !live.is_empty() => {
                let unit = live.swap_remove(rng.gen_range(0..live.len()));
                map.free_unit(unit);
            }
            _ => {}
        }
        let errors = map.check_consistency();
        assert!(errors.is_empty(), "step {step}: {errors:?}");
    }
    assert!(edges > 0);
    assert_eq!(map.state().unit_count, live.len() as u64);
}

#[test]
fn test_radius_aware_search() {
    let mut map = map_512();
    let big = UnitRef::with_radius(1, 200.0, 200.0, 40.0);
    map.add_unit(&big).unwrap();

    let mut result = SearchResult::new();
    map.search_from_pos(&Pos::new(250.0, 200.0), &mut result, 15.0);
    assert_eq!(result.ids(), vec![1]);

    let mut map = Map::new(MapConfig {
        radius_aware: false,
        divide: 4,
        ..MapConfig::default()
    })
    .unwrap();
    let big = UnitRef::with_radius(2, 200.0, 200.0, 40.0);
    map.add_unit(&big).unwrap();
    assert_eq!(map.max_radius(), 0.0);
    let mut result = SearchResult::new();
    map.search_from_pos(&Pos::new(250.0, 200.0), &mut result, 15.0);
    assert!(result.is_empty());
}

#[test]
fn test_generated_grid_neighbors() {
    let mut map = Map::make(Pos::new(0.0, 0.0), Size::new(128.0, 128.0), 3).unwrap();
    let mut blocks = vec![0u8; 8];
    // Wall along column 4
    for y in 0..8 {
        let index = y * 8 + 4;
        blocks[index / 8] |= 1 << (index % 8);
    }
    map.load_blocks(&blocks).unwrap();
    map.generate();
    assert!(map.check_consistency().is_empty());

    let left = map.get_node(&map.cell_code(3, 2), 3, FindBehavior::Accurate).unwrap();
    let wall = map.get_node(&map.cell_code(4, 2), 3, FindBehavior::Accurate).unwrap();
    assert_eq!(map.node(left).unwrap().walkable_neighbors().len(), 3);
    assert!(!map.node(left).unwrap().walkable_neighbors().contains(&wall));
    assert!(map.node(wall).unwrap().neighbors().is_empty());

    // Pinned cells stay after their units leave
    let unit = UnitRef::new(1, 10.0, 10.0);
    map.add_unit(&unit).unwrap();
    let nodes = map.state().node_count;
    map.remove_unit(&unit).unwrap();
    assert_eq!(map.state().node_count, nodes);
}

#[test]
fn test_pool_stats() {
    let mut map = map_512();
    let unit = UnitRef::new(1, 10.0, 10.0);
    map.add_unit(&unit).unwrap();
    map.remove_unit(&unit).unwrap();
    map.add_unit(&unit).unwrap();

    let stats = map.memory_state();
    let (name, nodes) = stats[0];
    assert_eq!(name, "node");
    // Root plus one branch; the second branch reuses recycled nodes
    assert_eq!(nodes.alloced, 5);
    assert_eq!(nodes.current, 5);
    assert_eq!(nodes.cached, 0);

    map.remove_unit(&unit).unwrap();
    map.cache_clear();
    let (_, nodes) = map.memory_state()[0];
    assert_eq!(nodes.cached, 0);
    assert_eq!(nodes.freed, 4);
}
