use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use reef_core::field::oxygen::OxygenSource;
use reef_core::{
    growth_modifier, Catalog, EntityStore, GrowthEngine, NoBleaching, NodeKind, NutritionField,
    OxygenField, PhysicsEngine, PlantType, SimConfig, WorldBounds,
};

fn config(width: f64) -> SimConfig {
    SimConfig {
        bounds: WorldBounds::centered(width, width),
        ..SimConfig::default()
    }
}

fn single_species(plant: PlantType) -> Catalog {
    Catalog {
        plants: vec![plant],
        fish: Vec::new(),
    }
}

#[test]
fn grid_round_trip_finds_every_inserted_node() {
    let config = config(3000.0);
    let mut store = EntityStore::new(&config, Catalog::default());
    let mut rng = ChaCha12Rng::seed_from_u64(11);
    let b = config.bounds;
    let mut points: Vec<(f64, f64)> = (0..500)
        .map(|_| {
            (
                rng.random_range(b.left..=b.right),
                rng.random_range(b.top..=b.bottom),
            )
        })
        .collect();
    points.extend([
        (b.left, b.top),
        (b.right, b.bottom),
        (b.right, b.top),
        (b.left, b.bottom),
    ]);
    let ids: Vec<_> = points
        .iter()
        .map(|&(x, y)| store.add_node(x, y, NodeKind::Fish).unwrap())
        .collect();
    store.rebuild_grid();

    for (&(x, y), &id) in points.iter().zip(&ids) {
        assert!(
            store.grid().cells_near(x, y).any(|cell| cell.contains(&id)),
            "node at ({x}, {y}) missing from its neighbourhood"
        );
    }
}

#[test]
fn pairwise_repulsion_obeys_newtons_third_law() {
    let config = config(1000.0);
    let physics = PhysicsEngine::new(&config);
    let mut rng = ChaCha12Rng::seed_from_u64(5);
    for _ in 0..200 {
        let mut store = EntityStore::new(&config, single_species(PlantType::default()));
        let d = rng.random_range(0.01..config.optimal_distance);
        let angle = rng.random_range(0.0..std::f64::consts::TAU);
        let a = store
            .add_node(0.0, 0.0, NodeKind::Plant { species: 0 })
            .unwrap();
        let b = store
            .add_node(d * angle.cos(), d * angle.sin(), NodeKind::Plant { species: 0 })
            .unwrap();
        physics.apply_forces(&mut store);
        let va = store.node(a).unwrap().velocity;
        let vb = store.node(b).unwrap().velocity;
        assert!((va[0] + vb[0]).abs() < 1e-9, "d = {d}");
        assert!((va[1] + vb[1]).abs() < 1e-9, "d = {d}");
        assert!(va[0].hypot(va[1]) > 0.0, "d = {d}");
    }
}

#[test]
fn reversed_duplicate_chain_is_rejected() {
    let config = config(1000.0);
    let mut store = EntityStore::new(&config, Catalog::default());
    let a = store.add_node(0.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
    let b = store.add_node(50.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
    assert!(store.add_chain(a, b).is_some());
    assert!(store.add_chain(b, a).is_none());
    assert_eq!(store.chain_count(), 1);
}

#[test]
fn nutrition_totals_match_applied_deltas() {
    let config = config(1500.0);
    let mut field = NutritionField::uniform(&config, 0.4);
    let mut rng = ChaCha12Rng::seed_from_u64(99);
    let mut removed = 0.0f64;
    let mut added = 0.0f64;
    for _ in 0..300 {
        let x = rng.random_range(-800.0..800.0);
        let y = rng.random_range(-800.0..800.0);
        let amount = rng.random_range(0.0..2.0f32);
        let radius = rng.random_range(0.0..150.0f32);
        let before: Vec<f32> = field.values().to_vec();
        if rng.random::<bool>() {
            field.deplete_at(x, y, amount, radius);
            removed += before
                .iter()
                .zip(field.values())
                .map(|(&old, &new)| old as f64 - new as f64)
                .sum::<f64>();
        } else {
            field.add_at(x, y, amount, radius);
            added += field
                .values()
                .iter()
                .zip(&before)
                .map(|(&new, &old)| new as f64 - old as f64)
                .sum::<f64>();
        }
    }
    assert!((field.total_depleted() - removed).abs() < 1e-6);
    assert!((field.total_added() - added).abs() < 1e-6);
    assert!(field.values().iter().all(|v| (0.0..=3.0).contains(v)));
}

#[test]
fn growth_modifier_never_decreases() {
    let mut prev = growth_modifier(0.0);
    for i in 1..=10_000 {
        let n = i as f32 / 10_000.0;
        let m = growth_modifier(n);
        assert!(m >= prev, "modifier drops at {n}: {prev} -> {m}");
        prev = m;
    }
}

#[test]
fn boundary_clamp_is_idempotent() {
    let config = config(1000.0);
    let physics = PhysicsEngine::new(&config);
    let mut store = EntityStore::new(&config, Catalog::default());
    let id = store.add_node(-490.0, 490.0, NodeKind::Fish).unwrap();
    store.node_mut(id).unwrap().velocity = [-100.0, 100.0];
    physics.integrate(&mut store);
    let first = store.node(id).unwrap().clone();
    assert_eq!(first.position, [-500.0, 500.0]);
    assert_eq!(first.velocity, [0.0, 0.0]);

    physics.integrate(&mut store);
    let second = store.node(id).unwrap();
    assert_eq!(second.position, first.position);
    assert_eq!(second.velocity, first.velocity);
}

#[test]
fn single_forced_branch_scenario() {
    let config = config(8000.0);
    assert_eq!(config.bounds.left, -4000.0);
    let plant = PlantType {
        max_branches: 3,
        growth_probability: 1.0,
        growth_attempts: 1,
        ..PlantType::default()
    };
    let branch_distance = plant.branch_distance;
    let mut store = EntityStore::new(&config, single_species(plant));
    let mut nutrition = NutritionField::uniform(&config, 0.6);
    let mut oxygen = OxygenField::new(&config);
    let mut growth = GrowthEngine::new(&config);
    let parent = store
        .add_node(0.0, 0.0, NodeKind::Plant { species: 0 })
        .unwrap();

    let report = growth.grow(&mut store, &mut nutrition, &mut oxygen, &NoBleaching);

    assert_eq!(report.grown, 1);
    assert_eq!(store.node_count(), 2);
    assert_eq!(store.chain_count(), 1);
    let (child, node) = store.nodes().find(|&(id, _)| id != parent).unwrap();
    let d = node.position[0].hypot(node.position[1]);
    assert!(
        (d - branch_distance).abs() <= branch_distance * 0.1,
        "child {child:?} at distance {d}"
    );
    assert_eq!(store.node(parent).unwrap().branch_count, 1);
}

#[test]
fn oxygen_falls_off_and_reads_base_far_away() {
    let config = SimConfig::default();
    let mut oxygen = OxygenField::new(&config);
    let source = OxygenSource {
        x: 0.0,
        y: 0.0,
        factor: 1.0,
        radius: 100.0,
    };
    for _ in 0..50 {
        oxygen.update([source]);
    }
    let near = oxygen.level_at(50.0, 0.0);
    let edge = oxygen.level_at(100.1, 0.0);
    assert!(near > oxygen.base_level());
    assert!(edge <= near);
    assert_eq!(oxygen.level_at(10_000.0, 0.0), oxygen.base_level());
    assert_eq!(oxygen.level_at(0.0, 10_000.0), oxygen.base_level());
}
