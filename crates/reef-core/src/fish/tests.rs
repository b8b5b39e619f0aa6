use super::*;
use crate::catalog::{Catalog, PlantType};
use crate::config::WorldBounds;
use crate::field::{FlowField, NutritionField};

fn config() -> SimConfig {
    SimConfig {
        bounds: WorldBounds::centered(2000.0, 2000.0),
        corpse_decay_frames: 2,
        ..SimConfig::default()
    }
}

fn catalog(fish: FishType) -> Catalog {
    Catalog {
        plants: vec![PlantType {
            growth_probability: 0.0,
            ..PlantType::default()
        }],
        fish: vec![fish],
    }
}

fn world(fish: FishType, nutrition: f32) -> (Ecosystem, School) {
    let config = config();
    let soil = NutritionField::uniform(&config, nutrition);
    let flow = FlowField::uniform(&config, [0.0, 0.0]);
    let school = School::new(&config);
    let eco = Ecosystem::try_with_fields(config, catalog(fish), soil, flow).unwrap();
    (eco, school)
}

fn hungry() -> FishType {
    FishType {
        eating_rate: 1.0,
        ..FishType::default()
    }
}

#[derive(Default)]
struct Scripted {
    action: Action,
    seen: Vec<Observation>,
    rewards: Vec<(f32, bool)>,
}

impl Scripted {
    fn toward(direction: [f64; 2]) -> Self {
        Self {
            action: Action { direction },
            ..Self::default()
        }
    }
}

impl FishController for Scripted {
    fn act(&mut self, _fish: &Fish, observation: &Observation) -> Action {
        self.seen.push(observation.clone());
        self.action
    }

    fn reward(&mut self, _fish: &Fish, reward: f32, done: bool) {
        self.rewards.push((reward, done));
    }
}

#[test]
fn spawn_rejects_unknown_type() {
    let (mut eco, mut school) = world(FishType::default(), 0.5);
    assert!(school.spawn(&mut eco, 0.0, 0.0, 3).is_none());
    assert_eq!(eco.store().node_count(), 0);
    assert_eq!(school.spawn(&mut eco, 0.0, 0.0, 0), Some(0));
    assert_eq!(school.spawn(&mut eco, 10.0, 0.0, 0), Some(1));
    assert_eq!(eco.store().node_count(), 2);
}

#[test]
fn action_sets_velocity_and_physics_moves_the_fish() {
    let (mut eco, mut school) = world(FishType::default(), 0.5);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    let mut controller = Scripted::toward([1.0, 0.0]);
    school.update(&mut eco, &mut controller);
    let node = school.fish()[0].node;
    assert_eq!(eco.store().node(node).unwrap().velocity, [8.0, 0.0]);
    assert_eq!(school.fish()[0].direction, [1.0, 0.0]);

    eco.step();
    let position = eco.store().node(node).unwrap().position;
    assert!((position[0] - 7.6).abs() < 1e-9);
    assert_eq!(position[1], 0.0);
}

#[test]
fn tiny_actions_fall_in_the_dead_zone() {
    let (mut eco, mut school) = world(FishType::default(), 0.5);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    let before = school.fish()[0].direction;
    let mut controller = Scripted::toward([0.05, -0.05]);
    school.update(&mut eco, &mut controller);
    let node = school.fish()[0].node;
    assert_eq!(eco.store().node(node).unwrap().velocity, [0.0, 0.0]);
    assert_eq!(school.fish()[0].direction, before);
}

#[test]
fn oversized_actions_are_clamped() {
    let (mut eco, mut school) = world(FishType::default(), 0.5);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    let mut controller = Scripted::toward([50.0, 0.0]);
    school.update(&mut eco, &mut controller);
    let node = school.fish()[0].node;
    assert_eq!(eco.store().node(node).unwrap().velocity, [8.0, 0.0]);
}

#[test]
fn fish_eat_nearby_plants() {
    let (mut eco, mut school) = world(hungry(), 0.5);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    let plant = eco.add_plant(10.0, 0.0, 0).unwrap();
    let cost = eco.store().node(plant).unwrap().stored_nutrition();

    let report = school.update(&mut eco, &mut Scripted::default());
    assert_eq!(report.meals, 1);
    assert!(eco.store().node(plant).is_none());
    let fish = &school.fish()[0];
    assert_eq!(fish.meals, 1);
    assert_eq!(fish.stomach, cost);
    assert!((school.total_consumed() - cost as f64).abs() < 1e-9);
    assert!(fish.last_reward > 1.0);
}

#[test]
fn immune_seeds_are_not_eaten() {
    let (mut eco, mut school) = world(hungry(), 0.5);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    let seed = eco.add_seed(10.0, 0.0, 0).unwrap();
    let report = school.update(&mut eco, &mut Scripted::default());
    assert_eq!(report.meals, 0);
    assert!(eco.store().node(seed).is_some());
    assert_eq!(school.fish()[0].meals, 0);
}

#[test]
fn full_stomach_fertilises_the_soil() {
    let (mut eco, mut school) = world(FishType::default(), 0.5);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    school.fish_mut()[0].stomach = 0.9;
    let report = school.update(&mut eco, &mut Scripted::default());
    assert_eq!(report.defecations, 1);
    assert_eq!(school.fish()[0].stomach, 0.0);
    assert!(school.total_defecated() > 0.0);
    assert_eq!(school.total_defecated(), eco.nutrition().total_added());
    assert!(eco.nutrition_at(0.0, 0.0) > 0.5);
}

#[test]
fn suffocated_fish_leave_a_corpse_that_decays() {
    let (mut eco, mut school) = world(FishType::default(), 0.5);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    school.spawn(&mut eco, 500.0, 0.0, 0).unwrap();
    school.fish_mut()[0].oxygen = 0.0001;
    eco.deplete_oxygen(0.0, 0.0, 5.0, 100.0);
    let node = school.fish()[0].node;

    let mut controller = Scripted::default();
    let report = school.update(&mut eco, &mut controller);
    assert_eq!(report.deaths, 1);
    assert_eq!(report.alive, 1);
    assert_eq!(school.total_deaths(), 1);
    assert!(eco.store().node(node).is_none());
    assert_eq!(eco.store().corpse_count(), 1);
    assert!(controller.rewards[0].1);
    assert!(!controller.rewards[1].1);

    assert_eq!(school.update(&mut eco, &mut controller).corpses_decayed, 0);
    assert_eq!(school.update(&mut eco, &mut controller).corpses_decayed, 1);
    assert_eq!(eco.store().corpse_count(), 0);
}

#[test]
fn old_fish_die() {
    let (mut eco, mut school) = world(
        FishType {
            max_age: 3,
            ..FishType::default()
        },
        0.5,
    );
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    let mut controller = Scripted::default();
    assert_eq!(school.update(&mut eco, &mut controller).deaths, 0);
    assert_eq!(school.update(&mut eco, &mut controller).deaths, 0);
    assert_eq!(school.update(&mut eco, &mut controller).deaths, 1);
    assert!(school.is_empty());
}

#[test]
fn externally_removed_fish_vanish_quietly() {
    let (mut eco, mut school) = world(FishType::default(), 0.5);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    let node = school.fish()[0].node;
    eco.remove_node(node);
    let report = school.update(&mut eco, &mut Scripted::default());
    assert_eq!(report.deaths, 0);
    assert!(school.is_empty());
    assert_eq!(eco.store().corpse_count(), 0);
}

#[test]
fn chemoreceptors_point_at_rich_soil() {
    let (mut eco, mut school) = world(FishType::default(), 0.2);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    eco.add_nutrition(100.0, 0.0, 1.0, 60.0);
    let mut controller = Scripted::default();
    school.update(&mut eco, &mut controller);
    let seen = &controller.seen[0];
    assert_eq!(seen.richest_ray(), 0);
    assert_eq!(Observation::ray_direction(0), [1.0, 0.0]);
    assert!((seen.local_nutrition - 0.2).abs() < 1e-6);
}

#[test]
fn vision_reports_nearest_plant_per_sector() {
    let (mut eco, mut school) = world(FishType::default(), 0.5);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    eco.add_plant(100.0, 0.0, 0).unwrap();
    eco.add_plant(150.0, 1.0, 0).unwrap();
    eco.add_plant(0.0, 180.0, 0).unwrap();
    eco.add_plant(-500.0, 0.0, 0).unwrap();
    let mut controller = Scripted::default();
    school.update(&mut eco, &mut controller);
    let vision = controller.seen[0].vision;
    assert!((vision[0] - 0.5).abs() < 1e-6);
    assert!((vision[3] - 0.9).abs() < 1e-6);
    assert_eq!(vision[6], 1.0);
    assert_eq!(vision.iter().filter(|&&v| v < 1.0).count(), 2);
}

#[test]
fn swimming_into_a_wall_is_penalised() {
    let (mut eco, mut school) = world(FishType::default(), 0.0);
    school.spawn(&mut eco, 1000.0, 0.0, 0).unwrap();
    let mut into_wall = Scripted::toward([1.0, 0.0]);
    school.update(&mut eco, &mut into_wall);
    let (mut eco2, mut school2) = world(FishType::default(), 0.0);
    school2.spawn(&mut eco2, 1000.0, 0.0, 0).unwrap();
    let mut away = Scripted::toward([-1.0, 0.0]);
    school2.update(&mut eco2, &mut away);
    assert!((away.rewards[0].0 - into_wall.rewards[0].0 - 0.01).abs() < 1e-6);
}

#[test]
fn update_borrows_the_shared_catalog() {
    let (mut eco, mut school) = world(FishType::default(), 0.5);
    school.spawn(&mut eco, 0.0, 0.0, 0).unwrap();
    let before = eco.store().shared_catalog();
    school.update(&mut eco, &mut Scripted::default());
    let after = eco.store().shared_catalog();
    assert!(std::sync::Arc::ptr_eq(&before, &after));
    assert_eq!(std::sync::Arc::strong_count(&after), 3);
}
