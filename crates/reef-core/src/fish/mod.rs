//! Fish: the main consumer of the core. Each fish is a `NodeKind::Fish` node
//! moved by physics plus a record here holding its physiology. Decisions come
//! from an external [`FishController`]; this module only builds observations,
//! applies actions and keeps the books.

mod sense;
#[cfg(test)]
mod tests;

pub use sense::{Observation, NUTRITION_RAYS, VISION_SECTORS};

use crate::catalog::FishType;
use crate::config::SimConfig;
use crate::ecosystem::Ecosystem;
use crate::entity::NodeId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use std::f64::consts::TAU;
use tracing::info;

const HUNGER_RATE: f32 = 0.0003;
const DEAD_ZONE: f64 = 0.1;
const FLOW_DRIFT: f64 = 0.03;
const DEFECATION_THRESHOLD: f32 = 0.7;
const SEED_CHANCE: f32 = 0.3;
const SEED_SCATTER: f64 = 10.0;

const OXYGEN_COMFORT: f32 = 0.6;
const OXYGEN_PENALTY: f32 = 0.05;
const HUNGER_PENALTY: f32 = 0.02;
const WELLBEING_BONUS: f32 = 0.005;
const CHEMO_REWARD: f32 = 0.01;
const EAT_REWARD: f32 = 15.0;
const STARVING_MISS_PENALTY: f32 = 0.015;
const MISS_PENALTY: f32 = 0.005;
const WALL_PENALTY: f32 = 0.01;

/// Desired swim direction. Components are clamped to `[-1, 1]`; a magnitude
/// below 0.1 means "hold still".
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Action {
    pub direction: [f64; 2],
}

/// The policy side of a fish, e.g. a trained network behind a bridge.
pub trait FishController {
    fn act(&mut self, fish: &Fish, observation: &Observation) -> Action;

    /// Shaped reward for the frame just played; `done` is set on death.
    fn reward(&mut self, _fish: &Fish, _reward: f32, _done: bool) {}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Fish {
    pub id: u64,
    pub node: NodeId,
    pub fish_type: usize,
    /// Unit heading of the last deliberate movement.
    pub direction: [f64; 2],
    pub energy: f32,
    pub oxygen: f32,
    pub hunger: f32,
    pub stomach: f32,
    pub age: u32,
    pub last_reward: f32,
    pub total_reward: f32,
    pub meals: usize,
}

impl Fish {
    pub fn heading(&self) -> f64 {
        self.direction[1].atan2(self.direction[0])
    }
}

/// What one [`School::update`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchoolReport {
    pub alive: usize,
    pub meals: usize,
    pub defecations: usize,
    pub seeds_planted: usize,
    pub deaths: usize,
    pub corpses_decayed: usize,
}

#[derive(Debug, PartialEq)]
enum Fate {
    Alive,
    Died,
    Vanished,
}

pub struct School {
    fish: Vec<Fish>,
    rng: ChaCha12Rng,
    next_id: u64,
    total_consumed: f64,
    total_defecated: f64,
    total_deaths: usize,
}

impl School {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            fish: Vec::new(),
            rng: ChaCha12Rng::seed_from_u64(config.seed.wrapping_add(6)),
            next_id: 0,
            total_consumed: 0.0,
            total_defecated: 0.0,
            total_deaths: 0,
        }
    }

    pub fn fish(&self) -> &[Fish] {
        &self.fish
    }

    pub fn fish_mut(&mut self) -> &mut [Fish] {
        &mut self.fish
    }

    pub fn len(&self) -> usize {
        self.fish.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fish.is_empty()
    }

    /// Nutrition removed from the world by eating.
    pub fn total_consumed(&self) -> f64 {
        self.total_consumed
    }

    /// Nutrition returned to the soil by defecation.
    pub fn total_defecated(&self) -> f64 {
        self.total_defecated
    }

    pub fn total_deaths(&self) -> usize {
        self.total_deaths
    }

    /// Adds a fish of `fish_type` at `(x, y)` facing a random direction.
    /// Returns its id, or `None` for an unknown type or a full store.
    pub fn spawn(&mut self, eco: &mut Ecosystem, x: f64, y: f64, fish_type: usize) -> Option<u64> {
        eco.catalog().fish_type(fish_type)?;
        let node = eco.add_fish_node(x, y)?;
        let angle = self.rng.random_range(0.0..TAU);
        let id = self.next_id;
        self.next_id += 1;
        self.fish.push(Fish {
            id,
            node,
            fish_type,
            direction: [angle.cos(), angle.sin()],
            energy: 1.0,
            oxygen: 1.0,
            hunger: 0.0,
            stomach: 0.0,
            age: 0,
            last_reward: 0.0,
            total_reward: 0.0,
            meals: 0,
        });
        Some(id)
    }

    /// One frame for every fish. Run after [`Ecosystem::step`].
    pub fn update(
        &mut self,
        eco: &mut Ecosystem,
        controller: &mut dyn FishController,
    ) -> SchoolReport {
        let mut report = SchoolReport {
            corpses_decayed: eco.store_mut().decay_corpses(),
            ..SchoolReport::default()
        };
        if report.corpses_decayed > 0 {
            info!(decayed = report.corpses_decayed, "corpses decayed");
        }

        let catalog = eco.store().shared_catalog();
        let mut fish = std::mem::take(&mut self.fish);
        fish.retain_mut(|f| {
            let Some(ft) = catalog.fish_type(f.fish_type) else {
                return false;
            };
            match self.update_one(eco, controller, f, ft, &mut report) {
                Fate::Alive => true,
                Fate::Died => {
                    report.deaths += 1;
                    false
                }
                Fate::Vanished => false,
            }
        });
        self.fish = fish;
        self.total_deaths += report.deaths;
        report.alive = self.fish.len();
        report
    }

    fn update_one(
        &mut self,
        eco: &mut Ecosystem,
        controller: &mut dyn FishController,
        fish: &mut Fish,
        ft: &FishType,
        report: &mut SchoolReport,
    ) -> Fate {
        let Some(position) = eco.store().node(fish.node).map(|n| n.position) else {
            return Fate::Vanished;
        };
        let [x, y] = position;

        let observation = Observation::gather(eco, fish, ft, position);
        let action = controller.act(fish, &observation);
        let mut reward = 0.0;
        if self.steer(eco, fish, ft, action, observation.flow) {
            reward -= WALL_PENALTY;
        }

        fish.oxygen -= ft.oxygen_consumption_rate * 0.5;
        if observation.oxygen > 0.1 {
            fish.oxygen += ft.oxygen_refill_rate * 2.0 * (observation.oxygen + 0.2);
        }
        fish.oxygen = fish.oxygen.clamp(0.0, 1.0);
        fish.hunger = (fish.hunger + HUNGER_RATE).min(1.0);
        fish.energy = (fish.energy - ft.energy_decay).max(0.0);

        if self.rng.random::<f32>() < ft.eating_rate {
            reward += self.try_eat(eco, fish, ft, position, report);
        }

        if fish.stomach >= DEFECATION_THRESHOLD {
            self.defecate(eco, fish, ft, position, report);
        }

        if fish.oxygen < OXYGEN_COMFORT {
            reward -= (OXYGEN_COMFORT - fish.oxygen).powi(2) * OXYGEN_PENALTY;
        }
        reward -= fish.hunger * HUNGER_PENALTY;
        if fish.oxygen > 0.8 && fish.hunger < 0.3 {
            reward += WELLBEING_BONUS;
        }
        reward += observation.local_nutrition * CHEMO_REWARD;

        fish.age = fish.age.saturating_add(1);
        fish.last_reward = reward;
        fish.total_reward += reward;

        let old_age = ft.max_age > 0 && fish.age >= ft.max_age;
        if fish.energy <= 0.0 || fish.oxygen <= 0.0 || old_age {
            controller.reward(fish, reward, true);
            eco.remove_node(fish.node);
            eco.store_mut()
                .add_corpse(x, y, fish.fish_type, fish.heading());
            info!(
                fish = fish.id,
                age = fish.age,
                energy = fish.energy,
                oxygen = fish.oxygen,
                "fish died"
            );
            return Fate::Died;
        }
        controller.reward(fish, reward, false);
        Fate::Alive
    }

    /// Sets the node velocity from the action plus flow drift. Returns true
    /// when the fish is pressed against a wall it is trying to swim through.
    fn steer(
        &mut self,
        eco: &mut Ecosystem,
        fish: &mut Fish,
        ft: &FishType,
        action: Action,
        flow: [f32; 2],
    ) -> bool {
        let ax = action.direction[0].clamp(-1.0, 1.0);
        let ay = action.direction[1].clamp(-1.0, 1.0);
        let magnitude = ax.hypot(ay);
        let mut desired = [0.0, 0.0];
        if magnitude >= DEAD_ZONE {
            fish.direction = [ax / magnitude, ay / magnitude];
            let speed = ft.max_speed * magnitude.min(1.0);
            desired = [fish.direction[0] * speed, fish.direction[1] * speed];
        }
        let drift = ft.flow_sensitivity * FLOW_DRIFT;
        desired[0] += flow[0] as f64 * drift;
        desired[1] += flow[1] as f64 * drift;

        let bounds = *eco.store().bounds();
        let Some(node) = eco.store_mut().node_mut(fish.node) else {
            return false;
        };
        node.velocity[0] += (desired[0] - node.velocity[0]) * ft.acceleration;
        node.velocity[1] += (desired[1] - node.velocity[1]) * ft.acceleration;

        let [px, py] = node.position;
        let [vx, vy] = node.velocity;
        (px <= bounds.left && vx < 0.0)
            || (px >= bounds.right && vx > 0.0)
            || (py <= bounds.top && vy < 0.0)
            || (py >= bounds.bottom && vy > 0.0)
    }

    /// Eats the first edible plant in reach. Returns the eating reward, or
    /// the miss penalty when nothing was in reach.
    fn try_eat(
        &mut self,
        eco: &mut Ecosystem,
        fish: &mut Fish,
        ft: &FishType,
        [x, y]: [f64; 2],
        report: &mut SchoolReport,
    ) -> f32 {
        let store = eco.store();
        let prey = store
            .plants_within(x, y, ft.eating_range)
            .find(|&id| store.node(id).is_some_and(|n| !n.is_immune()));
        let Some(prey) = prey else {
            return if fish.hunger > 0.7 {
                -STARVING_MISS_PENALTY
            } else {
                -MISS_PENALTY
            };
        };
        let gained = store.node(prey).map_or(0.0, |n| n.stored_nutrition());
        eco.remove_node(prey);

        let hunger_before = fish.hunger;
        fish.stomach += gained;
        fish.hunger = (fish.hunger - gained * 0.8).max(0.0);
        fish.energy = (fish.energy + gained).min(1.0);
        fish.meals += 1;
        self.total_consumed += gained as f64;
        report.meals += 1;
        gained * EAT_REWARD + hunger_before * 0.1
    }

    fn defecate(
        &mut self,
        eco: &mut Ecosystem,
        fish: &mut Fish,
        ft: &FishType,
        [x, y]: [f64; 2],
        report: &mut SchoolReport,
    ) {
        self.total_defecated += eco.add_nutrition(x, y, fish.stomach, ft.defecation_radius);
        fish.stomach = 0.0;
        report.defecations += 1;

        let species_count = eco.catalog().plants.len();
        if species_count > 0 && self.rng.random::<f32>() < SEED_CHANCE {
            let species = self.rng.random_range(0..species_count);
            let sx = x + self.rng.random_range(-SEED_SCATTER..=SEED_SCATTER);
            let sy = y + self.rng.random_range(-SEED_SCATTER..=SEED_SCATTER);
            if eco.add_seed(sx, sy, species).is_some() {
                report.seeds_planted += 1;
            }
        }
    }
}
