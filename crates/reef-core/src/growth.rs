use crate::catalog::PlantType;
use crate::config::SimConfig;
use crate::entity::{NodeId, NodeKind};
use crate::field::oxygen::OxygenSource;
use crate::field::{NutritionField, OxygenField};
use crate::store::EntityStore;
use crate::temperature::BleachingOracle;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use std::f64::consts::TAU;
use tracing::debug;

/// `(lower nutrition bound, modifier at that bound)`; linear in between.
const MODIFIER_BANDS: [(f32, f32); 9] = [
    (0.2, 0.05),
    (0.3, 0.10),
    (0.4, 0.25),
    (0.5, 0.50),
    (0.6, 1.00),
    (0.7, 1.80),
    (0.8, 2.50),
    (1.0, 3.50),
    (f32::INFINITY, 3.50),
];

/// Maps local nutrition to a growth multiplier. Non-decreasing; 0.05 below
/// 0.2 and saturating at 3.5 from 1.0.
pub fn growth_modifier(nutrition: f32) -> f32 {
    if nutrition.is_nan() || nutrition < MODIFIER_BANDS[0].0 {
        return MODIFIER_BANDS[0].1;
    }
    for pair in MODIFIER_BANDS.windows(2) {
        let (lo, lo_mod) = pair[0];
        let (hi, hi_mod) = pair[1];
        if nutrition < hi {
            if hi.is_infinite() {
                return lo_mod;
            }
            return lo_mod + (nutrition - lo) / (hi - lo) * (hi_mod - lo_mod);
        }
    }
    MODIFIER_BANDS[MODIFIER_BANDS.len() - 1].1
}

/// Nutrition a new node of this species costs the soil, and what an eater gains.
pub fn nutrition_cost(plant: &PlantType, optimal_distance: f64) -> f32 {
    let size_factor =
        (plant.max_branches as f32 / 3.0) * (plant.branch_distance / optimal_distance) as f32;
    plant.nutrition_depletion_strength * size_factor
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GrowthReport {
    pub eligible: usize,
    pub grown: usize,
    pub limit: usize,
}

/// Branching of plant nodes into free space, gated by soil nutrition.
pub struct GrowthEngine {
    rng: ChaCha12Rng,
    limit_base: usize,
    limit_divisor: usize,
    limit_cap: usize,
    depletion_radius: f32,
}

/// The per-species numbers one growth evaluation needs.
#[derive(Clone, Copy)]
struct Branching {
    species: usize,
    probability: f32,
    attempts: u32,
    distance: f64,
}

impl GrowthEngine {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            rng: ChaCha12Rng::seed_from_u64(config.seed.wrapping_add(4)),
            limit_base: config.growth_limit_base,
            limit_divisor: config.growth_limit_divisor,
            limit_cap: config.growth_limit_cap,
            depletion_radius: config.growth_depletion_radius,
        }
    }

    /// Successful branches allowed this frame for `node_count` live nodes.
    pub fn growth_limit(&self, node_count: usize) -> usize {
        (node_count / self.limit_divisor + self.limit_base).min(self.limit_cap)
    }

    /// Regenerates nutrition, refreshes oxygen from the current producers,
    /// then lets eligible plants branch.
    pub fn grow(
        &mut self,
        store: &mut EntityStore,
        nutrition: &mut NutritionField,
        oxygen: &mut OxygenField,
        bleaching: &dyn BleachingOracle,
    ) -> GrowthReport {
        nutrition.regenerate();
        oxygen.update(oxygen_sources(store, bleaching));

        let limit = self.growth_limit(store.node_count());
        let candidates: Vec<(NodeId, Branching)> = store
            .nodes()
            .filter_map(|(id, node)| {
                let species = node.species()?;
                let pt = store.catalog().plant(species)?;
                let eligible = node.can_grow
                    && node.branch_count < pt.max_branches
                    && node.age <= pt.age_mature
                    && !bleaching.is_bleached(id);
                eligible.then_some((
                    id,
                    Branching {
                        species,
                        probability: pt.growth_probability,
                        attempts: pt.growth_attempts,
                        distance: pt.branch_distance,
                    },
                ))
            })
            .collect();

        let mut report = GrowthReport {
            eligible: candidates.len(),
            grown: 0,
            limit,
        };
        for (parent, branching) in candidates {
            if report.grown >= limit {
                break;
            }
            let Some(position) = store.node(parent).map(|n| n.position) else {
                continue;
            };
            if self.try_branch(store, nutrition, parent, position, branching) {
                report.grown += 1;
            }
        }

        if report.grown > 0 {
            debug!(
                grown = report.grown,
                eligible = report.eligible,
                limit,
                "plants branched"
            );
        }
        report
    }

    fn try_branch(
        &mut self,
        store: &mut EntityStore,
        nutrition: &mut NutritionField,
        parent: NodeId,
        [px, py]: [f64; 2],
        b: Branching,
    ) -> bool {
        let local = nutrition.value_at(px, py);
        let modifier = growth_modifier(local);
        if self.rng.random::<f32>() >= b.probability * modifier {
            return false;
        }

        let mut attempt_modifier = modifier;
        if local < 0.3 {
            attempt_modifier *= 0.3;
        } else if local > 0.7 {
            attempt_modifier *= 1.8;
        }
        let ceiling = b.attempts.saturating_mul(3).max(1);
        let attempts = ((b.attempts as f32 * attempt_modifier) as u32).clamp(1, ceiling);
        let spacing = b.distance * 0.8;

        for _ in 0..attempts {
            let angle = self.rng.random_range(0.0..TAU);
            let reach = b.distance * self.rng.random_range(0.9..1.1);
            let x = px + angle.cos() * reach;
            let y = py + angle.sin() * reach;
            if !store.bounds().contains(x, y) || !is_position_free(store, x, y, spacing) {
                continue;
            }
            let Some(child) = store.add_node(x, y, NodeKind::Plant { species: b.species }) else {
                return false;
            };
            store.add_chain(parent, child);
            if let Some(node) = store.node_mut(parent) {
                node.branch_count += 1;
            }
            let cost = store.node(child).map_or(0.0, |n| n.stored_nutrition());
            nutrition.deplete_at(x, y, cost, self.depletion_radius);
            return true;
        }
        false
    }
}

/// True when no live node in the 3x3 grid block lies closer than `min_distance`.
pub fn is_position_free(store: &EntityStore, x: f64, y: f64, min_distance: f64) -> bool {
    let min_sq = min_distance * min_distance;
    !store
        .grid()
        .keys_near(x, y)
        .filter_map(|id| store.node(id))
        .any(|n| n.distance_sq_to(x, y) < min_sq)
}

/// Live, unbleached plants that produce oxygen.
fn oxygen_sources(store: &EntityStore, bleaching: &dyn BleachingOracle) -> Vec<OxygenSource> {
    store
        .nodes()
        .filter_map(|(id, node)| {
            let pt = store.catalog().plant(node.species()?)?;
            if pt.oxygen_production_factor <= 0.0
                || pt.oxygen_production_radius <= 0.0
                || bleaching.is_bleached(id)
            {
                return None;
            }
            Some(OxygenSource {
                x: node.position[0],
                y: node.position[1],
                factor: pt.oxygen_production_factor,
                radius: pt.oxygen_production_radius,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::WorldBounds;
    use crate::temperature::NoBleaching;

    #[test]
    fn modifier_matches_band_edges() {
        assert_eq!(growth_modifier(0.0), 0.05);
        assert_eq!(growth_modifier(0.2), 0.05);
        assert!((growth_modifier(0.25) - 0.075).abs() < 1e-6);
        assert!((growth_modifier(0.6) - 1.0).abs() < 1e-6);
        assert!((growth_modifier(0.65) - 1.4).abs() < 1e-6);
        assert!((growth_modifier(0.9) - 3.0).abs() < 1e-6);
        assert_eq!(growth_modifier(1.0), 3.5);
        assert_eq!(growth_modifier(2.7), 3.5);
    }

    #[test]
    fn cost_scales_with_size() {
        let base = PlantType::default();
        let big = PlantType {
            max_branches: 6,
            branch_distance: 100.0,
            ..PlantType::default()
        };
        let c = nutrition_cost(&base, 50.0);
        assert!((c - 0.08).abs() < 1e-6);
        assert!((nutrition_cost(&big, 50.0) - 4.0 * c).abs() < 1e-6);
    }

    #[test]
    fn growth_limit_is_sublinear_and_capped() {
        let engine = GrowthEngine::new(&SimConfig::default());
        assert_eq!(engine.growth_limit(0), 3);
        assert_eq!(engine.growth_limit(250), 5);
        assert_eq!(engine.growth_limit(1_000_000), 50);
    }

    fn world() -> (SimConfig, EntityStore, OxygenField) {
        let config = SimConfig {
            bounds: WorldBounds::centered(2000.0, 2000.0),
            ..SimConfig::default()
        };
        let catalog = Catalog {
            plants: vec![PlantType {
                growth_probability: 1.0,
                growth_attempts: 1,
                ..PlantType::default()
            }],
            fish: Vec::new(),
        };
        let store = EntityStore::new(&config, catalog);
        let oxygen = OxygenField::new(&config);
        (config, store, oxygen)
    }

    #[test]
    fn starved_soil_rarely_grows() {
        let (config, mut store, mut oxygen) = world();
        let mut nutrition = NutritionField::uniform(&config, 0.0);
        let mut engine = GrowthEngine::new(&config);
        store.add_node(0.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
        let mut grown = 0;
        for _ in 0..20 {
            grown += engine
                .grow(&mut store, &mut nutrition, &mut oxygen, &NoBleaching)
                .grown;
        }
        assert!(grown < 10, "grew {grown} times on empty soil");
    }

    #[test]
    fn branch_depletes_its_cost() {
        let (config, mut store, mut oxygen) = world();
        let mut nutrition = NutritionField::uniform(&config, 0.8);
        let mut engine = GrowthEngine::new(&config);
        let parent = store.add_node(0.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
        let report = engine.grow(&mut store, &mut nutrition, &mut oxygen, &NoBleaching);
        assert_eq!(report.grown, 1);
        assert_eq!(store.node(parent).unwrap().branch_count, 1);
        assert!(nutrition.total_depleted() > 0.0);
    }

    #[test]
    fn mature_and_full_plants_do_not_branch() {
        let (config, mut store, mut oxygen) = world();
        let mut nutrition = NutritionField::uniform(&config, 0.8);
        let mut engine = GrowthEngine::new(&config);
        let old = store.add_node(0.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
        store.node_mut(old).unwrap().age = 5000;
        let full = store.add_node(500.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
        store.node_mut(full).unwrap().branch_count = 3;
        let report = engine.grow(&mut store, &mut nutrition, &mut oxygen, &NoBleaching);
        assert_eq!(report.eligible, 0);
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn occupied_space_blocks_branching() {
        let (_, mut store, _) = world();
        store.add_node(0.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
        assert!(!is_position_free(&store, 10.0, 0.0, 40.0));
        assert!(is_position_free(&store, 45.0, 0.0, 40.0));
    }

    #[test]
    fn growth_refreshes_oxygen_first() {
        let (config, mut store, mut oxygen) = world();
        let mut nutrition = NutritionField::uniform(&config, 0.0);
        let mut engine = GrowthEngine::new(&config);
        store.add_node(0.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
        engine.grow(&mut store, &mut nutrition, &mut oxygen, &NoBleaching);
        assert!(oxygen.level_at(0.0, 0.0) > oxygen.base_level());
    }
}
