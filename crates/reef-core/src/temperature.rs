use crate::entity::NodeId;
use crate::store::EntityStore;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use slotmap::SecondaryMap;
use tracing::info;

/// Answers whether a coral node is bleached. Bleached corals stop growing and
/// producing oxygen.
pub trait BleachingOracle {
    fn is_bleached(&self, node: NodeId) -> bool;
}

/// Nothing is ever bleached.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBleaching;

impl BleachingOracle for NoBleaching {
    fn is_bleached(&self, _node: NodeId) -> bool {
        false
    }
}

pub const MAX_TEMPERATURE_ANOMALY: f32 = 3.0;
const MAX_EVENTS_PER_FRAME: usize = 1;
const MAX_SPREAD: usize = 3;
const MATURE_FACTOR: f32 = 1.5;

/// Per-frame chance that a sampled coral bleaches at temperature anomaly `t` (°C).
pub fn bleaching_probability(t: f32) -> f32 {
    let percent = if t <= 0.0 {
        0.0
    } else if t < 0.5 {
        t * 0.0001
    } else if t < 1.0 {
        0.0001 + (t - 0.5) / 0.5 * 0.009
    } else if t < 2.0 {
        0.01 + (t - 1.0) * 0.04
    } else {
        0.05 + (t - 2.0) * 0.1
    };
    percent / 100.0
}

/// Marine heat stress. Randomly bleaches a few mature-leaning corals per frame
/// and spreads bleaching along chains to directly connected corals.
pub struct ThermalStress {
    temperature: f32,
    bleached: SecondaryMap<NodeId, ()>,
    rng: ChaCha12Rng,
    total_events: usize,
}

impl ThermalStress {
    pub fn new(seed: u64) -> Self {
        Self {
            temperature: 0.0,
            bleached: SecondaryMap::new(),
            rng: ChaCha12Rng::seed_from_u64(seed),
            total_events: 0,
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Clamped to `[0, MAX_TEMPERATURE_ANOMALY]`.
    pub fn set_temperature(&mut self, t: f32) {
        self.temperature = if t.is_nan() {
            0.0
        } else {
            t.clamp(0.0, MAX_TEMPERATURE_ANOMALY)
        };
    }

    pub fn bleach(&mut self, node: NodeId) {
        self.bleached.insert(node, ());
    }

    pub fn bleached_count(&self) -> usize {
        self.bleached.len()
    }

    pub fn total_events(&self) -> usize {
        self.total_events
    }

    /// Runs one frame of bleaching. Returns how many nodes became bleached.
    pub fn process(&mut self, store: &EntityStore) -> usize {
        self.bleached.retain(|id, _| store.contains(id));
        if self.temperature <= 0.0 || store.node_count() == 0 {
            return 0;
        }
        let base = bleaching_probability(self.temperature);
        let ids: Vec<NodeId> = store.nodes().map(|(id, _)| id).collect();
        let checks = (ids.len() / 20).clamp(1, 50);

        let mut events = 0;
        let mut newly = 0;
        for _ in 0..checks {
            if events >= MAX_EVENTS_PER_FRAME {
                break;
            }
            let id = ids[self.rng.random_range(0..ids.len())];
            if self.bleached.contains_key(id) {
                continue;
            }
            let Some(node) = store.node(id) else {
                continue;
            };
            let Some(species) = node.species() else {
                continue;
            };
            let Some(pt) = store.catalog().plant(species) else {
                continue;
            };
            if !pt.is_coral {
                continue;
            }
            let factor = if node.age > pt.age_mature {
                MATURE_FACTOR
            } else {
                1.0
            };
            if self.rng.random::<f32>() >= base * factor {
                continue;
            }

            self.bleached.insert(id, ());
            events += 1;
            newly += 1;
            let spread = self.spread_from(store, id, species);
            newly += spread;
            info!(
                temperature = self.temperature,
                spread, "coral bleached"
            );
        }
        self.total_events += events;
        newly
    }

    fn spread_from(&mut self, store: &EntityStore, id: NodeId, species: usize) -> usize {
        let mut spread = 0;
        for (_, chain) in store.chains() {
            if spread >= MAX_SPREAD {
                break;
            }
            if chain.species() != species {
                continue;
            }
            let Some(other) = chain.other(id) else {
                continue;
            };
            let is_coral = store
                .node(other)
                .and_then(|n| n.species())
                .and_then(|s| store.catalog().plant(s))
                .is_some_and(|pt| pt.is_coral);
            if is_coral && !self.bleached.contains_key(other) {
                self.bleached.insert(other, ());
                spread += 1;
            }
        }
        spread
    }
}

impl BleachingOracle for ThermalStress {
    fn is_bleached(&self, node: NodeId) -> bool {
        self.bleached.contains_key(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, PlantType};
    use crate::config::SimConfig;
    use crate::entity::NodeKind;

    fn coral_store() -> EntityStore {
        let catalog = Catalog {
            plants: vec![
                PlantType {
                    is_coral: true,
                    ..PlantType::default()
                },
                PlantType::default(),
            ],
            fish: Vec::new(),
        };
        EntityStore::new(&SimConfig::default(), catalog)
    }

    #[test]
    fn probability_rises_with_temperature() {
        assert_eq!(bleaching_probability(0.0), 0.0);
        let mut prev = 0.0;
        for i in 1..=30 {
            let p = bleaching_probability(i as f32 * 0.1);
            assert!(p >= prev);
            prev = p;
        }
        assert!((bleaching_probability(3.0) - 0.0015).abs() < 1e-7);
    }

    #[test]
    fn temperature_is_clamped() {
        let mut t = ThermalStress::new(1);
        t.set_temperature(7.0);
        assert_eq!(t.temperature(), 3.0);
        t.set_temperature(-1.0);
        assert_eq!(t.temperature(), 0.0);
    }

    #[test]
    fn cold_water_never_bleaches() {
        let mut store = coral_store();
        store.add_node(0.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
        let mut t = ThermalStress::new(1);
        for _ in 0..1000 {
            assert_eq!(t.process(&store), 0);
        }
    }

    #[test]
    fn hot_water_eventually_bleaches_only_corals() {
        let mut store = coral_store();
        let coral = store.add_node(0.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
        let neighbour = store.add_node(50.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
        let kelp = store.add_node(500.0, 0.0, NodeKind::Plant { species: 1 }).unwrap();
        store.add_chain(coral, neighbour).unwrap();
        let mut t = ThermalStress::new(7);
        t.set_temperature(3.0);
        for _ in 0..200_000 {
            t.process(&store);
            if t.is_bleached(coral) || t.is_bleached(neighbour) {
                break;
            }
        }
        assert!(t.is_bleached(coral) && t.is_bleached(neighbour));
        assert!(!t.is_bleached(kelp));
        assert_eq!(t.total_events(), 1);
    }

    #[test]
    fn removed_nodes_are_forgotten() {
        let mut store = coral_store();
        let coral = store.add_node(0.0, 0.0, NodeKind::Plant { species: 0 }).unwrap();
        let mut t = ThermalStress::new(1);
        t.bleach(coral);
        assert_eq!(t.bleached_count(), 1);
        store.remove(coral);
        t.process(&store);
        assert_eq!(t.bleached_count(), 0);
    }
}
