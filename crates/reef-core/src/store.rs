use crate::catalog::Catalog;
use crate::config::{SimConfig, WorldBounds};
use crate::entity::{Chain, ChainCurve, ChainId, Node, NodeId, NodeKind};
use crate::growth::nutrition_cost;
use crate::spatial::{build_index, query_within, NodeLocation, SpatialGrid};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rstar::RTree;
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Owns every node and chain plus the spatial indices over them.
///
/// Removing a node frees its slot and invalidates its handle; the grid keeps
/// the stale key until the next rebuild, so lookups through the grid must be
/// resolved with [`EntityStore::node`].
pub struct EntityStore {
    bounds: WorldBounds,
    catalog: Arc<Catalog>,
    nodes: SlotMap<NodeId, Node>,
    chains: SlotMap<ChainId, Chain>,
    recent_chains: VecDeque<ChainId>,
    grid: SpatialGrid,
    index: RTree<NodeLocation>,
    rng: ChaCha12Rng,
    max_nodes: usize,
    max_chains: usize,
    duplicate_window: usize,
    optimal_distance: f64,
    seed_immunity_frames: u32,
    corpse_decay_frames: u32,
    node_capacity_warned: bool,
    chain_capacity_warned: bool,
}

pub(crate) struct ForceParts<'a> {
    pub grid: &'a SpatialGrid,
    pub chains: &'a SlotMap<ChainId, Chain>,
    pub catalog: &'a Catalog,
    pub nodes: &'a mut SlotMap<NodeId, Node>,
}

impl EntityStore {
    pub fn new(config: &SimConfig, catalog: Catalog) -> Self {
        Self {
            bounds: config.bounds,
            catalog: Arc::new(catalog),
            nodes: SlotMap::with_key(),
            chains: SlotMap::with_key(),
            recent_chains: VecDeque::with_capacity(config.chain_duplicate_window),
            grid: SpatialGrid::new(
                &config.bounds,
                config.spatial_cell_size,
                config.max_nodes_per_cell,
            ),
            index: RTree::new(),
            rng: ChaCha12Rng::seed_from_u64(config.seed.wrapping_add(3)),
            max_nodes: config.max_nodes,
            max_chains: config.max_chains,
            duplicate_window: config.chain_duplicate_window,
            optimal_distance: config.optimal_distance,
            seed_immunity_frames: config.seed_immunity_frames,
            corpse_decay_frames: config.corpse_decay_frames,
            node_capacity_warned: false,
            chain_capacity_warned: false,
        }
    }

    pub fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The species tables as a shared handle, for callers that need them
    /// alongside a mutable borrow of the store.
    pub fn shared_catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    /// Creates a node at `(x, y)` clamped into the world. Returns `None` when
    /// the store is full or a plant names an unknown species.
    pub fn add_node(&mut self, x: f64, y: f64, kind: NodeKind) -> Option<NodeId> {
        if self.nodes.len() >= self.max_nodes {
            if !self.node_capacity_warned {
                warn!(max = self.max_nodes, "node capacity exhausted");
                self.node_capacity_warned = true;
            }
            return None;
        }
        let stored = match kind {
            NodeKind::Plant { species } => {
                nutrition_cost(self.catalog.plant(species)?, self.optimal_distance)
            }
            NodeKind::Fish | NodeKind::Corpse { .. } => 0.0,
        };
        let (x, y) = self.bounds.clamp(x, y);
        let id = self.nodes.insert(Node::new([x, y], kind, stored));
        self.grid.insert(id, x, y);
        self.node_capacity_warned = false;
        Some(id)
    }

    /// A plant node that cannot be eaten for the configured immunity window.
    pub fn add_seed_node(&mut self, x: f64, y: f64, species: usize) -> Option<NodeId> {
        let id = self.add_node(x, y, NodeKind::Plant { species })?;
        if let Some(node) = self.nodes.get_mut(id) {
            node.immunity = self.seed_immunity_frames;
        }
        Some(id)
    }

    pub fn add_corpse(
        &mut self,
        x: f64,
        y: f64,
        original_type: usize,
        heading: f64,
    ) -> Option<NodeId> {
        let id = self.add_node(
            x,
            y,
            NodeKind::Corpse {
                original_type,
                heading,
            },
        )?;
        if let Some(node) = self.nodes.get_mut(id) {
            node.decay_timer = self.corpse_decay_frames;
        }
        Some(id)
    }

    /// Links two live plant nodes. Fails on self-loops, stale handles,
    /// non-plant endpoints, a full store, or when the same undirected edge is
    /// among the most recently created chains.
    pub fn add_chain(&mut self, a: NodeId, b: NodeId) -> Option<ChainId> {
        if a == b {
            return None;
        }
        let species = self.nodes.get(a)?.species()?;
        self.nodes.get(b)?.species()?;
        if self.is_recent_duplicate(a, b) {
            return None;
        }
        if self.chains.len() >= self.max_chains {
            if !self.chain_capacity_warned {
                warn!(max = self.max_chains, "chain capacity exhausted");
                self.chain_capacity_warned = true;
            }
            return None;
        }
        let curvature = self.catalog.plant(species).map_or(1.0, |pt| pt.curvature);
        let curve = ChainCurve {
            strength: curvature * (self.rng.random::<f32>() - 0.5) * 0.6,
            offset: (self.rng.random::<f32>() - 0.5) * 20.0,
            multiplier: 0.8 + self.rng.random::<f32>() * 0.4,
        };
        let id = self.chains.insert(Chain::new(a, b, species, curve));
        if self.duplicate_window > 0 {
            if self.recent_chains.len() == self.duplicate_window {
                self.recent_chains.pop_front();
            }
            self.recent_chains.push_back(id);
        }
        self.chain_capacity_warned = false;
        Some(id)
    }

    fn is_recent_duplicate(&self, a: NodeId, b: NodeId) -> bool {
        self.recent_chains
            .iter()
            .filter_map(|&c| self.chains.get(c))
            .any(|chain| chain.connects(a, b))
    }

    /// Deactivates a node. Chains touching it are retired on the next
    /// integration pass; its grid entry disappears on the next rebuild.
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.nodes.remove(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut Node)> + '_ {
        self.nodes.iter_mut()
    }

    pub fn chains(&self) -> impl Iterator<Item = (ChainId, &Chain)> + '_ {
        self.chains.iter()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn plant_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_plant()).count()
    }

    pub fn corpse_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_corpse()).count()
    }

    /// Counts corpse timers down and removes expired corpses.
    pub fn decay_corpses(&mut self) -> usize {
        let mut expired = Vec::new();
        for (id, node) in self.nodes.iter_mut() {
            if !node.is_corpse() {
                continue;
            }
            node.decay_timer = node.decay_timer.saturating_sub(1);
            if node.decay_timer == 0 {
                expired.push(id);
            }
        }
        for &id in &expired {
            self.nodes.remove(id);
        }
        expired.len()
    }

    pub fn tick_seed_immunity(&mut self) {
        for node in self.nodes.values_mut() {
            node.immunity = node.immunity.saturating_sub(1);
        }
    }

    /// Ages live chains and retires those whose endpoints were removed.
    pub fn age_chains(&mut self) -> usize {
        let nodes = &self.nodes;
        let before = self.chains.len();
        self.chains.retain(|_, chain| {
            let alive = nodes.contains_key(chain.a) && nodes.contains_key(chain.b);
            if alive {
                chain.age += 1;
            }
            alive
        });
        before - self.chains.len()
    }

    /// Disjoint borrows for the force pass: node state mutable, everything
    /// the forces read shared.
    pub(crate) fn force_parts(&mut self) -> ForceParts<'_> {
        ForceParts {
            grid: &self.grid,
            chains: &self.chains,
            catalog: &self.catalog,
            nodes: &mut self.nodes,
        }
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Re-buckets every live node and refreshes the nearest-node snapshot.
    pub fn rebuild_grid(&mut self) {
        let entries: Vec<(NodeId, [f64; 2])> =
            self.nodes.iter().map(|(id, n)| (id, n.position)).collect();
        self.index = build_index(
            entries
                .iter()
                .map(|&(id, position)| NodeLocation { id, position })
                .collect(),
        );
        self.grid.rebuild(entries);
        if self.grid.dropped() > 0 {
            debug!(
                dropped = self.grid.dropped(),
                "spatial grid cells over capacity"
            );
        }
    }

    /// Closest live node to `(x, y)` as of the last rebuild.
    pub fn nearest_node(&self, x: f64, y: f64) -> Option<NodeId> {
        self.index
            .nearest_neighbor_iter(&[x, y])
            .map(|loc| loc.id)
            .find(|&id| self.nodes.contains_key(id))
    }

    /// Live nodes whose position at the last rebuild lay within `radius`.
    pub fn nodes_within(&self, x: f64, y: f64, radius: f64) -> Vec<NodeId> {
        let mut found = query_within(&self.index, [x, y], radius);
        found.retain(|&id| self.nodes.contains_key(id));
        found
    }

    /// Closest live node within `radius` of `(x, y)`, searched in the 3x3
    /// grid block around the point.
    pub fn node_at(&self, x: f64, y: f64, radius: f64) -> Option<NodeId> {
        let r_sq = radius * radius;
        self.grid
            .keys_near(x, y)
            .filter_map(|id| self.nodes.get(id).map(|n| (id, n.distance_sq_to(x, y))))
            .filter(|&(_, d)| d <= r_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Live plant nodes within `radius`, in grid order.
    pub fn plants_within(&self, x: f64, y: f64, radius: f64) -> impl Iterator<Item = NodeId> + '_ {
        let r_sq = radius * radius;
        self.grid.keys_near(x, y).filter(move |&id| {
            self.nodes
                .get(id)
                .is_some_and(|n| n.is_plant() && n.distance_sq_to(x, y) <= r_sq)
        })
    }
}
