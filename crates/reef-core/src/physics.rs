use crate::catalog::Catalog;
use crate::config::SimConfig;
use crate::entity::{Chain, ChainId, Node, NodeId};
use crate::spatial::SpatialGrid;
use crate::store::{EntityStore, ForceParts};
use slotmap::SlotMap;

/// Stateless per-frame force accumulation and integration.
#[derive(Clone, Debug)]
pub struct PhysicsEngine {
    optimal_distance: f64,
    repulsion_force: f64,
    chain_force: f64,
    drag: f64,
}

impl PhysicsEngine {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            optimal_distance: config.optimal_distance,
            repulsion_force: config.repulsion_force,
            chain_force: config.chain_force,
            drag: config.water_drag,
        }
    }

    /// Pairwise repulsion over the grid, then chain springs. Forces are added
    /// straight into node velocities.
    pub fn apply_forces(&self, store: &mut EntityStore) {
        let ForceParts {
            grid,
            chains,
            catalog,
            nodes,
        } = store.force_parts();
        self.apply_repulsion(grid, catalog, nodes);
        self.apply_chain_springs(chains, catalog, nodes);
    }

    /// Visits every unordered key pair sharing a bucket or sitting in
    /// forward-adjacent buckets, each pair once.
    fn apply_repulsion(
        &self,
        grid: &SpatialGrid,
        catalog: &Catalog,
        nodes: &mut SlotMap<NodeId, Node>,
    ) {
        for ((gx, gy), cell) in grid.occupied() {
            for (i, &a) in cell.iter().enumerate() {
                for &b in &cell[i + 1..] {
                    self.repel(catalog, nodes, a, b);
                }
            }
            for neighbour in grid.forward_neighbors(gx, gy) {
                for &a in cell {
                    for &b in neighbour {
                        self.repel(catalog, nodes, a, b);
                    }
                }
            }
        }
    }

    fn repel(&self, catalog: &Catalog, nodes: &mut SlotMap<NodeId, Node>, a: NodeId, b: NodeId) {
        let Some([na, nb]) = nodes.get_disjoint_mut([a, b]) else {
            return;
        };
        let dx = nb.position[0] - na.position[0];
        let dy = nb.position[1] - na.position[1];
        let d_sq = dx * dx + dy * dy;
        if d_sq == 0.0 || d_sq >= self.optimal_distance * self.optimal_distance {
            return;
        }
        let (ma, mb) = (na.mobility(catalog), nb.mobility(catalog));
        let d = d_sq.sqrt();
        let base = self.repulsion_force * (self.optimal_distance - d) / d;
        // The stiffer side pushes the looser side further.
        let wa = base * (2.0 - mb) * ma;
        let wb = base * (2.0 - ma) * mb;
        na.velocity[0] -= dx * wa;
        na.velocity[1] -= dy * wa;
        nb.velocity[0] += dx * wb;
        nb.velocity[1] += dy * wb;
    }

    fn apply_chain_springs(
        &self,
        chains: &SlotMap<ChainId, Chain>,
        catalog: &Catalog,
        nodes: &mut SlotMap<NodeId, Node>,
    ) {
        for chain in chains.values() {
            let Some([na, nb]) = nodes.get_disjoint_mut([chain.a, chain.b]) else {
                continue;
            };
            if na.is_fish() || nb.is_fish() {
                continue;
            }
            let dx = nb.position[0] - na.position[0];
            let dy = nb.position[1] - na.position[1];
            let d = dx.hypot(dy);
            if d == 0.0 {
                continue;
            }
            let (ma, mb) = (na.mobility(catalog), nb.mobility(catalog));
            let f = self.chain_force * (d - self.optimal_distance) / d;
            na.velocity[0] += dx * f * ma;
            na.velocity[1] += dy * f * ma;
            nb.velocity[0] -= dx * f * mb;
            nb.velocity[1] -= dy * f * mb;
        }
    }

    /// Drag, move, clamp to the world with velocity zeroed on the clamped
    /// axis, then age nodes and chains. Returns how many dangling chains were
    /// retired.
    pub fn integrate(&self, store: &mut EntityStore) -> usize {
        let bounds = *store.bounds();
        let drag = self.drag;
        for (_, node) in store.nodes_mut() {
            node.age = node.age.saturating_add(1);
            node.velocity[0] *= drag;
            node.velocity[1] *= drag;
            node.position[0] += node.velocity[0];
            node.position[1] += node.velocity[1];

            if node.position[0] < bounds.left {
                node.position[0] = bounds.left;
                node.velocity[0] = 0.0;
            } else if node.position[0] > bounds.right {
                node.position[0] = bounds.right;
                node.velocity[0] = 0.0;
            }
            if node.position[1] < bounds.top {
                node.position[1] = bounds.top;
                node.velocity[1] = 0.0;
            } else if node.position[1] > bounds.bottom {
                node.position[1] = bounds.bottom;
                node.velocity[1] = 0.0;
            }
        }
        store.age_chains()
    }
}
