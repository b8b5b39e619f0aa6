use crate::catalog::Catalog;
use slotmap::new_key_type;

new_key_type! {
    /// Generational handle to a node; stale after the node is removed.
    pub struct NodeId;
    /// Generational handle to a chain.
    pub struct ChainId;
}

/// What a node represents. Fixed when the node is created.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    Plant { species: usize },
    Fish,
    Corpse { original_type: usize, heading: f64 },
}

impl NodeKind {
    /// Legacy integer tag: species index for plants, -1 for fish, -2 for corpses.
    pub fn code(&self) -> i64 {
        match *self {
            NodeKind::Plant { species } => species as i64,
            NodeKind::Fish => -1,
            NodeKind::Corpse { .. } => -2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub position: [f64; 2],
    pub velocity: [f64; 2],
    pub can_grow: bool,
    pub branch_count: u32,
    pub age: u32,
    /// Frames left before a corpse disappears; unused for other kinds.
    pub decay_timer: u32,
    /// Frames left during which the node cannot be eaten.
    pub immunity: u32,
    kind: NodeKind,
    stored_nutrition: f32,
}

impl Node {
    pub(crate) fn new(position: [f64; 2], kind: NodeKind, stored_nutrition: f32) -> Self {
        Self {
            position,
            velocity: [0.0, 0.0],
            can_grow: matches!(kind, NodeKind::Plant { .. }),
            branch_count: 0,
            age: 0,
            decay_timer: 0,
            immunity: 0,
            kind,
            stored_nutrition,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn kind_code(&self) -> i64 {
        self.kind.code()
    }

    pub fn species(&self) -> Option<usize> {
        match self.kind {
            NodeKind::Plant { species } => Some(species),
            _ => None,
        }
    }

    pub fn is_plant(&self) -> bool {
        matches!(self.kind, NodeKind::Plant { .. })
    }

    pub fn is_fish(&self) -> bool {
        matches!(self.kind, NodeKind::Fish)
    }

    pub fn is_corpse(&self) -> bool {
        matches!(self.kind, NodeKind::Corpse { .. })
    }

    pub fn is_immune(&self) -> bool {
        self.immunity > 0
    }

    /// Nutrition a consumer gains by eating this node. Set once at creation.
    pub fn stored_nutrition(&self) -> f32 {
        self.stored_nutrition
    }

    /// Species mobility for plants; fish and corpses are fully mobile.
    pub fn mobility(&self, catalog: &Catalog) -> f64 {
        self.species()
            .and_then(|s| catalog.plant(s))
            .map_or(1.0, |pt| pt.mobility_factor)
    }

    pub fn distance_sq_to(&self, x: f64, y: f64) -> f64 {
        let dx = self.position[0] - x;
        let dy = self.position[1] - y;
        dx * dx + dy * dy
    }
}

/// Render-only bend of a chain, generated once.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChainCurve {
    pub strength: f32,
    pub offset: f32,
    pub multiplier: f32,
}

#[derive(Clone, Debug)]
pub struct Chain {
    pub a: NodeId,
    pub b: NodeId,
    pub age: u32,
    species: usize,
    curve: ChainCurve,
}

impl Chain {
    pub(crate) fn new(a: NodeId, b: NodeId, species: usize, curve: ChainCurve) -> Self {
        Self {
            a,
            b,
            age: 0,
            species,
            curve,
        }
    }

    pub fn species(&self) -> usize {
        self.species
    }

    pub fn curve(&self) -> ChainCurve {
        self.curve
    }

    /// Same undirected edge.
    pub fn connects(&self, x: NodeId, y: NodeId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    pub fn other(&self, id: NodeId) -> Option<NodeId> {
        if self.a == id {
            Some(self.b)
        } else if self.b == id {
            Some(self.a)
        } else {
            None
        }
    }
}
