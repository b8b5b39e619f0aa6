use crate::config::WorldBounds;
use crate::entity::NodeId;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Cell offsets that cover each unordered pair of adjacent cells exactly once.
/// Offsets with `dgx < 0 || (dgx == 0 && dgy < 0)` belong to the other cell of the pair.
const FORWARD_OFFSETS: [(i64, i64); 4] = [(0, 1), (1, -1), (1, 0), (1, 1)];

/// Uniform bucket grid over the world. Contents are a snapshot of the last
/// rebuild; keys may refer to nodes that have since moved or been removed.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    bounds: WorldBounds,
    cell_size: f64,
    cols: usize,
    rows: usize,
    capacity: usize,
    cells: Vec<Vec<NodeId>>,
    occupied: Vec<usize>,
    dropped: usize,
}

impl SpatialGrid {
    pub fn new(bounds: &WorldBounds, cell_size: f64, capacity: usize) -> Self {
        let cols = (bounds.width() / cell_size).ceil().max(1.0) as usize;
        let rows = (bounds.height() / cell_size).ceil().max(1.0) as usize;
        Self {
            bounds: *bounds,
            cell_size,
            cols,
            rows,
            capacity,
            cells: vec![Vec::new(); cols * rows],
            occupied: Vec::new(),
            dropped: 0,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Insertions rejected by full cells since the last `clear`.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Grid coordinate of a world point. May lie outside the grid; NaN maps
    /// to `i64::MIN` so it never lands on a real cell.
    pub fn world_to_grid(&self, x: f64, y: f64) -> (i64, i64) {
        (
            cell_coord((x - self.bounds.left) / self.cell_size),
            cell_coord((y - self.bounds.top) / self.cell_size),
        )
    }

    /// Bucket index for an insertion. Points on the right/bottom edge belong
    /// to the last column/row.
    fn insertion_index(&self, x: f64, y: f64) -> Option<usize> {
        if !self.bounds.contains(x, y) {
            return None;
        }
        let (gx, gy) = self.world_to_grid(x, y);
        self.index(
            gx.min(self.cols as i64 - 1),
            gy.min(self.rows as i64 - 1),
        )
    }

    fn index(&self, gx: i64, gy: i64) -> Option<usize> {
        if gx < 0 || gy < 0 || gx as usize >= self.cols || gy as usize >= self.rows {
            return None;
        }
        Some(gy as usize * self.cols + gx as usize)
    }

    fn coords(&self, index: usize) -> (i64, i64) {
        ((index % self.cols) as i64, (index / self.cols) as i64)
    }

    /// Empties every bucket, keeping their allocations.
    pub fn clear(&mut self) {
        for idx in self.occupied.drain(..) {
            self.cells[idx].clear();
        }
        self.dropped = 0;
    }

    /// Adds `id` to the bucket under `(x, y)`. Returns false when the point is
    /// outside the grid or the bucket is full.
    pub fn insert(&mut self, id: NodeId, x: f64, y: f64) -> bool {
        let Some(idx) = self.insertion_index(x, y) else {
            return false;
        };
        let cell = &mut self.cells[idx];
        if cell.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        if cell.is_empty() {
            self.occupied.push(idx);
        }
        cell.push(id);
        true
    }

    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (NodeId, [f64; 2])>,
    {
        self.clear();
        for (id, [x, y]) in entries {
            self.insert(id, x, y);
        }
    }

    /// Bucket at a grid coordinate; empty when out of range.
    pub fn cell(&self, gx: i64, gy: i64) -> &[NodeId] {
        match self.index(gx, gy) {
            Some(idx) => self.cells[idx].as_slice(),
            None => &[],
        }
    }

    /// The in-range buckets of the `(2r+1)^2` block centred on grid cell `(gx, gy)`.
    pub fn cells_near_grid(
        &self,
        gx: i64,
        gy: i64,
        radius: i64,
    ) -> impl Iterator<Item = &[NodeId]> + '_ {
        let (x0, x1) = clip_span(gx, radius, self.cols);
        let (y0, y1) = clip_span(gy, radius, self.rows);
        (y0..=y1).flat_map(move |cy| {
            (x0..=x1).filter_map(move |cx| self.index(cx, cy).map(|idx| self.cells[idx].as_slice()))
        })
    }

    /// Buckets of the 3x3 block around a world point.
    pub fn cells_near(&self, x: f64, y: f64) -> impl Iterator<Item = &[NodeId]> + '_ {
        let (gx, gy) = self.world_to_grid(x, y);
        self.cells_near_grid(gx, gy, 1)
    }

    /// Every node key in the 3x3 block around a world point.
    pub fn keys_near(&self, x: f64, y: f64) -> impl Iterator<Item = NodeId> + '_ {
        self.cells_near(x, y).flat_map(|cell| cell.iter().copied())
    }

    /// Buckets of the forward half of the neighbourhood of `(gx, gy)`.
    pub fn forward_neighbors(&self, gx: i64, gy: i64) -> impl Iterator<Item = &[NodeId]> + '_ {
        FORWARD_OFFSETS
            .iter()
            .filter_map(move |&(dx, dy)| {
                self.index(gx.checked_add(dx)?, gy.checked_add(dy)?)
            })
            .map(|idx| self.cells[idx].as_slice())
    }

    /// Non-empty buckets with their grid coordinates, in first-filled order.
    pub fn occupied(&self) -> impl Iterator<Item = ((i64, i64), &[NodeId])> + '_ {
        self.occupied
            .iter()
            .map(|&idx| (self.coords(idx), self.cells[idx].as_slice()))
    }
}

/// Floor of a fractional cell coordinate; NaN becomes `i64::MIN` and
/// infinities saturate.
pub(crate) fn cell_coord(v: f64) -> i64 {
    if v.is_nan() {
        i64::MIN
    } else {
        v.floor() as i64
    }
}

/// Inclusive in-grid range of `center - radius ..= center + radius` along an
/// axis of `len` cells. Empty (start > end) when nothing overlaps.
pub(crate) fn clip_span(center: i64, radius: i64, len: usize) -> (i64, i64) {
    let radius = radius.max(0);
    let start = center.saturating_sub(radius).max(0);
    let end = center.saturating_add(radius).min(len as i64 - 1);
    (start, end)
}

/// Snapshot of a node position for the R*-tree.
#[derive(Clone, Copy, Debug)]
pub struct NodeLocation {
    pub id: NodeId,
    pub position: [f64; 2],
}

impl RTreeObject for NodeLocation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for NodeLocation {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Build an R*-tree from node positions via bulk_load (O(n log n)).
pub fn build_index(locations: Vec<NodeLocation>) -> RTree<NodeLocation> {
    RTree::bulk_load(locations)
}

/// Indexed entries within `radius` of `center`, by Euclidean distance.
pub fn query_within(tree: &RTree<NodeLocation>, center: [f64; 2], radius: f64) -> Vec<NodeId> {
    let envelope = AABB::from_corners(
        [center[0] - radius, center[1] - radius],
        [center[0] + radius, center[1] + radius],
    );
    let r_sq = radius * radius;

    tree.locate_in_envelope(&envelope)
        .filter(|loc| loc.distance_2(&center) <= r_sq)
        .map(|loc| loc.id)
        .collect()
}
