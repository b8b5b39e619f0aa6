//! Environmental layers sampled by world position: nutrition, oxygen and flow.
//!
//! All three share [`LayerGrid`] geometry over the world bounds at a coarser
//! resolution than the spatial grid. Point queries outside the grid return a
//! per-layer sentinel rather than an error.

pub mod flow;
pub mod noise;
pub mod nutrition;
pub mod oxygen;

pub use flow::FlowField;
pub use nutrition::NutritionField;
pub use oxygen::OxygenField;

use crate::config::WorldBounds;
use crate::spatial::{cell_coord, clip_span};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerGrid {
    left: f64,
    top: f64,
    cell_size: f64,
    width: usize,
    height: usize,
}

impl LayerGrid {
    pub fn new(bounds: &WorldBounds, cell_size: f64) -> Self {
        Self {
            left: bounds.left,
            top: bounds.top,
            cell_size,
            width: (bounds.width() / cell_size).ceil().max(1.0) as usize,
            height: (bounds.height() / cell_size).ceil().max(1.0) as usize,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn world_to_cell(&self, x: f64, y: f64) -> (i64, i64) {
        (
            cell_coord((x - self.left) / self.cell_size),
            cell_coord((y - self.top) / self.cell_size),
        )
    }

    pub fn index(&self, cx: i64, cy: i64) -> Option<usize> {
        if cx < 0 || cy < 0 || cx as usize >= self.width || cy as usize >= self.height {
            return None;
        }
        Some(cy as usize * self.width + cx as usize)
    }

    /// Index of the cell under a world point, if inside the grid.
    pub fn index_at(&self, x: f64, y: f64) -> Option<usize> {
        let (cx, cy) = self.world_to_cell(x, y);
        self.index(cx, cy)
    }

    /// Visits every in-grid cell whose offset from the cell under `(x, y)`
    /// lies within `radius`, passing the cell index and the offset distance
    /// in world units.
    pub fn for_each_in_radius<F>(&self, x: f64, y: f64, radius: f32, mut f: F)
    where
        F: FnMut(usize, f32),
    {
        if radius.is_nan() || radius <= 0.0 {
            return;
        }
        let (cx, cy) = self.world_to_cell(x, y);
        let reach = (radius as f64 / self.cell_size).ceil() as i64;
        let (x0, x1) = clip_span(cx, reach, self.width);
        let (y0, y1) = clip_span(cy, reach, self.height);
        for gy in y0..=y1 {
            for gx in x0..=x1 {
                let Some(idx) = self.index(gx, gy) else {
                    continue;
                };
                let (dx, dy) = ((gx - cx) as f64, (gy - cy) as f64);
                let distance = ((dx * dx + dy * dy).sqrt() * self.cell_size) as f32;
                if distance <= radius {
                    f(idx, distance);
                }
            }
        }
    }
}

/// `(1 - d/r)^2`, zero outside the radius.
pub fn quadratic_falloff(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 || distance > radius {
        return 0.0;
    }
    let f = 1.0 - distance / radius;
    f * f
}
