use super::{quadratic_falloff, LayerGrid};
use crate::config::SimConfig;
use rayon::prelude::*;

/// A plant producing oxygen this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OxygenSource {
    pub x: f64,
    pub y: f64,
    pub factor: f32,
    pub radius: f32,
}

/// Producer strength at normalised distance `t = d / r`: flat core out to
/// 0.3, cubic drop to 0.75, quartic tail to zero at 1.
pub fn producer_falloff(t: f32) -> f32 {
    if !(0.0..=1.0).contains(&t) {
        0.0
    } else if t < 0.3 {
        1.0 - 0.1 * t / 0.3
    } else if t < 0.75 {
        let s = (t - 0.3) / 0.45;
        0.1 + 0.8 * (1.0 - s).powi(3)
    } else {
        let u = (t - 0.75) / 0.25;
        0.1 * (1.0 - u).powi(4)
    }
}

/// Dissolved oxygen. `current` is what consumers read; `target` is rebuilt
/// from producers each update and `current` is blended toward it.
#[derive(Clone, Debug)]
pub struct OxygenField {
    grid: LayerGrid,
    current: Vec<f32>,
    target: Vec<f32>,
    base: f32,
    rise_rate: f32,
    fall_rate: f32,
    decay: f32,
    max: f32,
}

impl OxygenField {
    pub fn new(config: &SimConfig) -> Self {
        let grid = LayerGrid::new(&config.bounds, config.layer_cell_size);
        let base = config.oxygen_base_level;
        Self {
            current: vec![base; grid.len()],
            target: vec![base; grid.len()],
            grid,
            base,
            rise_rate: config.oxygen_rise_rate,
            fall_rate: config.oxygen_fall_rate,
            decay: config.oxygen_decay_rate,
            max: config.oxygen_max,
        }
    }

    pub fn grid(&self) -> &LayerGrid {
        &self.grid
    }

    pub fn base_level(&self) -> f32 {
        self.base
    }

    pub fn current(&self) -> &[f32] {
        &self.current
    }

    pub fn target(&self) -> &[f32] {
        &self.target
    }

    pub fn level_at(&self, x: f64, y: f64) -> f32 {
        self.grid
            .index_at(x, y)
            .map_or(self.base, |i| self.current[i])
    }

    pub fn add_at(&mut self, x: f64, y: f64, amount: f32, radius: f32) {
        let max = self.max;
        let current = &mut self.current;
        self.grid.for_each_in_radius(x, y, radius, |i, d| {
            current[i] = (current[i] + amount * quadratic_falloff(d, radius)).clamp(0.0, max);
        });
    }

    pub fn deplete_at(&mut self, x: f64, y: f64, amount: f32, radius: f32) {
        let max = self.max;
        let current = &mut self.current;
        self.grid.for_each_in_radius(x, y, radius, |i, d| {
            current[i] = (current[i] - amount * quadratic_falloff(d, radius)).clamp(0.0, max);
        });
    }

    /// Rebuilds the target from `sources` and blends the current grid toward it.
    pub fn update<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = OxygenSource>,
    {
        self.recompute_target(sources);
        self.blend();
    }

    /// Overlapping producers combine by maximum, not by sum.
    pub fn recompute_target<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = OxygenSource>,
    {
        self.target.fill(self.base);
        let base = self.base;
        let max = self.max;
        let target = &mut self.target;
        for src in sources {
            if src.factor <= 0.0 || src.radius <= 0.0 {
                continue;
            }
            self.grid.for_each_in_radius(src.x, src.y, src.radius, |i, d| {
                let value = (base + src.factor * producer_falloff(d / src.radius)).min(max);
                if value > target[i] {
                    target[i] = value;
                }
            });
        }
    }

    /// Fast rise, slow fall plus linear decay that never undershoots the target.
    pub fn blend(&mut self) {
        let (rise, fall, decay, max) = (self.rise_rate, self.fall_rate, self.decay, self.max);
        self.current
            .par_iter_mut()
            .zip(self.target.par_iter())
            .for_each(|(c, &t)| {
                if t > *c {
                    *c += (t - *c) * rise;
                } else {
                    *c += (t - *c) * fall;
                    if *c > t {
                        *c = (*c - decay).max(t);
                    }
                }
                *c = c.clamp(0.0, max);
            });
    }

    pub fn mean(&self) -> f32 {
        if self.current.is_empty() {
            return 0.0;
        }
        (self.current.iter().map(|&v| v as f64).sum::<f64>() / self.current.len() as f64) as f32
    }
}
