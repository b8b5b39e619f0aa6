use super::noise::{smoothstep, Perlin};
use super::{quadratic_falloff, LayerGrid};
use crate::config::SimConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;

/// `(octaves, persistence, scale, weight)` of the summed terrain layers.
const TERRAIN_LAYERS: [(u32, f64, f64, f64); 4] = [
    (4, 0.6, 0.005, 1.0),
    (6, 0.5, 0.02, 0.4),
    (4, 0.4, 0.08, 0.3),
    (2, 0.3, 0.2, 0.2),
];
const TERRAIN_JITTER: f32 = 0.3;
const BLUR_PASSES: usize = 2;
const BLUR_SIGMA_SQ: f64 = 1.0;

/// Soil nutrition. Keeps the generated terrain as a ceiling for regeneration
/// and tracks how much has been added and removed through point operations.
#[derive(Clone, Debug)]
pub struct NutritionField {
    grid: LayerGrid,
    values: Vec<f32>,
    original: Vec<f32>,
    cap: f32,
    regen_rate: f32,
    regen_threshold: f32,
    out_of_bounds: f32,
    total_added: f64,
    total_depleted: f64,
}

impl NutritionField {
    /// Procedural terrain seeded from `config.seed`.
    pub fn generate(config: &SimConfig) -> Self {
        let grid = LayerGrid::new(&config.bounds, config.layer_cell_size);
        let mut rng = ChaCha12Rng::seed_from_u64(config.seed.wrapping_add(1));
        let perlin = Perlin::new(&mut rng);
        let offsets: Vec<(f64, f64)> = TERRAIN_LAYERS
            .iter()
            .map(|_| (rng.random_range(0.0..1000.0), rng.random_range(0.0..1000.0)))
            .collect();
        let jitter: Vec<f32> = (0..grid.len())
            .map(|_| (rng.random::<f32>() - 0.5) * TERRAIN_JITTER)
            .collect();

        let width = grid.width();
        let mut values = vec![0.0f32; grid.len()];
        values.par_iter_mut().enumerate().for_each(|(i, v)| {
            let x = (i % width) as f64;
            let y = (i / width) as f64;
            let mut sum = 0.0;
            for (&(octaves, persistence, scale, weight), &(ox, oy)) in
                TERRAIN_LAYERS.iter().zip(offsets.iter())
            {
                sum += perlin.octaves(x + ox, y + oy, octaves, persistence, scale) * weight;
            }
            let value = ((sum + 1.0) * 0.5) as f32 + jitter[i];
            *v = ((value - 0.5) * 2.0 + 0.5).clamp(0.0, 1.0);
        });

        normalize(&mut values);
        for v in values.iter_mut() {
            *v = smoothstep(*v);
        }
        for _ in 0..BLUR_PASSES {
            values = blur3x3(&values, width, grid.height());
        }

        Self::from_values(config, grid, values)
    }

    /// Every cell at `value`. Useful for controlled experiments.
    pub fn uniform(config: &SimConfig, value: f32) -> Self {
        let grid = LayerGrid::new(&config.bounds, config.layer_cell_size);
        let values = vec![value.clamp(0.0, config.nutrition_cap); grid.len()];
        Self::from_values(config, grid, values)
    }

    fn from_values(config: &SimConfig, grid: LayerGrid, values: Vec<f32>) -> Self {
        Self {
            grid,
            original: values.clone(),
            values,
            cap: config.nutrition_cap,
            regen_rate: config.nutrition_regen_rate,
            regen_threshold: config.nutrition_regen_threshold,
            out_of_bounds: config.nutrition_out_of_bounds,
            total_added: 0.0,
            total_depleted: 0.0,
        }
    }

    pub fn grid(&self) -> &LayerGrid {
        &self.grid
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The post-processed terrain regeneration is capped at.
    pub fn original(&self) -> &[f32] {
        &self.original
    }

    pub fn value_at(&self, x: f64, y: f64) -> f32 {
        self.grid
            .index_at(x, y)
            .map_or(self.out_of_bounds, |i| self.values[i])
    }

    /// Removes `amount` with quadratic falloff over `radius`. Returns the
    /// amount actually removed after clamping at zero.
    pub fn deplete_at(&mut self, x: f64, y: f64, amount: f32, radius: f32) -> f64 {
        let cap = self.cap;
        let values = &mut self.values;
        let mut removed = 0.0f64;
        self.grid.for_each_in_radius(x, y, radius, |i, d| {
            let old = values[i];
            let new = (old - amount * quadratic_falloff(d, radius)).clamp(0.0, cap);
            values[i] = new;
            removed += old as f64 - new as f64;
        });
        self.total_depleted += removed;
        removed
    }

    /// Adds `amount` with quadratic falloff over `radius`. Returns the amount
    /// actually added after clamping at the cap.
    pub fn add_at(&mut self, x: f64, y: f64, amount: f32, radius: f32) -> f64 {
        let cap = self.cap;
        let values = &mut self.values;
        let mut added = 0.0f64;
        self.grid.for_each_in_radius(x, y, radius, |i, d| {
            let old = values[i];
            let new = (old + amount * quadratic_falloff(d, radius)).clamp(0.0, cap);
            values[i] = new;
            added += new as f64 - old as f64;
        });
        self.total_added += added;
        added
    }

    /// Nudges cells depleted below the threshold back toward their original
    /// value, never past it.
    pub fn regenerate(&mut self) {
        let rate = self.regen_rate;
        let threshold = self.regen_threshold;
        self.values
            .par_iter_mut()
            .zip(self.original.par_iter())
            .for_each(|(v, &orig)| {
                if *v < orig * threshold {
                    *v = (*v + rate).min(orig);
                }
            });
    }

    pub fn total_added(&self) -> f64 {
        self.total_added
    }

    pub fn total_depleted(&self) -> f64 {
        self.total_depleted
    }

    /// Sum of all cells.
    pub fn total(&self) -> f64 {
        self.values.iter().map(|&v| v as f64).sum()
    }

    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        (self.total() / self.values.len() as f64) as f32
    }
}

fn normalize(values: &mut [f32]) {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    if range > 0.0 {
        for v in values.iter_mut() {
            *v = (*v - min) / range;
        }
    }
}

fn blur3x3(values: &[f32], width: usize, height: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; values.len()];
    out.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        for (x, cell) in row.iter_mut().enumerate() {
            let mut sum = 0.0f64;
            let mut weight_sum = 0.0f64;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                        continue;
                    }
                    let d_sq = (dx * dx + dy * dy) as f64;
                    let w = (-d_sq / (2.0 * BLUR_SIGMA_SQ)).exp();
                    sum += values[ny as usize * width + nx as usize] as f64 * w;
                    weight_sum += w;
                }
            }
            *cell = (sum / weight_sum) as f32;
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldBounds;

    fn config() -> SimConfig {
        SimConfig {
            bounds: WorldBounds::centered(900.0, 600.0),
            ..SimConfig::default()
        }
    }

    #[test]
    fn generated_terrain_is_normalised_and_reproducible() {
        let a = NutritionField::generate(&config());
        let b = NutritionField::generate(&config());
        assert_eq!(a.values(), b.values());
        assert!(a.values().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(a.values(), a.original());

        let other = NutritionField::generate(&SimConfig {
            seed: 1234,
            ..config()
        });
        assert_ne!(a.values(), other.values());
    }

    #[test]
    fn out_of_bounds_reads_sentinel() {
        let field = NutritionField::uniform(&config(), 0.9);
        assert_eq!(field.value_at(0.0, 0.0), 0.9);
        assert_eq!(field.value_at(10_000.0, 0.0), 0.5);
    }

    #[test]
    fn deplete_clamps_at_zero_and_reports_actual_amount() {
        let mut field = NutritionField::uniform(&config(), 0.1);
        let removed = field.deplete_at(0.0, 0.0, 5.0, 30.0);
        assert_eq!(field.value_at(0.0, 0.0), 0.0);
        // Centre cell plus four edge neighbours at falloff 0.
        assert!((removed - 0.1f32 as f64).abs() < 1e-9);
        assert_eq!(field.total_depleted(), removed);
    }

    #[test]
    fn add_clamps_at_cap() {
        let mut field = NutritionField::uniform(&config(), 2.9);
        let added = field.add_at(0.0, 0.0, 1.0, 10.0);
        assert_eq!(field.value_at(0.0, 0.0), 3.0);
        assert!((added - (3.0f64 - 2.9f32 as f64)).abs() < 1e-6);
    }

    #[test]
    fn regeneration_is_capped_by_original() {
        let mut field = NutritionField::uniform(&config(), 0.5);
        field.deplete_at(0.0, 0.0, 0.5, 10.0);
        assert_eq!(field.value_at(0.0, 0.0), 0.0);
        field.regenerate();
        assert!((field.value_at(0.0, 0.0) - 0.0002).abs() < 1e-7);
        for _ in 0..5000 {
            field.regenerate();
        }
        // Regeneration stops once the cell is back above 80% of the original.
        let v = field.value_at(0.0, 0.0);
        assert!(v >= 0.4 && v <= 0.5, "{v}");
    }

    #[test]
    fn mild_depletion_does_not_regenerate() {
        let mut field = NutritionField::uniform(&config(), 0.5);
        field.deplete_at(0.0, 0.0, 0.05, 10.0);
        let before = field.value_at(0.0, 0.0);
        field.regenerate();
        assert_eq!(field.value_at(0.0, 0.0), before);
    }
}
