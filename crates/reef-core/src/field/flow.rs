use super::noise::Perlin;
use super::LayerGrid;
use crate::config::SimConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use std::f64::consts::PI;

const OFFSET_RANGE: f64 = 5000.0;
const VORTEX_COUNT: usize = 3;

/// Static water current generated once from layered noise.
#[derive(Clone, Debug)]
pub struct FlowField {
    grid: LayerGrid,
    vectors: Vec<[f32; 2]>,
}

impl FlowField {
    pub fn generate(config: &SimConfig) -> Self {
        let grid = LayerGrid::new(&config.bounds, config.layer_cell_size);
        let mut rng = ChaCha12Rng::seed_from_u64(config.seed.wrapping_add(2));
        let perlin = Perlin::new(&mut rng);
        let offsets: [(f64, f64); 6] = std::array::from_fn(|_| {
            (
                rng.random_range(0.0..OFFSET_RANGE),
                rng.random_range(0.0..OFFSET_RANGE),
            )
        });

        let width = grid.width();
        let height = grid.height();
        let max_magnitude = config.flow_max_magnitude as f64;
        let boundary = config.flow_boundary_cells as f64;
        let mut vectors = vec![[0.0f32; 2]; grid.len()];
        vectors.par_iter_mut().enumerate().for_each(|(i, v)| {
            let x = (i % width) as f64;
            let y = (i / width) as f64;
            let mut flow = sample(&perlin, &offsets, x, y, width as f64, height as f64);

            let border = x.min(width as f64 - x).min(y.min(height as f64 - y));
            if boundary > 0.0 && border < boundary {
                let factor = border / boundary;
                flow[0] *= factor;
                flow[1] *= factor;
            }

            let magnitude = flow[0].hypot(flow[1]);
            if magnitude > max_magnitude {
                flow[0] = flow[0] / magnitude * max_magnitude;
                flow[1] = flow[1] / magnitude * max_magnitude;
            }
            *v = [flow[0] as f32, flow[1] as f32];
        });

        Self { grid, vectors }
    }

    /// Uniform current everywhere. Useful for controlled experiments.
    pub fn uniform(config: &SimConfig, vector: [f32; 2]) -> Self {
        let grid = LayerGrid::new(&config.bounds, config.layer_cell_size);
        Self {
            vectors: vec![vector; grid.len()],
            grid,
        }
    }

    pub fn grid(&self) -> &LayerGrid {
        &self.grid
    }

    /// Zero vector outside the grid.
    pub fn vector_at(&self, x: f64, y: f64) -> [f32; 2] {
        self.grid
            .index_at(x, y)
            .map_or([0.0, 0.0], |i| self.vectors[i])
    }

    pub fn magnitude_at(&self, x: f64, y: f64) -> f32 {
        let [fx, fy] = self.vector_at(x, y);
        fx.hypot(fy)
    }
}

/// Circulation, turbulence and eddies from noise, plus a centre spiral and a
/// few fixed vortices, at grid cell `(x, y)`.
fn sample(perlin: &Perlin, offsets: &[(f64, f64); 6], x: f64, y: f64, w: f64, h: f64) -> [f64; 2] {
    let (px1, py1) = ((x + offsets[0].0) * 0.008, (y + offsets[0].1) * 0.008);
    let base_angle = perlin.octaves(px1, py1, 3, 0.6, 1.0) * 2.0 * PI;
    let base_strength = 0.4 + perlin.octaves(px1 + 1000.0, py1 + 1000.0, 2, 0.5, 1.0) * 0.3;
    let mut fx = base_angle.cos() * base_strength;
    let mut fy = base_angle.sin() * base_strength;

    let (px2, py2) = ((x + offsets[1].0) * 0.02, (y + offsets[1].1) * 0.02);
    let turb_angle = perlin.octaves(px2, py2, 4, 0.5, 1.0) * PI;
    let turb_strength = perlin.octaves(px2 + 2000.0, py2 + 2000.0, 3, 0.4, 1.0) * 0.8;
    fx += turb_angle.cos() * turb_strength;
    fy += turb_angle.sin() * turb_strength;

    let (px3, py3) = ((x + offsets[2].0) * 0.05, (y + offsets[2].1) * 0.05);
    let eddy_angle = perlin.octaves(px3, py3, 2, 0.7, 1.0) * PI * 0.5;
    let eddy_strength = perlin.octaves(px3 + 3000.0, py3 + 3000.0, 2, 0.6, 1.0) * 0.6;
    fx += eddy_angle.cos() * eddy_strength;
    fy += eddy_angle.sin() * eddy_strength;

    let (px4, py4) = ((x + offsets[3].0) * 0.003, (y + offsets[3].1) * 0.003);
    let current_bias = perlin.octaves(px4, py4, 2, 0.8, 1.0);
    let (cx, cy) = (w * 0.5, h * 0.5);
    let dist_center = (x - cx).hypot(y - cy);
    let spiral_angle = (y - cy).atan2(x - cx) + dist_center * 0.01;
    let spiral_strength = 0.3 * (-dist_center * 0.002).exp();
    fx += spiral_angle.cos() * spiral_strength * current_bias;
    fy += spiral_angle.sin() * spiral_strength * current_bias;

    for v in 0..VORTEX_COUNT {
        let (ox, oy) = offsets[4 + v % 2];
        let (vx, vy) = (ox * 0.0003 * w, oy * 0.0003 * h);
        let dist = (x - vx).hypot(y - vy);
        if dist > 0.1 {
            let angle = (y - vy).atan2(x - vx) + PI * 0.5;
            let strength = 1.5 * (-dist * 0.01).exp();
            fx += angle.cos() * strength;
            fy += angle.sin() * strength;
        }
    }

    [fx, fy]
}
