use super::Fish;
use crate::catalog::FishType;
use crate::ecosystem::Ecosystem;
use std::f64::consts::TAU;

pub const NUTRITION_RAYS: usize = 12;
pub const VISION_SECTORS: usize = 12;
const RAY_SAMPLES: usize = 3;

/// Everything a controller gets to see about one fish for one frame.
///
/// Rays and sectors are laid out counter-clockwise from +x in world space.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// Ambient oxygen at the fish.
    pub oxygen: f32,
    /// The fish's own oxygen reserve.
    pub oxygen_reserve: f32,
    pub hunger: f32,
    pub stomach: f32,
    pub energy: f32,
    pub local_nutrition: f32,
    /// Mean nutrition sampled along each chemoreceptor ray.
    pub nutrition_rays: [f32; NUTRITION_RAYS],
    /// Distance to the nearest plant per sector over the field of view; 1.0
    /// when the sector is empty.
    pub vision: [f32; VISION_SECTORS],
    pub flow: [f32; 2],
}

impl Observation {
    /// Unit vector of nutrition ray `k`.
    pub fn ray_direction(k: usize) -> [f64; 2] {
        let angle = k as f64 * TAU / NUTRITION_RAYS as f64;
        [angle.cos(), angle.sin()]
    }

    pub(crate) fn gather(eco: &Ecosystem, fish: &Fish, ft: &FishType, [x, y]: [f64; 2]) -> Self {
        let mut nutrition_rays = [0.0f32; NUTRITION_RAYS];
        for (k, ray) in nutrition_rays.iter_mut().enumerate() {
            let [dx, dy] = Self::ray_direction(k);
            let mut sum = 0.0;
            for s in 1..=RAY_SAMPLES {
                let reach = ft.chemoreceptor_range * s as f64 / RAY_SAMPLES as f64;
                sum += eco.nutrition_at(x + dx * reach, y + dy * reach);
            }
            *ray = sum / RAY_SAMPLES as f32;
        }

        Self {
            oxygen: eco.oxygen_at(x, y),
            oxygen_reserve: fish.oxygen,
            hunger: fish.hunger,
            stomach: fish.stomach,
            energy: fish.energy,
            local_nutrition: eco.nutrition_at(x, y),
            nutrition_rays,
            vision: vision(eco, x, y, ft.fov_range),
            flow: eco.flow_at(x, y),
        }
    }

    /// Index of the richest nutrition ray; the first on ties.
    pub fn richest_ray(&self) -> usize {
        let mut best = 0;
        for (k, &v) in self.nutrition_rays.iter().enumerate() {
            if v > self.nutrition_rays[best] {
                best = k;
            }
        }
        best
    }
}

fn vision(eco: &Ecosystem, x: f64, y: f64, fov: f64) -> [f32; VISION_SECTORS] {
    let mut sectors = [1.0f32; VISION_SECTORS];
    if fov.is_nan() || fov <= 0.0 {
        return sectors;
    }
    let grid = eco.store().grid();
    let (gx, gy) = grid.world_to_grid(x, y);
    let reach = (fov / grid.cell_size()).ceil() as i64;
    let fov_sq = fov * fov;
    for id in eco
        .cells_near_grid(gx, gy, reach)
        .flat_map(|cell| cell.iter().copied())
    {
        let Some(node) = eco.store().node(id) else {
            continue;
        };
        if !node.is_plant() {
            continue;
        }
        let dx = node.position[0] - x;
        let dy = node.position[1] - y;
        let d_sq = dx * dx + dy * dy;
        if d_sq == 0.0 || d_sq > fov_sq {
            continue;
        }
        let angle = dy.atan2(dx).rem_euclid(TAU);
        let sector = (angle / TAU * VISION_SECTORS as f64) as usize % VISION_SECTORS;
        let normalized = (d_sq.sqrt() / fov) as f32;
        if normalized < sectors[sector] {
            sectors[sector] = normalized;
        }
    }
    sectors
}
