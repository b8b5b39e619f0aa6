use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Axis-aligned rectangle the simulation lives in. `top < bottom` (screen-style y axis).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorldBounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl WorldBounds {
    /// Bounds of a `width` x `height` world centred on the origin.
    pub fn centered(width: f64, height: f64) -> Self {
        Self {
            left: -width / 2.0,
            top: -height / 2.0,
            right: width / 2.0,
            bottom: height / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (x.clamp(self.left, self.right), y.clamp(self.top, self.bottom))
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.left + self.right) * 0.5,
            (self.top + self.bottom) * 0.5,
        ]
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::centered(15_000.0, 15_000.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed; sub-streams are derived with `wrapping_add`.
    pub seed: u64,
    pub bounds: WorldBounds,

    /// Edge length of a spatial hash cell in world units.
    pub spatial_cell_size: f64,
    /// Bucket capacity; further insertions into a full cell are dropped.
    pub max_nodes_per_cell: usize,
    /// The spatial grid is rebuilt when `frame % grid_rebuild_interval == 0`.
    pub grid_rebuild_interval: u64,
    /// Edge length of a nutrition/oxygen/flow layer cell.
    pub layer_cell_size: f64,

    pub max_nodes: usize,
    pub max_chains: usize,
    /// How many of the most recently created chains are scanned for duplicates.
    pub chain_duplicate_window: usize,

    pub optimal_distance: f64,
    pub repulsion_force: f64,
    pub chain_force: f64,
    /// Multiplicative velocity damping per frame (< 1).
    pub water_drag: f64,

    pub growth_limit_base: usize,
    pub growth_limit_divisor: usize,
    pub growth_limit_cap: usize,
    /// Radius over which a new branch's nutrition cost is removed from the soil.
    pub growth_depletion_radius: f32,

    pub seed_immunity_frames: u32,
    pub corpse_decay_frames: u32,

    pub nutrition_cap: f32,
    pub nutrition_regen_rate: f32,
    /// Cells regenerate only while below `original * nutrition_regen_threshold`.
    pub nutrition_regen_threshold: f32,
    pub nutrition_out_of_bounds: f32,

    pub oxygen_base_level: f32,
    pub oxygen_rise_rate: f32,
    pub oxygen_fall_rate: f32,
    pub oxygen_decay_rate: f32,
    pub oxygen_max: f32,

    pub flow_max_magnitude: f32,
    /// Width (in layer cells) of the band along the edges where flow fades out.
    pub flow_boundary_cells: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            bounds: WorldBounds::default(),
            spatial_cell_size: 40.0,
            max_nodes_per_cell: 200,
            grid_rebuild_interval: 5,
            layer_cell_size: 30.0,
            max_nodes: 10_000_000,
            max_chains: 10_000_000,
            chain_duplicate_window: 1000,
            optimal_distance: 50.0,
            repulsion_force: 0.05,
            chain_force: 0.05,
            water_drag: 0.95,
            growth_limit_base: 3,
            growth_limit_divisor: 100,
            growth_limit_cap: 50,
            growth_depletion_radius: 120.0,
            seed_immunity_frames: 300,
            corpse_decay_frames: 1800,
            nutrition_cap: 3.0,
            nutrition_regen_rate: 0.0002,
            nutrition_regen_threshold: 0.8,
            nutrition_out_of_bounds: 0.5,
            oxygen_base_level: 0.3,
            oxygen_rise_rate: 0.1,
            oxygen_fall_rate: 0.01,
            oxygen_decay_rate: 0.0008,
            oxygen_max: 2.0,
            flow_max_magnitude: 3.0,
            flow_boundary_cells: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimConfigError {
    InvalidBounds,
    InvalidSpatialCellSize,
    InvalidLayerCellSize,
    ZeroCellCapacity,
    ZeroRebuildInterval,
    ZeroCapacity,
    InvalidOptimalDistance,
    InvalidForce { name: &'static str, value: f64 },
    InvalidDrag(f64),
    ZeroGrowthDivisor,
    InvalidFieldParameter { name: &'static str, value: f32 },
    GridTooLarge { cells: u128, max: usize },
}

impl fmt::Display for SimConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimConfigError::InvalidBounds => {
                write!(f, "world bounds must be finite with left < right and top < bottom")
            }
            SimConfigError::InvalidSpatialCellSize => {
                write!(f, "spatial_cell_size must be positive and finite")
            }
            SimConfigError::InvalidLayerCellSize => {
                write!(f, "layer_cell_size must be positive and finite")
            }
            SimConfigError::ZeroCellCapacity => write!(f, "max_nodes_per_cell must be positive"),
            SimConfigError::ZeroRebuildInterval => {
                write!(f, "grid_rebuild_interval must be positive")
            }
            SimConfigError::ZeroCapacity => write!(f, "max_nodes and max_chains must be positive"),
            SimConfigError::InvalidOptimalDistance => {
                write!(f, "optimal_distance must be positive and finite")
            }
            SimConfigError::InvalidForce { name, value } => {
                write!(f, "{name} ({value}) must be non-negative and finite")
            }
            SimConfigError::InvalidDrag(value) => {
                write!(f, "water_drag ({value}) must lie in [0, 1]")
            }
            SimConfigError::ZeroGrowthDivisor => write!(f, "growth_limit_divisor must be positive"),
            SimConfigError::InvalidFieldParameter { name, value } => {
                write!(f, "{name} ({value}) must be non-negative and finite")
            }
            SimConfigError::GridTooLarge { cells, max } => {
                write!(f, "grid would need {cells} cells, exceeding supported maximum ({max})")
            }
        }
    }
}

impl Error for SimConfigError {}

impl SimConfig {
    /// Upper bound on cells of any single grid (spatial or layer).
    pub const MAX_GRID_CELLS: usize = 64 * 1024 * 1024;

    pub fn validate(&self) -> Result<(), SimConfigError> {
        let b = &self.bounds;
        let finite = [b.left, b.top, b.right, b.bottom]
            .iter()
            .all(|v| v.is_finite());
        if !finite || b.left >= b.right || b.top >= b.bottom {
            return Err(SimConfigError::InvalidBounds);
        }
        if !(self.spatial_cell_size.is_finite() && self.spatial_cell_size > 0.0) {
            return Err(SimConfigError::InvalidSpatialCellSize);
        }
        if !(self.layer_cell_size.is_finite() && self.layer_cell_size > 0.0) {
            return Err(SimConfigError::InvalidLayerCellSize);
        }
        if self.max_nodes_per_cell == 0 {
            return Err(SimConfigError::ZeroCellCapacity);
        }
        if self.grid_rebuild_interval == 0 {
            return Err(SimConfigError::ZeroRebuildInterval);
        }
        if self.max_nodes == 0 || self.max_chains == 0 {
            return Err(SimConfigError::ZeroCapacity);
        }
        if !(self.optimal_distance.is_finite() && self.optimal_distance > 0.0) {
            return Err(SimConfigError::InvalidOptimalDistance);
        }
        for (name, value) in [
            ("repulsion_force", self.repulsion_force),
            ("chain_force", self.chain_force),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimConfigError::InvalidForce { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.water_drag) {
            return Err(SimConfigError::InvalidDrag(self.water_drag));
        }
        if self.growth_limit_divisor == 0 {
            return Err(SimConfigError::ZeroGrowthDivisor);
        }
        for (name, value) in [
            ("growth_depletion_radius", self.growth_depletion_radius),
            ("nutrition_cap", self.nutrition_cap),
            ("nutrition_regen_rate", self.nutrition_regen_rate),
            ("nutrition_regen_threshold", self.nutrition_regen_threshold),
            ("nutrition_out_of_bounds", self.nutrition_out_of_bounds),
            ("oxygen_base_level", self.oxygen_base_level),
            ("oxygen_rise_rate", self.oxygen_rise_rate),
            ("oxygen_fall_rate", self.oxygen_fall_rate),
            ("oxygen_decay_rate", self.oxygen_decay_rate),
            ("oxygen_max", self.oxygen_max),
            ("flow_max_magnitude", self.flow_max_magnitude),
            ("flow_boundary_cells", self.flow_boundary_cells),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimConfigError::InvalidFieldParameter { name, value });
            }
        }
        for cell_size in [self.spatial_cell_size, self.layer_cell_size] {
            let cols = (b.width() / cell_size).ceil() as u128;
            let rows = (b.height() / cell_size).ceil() as u128;
            let cells = cols * rows;
            if cells > Self::MAX_GRID_CELLS as u128 {
                return Err(SimConfigError::GridTooLarge {
                    cells,
                    max: Self::MAX_GRID_CELLS,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let cfg = SimConfig {
            bounds: WorldBounds {
                left: 10.0,
                top: 0.0,
                right: -10.0,
                bottom: 5.0,
            },
            ..SimConfig::default()
        };
        assert_eq!(cfg.validate(), Err(SimConfigError::InvalidBounds));
    }

    #[test]
    fn rejects_drag_above_one() {
        let cfg = SimConfig {
            water_drag: 1.5,
            ..SimConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SimConfigError::InvalidDrag(_))));
    }

    #[test]
    fn rejects_absurd_grid_resolution() {
        let cfg = SimConfig {
            spatial_cell_size: 0.01,
            ..SimConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("exceeding supported maximum"));
    }

    #[test]
    fn clamp_pulls_points_inside() {
        let b = WorldBounds::centered(100.0, 50.0);
        assert_eq!(b.clamp(80.0, -30.0), (50.0, -25.0));
        assert!(b.contains(50.0, 25.0));
        assert!(!b.contains(50.1, 0.0));
    }

    #[test]
    fn config_round_trips_through_json_with_defaults() {
        let cfg: SimConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.grid_rebuild_interval, 5);
    }
}
