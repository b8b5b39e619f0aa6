use serde::{Deserialize, Serialize};
use std::{error::Error, fmt};

/// Growth, physics and oxygen coefficients of one plant species.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlantType {
    pub name: String,
    pub growth_probability: f32,
    pub growth_attempts: u32,
    pub max_branches: u32,
    pub branch_distance: f64,
    /// 0 = immovable, 1 = fully responsive to forces.
    pub mobility_factor: f64,
    pub age_mature: u32,
    pub nutrition_depletion_strength: f32,
    pub oxygen_production_factor: f32,
    pub oxygen_production_radius: f32,
    /// Scales the random bend of chains grown by this species.
    pub curvature: f32,
    /// Corals are the only species subject to thermal bleaching.
    pub is_coral: bool,
}

impl Default for PlantType {
    fn default() -> Self {
        Self {
            name: String::from("Kelp"),
            growth_probability: 0.02,
            growth_attempts: 5,
            max_branches: 3,
            branch_distance: 50.0,
            mobility_factor: 1.0,
            age_mature: 1800,
            nutrition_depletion_strength: 0.08,
            oxygen_production_factor: 0.2,
            oxygen_production_radius: 80.0,
            curvature: 1.0,
            is_coral: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FishType {
    pub name: String,
    pub max_speed: f64,
    /// Fraction of the gap to the desired velocity closed per frame.
    pub acceleration: f64,
    pub eating_range: f64,
    /// Per-frame probability of attempting to eat.
    pub eating_rate: f32,
    pub defecation_radius: f32,
    pub fov_range: f64,
    pub chemoreceptor_range: f64,
    pub oxygen_consumption_rate: f32,
    pub oxygen_refill_rate: f32,
    pub flow_sensitivity: f64,
    pub energy_decay: f32,
    /// Frames until death of old age; 0 disables ageing.
    pub max_age: u32,
}

impl Default for FishType {
    fn default() -> Self {
        Self {
            name: String::from("Herbivore"),
            max_speed: 8.0,
            acceleration: 1.0,
            eating_range: 80.0,
            eating_rate: 0.01,
            defecation_radius: 60.0,
            fov_range: 200.0,
            chemoreceptor_range: 150.0,
            oxygen_consumption_rate: 0.0004,
            oxygen_refill_rate: 0.003,
            flow_sensitivity: 0.3,
            energy_decay: 0.0002,
            max_age: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    EmptyPlantCatalog,
    InvalidPlantType { index: usize, reason: &'static str },
    InvalidFishType { index: usize, reason: &'static str },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::EmptyPlantCatalog => write!(f, "catalog must define at least one plant type"),
            CatalogError::InvalidPlantType { index, reason } => {
                write!(f, "plant type {index}: {reason}")
            }
            CatalogError::InvalidFishType { index, reason } => {
                write!(f, "fish type {index}: {reason}")
            }
        }
    }
}

impl Error for CatalogError {}

/// Read-only species tables keyed by small integer index.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Catalog {
    pub plants: Vec<PlantType>,
    pub fish: Vec<FishType>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            plants: vec![
                PlantType::default(),
                PlantType {
                    name: String::from("Seagrass"),
                    growth_probability: 0.03,
                    growth_attempts: 4,
                    max_branches: 2,
                    branch_distance: 40.0,
                    mobility_factor: 0.8,
                    nutrition_depletion_strength: 0.05,
                    oxygen_production_factor: 0.15,
                    oxygen_production_radius: 60.0,
                    curvature: 1.4,
                    ..PlantType::default()
                },
                PlantType {
                    name: String::from("Brain Coral"),
                    growth_probability: 0.01,
                    growth_attempts: 3,
                    max_branches: 4,
                    branch_distance: 35.0,
                    mobility_factor: 0.05,
                    age_mature: 3600,
                    nutrition_depletion_strength: 0.12,
                    oxygen_production_factor: 0.3,
                    oxygen_production_radius: 100.0,
                    curvature: 0.3,
                    is_coral: true,
                    ..PlantType::default()
                },
            ],
            fish: vec![FishType::default()],
        }
    }
}

impl Catalog {
    pub fn plant(&self, species: usize) -> Option<&PlantType> {
        self.plants.get(species)
    }

    pub fn fish_type(&self, index: usize) -> Option<&FishType> {
        self.fish.get(index)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.plants.is_empty() {
            return Err(CatalogError::EmptyPlantCatalog);
        }
        for (index, pt) in self.plants.iter().enumerate() {
            let reason = if !(pt.branch_distance.is_finite() && pt.branch_distance > 0.0) {
                Some("branch_distance must be positive")
            } else if !(0.0..=1.0).contains(&pt.mobility_factor) {
                Some("mobility_factor must lie in [0, 1]")
            } else if !(pt.growth_probability.is_finite() && pt.growth_probability >= 0.0) {
                Some("growth_probability must be non-negative")
            } else if !(pt.oxygen_production_radius.is_finite()
                && pt.oxygen_production_radius >= 0.0)
            {
                Some("oxygen_production_radius must be non-negative")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(CatalogError::InvalidPlantType { index, reason });
            }
        }
        for (index, ft) in self.fish.iter().enumerate() {
            let reason = if !(ft.max_speed.is_finite() && ft.max_speed >= 0.0) {
                Some("max_speed must be non-negative")
            } else if !(0.0..=1.0).contains(&ft.acceleration) {
                Some("acceleration must lie in [0, 1]")
            } else if !(ft.eating_range.is_finite() && ft.eating_range >= 0.0) {
                Some("eating_range must be non-negative")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(CatalogError::InvalidFishType { index, reason });
            }
        }
        Ok(())
    }
}
