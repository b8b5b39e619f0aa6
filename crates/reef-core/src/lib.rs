pub mod catalog;
pub mod config;
pub mod ecosystem;
pub mod entity;
pub mod field;
pub mod fish;
pub mod growth;
pub mod physics;
pub mod spatial;
pub mod store;
pub mod temperature;

pub use catalog::{Catalog, CatalogError, FishType, PlantType};
pub use config::{SimConfig, SimConfigError, WorldBounds};
pub use ecosystem::{
    Ecosystem, EcosystemInitError, ExperimentError, FrameStats, RunSummary, StepTimings,
};
pub use entity::{Chain, ChainId, Node, NodeId, NodeKind};
pub use field::{FlowField, NutritionField, OxygenField};
pub use fish::{Action, Fish, FishController, Observation, School, SchoolReport};
pub use growth::{growth_modifier, nutrition_cost, GrowthEngine, GrowthReport};
pub use physics::PhysicsEngine;
pub use spatial::SpatialGrid;
pub use store::EntityStore;
pub use temperature::{BleachingOracle, NoBleaching, ThermalStress};
