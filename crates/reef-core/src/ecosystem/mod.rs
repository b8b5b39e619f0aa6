pub mod metrics;
pub mod stepper;

pub use metrics::*;

use crate::catalog::{Catalog, CatalogError};
use crate::config::{SimConfig, SimConfigError};
use crate::entity::{ChainId, NodeId, NodeKind};
use crate::field::{FlowField, LayerGrid, NutritionField, OxygenField};
use crate::growth::{GrowthEngine, GrowthReport};
use crate::physics::PhysicsEngine;
use crate::store::EntityStore;
use crate::temperature::ThermalStress;
use std::{error::Error, fmt};
use tracing::info;

/// The whole simulated reef: entities, environmental layers and the engines
/// that advance them one frame at a time.
pub struct Ecosystem {
    pub(crate) config: SimConfig,
    pub(crate) store: EntityStore,
    pub(crate) nutrition: NutritionField,
    pub(crate) oxygen: OxygenField,
    pub(crate) flow: FlowField,
    pub(crate) thermal: ThermalStress,
    pub(crate) physics: PhysicsEngine,
    pub(crate) growth: GrowthEngine,
    pub(crate) frame: u64,
    pub(crate) last_growth: GrowthReport,
    pub(crate) total_grown: usize,
    pub(crate) total_bleached: usize,
    pub(crate) total_chains_retired: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EcosystemInitError {
    Config(SimConfigError),
    Catalog(CatalogError),
    LayerShapeMismatch { layer: &'static str },
}

impl fmt::Display for EcosystemInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcosystemInitError::Config(e) => write!(f, "{}", e),
            EcosystemInitError::Catalog(e) => write!(f, "{}", e),
            EcosystemInitError::LayerShapeMismatch { layer } => write!(
                f,
                "{layer} layer does not match the configured bounds and layer_cell_size"
            ),
        }
    }
}

impl From<SimConfigError> for EcosystemInitError {
    fn from(err: SimConfigError) -> Self {
        EcosystemInitError::Config(err)
    }
}

impl From<CatalogError> for EcosystemInitError {
    fn from(err: CatalogError) -> Self {
        EcosystemInitError::Catalog(err)
    }
}

impl Error for EcosystemInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EcosystemInitError::Config(e) => Some(e),
            EcosystemInitError::Catalog(e) => Some(e),
            EcosystemInitError::LayerShapeMismatch { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    InvalidSampleEvery,
    TooManyFrames { max: usize, actual: usize },
    TooManySamples { max: usize, actual: usize },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            ExperimentError::TooManyFrames { max, actual } => {
                write!(f, "frames ({actual}) exceed supported maximum ({max})")
            }
            ExperimentError::TooManySamples { max, actual } => {
                write!(
                    f,
                    "sample count ({actual}) exceeds supported maximum ({max})"
                )
            }
        }
    }
}

impl Error for ExperimentError {}

impl Ecosystem {
    pub const MAX_RUN_FRAMES: usize = 1_000_000;
    pub const MAX_RUN_SAMPLES: usize = 50_000;

    pub fn new(config: SimConfig, catalog: Catalog) -> Self {
        Self::try_new(config, catalog).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Validates the inputs and generates the nutrition terrain and flow
    /// field from `config.seed`.
    pub fn try_new(config: SimConfig, catalog: Catalog) -> Result<Self, EcosystemInitError> {
        config.validate()?;
        catalog.validate()?;
        let nutrition = NutritionField::generate(&config);
        let flow = FlowField::generate(&config);
        Self::assemble(config, catalog, nutrition, flow)
    }

    /// Like [`Ecosystem::try_new`] but with caller-supplied nutrition and
    /// flow layers, which must share the configured layer geometry.
    pub fn try_with_fields(
        config: SimConfig,
        catalog: Catalog,
        nutrition: NutritionField,
        flow: FlowField,
    ) -> Result<Self, EcosystemInitError> {
        config.validate()?;
        catalog.validate()?;
        let expected = LayerGrid::new(&config.bounds, config.layer_cell_size);
        if *nutrition.grid() != expected {
            return Err(EcosystemInitError::LayerShapeMismatch { layer: "nutrition" });
        }
        if *flow.grid() != expected {
            return Err(EcosystemInitError::LayerShapeMismatch { layer: "flow" });
        }
        Self::assemble(config, catalog, nutrition, flow)
    }

    fn assemble(
        config: SimConfig,
        catalog: Catalog,
        nutrition: NutritionField,
        flow: FlowField,
    ) -> Result<Self, EcosystemInitError> {
        let store = EntityStore::new(&config, catalog);
        let oxygen = OxygenField::new(&config);
        info!(
            seed = config.seed,
            grid_cols = store.grid().cols(),
            grid_rows = store.grid().rows(),
            layer_width = oxygen.grid().width(),
            layer_height = oxygen.grid().height(),
            plant_types = store.catalog().plants.len(),
            fish_types = store.catalog().fish.len(),
            "ecosystem initialised"
        );
        Ok(Self {
            thermal: ThermalStress::new(config.seed.wrapping_add(5)),
            physics: PhysicsEngine::new(&config),
            growth: GrowthEngine::new(&config),
            store,
            nutrition,
            oxygen,
            flow,
            config,
            frame: 0,
            last_growth: GrowthReport::default(),
            total_grown: 0,
            total_bleached: 0,
            total_chains_retired: 0,
        })
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        self.store.catalog()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn nutrition(&self) -> &NutritionField {
        &self.nutrition
    }

    pub fn oxygen(&self) -> &OxygenField {
        &self.oxygen
    }

    pub fn flow(&self) -> &FlowField {
        &self.flow
    }

    pub fn thermal(&self) -> &ThermalStress {
        &self.thermal
    }

    pub fn thermal_mut(&mut self) -> &mut ThermalStress {
        &mut self.thermal
    }

    pub fn add_plant(&mut self, x: f64, y: f64, species: usize) -> Option<NodeId> {
        self.store.add_node(x, y, NodeKind::Plant { species })
    }

    /// A plant that fish cannot eat until its immunity runs out.
    pub fn add_seed(&mut self, x: f64, y: f64, species: usize) -> Option<NodeId> {
        self.store.add_seed_node(x, y, species)
    }

    pub fn add_fish_node(&mut self, x: f64, y: f64) -> Option<NodeId> {
        self.store.add_node(x, y, NodeKind::Fish)
    }

    pub fn add_chain(&mut self, a: NodeId, b: NodeId) -> Option<ChainId> {
        self.store.add_chain(a, b)
    }

    pub fn remove_node(&mut self, id: NodeId) -> bool {
        self.store.remove(id)
    }

    pub fn nearest_node(&self, x: f64, y: f64) -> Option<NodeId> {
        self.store.nearest_node(x, y)
    }

    pub fn node_at(&self, x: f64, y: f64, radius: f64) -> Option<NodeId> {
        self.store.node_at(x, y, radius)
    }

    pub fn nutrition_at(&self, x: f64, y: f64) -> f32 {
        self.nutrition.value_at(x, y)
    }

    pub fn oxygen_at(&self, x: f64, y: f64) -> f32 {
        self.oxygen.level_at(x, y)
    }

    pub fn flow_at(&self, x: f64, y: f64) -> [f32; 2] {
        self.flow.vector_at(x, y)
    }

    pub fn flow_magnitude_at(&self, x: f64, y: f64) -> f32 {
        self.flow.magnitude_at(x, y)
    }

    /// Returns the amount actually removed.
    pub fn deplete_nutrition(&mut self, x: f64, y: f64, amount: f32, radius: f32) -> f64 {
        self.nutrition.deplete_at(x, y, amount, radius)
    }

    /// Returns the amount actually added.
    pub fn add_nutrition(&mut self, x: f64, y: f64, amount: f32, radius: f32) -> f64 {
        self.nutrition.add_at(x, y, amount, radius)
    }

    pub fn deplete_oxygen(&mut self, x: f64, y: f64, amount: f32, radius: f32) {
        self.oxygen.deplete_at(x, y, amount, radius);
    }

    pub fn add_oxygen(&mut self, x: f64, y: f64, amount: f32, radius: f32) {
        self.oxygen.add_at(x, y, amount, radius);
    }

    /// Spatial buckets of the 3x3 block around a world point.
    pub fn cells_near(&self, x: f64, y: f64) -> impl Iterator<Item = &[NodeId]> + '_ {
        self.store.grid().cells_near(x, y)
    }

    pub fn cells_near_grid(
        &self,
        gx: i64,
        gy: i64,
        radius: i64,
    ) -> impl Iterator<Item = &[NodeId]> + '_ {
        self.store.grid().cells_near_grid(gx, gy, radius)
    }

    pub fn last_growth(&self) -> GrowthReport {
        self.last_growth
    }

    pub fn run(&mut self, frames: usize, sample_every: usize) -> RunSummary {
        self.try_run(frames, sample_every)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_run(
        &mut self,
        frames: usize,
        sample_every: usize,
    ) -> Result<RunSummary, ExperimentError> {
        self.try_run_with(frames, sample_every, |_| {})
    }

    /// Steps `frames` times, calling `after_step` once per frame after the
    /// core sequence (the place for consumers such as fish), and samples
    /// [`FrameStats`] every `sample_every` frames and on the last one.
    pub fn try_run_with<F>(
        &mut self,
        frames: usize,
        sample_every: usize,
        mut after_step: F,
    ) -> Result<RunSummary, ExperimentError>
    where
        F: FnMut(&mut Ecosystem),
    {
        if sample_every == 0 {
            return Err(ExperimentError::InvalidSampleEvery);
        }
        if frames > Self::MAX_RUN_FRAMES {
            return Err(ExperimentError::TooManyFrames {
                max: Self::MAX_RUN_FRAMES,
                actual: frames,
            });
        }
        let estimated_samples = if frames == 0 {
            0
        } else {
            ((frames - 1) / sample_every) + 1
        };
        if estimated_samples > Self::MAX_RUN_SAMPLES {
            return Err(ExperimentError::TooManySamples {
                max: Self::MAX_RUN_SAMPLES,
                actual: estimated_samples,
            });
        }

        let grown_before = self.total_grown;
        let bleached_before = self.total_bleached;
        let retired_before = self.total_chains_retired;
        let mut samples = Vec::with_capacity(estimated_samples);
        for frame in 1..=frames {
            self.step();
            after_step(self);
            if frame % sample_every == 0 || frame == frames {
                samples.push(self.frame_stats());
            }
        }
        Ok(RunSummary {
            schema_version: 1,
            frames,
            sample_every,
            final_node_count: self.store.node_count(),
            final_chain_count: self.store.chain_count(),
            samples,
            total_grown: self.total_grown - grown_before,
            total_bleached: self.total_bleached - bleached_before,
            total_chains_retired: self.total_chains_retired - retired_before,
        })
    }
}
