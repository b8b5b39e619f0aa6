use super::Ecosystem;
use serde::{Deserialize, Serialize};

/// Wall-clock cost of each phase of one frame, in microseconds.
#[derive(Clone, Debug, Default)]
pub struct StepTimings {
    pub grid_rebuild_us: u64,
    pub forces_us: u64,
    pub growth_us: u64,
    pub integrate_us: u64,
    pub thermal_us: u64,
    pub total_us: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FrameStats {
    pub frame: u64,
    pub node_count: usize,
    pub plant_count: usize,
    pub fish_node_count: usize,
    pub corpse_count: usize,
    pub chain_count: usize,
    pub grown_last_frame: usize,
    pub eligible_last_frame: usize,
    pub nutrition_mean: f32,
    pub nutrition_total_added: f64,
    pub nutrition_total_depleted: f64,
    pub oxygen_mean: f32,
    pub temperature: f32,
    pub bleached_count: usize,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub frames: usize,
    pub sample_every: usize,
    pub final_node_count: usize,
    pub final_chain_count: usize,
    pub samples: Vec<FrameStats>,
    #[serde(default)]
    pub total_grown: usize,
    #[serde(default)]
    pub total_bleached: usize,
    #[serde(default)]
    pub total_chains_retired: usize,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Ecosystem {
    /// Population and field statistics for the current frame.
    pub fn frame_stats(&self) -> FrameStats {
        let mut plant_count = 0;
        let mut fish_node_count = 0;
        let mut corpse_count = 0;
        for (_, node) in self.store.nodes() {
            if node.is_plant() {
                plant_count += 1;
            } else if node.is_fish() {
                fish_node_count += 1;
            } else if node.is_corpse() {
                corpse_count += 1;
            }
        }
        FrameStats {
            frame: self.frame,
            node_count: self.store.node_count(),
            plant_count,
            fish_node_count,
            corpse_count,
            chain_count: self.store.chain_count(),
            grown_last_frame: self.last_growth.grown,
            eligible_last_frame: self.last_growth.eligible,
            nutrition_mean: self.nutrition.mean(),
            nutrition_total_added: self.nutrition.total_added(),
            nutrition_total_depleted: self.nutrition.total_depleted(),
            oxygen_mean: self.oxygen.mean(),
            temperature: self.thermal.temperature(),
            bleached_count: self.thermal.bleached_count(),
        }
    }
}
