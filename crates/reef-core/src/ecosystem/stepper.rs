use super::{Ecosystem, StepTimings};
use std::time::Instant;
use tracing::debug;

impl Ecosystem {
    /// Advances the world by one frame.
    ///
    /// Order: frame counter and seed immunity, periodic grid rebuild,
    /// repulsion and chain forces, growth (which first regenerates nutrition
    /// and refreshes oxygen), integration with chain ageing, then thermal
    /// bleaching. Fish and other consumers update after this returns.
    pub fn step(&mut self) -> StepTimings {
        let total_start = Instant::now();
        self.frame += 1;
        self.store.tick_seed_immunity();

        let t0 = Instant::now();
        if self.frame % self.config.grid_rebuild_interval == 0 {
            self.store.rebuild_grid();
        }
        let grid_rebuild_us = t0.elapsed().as_micros() as u64;

        let t1 = Instant::now();
        self.physics.apply_forces(&mut self.store);
        let forces_us = t1.elapsed().as_micros() as u64;

        let t2 = Instant::now();
        self.last_growth = self.growth.grow(
            &mut self.store,
            &mut self.nutrition,
            &mut self.oxygen,
            &self.thermal,
        );
        self.total_grown += self.last_growth.grown;
        let growth_us = t2.elapsed().as_micros() as u64;

        let t3 = Instant::now();
        let retired = self.physics.integrate(&mut self.store);
        self.total_chains_retired += retired;
        if retired > 0 {
            debug!(frame = self.frame, retired, "dangling chains retired");
        }
        let integrate_us = t3.elapsed().as_micros() as u64;

        let t4 = Instant::now();
        self.total_bleached += self.thermal.process(&self.store);
        let thermal_us = t4.elapsed().as_micros() as u64;

        StepTimings {
            grid_rebuild_us,
            forces_us,
            growth_us,
            integrate_us,
            thermal_us,
            total_us: total_start.elapsed().as_micros() as u64,
        }
    }
}
