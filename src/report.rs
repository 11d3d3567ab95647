//! Run summaries for the headless driver
//!
//! Collects per-tick statistics and writes a RON summary at the end of a run.

use std::path::Path;

use anyhow::{Context, Result};
use raahn_core::{EntityType, MoveOutcome, Simulation};
use serde::{Deserialize, Serialize};

/// Aggregate statistics of one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub blocked_moves: u64,
    pub ticks_on_road: u64,
    pub distance_travelled: f64,
    pub final_position: (f64, f64),
    pub final_heading: f64,
    pub signals: Vec<f64>,
}

impl RunSummary {
    /// Account for one tick that just finished
    pub fn record(&mut self, simulation: &Simulation, outcome: MoveOutcome) {
        self.ticks += 1;
        match outcome {
            MoveOutcome::Moved => {
                self.distance_travelled += simulation.car().velocity().length();
            }
            MoveOutcome::Blocked { .. } => self.blocked_moves += 1,
        }
        if simulation.car().is_hovering(EntityType::Road) {
            self.ticks_on_road += 1;
        }

        let pose = simulation.pose();
        self.final_position = (pose.center.x, pose.center.y);
        self.final_heading = pose.heading;
        self.signals = simulation
            .car()
            .brain()
            .signals()
            .iter()
            .map(|(_, value)| value)
            .collect();
    }

    /// One-line progress report
    pub fn log_progress(&self, simulation: &Simulation) {
        let car = simulation.car();
        let readings: Vec<String> = car
            .sensor_vector()
            .iter()
            .map(|value| format!("{:.2}", value))
            .collect();
        let hovering: Vec<String> = car
            .entities_hovering()
            .iter()
            .map(|entity| entity.kind().to_string())
            .collect();

        log::info!(
            "tick {:>6} | pos ({:>8.1}, {:>8.1}) heading {:>5.1} | blocked {:>4} | sensors [{}] | hovering [{}] | signals {:?}",
            self.ticks,
            self.final_position.0,
            self.final_position.1,
            self.final_heading,
            self.blocked_moves,
            readings.join(", "),
            hovering.join(", "),
            self.signals
        );
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let ron = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("Failed to serialize run summary")?;
        std::fs::write(path, ron)
            .with_context(|| format!("Failed to write run summary: {}", path.display()))?;

        log::info!("Summary written: {}", path.display());
        Ok(())
    }
}
