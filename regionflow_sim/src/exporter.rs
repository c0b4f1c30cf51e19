//! JSON exporter for scenario results.
//!
//! Writes the records a real job would persist (cells, borders, shipments)
//! next to the scenario's verdict, for inspection or plotting.

use crate::error::SimError;
use crate::runner::ScenarioMetrics;
use nalgebra::{DMatrix, DVector};
use regionflow_core::metrics::{trip_length_distribution, TripLengthBin};
use regionflow_core::{BorderRecord, CellRecord, GravityResult, IterationTrace, RasOutcome};
use regionflow_env::RunId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Bands in an exported trip length distribution.
const TRIP_LENGTH_BINS: usize = 10;

/// Records of one RAS job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasExport {
    pub run_id: RunId,
    pub iterations: usize,
    pub converged: bool,
    pub cells: Vec<CellRecord>,
    pub rows: Vec<BorderRecord>,
    pub cols: Vec<BorderRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub trace: Vec<IterationTrace>,
}

impl From<&RasOutcome> for RasExport {
    fn from(outcome: &RasOutcome) -> Self {
        Self {
            run_id: outcome.run_id,
            iterations: outcome.result.iterations,
            converged: outcome.result.converged,
            cells: outcome.cells.clone(),
            rows: outcome.rows.clone(),
            cols: outcome.cols.clone(),
            trace: outcome.result.trace.clone(),
        }
    }
}

/// Output of one gravity solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GravityExport {
    pub run_id: RunId,
    pub rounds: usize,
    pub residual: f64,
    pub shipments: DMatrix<f64>,
    pub origin_factors: DVector<f64>,
    pub destination_factors: DVector<f64>,
    pub trip_lengths: Vec<TripLengthBin>,
}

impl GravityExport {
    pub fn new(result: &GravityResult, impedance: &DMatrix<f64>) -> Self {
        let longest = impedance
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(0.0, f64::max);
        let width = longest / TRIP_LENGTH_BINS as f64;

        Self {
            run_id: result.run_id,
            rounds: result.rounds,
            residual: result.residual,
            shipments: result.shipments.clone(),
            origin_factors: result.origin_factors.clone(),
            destination_factors: result.destination_factors.clone(),
            trip_lengths: trip_length_distribution(&result.shipments, impedance, width, TRIP_LENGTH_BINS),
        }
    }
}

/// Complete scenario export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    pub metrics: ScenarioMetrics,

    /// RAS jobs in the order they ran
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ras: Vec<RasExport>,

    /// Gravity solves in the order they ran
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub gravity: Vec<GravityExport>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            passed: false,
            failure_reason: None,
            metrics: ScenarioMetrics::default(),
            ras: Vec::new(),
            gravity: Vec::new(),
        }
    }

    pub fn add_ras(&mut self, outcome: &RasOutcome) {
        self.ras.push(RasExport::from(outcome));
    }

    pub fn add_gravity(&mut self, result: &GravityResult, impedance: &DMatrix<f64>) {
        self.gravity.push(GravityExport::new(result, impedance));
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>, metrics: ScenarioMetrics) {
        self.passed = passed;
        self.failure_reason = failure_reason;
        self.metrics = metrics;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
