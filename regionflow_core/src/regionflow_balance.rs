//! The "BALANCE" Engine - RAS / Iterative Proportional Fitting
//!
//! Adjusts a non-negative seed matrix so its row and column sums reproduce
//! externally supplied border totals, while keeping the seed's cross-ratio
//! structure: in the limit the result is `diag(R) * M * diag(S)` for positive
//! diagonal scalings `R`, `S`.
//!
//! Negative entries never enter the loop. They are split off by
//! [`crate::freeze`] and added back after scaling.

use crate::config::RasConfig;
use crate::error::{BalanceError, Location};
use crate::freeze::{freeze_negatives, FrozenSplit};
use crate::margins::{
    col_sums, first_negative, first_non_finite, max_abs_diff, ratio_or_one, row_sums, scale_outer,
};
use crate::records::{border_records, cell_records, BorderRecord, CellRecord};
use crate::validation::{validate_split, QcPolicy, QcReport};
use nalgebra::{DMatrix, DVector};
use regionflow_env::{EnvError, RunId, SolveContext, Unbounded};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// Why the iteration loop stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Termination {
    /// Both errors fell below epsilon
    Converged,
    /// `max_iterations` ran out first; the matrix is a best-effort result
    IterationCap,
    /// The solve context asked the loop to stop
    Interrupted(String),
}

impl Termination {
    pub(crate) fn interrupted(err: &EnvError) -> Self {
        Termination::Interrupted(err.to_string())
    }
}

/// One line of the optional per-iteration trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationTrace {
    /// 1-based iteration number
    pub iteration: usize,
    pub row_error: f64,
    pub col_error: f64,
}

/// Output of a RAS run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceResult {
    /// Scaled matrix plus the frozen matrix
    pub balanced: DMatrix<f64>,

    /// The scaled part alone (no frozen values)
    pub scaled: DMatrix<f64>,

    /// Number of completed iterations
    pub iterations: usize,

    /// True when both errors are below epsilon
    pub converged: bool,

    /// `max |r - row_sums(scaled)|` after the last iteration
    pub row_error: f64,

    /// `max |c - col_sums(scaled)|` after the last iteration
    pub col_error: f64,

    pub termination: Termination,

    /// Product of all row multipliers applied, so that
    /// `scaled == diag(row_scaling) * seed * diag(col_scaling)`
    pub row_scaling: DVector<f64>,

    /// Product of all column multipliers applied
    pub col_scaling: DVector<f64>,

    /// Per-iteration errors; empty unless tracing was enabled
    pub trace: Vec<IterationTrace>,
}

/// RAS balancer configured with an iteration cap and tolerance.
#[derive(Debug, Clone)]
pub struct RasBalancer {
    config: RasConfig,
}

impl RasBalancer {
    /// Creates a balancer, rejecting a nonsensical configuration.
    pub fn new(config: RasConfig) -> Result<Self, BalanceError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RasConfig {
        &self.config
    }

    /// Balances `matrix` to `row_totals` / `col_totals`, then adds `frozen`.
    pub fn balance(
        &self,
        matrix: &DMatrix<f64>,
        row_totals: &DVector<f64>,
        col_totals: &DVector<f64>,
        frozen: &DMatrix<f64>,
    ) -> Result<ConvergenceResult, BalanceError> {
        self.balance_with_context(matrix, row_totals, col_totals, frozen, &Unbounded)
    }

    /// As [`RasBalancer::balance`], checking `ctx` once per iteration.
    pub fn balance_with_context<C: SolveContext + ?Sized>(
        &self,
        matrix: &DMatrix<f64>,
        row_totals: &DVector<f64>,
        col_totals: &DVector<f64>,
        frozen: &DMatrix<f64>,
        ctx: &C,
    ) -> Result<ConvergenceResult, BalanceError> {
        check_inputs(matrix, row_totals, col_totals, frozen)?;

        let (nrows, ncols) = matrix.shape();
        let epsilon = self.config.epsilon;
        let mut result = matrix.clone();
        let ones_rows = DVector::from_element(nrows, 1.0);
        let ones_cols = DVector::from_element(ncols, 1.0);
        let mut row_scaling = ones_rows.clone();
        let mut col_scaling = ones_cols.clone();
        let mut trace_log = Vec::new();
        let mut row_error = max_abs_diff(row_totals, &row_sums(&result));
        let mut col_error = max_abs_diff(col_totals, &col_sums(&result));
        let mut iterations = 0;
        let mut termination = Termination::IterationCap;

        for iteration in 1..=self.config.max_iterations {
            if let Err(e) = ctx.check() {
                termination = Termination::interrupted(&e);
                break;
            }

            // Row multipliers from the current sums, 1 on empty rows
            let r = ratio_or_one(row_totals, &row_sums(&result));
            scale_outer(&mut result, &r, &ones_cols);

            // Column multipliers from the row-scaled sums, 1 on empty columns
            let s = ratio_or_one(col_totals, &col_sums(&result));
            scale_outer(&mut result, &ones_rows, &s);

            row_scaling.component_mul_assign(&r);
            col_scaling.component_mul_assign(&s);

            // Errors against the targets
            row_error = max_abs_diff(row_totals, &row_sums(&result));
            col_error = max_abs_diff(col_totals, &col_sums(&result));
            iterations = iteration;

            trace!(iteration, row_error, col_error, "ras iteration");
            if self.config.record_trace {
                trace_log.push(IterationTrace {
                    iteration,
                    row_error,
                    col_error,
                });
            }

            // Stop once both errors are inside the tolerance
            if row_error < epsilon && col_error < epsilon {
                termination = Termination::Converged;
                break;
            }
        }

        let converged = termination == Termination::Converged;
        match &termination {
            Termination::Converged => {
                info!(iterations, row_error, col_error, "RAS completed, threshold reached");
            }
            Termination::IterationCap => {
                warn!(iterations, row_error, col_error, epsilon, "RAS completed, max iterations reached");
            }
            Termination::Interrupted(reason) => {
                warn!(iterations, row_error, col_error, %reason, "RAS interrupted");
            }
        }

        // Frozen values go back in unchanged
        let balanced = &result + frozen;

        Ok(ConvergenceResult {
            balanced,
            scaled: result,
            iterations,
            converged,
            row_error,
            col_error,
            termination,
            row_scaling,
            col_scaling,
            trace: trace_log,
        })
    }

    /// Full pipeline for one job: freeze, validate, balance, build records.
    pub fn run_job(&self, job: &RasJob) -> Result<RasOutcome, BalanceError> {
        self.run_job_with_context(job, &Unbounded)
    }

    /// As [`RasBalancer::run_job`], checking `ctx` once per iteration.
    pub fn run_job_with_context<C: SolveContext + ?Sized>(
        &self,
        job: &RasJob,
        ctx: &C,
    ) -> Result<RasOutcome, BalanceError> {
        debug!(
            run = %job.run_id,
            rows = job.matrix.nrows(),
            cols = job.matrix.ncols(),
            seed = ctx.seed(),
            "starting RAS job"
        );

        let mut split = freeze_negatives(&job.matrix, &job.row_totals, &job.col_totals);
        if let Some(adhoc) = &job.adhoc_freeze {
            split = split.freeze_adhoc(adhoc)?;
        }

        let balancer = RasBalancer::new(job.properties.resolve(&self.config))?;
        let qc = validate_split(
            &job.row_totals,
            &job.col_totals,
            &job.matrix,
            &split,
            &job.properties.qc,
        )?;

        let result = balancer.balance_with_context(
            &split.scalable_matrix,
            &split.scalable_rows,
            &split.scalable_cols,
            &split.frozen_matrix,
            ctx,
        )?;

        let cells = cell_records(&job.matrix, &split.frozen_matrix, &result.balanced);
        let rows = border_records(&job.row_totals, &row_sums(&result.balanced));
        let cols = border_records(&job.col_totals, &col_sums(&result.balanced));

        Ok(RasOutcome {
            run_id: job.run_id,
            split,
            qc,
            result,
            cells,
            rows,
            cols,
        })
    }
}

fn check_inputs(
    matrix: &DMatrix<f64>,
    row_totals: &DVector<f64>,
    col_totals: &DVector<f64>,
    frozen: &DMatrix<f64>,
) -> Result<(), BalanceError> {
    let (nrows, ncols) = matrix.shape();
    if row_totals.len() != nrows {
        return Err(BalanceError::dimension("row totals length", nrows, row_totals.len()));
    }
    if col_totals.len() != ncols {
        return Err(BalanceError::dimension("column totals length", ncols, col_totals.len()));
    }
    if frozen.nrows() != nrows {
        return Err(BalanceError::dimension("frozen matrix rows", nrows, frozen.nrows()));
    }
    if frozen.ncols() != ncols {
        return Err(BalanceError::dimension("frozen matrix columns", ncols, frozen.ncols()));
    }

    let checks = [
        ("seed matrix", first_non_finite(matrix.iter())),
        ("row total", first_non_finite(row_totals.iter())),
        ("column total", first_non_finite(col_totals.iter())),
        ("frozen matrix", first_non_finite(frozen.iter())),
    ];
    for (what, found) in checks {
        if let Some((index, value)) = found {
            return Err(BalanceError::InvalidInput { what, index, value });
        }
    }

    let negatives = [
        (Location::RowTotals, first_negative(row_totals.iter())),
        (Location::ColumnTotals, first_negative(col_totals.iter())),
        (Location::Matrix, first_negative(matrix.iter())),
    ];
    for (location, found) in negatives {
        if let Some((index, value)) = found {
            return Err(BalanceError::ResidualNegative { location, index, value });
        }
    }
    Ok(())
}

/// Plain-function entry point.
///
/// `matrix`, `row_totals` and `col_totals` must already be non-negative (see
/// [`freeze_negatives`]); `frozen` is added to the scaled result.
pub fn ras_balance(
    matrix: &DMatrix<f64>,
    row_totals: &DVector<f64>,
    col_totals: &DVector<f64>,
    frozen: &DMatrix<f64>,
    max_iterations: usize,
    epsilon: f64,
) -> Result<ConvergenceResult, BalanceError> {
    let balancer = RasBalancer::new(RasConfig {
        max_iterations,
        epsilon,
        record_trace: false,
    })?;
    balancer.balance(matrix, row_totals, col_totals, frozen)
}

// ========== Job pipeline ==========

/// Settings stored with a job. Unset fields fall back to the balancer's
/// [`RasConfig`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RasJobProperties {
    pub max_iterations: Option<usize>,
    /// Absolute solution tolerance
    pub epsilon: Option<f64>,
    pub qc: QcPolicy,
}

impl RasJobProperties {
    /// `base` with this job's overrides applied.
    pub fn resolve(&self, base: &RasConfig) -> RasConfig {
        RasConfig {
            max_iterations: self.max_iterations.unwrap_or(base.max_iterations),
            epsilon: self.epsilon.unwrap_or(base.epsilon),
            record_trace: base.record_trace,
        }
    }
}

/// One RAS job: seed matrix, border totals and job properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasJob {
    pub run_id: RunId,
    pub matrix: DMatrix<f64>,
    pub row_totals: DVector<f64>,
    pub col_totals: DVector<f64>,
    /// Extra per-cell amounts to exclude from scaling
    pub adhoc_freeze: Option<DMatrix<f64>>,
    pub properties: RasJobProperties,
}

impl RasJob {
    pub fn new(matrix: DMatrix<f64>, row_totals: DVector<f64>, col_totals: DVector<f64>) -> Self {
        Self {
            run_id: RunId::new(),
            matrix,
            row_totals,
            col_totals,
            adhoc_freeze: None,
            properties: RasJobProperties::default(),
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_adhoc_freeze(mut self, adhoc: DMatrix<f64>) -> Self {
        self.adhoc_freeze = Some(adhoc);
        self
    }

    pub fn with_qc(mut self, qc: QcPolicy) -> Self {
        self.properties.qc = qc;
        self
    }

    pub fn with_properties(mut self, properties: RasJobProperties) -> Self {
        self.properties = properties;
        self
    }
}

/// Everything a caller needs to persist after a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasOutcome {
    pub run_id: RunId,
    pub split: FrozenSplit,
    pub qc: QcReport,
    pub result: ConvergenceResult,
    pub cells: Vec<CellRecord>,
    pub rows: Vec<BorderRecord>,
    pub cols: Vec<BorderRecord>,
}
