//! The "TRADE" Engine - Doubly-Constrained Gravity Model
//!
//! Distributes shipments between places in proportion to supply at the
//! origin, demand at the destination and a cost derived from impedance:
//!
//! ```text
//! cost[i][j] = alpha * d[i][j]^beta * exp(gamma * d[i][j])
//! S[i][j]    = supply[i] * A[i] * cost[i][j] * demand[j] * B[j]
//! ```
//!
//! The balancing factors `A` and `B` come from a fixed-point iteration. Each
//! round forms the origin and destination attraction matrices from the
//! current factors and derives the next factors from the previous round's
//! matrices, with every reciprocal of zero taken as zero. The update is
//! lagged, so the row and column constraints are met on alternate rounds and
//! the factors settle together as rounds accumulate.

use crate::config::{CostFunction, FixedPointRule, GravityConfig};
use crate::error::BalanceError;
use crate::margins::{col_sums, max_abs_diff, reciprocal_or_zero, row_sums, scale_cols, scale_rows};
use crate::regionflow_balance::Termination;
use nalgebra::{DMatrix, DVector};
use regionflow_env::{RunId, SolveContext, Unbounded};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// Agreement between the two shipment totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConservationCheck {
    /// `|total_shipped_supply - total_shipped_demand|`
    pub imbalance: f64,
    pub tolerance: f64,
    pub balanced: bool,
}

/// Output of a gravity solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityResult {
    pub run_id: RunId,

    /// Shipment matrix, origins by row
    pub shipments: DMatrix<f64>,

    /// Transformed impedance, degenerate cells zeroed
    pub cost: DMatrix<f64>,

    /// Origin balancing factors `A`
    pub origin_factors: DVector<f64>,

    /// Destination balancing factors `B`
    pub destination_factors: DVector<f64>,

    /// Completed fixed-point rounds
    pub rounds: usize,

    pub termination: Termination,

    /// `max(|row_sums(S) - supply|, |col_sums(S) - demand|)`
    pub residual: f64,

    pub total_shipped_supply: f64,
    pub total_shipped_demand: f64,
    pub conservation: ConservationCheck,

    /// Cells whose cost came out non-finite and were set to zero
    pub degenerate_cost_cells: usize,
}

impl GravityResult {
    /// True when the final residual met the rule's tolerance within its
    /// rounds and the solve was not interrupted.
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Applies `cost` to every impedance cell, zeroing non-finite results.
///
/// Returns the cost matrix and the number of cells that were zeroed.
pub fn cost_matrix(impedance: &DMatrix<f64>, cost: &CostFunction) -> (DMatrix<f64>, usize) {
    let mut degenerate = 0;
    let matrix = impedance.map(|d| {
        let c = cost.apply(d);
        if c.is_finite() {
            c
        } else {
            degenerate += 1;
            0.0
        }
    });
    (matrix, degenerate)
}

/// Largest constraint violation of the shipments implied by `A` and `B`.
///
/// Works from the factors directly: `row_sums(S)[i] = supply[i] * A[i] *
/// (att_dest * B)[i]` and symmetrically for columns, so no shipment matrix is
/// materialised per round.
fn constraint_residual(
    att_origin: &DMatrix<f64>,
    att_dest: &DMatrix<f64>,
    supply: &DVector<f64>,
    demand: &DVector<f64>,
    a: &DVector<f64>,
    b: &DVector<f64>,
) -> f64 {
    let shipped_from = supply.component_mul(a).component_mul(&(att_dest * b));
    let shipped_to = demand.component_mul(b).component_mul(&(att_origin.transpose() * a));
    max_abs_diff(&shipped_from, supply).max(max_abs_diff(&shipped_to, demand))
}

/// Gravity model configured with a cost function and stopping rule.
#[derive(Debug, Clone)]
pub struct TradeModel {
    config: GravityConfig,
    run_id: RunId,
}

impl TradeModel {
    /// Creates a model, rejecting a nonsensical configuration.
    pub fn new(config: GravityConfig) -> Result<Self, BalanceError> {
        config.validate()?;
        Ok(Self {
            config,
            run_id: RunId::new(),
        })
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn config(&self) -> &GravityConfig {
        &self.config
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn solve(
        &self,
        impedance: &DMatrix<f64>,
        supply: &DVector<f64>,
        demand: &DVector<f64>,
    ) -> Result<GravityResult, BalanceError> {
        self.solve_with_context(impedance, supply, demand, &Unbounded)
    }

    /// As [`TradeModel::solve`], checking `ctx` once per round.
    pub fn solve_with_context<C: SolveContext + ?Sized>(
        &self,
        impedance: &DMatrix<f64>,
        supply: &DVector<f64>,
        demand: &DVector<f64>,
        ctx: &C,
    ) -> Result<GravityResult, BalanceError> {
        check_inputs(impedance, supply, demand)?;
        let n = impedance.nrows();
        debug!(run = %self.run_id, places = n, seed = ctx.seed(), "starting gravity solve");

        let (cost, degenerate_cost_cells) = cost_matrix(impedance, &self.config.cost);
        if degenerate_cost_cells > 0 {
            debug!(degenerate_cost_cells, "zeroed non-finite cost cells");
        }

        let att_origin = scale_rows(&cost, supply);
        let att_dest = scale_cols(&cost, demand);

        let mut a = DVector::from_element(n, 1.0);
        let mut b = reciprocal_or_zero(&col_sums(&att_origin));
        let mut ms = scale_rows(&att_origin, &a);
        let mut md = scale_cols(&att_dest, &b);

        let rule = self.config.fixed_point;
        let mut residual = constraint_residual(&att_origin, &att_dest, supply, demand, &a, &b);
        let mut rounds = 0;
        let mut termination = Termination::IterationCap;

        for round in 1..=rule.max_rounds() {
            if let Err(e) = ctx.check() {
                termination = Termination::interrupted(&e);
                break;
            }

            let next_a = reciprocal_or_zero(&row_sums(&md));
            let next_b = reciprocal_or_zero(&col_sums(&ms));
            ms = scale_rows(&att_origin, &a);
            md = scale_cols(&att_dest, &b);
            a = next_a;
            b = next_b;
            rounds = round;

            residual = constraint_residual(&att_origin, &att_dest, supply, demand, &a, &b);
            trace!(round, residual, "gravity round");

            if let FixedPointRule::Converge { tolerance, .. } = rule {
                if residual < tolerance {
                    termination = Termination::Converged;
                    break;
                }
            }
        }

        // A fixed round count still has to land on the fixed point
        if let FixedPointRule::Rounds(n) = rule {
            if rounds == n && residual < self.config.rounds_tolerance {
                termination = Termination::Converged;
            }
        }

        let shipments = scale_cols(&scale_rows(&att_dest, &supply.component_mul(&a)), &b);
        let total_shipped_supply = row_sums(&shipments).sum();
        let total_shipped_demand = col_sums(&shipments).sum();
        let imbalance = (total_shipped_supply - total_shipped_demand).abs();
        let conservation = ConservationCheck {
            imbalance,
            tolerance: self.config.conservation_tolerance,
            balanced: imbalance <= self.config.conservation_tolerance,
        };

        match &termination {
            Termination::Converged => {
                info!(rounds, residual, total_shipped_supply, total_shipped_demand, "Gravity solve completed");
            }
            Termination::IterationCap => {
                warn!(rounds, residual, "Gravity solve completed, fixed point not reached");
            }
            Termination::Interrupted(reason) => {
                warn!(rounds, residual, %reason, "Gravity solve interrupted");
            }
        }
        if conservation.balanced {
            info!(imbalance, "Supply/demand conservation check passed");
        } else {
            warn!(
                imbalance,
                tolerance = conservation.tolerance,
                "Total shipped supply and demand disagree"
            );
        }

        Ok(GravityResult {
            run_id: self.run_id,
            shipments,
            cost,
            origin_factors: a,
            destination_factors: b,
            rounds,
            termination,
            residual,
            total_shipped_supply,
            total_shipped_demand,
            conservation,
            degenerate_cost_cells,
        })
    }
}

fn check_inputs(
    impedance: &DMatrix<f64>,
    supply: &DVector<f64>,
    demand: &DVector<f64>,
) -> Result<(), BalanceError> {
    let (rows, cols) = impedance.shape();
    if rows != cols {
        return Err(BalanceError::NonSquareImpedance { rows, cols });
    }
    if supply.len() != rows {
        return Err(BalanceError::dimension("supply length", rows, supply.len()));
    }
    if demand.len() != rows {
        return Err(BalanceError::dimension("demand length", rows, demand.len()));
    }

    // +inf impedance means "unreachable" and is allowed
    if let Some((index, &value)) = impedance
        .iter()
        .enumerate()
        .find(|(_, d)| d.is_nan() || **d < 0.0)
    {
        return Err(BalanceError::InvalidInput {
            what: "impedance",
            index,
            value,
        });
    }
    for (what, v) in [("supply", supply), ("demand", demand)] {
        if let Some((index, &value)) = v
            .iter()
            .enumerate()
            .find(|(_, x)| !x.is_finite() || **x < 0.0)
        {
            return Err(BalanceError::InvalidInput { what, index, value });
        }
    }
    Ok(())
}

/// Plain-function entry point with the legacy fixed round count.
pub fn gravity_solve(
    impedance: &DMatrix<f64>,
    supply: &DVector<f64>,
    demand: &DVector<f64>,
    alpha: f64,
    beta: f64,
    gamma: f64,
    fixed_point_rounds: usize,
) -> Result<GravityResult, BalanceError> {
    let model = TradeModel::new(GravityConfig {
        cost: CostFunction::new(alpha, beta, gamma),
        fixed_point: FixedPointRule::Rounds(fixed_point_rounds),
        ..GravityConfig::default()
    })?;
    model.solve(impedance, supply, demand)
}
