//! QC / Validation Layer
//! =====================
//!
//! Invariant checks run before balancing. Any failure is fatal for the one
//! job being validated and comes back as a [`BalanceError`] naming the check
//! and the offending index, so a batch of independent jobs keeps going.
//!
//! Checks:
//! - Border-total agreement (`sum(rows) == sum(cols)` within a tolerance)
//! - Non-negativity of the post-freeze data
//! - Row consistency (populated rows need a non-zero target)
//! - Column consistency (symmetric)
//! - Control total (only when the job carries one)
//!
//! Usage:
//! ```ignore
//! use regionflow_core::validation::{validate, QcPolicy};
//!
//! let report = validate(&row_totals, &col_totals, &matrix, &QcPolicy::default())?;
//! assert!(report.all_passed());
//! ```

use crate::error::{Axis, BalanceError, Location, QcCheck};
use crate::freeze::{freeze_negatives, FrozenSplit};
use crate::margins::{col_sums, first_negative, row_sums};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// POLICY
// =============================================================================

/// Tolerances applied by the QC layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcPolicy {
    /// Allowed absolute gap between the row and column grand totals.
    /// 0.0 reproduces the exact-equality check.
    pub border_tolerance: f64,

    /// Expected grand total of the border totals, if the job has one
    pub control_total: Option<f64>,
}

impl Default for QcPolicy {
    fn default() -> Self {
        Self {
            border_tolerance: 0.0,
            control_total: None,
        }
    }
}

impl QcPolicy {
    /// Policy with a tolerance on the border-total agreement check.
    pub fn with_tolerance(border_tolerance: f64) -> Self {
        Self {
            border_tolerance,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), BalanceError> {
        if !self.border_tolerance.is_finite() || self.border_tolerance < 0.0 {
            return Err(BalanceError::InvalidConfig(format!(
                "border_tolerance must be finite and >= 0, got {}",
                self.border_tolerance
            )));
        }
        if let Some(total) = self.control_total {
            if !total.is_finite() {
                return Err(BalanceError::InvalidConfig(format!(
                    "control_total must be finite, got {}",
                    total
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// INDIVIDUAL CHECKS
// =============================================================================

/// Check 1: row and column grand totals agree.
pub fn check_border_totals(
    row_totals: &DVector<f64>,
    col_totals: &DVector<f64>,
    tolerance: f64,
) -> Result<(), BalanceError> {
    let row_sum = row_totals.sum();
    let col_sum = col_totals.sum();
    // Written so a NaN grand total fails the check
    if !((row_sum - col_sum).abs() <= tolerance) {
        return Err(BalanceError::BorderTotalMismatch {
            row_sum,
            col_sum,
            tolerance,
        });
    }
    info!(check = "border_totals", row_sum, col_sum, "success: border totals match");
    Ok(())
}

/// Check 2: nothing negative survived the freeze step.
pub fn check_non_negative(
    row_totals: &DVector<f64>,
    col_totals: &DVector<f64>,
    matrix: &DMatrix<f64>,
) -> Result<(), BalanceError> {
    let checks = [
        (Location::RowTotals, first_negative(row_totals.iter())),
        (Location::ColumnTotals, first_negative(col_totals.iter())),
        (Location::Matrix, first_negative(matrix.iter())),
    ];
    for (location, found) in checks {
        if let Some((index, value)) = found {
            return Err(BalanceError::ResidualNegative {
                location,
                index,
                value,
            });
        }
    }
    info!(check = "non_negative", "success: input data do not contain negative values");
    Ok(())
}

/// Check 3: row count agrees and populated rows have a non-zero target.
pub fn check_row_consistency(
    row_totals: &DVector<f64>,
    matrix: &DMatrix<f64>,
) -> Result<(), BalanceError> {
    check_axis_consistency(Axis::Row, row_totals, &row_sums(matrix))?;
    info!(check = "row_consistency", "success: matrix rows and border total rows consistent");
    Ok(())
}

/// Check 4: column count agrees and populated columns have a non-zero target.
pub fn check_column_consistency(
    col_totals: &DVector<f64>,
    matrix: &DMatrix<f64>,
) -> Result<(), BalanceError> {
    check_axis_consistency(Axis::Column, col_totals, &col_sums(matrix))?;
    info!(check = "column_consistency", "success: matrix cols and border total cols consistent");
    Ok(())
}

fn check_axis_consistency(
    axis: Axis,
    totals: &DVector<f64>,
    matrix_sums: &DVector<f64>,
) -> Result<(), BalanceError> {
    if totals.len() != matrix_sums.len() {
        let what = match axis {
            Axis::Row => "matrix row count vs row border totals",
            Axis::Column => "matrix column count vs column border totals",
        };
        return Err(BalanceError::dimension(what, matrix_sums.len(), totals.len()));
    }
    for (index, (&matrix_sum, &total)) in matrix_sums.iter().zip(totals.iter()).enumerate() {
        if matrix_sum > 0.0 && total == 0.0 {
            return Err(BalanceError::UnsatisfiableZeroTarget {
                axis,
                index,
                matrix_sum,
            });
        }
    }
    Ok(())
}

/// Optional check: the grand total matches the job's control total.
pub fn check_control_total(
    row_totals: &DVector<f64>,
    expected: f64,
    tolerance: f64,
) -> Result<(), BalanceError> {
    let actual = row_totals.sum();
    if !((actual - expected).abs() <= tolerance) {
        return Err(BalanceError::ControlTotalMismatch {
            expected,
            actual,
            tolerance,
        });
    }
    info!(check = "control_total", expected, actual, "success: control total matches");
    Ok(())
}

// =============================================================================
// REPORT
// =============================================================================

/// Outcome of a successful validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcReport {
    /// Checks that ran, in order
    pub passed: Vec<QcCheck>,
    /// Grand total of the row border totals
    pub row_total: f64,
    /// Grand total of the column border totals
    pub col_total: f64,
}

impl QcReport {
    /// True when the four mandatory checks are all listed.
    pub fn all_passed(&self) -> bool {
        [
            QcCheck::BorderTotals,
            QcCheck::NonNegative,
            QcCheck::RowConsistency,
            QcCheck::ColumnConsistency,
        ]
        .iter()
        .all(|c| self.passed.contains(c))
    }
}

/// Runs all checks on unfrozen input, freezing internally for check 2.
pub fn validate(
    row_totals: &DVector<f64>,
    col_totals: &DVector<f64>,
    matrix: &DMatrix<f64>,
    policy: &QcPolicy,
) -> Result<QcReport, BalanceError> {
    let split = freeze_negatives(matrix, row_totals, col_totals);
    validate_split(row_totals, col_totals, matrix, &split, policy)
}

/// Runs all checks given the original data and an already computed split.
///
/// Checks 1 and the control total look at the original data, check 2 at the
/// scalable part of `split`, and checks 3 and 4 at both: an ad-hoc freeze can
/// empty a row or column target while cells in it are still scalable.
pub fn validate_split(
    row_totals: &DVector<f64>,
    col_totals: &DVector<f64>,
    matrix: &DMatrix<f64>,
    split: &FrozenSplit,
    policy: &QcPolicy,
) -> Result<QcReport, BalanceError> {
    policy.validate()?;

    let mut passed = Vec::with_capacity(5);

    check_border_totals(row_totals, col_totals, policy.border_tolerance)?;
    passed.push(QcCheck::BorderTotals);

    check_non_negative(&split.scalable_rows, &split.scalable_cols, &split.scalable_matrix)?;
    passed.push(QcCheck::NonNegative);

    check_axis_consistency(Axis::Row, &split.scalable_rows, &row_sums(&split.scalable_matrix))?;
    check_row_consistency(row_totals, matrix)?;
    passed.push(QcCheck::RowConsistency);

    check_axis_consistency(Axis::Column, &split.scalable_cols, &col_sums(&split.scalable_matrix))?;
    check_column_consistency(col_totals, matrix)?;
    passed.push(QcCheck::ColumnConsistency);

    if let Some(expected) = policy.control_total {
        check_control_total(row_totals, expected, policy.border_tolerance)?;
        passed.push(QcCheck::ControlTotal);
    }

    Ok(QcReport {
        passed,
        row_total: row_totals.sum(),
        col_total: col_totals.sum(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
