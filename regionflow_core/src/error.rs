//! Error taxonomy for the balancing engines.
//!
//! Only precondition failures are errors. Running out of iterations or being
//! interrupted is reported through [`crate::Termination`] together with the
//! best-effort matrix, and division-by-zero candidates are masked inside the
//! engines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Matrix axis, used to say where a problem was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Row,
    Column,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Row => write!(f, "row"),
            Axis::Column => write!(f, "column"),
        }
    }
}

/// Which piece of input data a negative value was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    RowTotals,
    ColumnTotals,
    Matrix,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::RowTotals => write!(f, "row border totals"),
            Location::ColumnTotals => write!(f, "column border totals"),
            Location::Matrix => write!(f, "matrix"),
        }
    }
}

/// The QC checks run before balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QcCheck {
    /// sum(row totals) agrees with sum(column totals)
    BorderTotals,
    /// No negatives survive the freeze step
    NonNegative,
    /// Populated rows have non-zero targets
    RowConsistency,
    /// Populated columns have non-zero targets
    ColumnConsistency,
    /// Grand total agrees with the job's control total
    ControlTotal,
}

impl QcCheck {
    pub fn name(&self) -> &'static str {
        match self {
            QcCheck::BorderTotals => "border_totals",
            QcCheck::NonNegative => "non_negative",
            QcCheck::RowConsistency => "row_consistency",
            QcCheck::ColumnConsistency => "column_consistency",
            QcCheck::ControlTotal => "control_total",
        }
    }
}

impl std::fmt::Display for QcCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coarse classification for callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The data cannot be balanced as given; fix the input
    FatalInput,
    /// The engine was configured with nonsensical parameters
    Config,
}

/// Errors raised by the preprocessor, QC layer and engines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BalanceError {
    #[error("border totals disagree: rows sum to {row_sum}, columns sum to {col_sum} (tolerance {tolerance})")]
    BorderTotalMismatch {
        row_sum: f64,
        col_sum: f64,
        tolerance: f64,
    },

    #[error("border totals sum to {actual}, control total is {expected} (tolerance {tolerance})")]
    ControlTotalMismatch {
        expected: f64,
        actual: f64,
        tolerance: f64,
    },

    #[error("{location} contains negative value {value} at index {index} after freezing")]
    ResidualNegative {
        location: Location,
        index: usize,
        value: f64,
    },

    #[error("{what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{axis} {index} sums to {matrix_sum} in the matrix but its border total is zero")]
    UnsatisfiableZeroTarget {
        axis: Axis,
        index: usize,
        matrix_sum: f64,
    },

    #[error("impedance matrix is not square: {rows}x{cols}")]
    NonSquareImpedance { rows: usize, cols: usize },

    #[error("invalid {what} value {value} at index {index}")]
    InvalidInput {
        what: &'static str,
        index: usize,
        value: f64,
    },

    #[error("cannot freeze {amount} at ({row}, {col}): only {available} is scalable")]
    InvalidAdhocFreeze {
        row: usize,
        col: usize,
        amount: f64,
        available: f64,
    },

    #[error("ad-hoc freeze of {amount} on {axis} {index} exceeds its scalable total {available}")]
    AdhocExceedsTotal {
        axis: Axis,
        index: usize,
        amount: f64,
        available: f64,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BalanceError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BalanceError::InvalidConfig(_) => ErrorKind::Config,
            _ => ErrorKind::FatalInput,
        }
    }

    /// Names the QC check that failed, when the error came from one.
    pub fn check(&self) -> Option<QcCheck> {
        match self {
            BalanceError::BorderTotalMismatch { .. } => Some(QcCheck::BorderTotals),
            BalanceError::ControlTotalMismatch { .. } => Some(QcCheck::ControlTotal),
            BalanceError::ResidualNegative { .. } => Some(QcCheck::NonNegative),
            BalanceError::UnsatisfiableZeroTarget { axis: Axis::Row, .. } => {
                Some(QcCheck::RowConsistency)
            }
            BalanceError::UnsatisfiableZeroTarget { axis: Axis::Column, .. } => {
                Some(QcCheck::ColumnConsistency)
            }
            _ => None,
        }
    }

    pub(crate) fn dimension(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }
}
