//! Freeze-negatives preprocessor.
//!
//! Negative entries (known corrections, net exports, ...) must not take part
//! in proportional scaling. They are split off into a frozen part, the
//! balancer works on the non-negative remainder, and the frozen part is added
//! back verbatim at the end.
//!
//! Invariant for every [`FrozenSplit`]: `original == scalable + frozen`,
//! element-wise, for the matrix and both total vectors.

use crate::error::{Axis, BalanceError};
use crate::margins::{col_sums, row_sums};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// The six outputs of freezing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenSplit {
    pub scalable_matrix: DMatrix<f64>,
    pub scalable_rows: DVector<f64>,
    pub scalable_cols: DVector<f64>,
    pub frozen_matrix: DMatrix<f64>,
    pub frozen_rows: DVector<f64>,
    pub frozen_cols: DVector<f64>,
}

fn split_matrix(m: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
    (
        m.map(|v| if v < 0.0 { 0.0 } else { v }),
        m.map(|v| if v < 0.0 { v } else { 0.0 }),
    )
}

fn split_vector(v: &DVector<f64>) -> (DVector<f64>, DVector<f64>) {
    (
        v.map(|x| if x < 0.0 { 0.0 } else { x }),
        v.map(|x| if x < 0.0 { x } else { 0.0 }),
    )
}

/// Moves every negative entry of the inputs into the frozen outputs.
///
/// Pure and infallible; the inputs are not modified.
pub fn freeze_negatives(
    matrix: &DMatrix<f64>,
    row_totals: &DVector<f64>,
    col_totals: &DVector<f64>,
) -> FrozenSplit {
    let (scalable_matrix, frozen_matrix) = split_matrix(matrix);
    let (scalable_rows, frozen_rows) = split_vector(row_totals);
    let (scalable_cols, frozen_cols) = split_vector(col_totals);

    FrozenSplit {
        scalable_matrix,
        scalable_rows,
        scalable_cols,
        frozen_matrix,
        frozen_rows,
        frozen_cols,
    }
}

impl FrozenSplit {
    /// Additionally freezes caller-chosen amounts per cell.
    ///
    /// Each amount moves from the scalable matrix to the frozen matrix, and
    /// its row and column sums move from the scalable totals to the frozen
    /// totals, so the balanced scalable part targets what is left over.
    pub fn freeze_adhoc(mut self, adhoc: &DMatrix<f64>) -> Result<Self, BalanceError> {
        let (nrows, ncols) = self.scalable_matrix.shape();
        if adhoc.nrows() != nrows {
            return Err(BalanceError::dimension("ad-hoc freeze rows", nrows, adhoc.nrows()));
        }
        if adhoc.ncols() != ncols {
            return Err(BalanceError::dimension("ad-hoc freeze columns", ncols, adhoc.ncols()));
        }

        for j in 0..ncols {
            for i in 0..nrows {
                let amount = adhoc[(i, j)];
                let available = self.scalable_matrix[(i, j)];
                if !amount.is_finite() || amount < 0.0 || amount > available {
                    return Err(BalanceError::InvalidAdhocFreeze {
                        row: i,
                        col: j,
                        amount,
                        available,
                    });
                }
            }
        }

        let adhoc_rows = row_sums(adhoc);
        let adhoc_cols = col_sums(adhoc);
        for (i, (&amount, &available)) in adhoc_rows.iter().zip(self.scalable_rows.iter()).enumerate() {
            if amount > available {
                return Err(BalanceError::AdhocExceedsTotal {
                    axis: Axis::Row,
                    index: i,
                    amount,
                    available,
                });
            }
        }
        for (j, (&amount, &available)) in adhoc_cols.iter().zip(self.scalable_cols.iter()).enumerate() {
            if amount > available {
                return Err(BalanceError::AdhocExceedsTotal {
                    axis: Axis::Column,
                    index: j,
                    amount,
                    available,
                });
            }
        }

        self.scalable_matrix -= adhoc;
        self.frozen_matrix += adhoc;
        self.scalable_rows -= &adhoc_rows;
        self.frozen_rows += &adhoc_rows;
        self.scalable_cols -= &adhoc_cols;
        self.frozen_cols += &adhoc_cols;
        Ok(self)
    }

    /// Rebuilds the original matrix (`scalable + frozen`).
    pub fn original_matrix(&self) -> DMatrix<f64> {
        &self.scalable_matrix + &self.frozen_matrix
    }

    /// Rebuilds the original row totals.
    pub fn original_rows(&self) -> DVector<f64> {
        &self.scalable_rows + &self.frozen_rows
    }

    /// Rebuilds the original column totals.
    pub fn original_cols(&self) -> DVector<f64> {
        &self.scalable_cols + &self.frozen_cols
    }

    /// Number of matrix cells carrying a frozen amount.
    pub fn frozen_cell_count(&self) -> usize {
        self.frozen_matrix.iter().filter(|v| **v != 0.0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mixed() -> (DMatrix<f64>, DVector<f64>, DVector<f64>) {
        (
            DMatrix::from_row_slice(2, 2, &[4.0, -1.5, 0.0, 3.0]),
            DVector::from_vec(vec![2.5, -3.0]),
            DVector::from_vec(vec![4.0, 1.5]),
        )
    }

    #[test]
    fn test_negatives_move_to_frozen() {
        let (m, r, c) = mixed();
        let split = freeze_negatives(&m, &r, &c);

        assert_eq!(split.scalable_matrix, DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 3.0]));
        assert_eq!(split.frozen_matrix, DMatrix::from_row_slice(2, 2, &[0.0, -1.5, 0.0, 0.0]));
        assert_eq!(split.scalable_rows, DVector::from_vec(vec![2.5, 0.0]));
        assert_eq!(split.frozen_rows, DVector::from_vec(vec![0.0, -3.0]));
        assert_eq!(split.scalable_cols, c);
        assert_eq!(split.frozen_cols, DVector::zeros(2));
        assert_eq!(split.frozen_cell_count(), 1);
    }

    #[test]
    fn test_split_reassembles_original() {
        let (m, r, c) = mixed();
        let split = freeze_negatives(&m, &r, &c);

        assert_eq!(split.original_matrix(), m);
        assert_eq!(split.original_rows(), r);
        assert_eq!(split.original_cols(), c);
    }

    #[test]
    fn test_inputs_not_mutated() {
        let (m, r, c) = mixed();
        let before = m.clone();
        let _ = freeze_negatives(&m, &r, &c);
        assert_eq!(m, before);
    }

    #[test]
    fn test_adhoc_freeze_keeps_invariant() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 1.0, 3.0]);
        let r = DVector::from_vec(vec![6.0, 4.0]);
        let c = DVector::from_vec(vec![5.0, 5.0]);
        let adhoc = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.5]);

        let split = freeze_negatives(&m, &r, &c).freeze_adhoc(&adhoc).unwrap();

        assert_relative_eq!(split.original_matrix(), m, epsilon = 1e-12);
        assert_relative_eq!(split.original_rows(), r, epsilon = 1e-12);
        assert_relative_eq!(split.original_cols(), c, epsilon = 1e-12);
        assert_relative_eq!(split.scalable_rows[0], 5.0);
        assert_relative_eq!(split.scalable_cols[1], 4.5);
        assert_eq!(split.frozen_cell_count(), 2);
    }

    #[test]
    fn test_adhoc_freeze_rejects_overdraw() {
        let m = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let r = DVector::from_vec(vec![3.0]);
        let c = DVector::from_vec(vec![1.0, 2.0]);
        let adhoc = DMatrix::from_row_slice(1, 2, &[1.5, 0.0]);

        let err = freeze_negatives(&m, &r, &c).freeze_adhoc(&adhoc).unwrap_err();
        assert!(matches!(err, BalanceError::InvalidAdhocFreeze { row: 0, col: 0, .. }));
    }

    #[test]
    fn test_adhoc_freeze_rejects_exceeding_total() {
        let m = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let r = DVector::from_vec(vec![0.5]);
        let c = DVector::from_vec(vec![1.0, 2.0]);
        let adhoc = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);

        let err = freeze_negatives(&m, &r, &c).freeze_adhoc(&adhoc).unwrap_err();
        assert!(matches!(err, BalanceError::AdhocExceedsTotal { axis: Axis::Row, index: 0, .. }));
    }

    #[test]
    fn test_adhoc_freeze_rejects_wrong_shape() {
        let m = DMatrix::from_element(2, 2, 1.0);
        let v = DVector::from_element(2, 2.0);
        let adhoc = DMatrix::zeros(3, 2);

        let err = freeze_negatives(&m, &v, &v).freeze_adhoc(&adhoc).unwrap_err();
        assert_eq!(
            err,
            BalanceError::DimensionMismatch { what: "ad-hoc freeze rows", expected: 2, actual: 3 }
        );
    }
}
