//! Flat per-cell and per-border output records.
//!
//! These are what a job persists: one [`CellRecord`] per matrix cell and one
//! [`BorderRecord`] per row or column total, each carrying the original value
//! next to the balanced one.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// One matrix cell before and after balancing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub row: usize,
    pub col: usize,
    pub amt_original: f64,
    /// Amount excluded from scaling (negatives and ad-hoc freezes)
    pub amt_frozen: f64,
    pub amt_after_ras: f64,
}

/// One border total and the sum the balanced matrix actually reaches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BorderRecord {
    pub index: usize,
    pub amt_original: f64,
    pub amt_after_ras: f64,
}

impl BorderRecord {
    pub fn discrepancy(&self) -> f64 {
        self.amt_after_ras - self.amt_original
    }
}

/// Builds cell records in row-major order.
pub fn cell_records(
    original: &DMatrix<f64>,
    frozen: &DMatrix<f64>,
    balanced: &DMatrix<f64>,
) -> Vec<CellRecord> {
    let (nrows, ncols) = original.shape();
    let mut records = Vec::with_capacity(nrows * ncols);
    for row in 0..nrows {
        for col in 0..ncols {
            records.push(CellRecord {
                row,
                col,
                amt_original: original[(row, col)],
                amt_frozen: frozen[(row, col)],
                amt_after_ras: balanced[(row, col)],
            });
        }
    }
    records
}

/// Pairs each original border total with the achieved sum.
pub fn border_records(original: &DVector<f64>, achieved: &DVector<f64>) -> Vec<BorderRecord> {
    original
        .iter()
        .zip(achieved.iter())
        .enumerate()
        .map(|(index, (&amt_original, &amt_after_ras))| BorderRecord {
            index,
            amt_original,
            amt_after_ras,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_are_row_major() {
        let original = DMatrix::from_row_slice(2, 2, &[1.0, -2.0, 3.0, 4.0]);
        let frozen = DMatrix::from_row_slice(2, 2, &[0.0, -2.0, 0.0, 0.0]);
        let balanced = DMatrix::from_row_slice(2, 2, &[1.5, -2.0, 2.5, 4.5]);

        let cells = cell_records(&original, &frozen, &balanced);

        let coords: Vec<_> = cells.iter().map(|c| (c.row, c.col)).collect();
        assert_eq!(coords, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_eq!(cells[1].amt_frozen, -2.0);
        assert_eq!(cells[2].amt_after_ras, 2.5);
    }

    #[test]
    fn test_border_discrepancy() {
        let records = border_records(
            &DVector::from_vec(vec![10.0, 5.0]),
            &DVector::from_vec(vec![10.0, 5.25]),
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].discrepancy(), 0.0);
        assert_eq!(records[1].index, 1);
        assert_eq!(records[1].discrepancy(), 0.25);
    }

    #[test]
    fn test_records_serialize_with_field_names() {
        let record = BorderRecord { index: 3, amt_original: 1.0, amt_after_ras: 2.0 };
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["index"], 3);
        assert_eq!(json["amt_after_ras"], 2.0);
    }
}
