//! Matrix margin helpers shared by both engines.
//!
//! nalgebra's `row_sum`/`column_sum` are named after the shape of the result,
//! which reads backwards next to "row totals" in the economics sense. These
//! wrappers use the economics meaning: `row_sums(m)[i]` is the sum of row `i`.

use nalgebra::{DMatrix, DVector};

/// Sum of each row, length = number of rows.
pub fn row_sums(m: &DMatrix<f64>) -> DVector<f64> {
    m.column_sum()
}

/// Sum of each column, length = number of columns.
pub fn col_sums(m: &DMatrix<f64>) -> DVector<f64> {
    m.row_sum().transpose()
}

/// `1/x` elementwise, with `0` wherever `x == 0`.
pub fn reciprocal_or_zero(v: &DVector<f64>) -> DVector<f64> {
    v.map(|x| if x != 0.0 { 1.0 / x } else { 0.0 })
}

/// `target / current` where `current > 0`, else `1`.
///
/// Rows or columns that sum to zero are left untouched by the multiplier.
pub fn ratio_or_one(target: &DVector<f64>, current: &DVector<f64>) -> DVector<f64> {
    target.zip_map(current, |t, c| if c > 0.0 { t / c } else { 1.0 })
}

/// `max |a - b|` over all entries, `0` for empty vectors.
pub fn max_abs_diff(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// `m[i][j] *= r[i] * s[j]` in place.
pub fn scale_outer(m: &mut DMatrix<f64>, r: &DVector<f64>, s: &DVector<f64>) {
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            m[(i, j)] *= r[i] * s[j];
        }
    }
}

/// `m[i][j] *= r[i]`, i.e. `diag(r) * m`.
pub fn scale_rows(m: &DMatrix<f64>, r: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)] * r[i])
}

/// `m[i][j] *= s[j]`, i.e. `m * diag(s)`.
pub fn scale_cols(m: &DMatrix<f64>, s: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)] * s[j])
}

/// First negative entry in column-major order, as `(linear index, value)`.
pub fn first_negative<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<(usize, f64)> {
    values
        .into_iter()
        .copied()
        .enumerate()
        .find(|(_, v)| *v < 0.0)
}

/// First non-finite entry, as `(linear index, value)`.
pub fn first_non_finite<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<(usize, f64)> {
    values
        .into_iter()
        .copied()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
}

/// Returns true when every entry is finite.
pub fn all_finite(m: &DMatrix<f64>) -> bool {
    m.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
    }

    #[test]
    fn test_row_and_col_sums_use_economics_orientation() {
        let m = sample();
        assert_eq!(row_sums(&m), DVector::from_vec(vec![6.0, 15.0]));
        assert_eq!(col_sums(&m), DVector::from_vec(vec![5.0, 7.0, 9.0]));
    }

    #[test]
    fn test_reciprocal_guards_zero() {
        let v = DVector::from_vec(vec![2.0, 0.0, -4.0]);
        let r = reciprocal_or_zero(&v);
        assert_relative_eq!(r[0], 0.5);
        assert_eq!(r[1], 0.0);
        assert_relative_eq!(r[2], -0.25);
    }

    #[test]
    fn test_ratio_or_one_masks_empty_lines() {
        let target = DVector::from_vec(vec![10.0, 3.0]);
        let current = DVector::from_vec(vec![5.0, 0.0]);
        let r = ratio_or_one(&target, &current);
        assert_relative_eq!(r[0], 2.0);
        assert_eq!(r[1], 1.0);
    }

    #[test]
    fn test_scale_outer_matches_diagonal_products() {
        let mut m = sample();
        let r = DVector::from_vec(vec![2.0, 0.5]);
        let s = DVector::from_vec(vec![1.0, 10.0, 0.0]);
        let expected = DMatrix::from_diagonal(&r) * sample() * DMatrix::from_diagonal(&s);

        scale_outer(&mut m, &r, &s);
        assert_relative_eq!(m, expected, epsilon = 1e-12);

        assert_relative_eq!(
            scale_cols(&scale_rows(&sample(), &r), &s),
            expected,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_first_negative_and_non_finite() {
        let v = [1.0, -2.0, f64::NAN];
        assert_eq!(first_negative(&v), Some((1, -2.0)));
        let (idx, val) = first_non_finite(&v).unwrap();
        assert_eq!(idx, 2);
        assert!(val.is_nan());
        assert_eq!(max_abs_diff(&DVector::from_vec(vec![1.0, 5.0]), &DVector::from_vec(vec![2.0, 2.0])), 3.0);
    }
}
