//! RegionFlow Metrics Module
//! =========================
//!
//! Diagnostics for balanced and distributed matrices:
//! - **Cross-ratio drift**: how far a balanced matrix strays from the seed's
//!   structure (zero, up to rounding, for a true RAS result)
//! - **Mean adjustment**: average absolute change per cell
//! - **Trip impedance**: flow-weighted mean impedance, the statistic used to
//!   calibrate the gravity decay exponent
//! - **Trip length distribution**: shipment mass per impedance band

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

// =============================================================================
// BALANCE DIAGNOSTICS
// =============================================================================

/// Largest relative change in any 2x2 cross-ratio between `seed` and
/// `balanced`.
///
/// For rows `i < k` and columns `j < l` with all four seed cells non-zero:
///
/// ```text
/// x(M) = M[i][j] * M[k][l] / (M[i][l] * M[k][j])
/// drift = max |x(balanced) / x(seed) - 1|
/// ```
///
/// Row and column scaling cancel out of `x`, so a matrix of the form
/// `diag(R) * seed * diag(S)` has drift 0. Quadruples where the balanced
/// denominator vanishes count as drift 1. Returns 0 when no quadruple applies.
pub fn max_cross_ratio_drift(seed: &DMatrix<f64>, balanced: &DMatrix<f64>) -> f64 {
    let (nrows, ncols) = seed.shape();
    let mut drift: f64 = 0.0;

    for i in 0..nrows {
        for k in (i + 1)..nrows {
            for j in 0..ncols {
                for l in (j + 1)..ncols {
                    let corners = [seed[(i, j)], seed[(k, l)], seed[(i, l)], seed[(k, j)]];
                    if corners.iter().any(|v| *v == 0.0) {
                        continue;
                    }
                    let before = corners[0] * corners[1] / (corners[2] * corners[3]);

                    let denom = balanced[(i, l)] * balanced[(k, j)];
                    let d = if denom == 0.0 {
                        1.0
                    } else {
                        let after = balanced[(i, j)] * balanced[(k, l)] / denom;
                        (after / before - 1.0).abs()
                    };
                    drift = drift.max(d);
                }
            }
        }
    }

    drift
}

/// Mean of `|balanced - seed|` over all cells, 0 for an empty matrix.
pub fn mean_absolute_adjustment(seed: &DMatrix<f64>, balanced: &DMatrix<f64>) -> f64 {
    if seed.is_empty() {
        return 0.0;
    }
    let total: f64 = seed
        .iter()
        .zip(balanced.iter())
        .map(|(a, b)| (b - a).abs())
        .sum();
    total / seed.len() as f64
}

// =============================================================================
// TRADE DIAGNOSTICS
// =============================================================================

/// Flow-weighted mean impedance, `sum(S * d) / sum(S)`.
///
/// Only cells carrying flow contribute, so unreachable (`+inf`) pairs with no
/// shipments do not poison the mean. `None` when nothing is shipped.
pub fn mean_trip_impedance(shipments: &DMatrix<f64>, impedance: &DMatrix<f64>) -> Option<f64> {
    let mut flow = 0.0;
    let mut weighted = 0.0;
    for (s, d) in shipments.iter().zip(impedance.iter()) {
        if *s > 0.0 {
            flow += s;
            weighted += s * d;
        }
    }
    if flow > 0.0 {
        Some(weighted / flow)
    } else {
        None
    }
}

/// Share of all shipments that stay within their origin place.
pub fn intrazonal_share(shipments: &DMatrix<f64>) -> Option<f64> {
    let total = shipments.sum();
    if total > 0.0 {
        Some(shipments.diagonal().sum() / total)
    } else {
        None
    }
}

/// One impedance band of a trip length distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TripLengthBin {
    pub lower: f64,
    /// `f64::INFINITY` for the overflow band
    pub upper: f64,
    pub flow: f64,
}

/// Shipment mass per impedance band of width `width`.
///
/// Produces `bins` bands starting at 0; the last one is open-ended and
/// collects everything beyond. Empty when `bins == 0` or `width` is not a
/// positive finite number.
pub fn trip_length_distribution(
    shipments: &DMatrix<f64>,
    impedance: &DMatrix<f64>,
    width: f64,
    bins: usize,
) -> Vec<TripLengthBin> {
    if bins == 0 || !width.is_finite() || width <= 0.0 {
        return Vec::new();
    }

    let mut out: Vec<TripLengthBin> = (0..bins)
        .map(|b| TripLengthBin {
            lower: b as f64 * width,
            upper: if b + 1 == bins {
                f64::INFINITY
            } else {
                (b + 1) as f64 * width
            },
            flow: 0.0,
        })
        .collect();

    for (s, d) in shipments.iter().zip(impedance.iter()) {
        if *s <= 0.0 {
            continue;
        }
        let band = (d / width).floor();
        let idx = if band.is_finite() && band < (bins - 1) as f64 {
            band.max(0.0) as usize
        } else {
            bins - 1
        };
        out[idx].flow += s;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    #[test]
    fn test_cross_ratio_drift_zero_for_biproportional() {
        let seed = DMatrix::from_row_slice(3, 3, &[1.1, 2.1, 1.1, 3.1, 5.1, 5.1, 6.1, 2.1, 2.1]);
        let r = DVector::from_vec(vec![0.5, 2.0, 1.5]);
        let s = DVector::from_vec(vec![3.0, 0.25, 1.0]);
        let scaled = DMatrix::from_diagonal(&r) * &seed * DMatrix::from_diagonal(&s);

        assert!(max_cross_ratio_drift(&seed, &scaled) < 1e-12);
    }

    #[test]
    fn test_cross_ratio_drift_detects_distortion() {
        let seed = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let distorted = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 1.0]);

        assert_relative_eq!(max_cross_ratio_drift(&seed, &distorted), 1.0);
    }

    #[test]
    fn test_mean_absolute_adjustment() {
        let seed = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let balanced = DMatrix::from_row_slice(2, 2, &[2.0, 2.0, 1.0, 4.0]);
        assert_relative_eq!(mean_absolute_adjustment(&seed, &balanced), 0.75);
    }

    #[test]
    fn test_mean_trip_impedance_ignores_empty_unreachable_pairs() {
        let shipments = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 0.0, 4.0]);
        let impedance = DMatrix::from_row_slice(2, 2, &[1.0, 5.0, f64::INFINITY, 2.0]);

        let mean = mean_trip_impedance(&shipments, &impedance).unwrap();
        assert_relative_eq!(mean, (3.0 + 5.0 + 8.0) / 8.0);
        assert_eq!(mean_trip_impedance(&DMatrix::zeros(2, 2), &impedance), None);
    }

    #[test]
    fn test_intrazonal_share() {
        let shipments = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 0.0, 4.0]);
        assert_relative_eq!(intrazonal_share(&shipments).unwrap(), 7.0 / 8.0);
    }

    #[test]
    fn test_trip_length_distribution_bins_and_overflow() {
        let shipments = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 2.0, 4.0]);
        let impedance = DMatrix::from_row_slice(2, 2, &[1.0, 12.0, 50.0, 9.99]);

        let bins = trip_length_distribution(&shipments, &impedance, 10.0, 3);

        assert_eq!(bins.len(), 3);
        assert_relative_eq!(bins[0].flow, 7.0);
        assert_relative_eq!(bins[1].flow, 1.0);
        assert_relative_eq!(bins[2].flow, 2.0);
        assert_eq!(bins[2].upper, f64::INFINITY);
        assert!(trip_length_distribution(&shipments, &impedance, 0.0, 3).is_empty());
    }
}
