// Property-based tests for the balance and trade engines.
// CI: 128 cases (default). Soak: PROPTEST_CASES=5000 cargo test --release

use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use regionflow_core::margins::{col_sums, row_sums};
use regionflow_core::metrics::max_cross_ratio_drift;
use regionflow_core::{
    freeze_negatives, gravity_solve, ras_balance, validate, BalanceError, QcPolicy, Termination,
};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Matrix of the given entry range, 1..=5 rows and columns.
fn arb_matrix(lo: f64, hi: f64) -> impl Strategy<Value = DMatrix<f64>> {
    (1usize..=5, 1usize..=5).prop_flat_map(move |(r, c)| {
        prop::collection::vec(lo..hi, r * c).prop_map(move |v| DMatrix::from_vec(r, c, v))
    })
}

/// Positive seed plus border totals taken from another positive matrix of the
/// same shape, so the totals are consistent and reachable.
fn arb_ras_problem() -> impl Strategy<Value = (DMatrix<f64>, DVector<f64>, DVector<f64>)> {
    (1usize..=5, 1usize..=5).prop_flat_map(|(r, c)| {
        (
            prop::collection::vec(0.5..10.0f64, r * c),
            prop::collection::vec(0.5..10.0f64, r * c),
        )
            .prop_map(move |(seed, truth)| {
                let seed = DMatrix::from_vec(r, c, seed);
                let truth = DMatrix::from_vec(r, c, truth);
                (seed, row_sums(&truth), col_sums(&truth))
            })
    })
}

/// Symmetric impedance with short intrazonal trips, supply, and demand
/// rescaled to the same grand total.
fn arb_gravity_problem() -> impl Strategy<Value = (DMatrix<f64>, DVector<f64>, DVector<f64>)> {
    (2usize..=6).prop_flat_map(|n| {
        (
            prop::collection::vec(2.0..50.0f64, n * n),
            prop::collection::vec(0.5..5.0f64, n),
            prop::collection::vec(1.0..100.0f64, n),
            prop::collection::vec(1.0..100.0f64, n),
        )
            .prop_map(move |(dist, diag, supply, demand)| {
                let raw = DMatrix::from_vec(n, n, dist);
                let mut impedance = (&raw + raw.transpose()) * 0.5;
                for i in 0..n {
                    impedance[(i, i)] = diag[i];
                }
                let supply = DVector::from_vec(supply);
                let demand = DVector::from_vec(demand);
                let demand = &demand * (supply.sum() / demand.sum());
                (impedance, supply, demand)
            })
    })
}

// ---------------------------------------------------------------------------
// Freeze
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn freeze_split_reassembles_exactly(m in arb_matrix(-100.0, 100.0)) {
        let r = row_sums(&m);
        let c = col_sums(&m);
        let split = freeze_negatives(&m, &r, &c);

        prop_assert_eq!(split.original_matrix(), m);
        prop_assert_eq!(split.original_rows(), r);
        prop_assert_eq!(split.original_cols(), c);
        prop_assert!(split.scalable_matrix.iter().all(|v| *v >= 0.0));
        prop_assert!(split.frozen_matrix.iter().all(|v| *v <= 0.0));
    }
}

// ---------------------------------------------------------------------------
// RAS
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn ras_converges_on_positive_consistent_problems((m, r, c) in arb_ras_problem()) {
        let frozen = DMatrix::zeros(m.nrows(), m.ncols());
        let result = ras_balance(&m, &r, &c, &frozen, 10_000, 1e-6).unwrap();

        prop_assert_eq!(result.termination, Termination::Converged);
        let rs = row_sums(&result.balanced);
        let cs = col_sums(&result.balanced);
        for i in 0..r.len() {
            prop_assert!((rs[i] - r[i]).abs() < 1e-6);
        }
        for j in 0..c.len() {
            prop_assert!((cs[j] - c[j]).abs() < 1e-6);
        }
        prop_assert!(max_cross_ratio_drift(&m, &result.balanced) < 1e-8);
    }

    #[test]
    fn ras_never_produces_non_finite_values(m in arb_matrix(0.0, 10.0), scale in 0.1..10.0f64) {
        let r = row_sums(&m) * scale;
        let c = col_sums(&m) * scale;
        let frozen = DMatrix::zeros(m.nrows(), m.ncols());

        let result = ras_balance(&m, &r, &c, &frozen, 50, 1e-9).unwrap();
        prop_assert!(result.balanced.iter().all(|v| v.is_finite() && *v >= 0.0));
        prop_assert!(result.iterations <= 50);
    }

    #[test]
    fn validation_rejects_disagreeing_border_totals(
        m in arb_matrix(0.0, 10.0),
        gap in 0.01..100.0f64,
    ) {
        let r = row_sums(&m);
        let mut c = col_sums(&m);
        c[0] += gap;

        let err = validate(&r, &c, &m, &QcPolicy::with_tolerance(gap / 2.0)).unwrap_err();
        let is_border_mismatch = matches!(err, BalanceError::BorderTotalMismatch { .. });
        prop_assert!(is_border_mismatch);
    }
}

// ---------------------------------------------------------------------------
// Gravity
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config())]

    #[test]
    fn gravity_conserves_balanced_supply_and_demand((d, s, t) in arb_gravity_problem()) {
        let result = gravity_solve(&d, &s, &t, 1.0, -1.1, 0.0, 100).unwrap();

        prop_assert!(result.shipments.iter().all(|v| v.is_finite() && *v >= 0.0));
        prop_assert!(result.conservation.balanced);
        prop_assert!((result.total_shipped_supply - result.total_shipped_demand).abs() <= 1.0);
    }

    #[test]
    fn gravity_zero_guards_an_unreachable_place((d, s, t) in arb_gravity_problem()) {
        let n = d.nrows();
        let mut impedance = DMatrix::from_element(n + 1, n + 1, f64::INFINITY);
        impedance.view_mut((0, 0), (n, n)).copy_from(&d);
        let supply = s.push(0.0);
        let demand = t.push(0.0);

        let result = gravity_solve(&impedance, &supply, &demand, 1.0, -1.1, 0.0, 100).unwrap();

        prop_assert!(result.shipments.iter().all(|v| v.is_finite()));
        prop_assert!(result.origin_factors.iter().all(|v| v.is_finite()));
        prop_assert!(result.destination_factors.iter().all(|v| v.is_finite()));
        prop_assert_eq!(row_sums(&result.shipments)[n], 0.0);
        prop_assert_eq!(col_sums(&result.shipments)[n], 0.0);
    }
}
