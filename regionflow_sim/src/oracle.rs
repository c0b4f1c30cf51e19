//! Ground truth oracle for simulation.
//!
//! The Oracle generates synthetic problems whose answer is known:
//! - RAS problems: a "true" flow matrix supplies the border totals, the seed
//!   is that matrix blurred by multiplicative noise (an outdated survey)
//! - Gravity problems: places scattered on a plane, euclidean impedance,
//!   supply and demand rescaled to the same grand total

use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, LogNormal, Uniform};
use serde::{Deserialize, Serialize};

/// A seed matrix with border totals taken from a known truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasProblem {
    pub truth: DMatrix<f64>,
    pub seed: DMatrix<f64>,
    pub row_totals: DVector<f64>,
    pub col_totals: DVector<f64>,
}

impl RasProblem {
    fn refresh_totals(&mut self) {
        self.row_totals = self.truth.column_sum();
        self.col_totals = self.truth.row_sum().transpose();
    }
}

/// Places, impedance and masses for one gravity solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GravityProblem {
    /// Place coordinates `(x, y)`
    pub places: Vec<(f64, f64)>,
    pub impedance: DMatrix<f64>,
    pub supply: DVector<f64>,
    pub demand: DVector<f64>,
}

impl GravityProblem {
    /// Appends a place no other place can reach, with no supply or demand.
    pub fn with_unreachable_place(mut self) -> Self {
        let n = self.impedance.nrows();
        let mut impedance = DMatrix::from_element(n + 1, n + 1, f64::INFINITY);
        impedance.view_mut((0, 0), (n, n)).copy_from(&self.impedance);
        self.impedance = impedance;
        self.supply = self.supply.push(0.0);
        self.demand = self.demand.push(0.0);
        self.places.push((f64::INFINITY, f64::INFINITY));
        self
    }
}

/// The Oracle - generates seeded synthetic problems.
pub struct Oracle {
    rng: ChaCha8Rng,

    /// Log-space standard deviation of flows and masses
    flow_sigma: f64,

    /// Log-space standard deviation of the seed's deviation from truth
    seed_noise: f64,
}

impl Oracle {
    /// Creates a new Oracle with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            flow_sigma: 1.0,
            seed_noise: 0.3,
        }
    }

    fn lognormal(&mut self, sigma: f64) -> f64 {
        match LogNormal::new(0.0, sigma) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 1.0,
        }
    }

    /// Generates a strictly positive `rows x cols` RAS problem.
    pub fn ras_problem(&mut self, rows: usize, cols: usize) -> RasProblem {
        let flow_sigma = self.flow_sigma;
        let seed_noise = self.seed_noise;

        // Whole-unit flows keep both grand totals exact
        let truth = DMatrix::from_fn(rows, cols, |_, _| {
            (10.0 * self.lognormal(flow_sigma)).round().max(1.0)
        });
        let seed = truth.map(|v| v * self.lognormal(seed_noise));

        let mut problem = RasProblem {
            row_totals: DVector::zeros(rows),
            col_totals: DVector::zeros(cols),
            truth,
            seed,
        };
        problem.refresh_totals();
        problem
    }

    /// Generates a RAS problem whose seed carries `negatives` negative cells.
    ///
    /// Negative cells are net outflows with no counterpart in the truth, so
    /// the truth is a feasible answer for the scalable part.
    pub fn ras_problem_with_negatives(
        &mut self,
        rows: usize,
        cols: usize,
        negatives: usize,
    ) -> RasProblem {
        let mut problem = self.ras_problem(rows, cols);
        let cells = rows * cols;
        // Keep at least one positive cell per row and column
        let limit = negatives.min(cells.saturating_sub(rows.max(cols)));
        let mut chosen = 0;
        let mut attempts = 0;
        while chosen < limit && attempts < cells * 10 {
            attempts += 1;
            let i = self.rng.gen_range(0..rows);
            let j = self.rng.gen_range(0..cols);
            let row_positive = (0..cols).filter(|&c| problem.seed[(i, c)] > 0.0).count();
            let col_positive = (0..rows).filter(|&r| problem.seed[(r, j)] > 0.0).count();
            if problem.seed[(i, j)] > 0.0 && row_positive > 1 && col_positive > 1 {
                problem.seed[(i, j)] = -self.lognormal(self.flow_sigma);
                problem.truth[(i, j)] = 0.0;
                chosen += 1;
            }
        }
        problem.refresh_totals();
        problem
    }

    /// Zeroes row `row` of the truth and seed, and its border total.
    pub fn zero_row(problem: &mut RasProblem, row: usize) {
        for j in 0..problem.truth.ncols() {
            problem.truth[(row, j)] = 0.0;
            problem.seed[(row, j)] = 0.0;
        }
        problem.refresh_totals();
    }

    /// Generates `places` places on a 100 x 100 plane.
    ///
    /// Impedance is euclidean distance; intrazonal impedance is half the
    /// distance to the nearest other place (at least 0.5).
    pub fn gravity_problem(&mut self, places: usize) -> GravityProblem {
        let coord = Uniform::new(0.0, 100.0);
        let coords: Vec<(f64, f64)> = (0..places)
            .map(|_| (coord.sample(&mut self.rng), coord.sample(&mut self.rng)))
            .collect();

        let mut impedance = DMatrix::from_fn(places, places, |i, j| {
            let (xi, yi) = coords[i];
            let (xj, yj) = coords[j];
            ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt()
        });
        for i in 0..places {
            let nearest = (0..places)
                .filter(|&j| j != i)
                .map(|j| impedance[(i, j)])
                .fold(f64::INFINITY, f64::min);
            impedance[(i, i)] = if nearest.is_finite() {
                (nearest / 2.0).max(0.5)
            } else {
                1.0
            };
        }

        let flow_sigma = self.flow_sigma;
        let supply = DVector::from_fn(places, |_, _| 100.0 * self.lognormal(flow_sigma));
        let demand = DVector::from_fn(places, |_, _| 100.0 * self.lognormal(flow_sigma));
        let demand = &demand * (supply.sum() / demand.sum());

        GravityProblem {
            places: coords,
            impedance,
            supply,
            demand,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_same_seed_same_problem() {
        let a = Oracle::new(42).ras_problem(4, 3);
        let b = Oracle::new(42).ras_problem(4, 3);
        assert_eq!(a.seed, b.seed);

        let c = Oracle::new(43).ras_problem(4, 3);
        assert_ne!(a.seed, c.seed);
    }

    #[test]
    fn test_ras_totals_are_consistent() {
        let p = Oracle::new(7).ras_problem(5, 6);
        assert_eq!(p.row_totals.sum(), p.col_totals.sum());
        assert!(p.truth.iter().all(|v| v.fract() == 0.0 && *v >= 1.0));
        assert!(p.seed.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn test_negative_cells_leave_rows_populated() {
        let p = Oracle::new(9).ras_problem_with_negatives(4, 4, 5);
        let negatives = p.seed.iter().filter(|v| **v < 0.0).count();
        assert!(negatives > 0 && negatives <= 5);
        for i in 0..4 {
            assert!((0..4).any(|j| p.seed[(i, j)] > 0.0));
            assert!((0..4).any(|j| p.seed[(j, i)] > 0.0));
        }
    }

    #[test]
    fn test_zero_row_keeps_totals_consistent() {
        let mut p = Oracle::new(3).ras_problem(3, 3);
        Oracle::zero_row(&mut p, 1);
        assert_eq!(p.row_totals[1], 0.0);
        assert!(p.seed.row(1).iter().all(|v| *v == 0.0));
        assert_eq!(p.row_totals.sum(), p.col_totals.sum());
    }

    #[test]
    fn test_gravity_problem_shape() {
        let p = Oracle::new(11).gravity_problem(6);
        assert_eq!(p.impedance.shape(), (6, 6));
        assert_relative_eq!(p.supply.sum(), p.demand.sum(), max_relative = 1e-12);
        assert!(p.impedance.iter().all(|d| d.is_finite() && *d > 0.0));
        assert_relative_eq!(p.impedance, p.impedance.transpose());

        let p = p.with_unreachable_place();
        assert_eq!(p.impedance.shape(), (7, 7));
        assert_eq!(p.supply[6], 0.0);
        assert!(p.impedance[(6, 0)].is_infinite());
    }
}
