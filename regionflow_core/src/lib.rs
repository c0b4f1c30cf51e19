//! RegionFlow Core - Balanced Regional Flow Matrices
//!
//! Two numeric engines turn partial, inconsistent regional economic data into
//! consistent flow matrices:
//! 1. **Balance Engine**: RAS / iterative proportional fitting of a seed
//!    matrix to row and column control totals, with negative and ad-hoc
//!    frozen values kept out of the scaling
//! 2. **Trade Engine**: a doubly-constrained gravity model that distributes
//!    supply to demand through an impedance-derived cost matrix
//!
//! Both engines are pure functions of in-memory `nalgebra` matrices. Input
//! problems are `BalanceError`s; running out of iterations is a
//! [`Termination`] status on the result.

pub mod config;
pub mod error;
pub mod freeze;
pub mod margins;
pub mod metrics;
pub mod records;
pub mod regionflow_balance;
pub mod regionflow_trade;
pub mod validation;

// Re-export key types for convenience
pub use config::{ConfigError, CostFunction, EngineConfig, FixedPointRule, GravityConfig, RasConfig};
pub use error::{Axis, BalanceError, ErrorKind, Location, QcCheck};
pub use freeze::{freeze_negatives, FrozenSplit};
pub use records::{BorderRecord, CellRecord};
pub use regionflow_balance::{
    ras_balance, ConvergenceResult, IterationTrace, RasBalancer, RasJob, RasJobProperties, RasOutcome,
    Termination,
};
pub use regionflow_trade::{gravity_solve, ConservationCheck, GravityResult, TradeModel};
pub use validation::{validate, QcPolicy, QcReport};
