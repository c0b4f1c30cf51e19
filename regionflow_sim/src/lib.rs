//! RegionFlow Deterministic Scenario Harness
//!
//! Drives both balancing engines through seeded, reproducible scenarios:
//! synthetic problems with a known answer, edge cases that must not produce
//! NaN, and budget-limited runs that must stop at a predictable iteration.
//!
//! # Core Principle: Nothing Varies Between Runs
//!
//! - **Problems**: every matrix and vector comes from a ChaCha stream keyed
//!   by the master seed and the scenario
//! - **Time**: engines see a virtual clock that advances a fixed step per
//!   iteration, so a timeout lands on the same iteration on every machine
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    ScenarioRunner                     │
//! │  ┌──────────────┐        ┌─────────────────────────┐  │
//! │  │    Oracle    │──────► │ RasBalancer / TradeModel│  │
//! │  │ (known truth)│        │    (regionflow_core)    │  │
//! │  └──────────────┘        └────────────▲────────────┘  │
//! │                                       │ check()       │
//! │                          ┌────────────┴────────────┐  │
//! │                          │ SimContext (virtual clk)│  │
//! │                          └─────────────────────────┘  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use regionflow_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::FrozenNegatives);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod oracle;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{GravityExport, RasExport, SimExport};
pub use oracle::{GravityProblem, Oracle, RasProblem};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
