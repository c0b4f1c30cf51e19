//! RegionFlow Environment Abstraction Layer
//!
//! The balancing engines in `regionflow_core` are pure loops over in-memory
//! matrices. The only thing they ask of the outside world is whether they
//! should keep going. This crate provides that seam:
//!
//! - **Cancellation**: a shared flag another thread can raise
//! - **Deadlines**: a wall-clock budget for a single solve
//! - **Identity**: a [`RunId`] that ties log lines to one job or commodity
//!
//! Engines call [`SolveContext::check`] once per iteration. Production code
//! uses [`WallClockContext`] or [`Unbounded`]; the simulation harness plugs in
//! a virtual clock so timeouts are reproducible.
//!
//! # Example
//!
//! ```ignore
//! use regionflow_env::{CancelToken, WallClockContext};
//! use std::time::Duration;
//!
//! let token = CancelToken::new();
//! let ctx = WallClockContext::with_timeout(Duration::from_secs(30))
//!     .with_cancel_token(token.clone());
//!
//! // hand `ctx` to RasBalancer::balance_with_context, call token.cancel()
//! // from elsewhere to stop it at the next iteration boundary
//! ```

mod context;
mod types;
mod error;
mod std_impl;

pub use context::{SolveContext, Unbounded};
pub use types::RunId;
pub use error::EnvError;
pub use std_impl::{CancelToken, WallClockContext};
