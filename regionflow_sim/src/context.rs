//! Simulation context implementing SolveContext for deterministic testing.

use regionflow_env::{CancelToken, EnvError, SolveContext};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Solve context backed by a virtual clock.
///
/// Every [`SolveContext::check`] advances the clock by a fixed step, so an
/// engine given a budget of `n * step` is interrupted on exactly its
/// `n + 1`-th iteration, on every machine.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<AtomicU64>,

    /// Virtual time charged per check
    step: Duration,

    /// Time budget; checks past it fail with a timeout
    budget: Option<Duration>,

    cancel: Option<CancelToken>,
}

impl SimContext {
    /// Creates an unbounded context charging 1ms per check.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(AtomicU64::new(0)),
            step: Duration::from_millis(1),
            budget: None,
            cancel: None,
        }
    }

    /// Creates a context that times out once `budget` is used up.
    pub fn with_budget(seed: u64, step: Duration, budget: Duration) -> Self {
        Self {
            step,
            budget: Some(budget),
            ..Self::new(seed)
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        self.virtual_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.load(Ordering::SeqCst)
    }

    /// Number of checks charged so far.
    pub fn checks(&self) -> u64 {
        let step = self.step.as_nanos() as u64;
        if step == 0 {
            0
        } else {
            self.time_ns() / step
        }
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            step: self.step,
            budget: self.budget,
            cancel: self.cancel.clone(),
        }
    }
}

impl SolveContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn check(&self) -> Result<(), EnvError> {
        if let Some(token) = &self.cancel {
            token.check()?;
        }
        self.advance_time(self.step);
        match self.budget {
            Some(budget) if self.now() > budget => Err(EnvError::timeout(budget)),
            _ => Ok(()),
        }
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
