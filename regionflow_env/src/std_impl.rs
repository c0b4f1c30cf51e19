//! Production implementation of SolveContext using the system clock.

use crate::{EnvError, SolveContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancel flag.
///
/// Cloning yields a handle to the same flag, so one clone can be given to a
/// solve and another kept by whoever decides to stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the "running" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once `cancel` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl SolveContext for CancelToken {
    fn now(&self) -> Duration {
        Duration::ZERO
    }

    fn check(&self) -> Result<(), EnvError> {
        if self.is_cancelled() {
            Err(EnvError::cancelled("cancel token raised"))
        } else {
            Ok(())
        }
    }
}

/// Production context backed by `Instant`.
///
/// Combines an optional time budget with an optional cancel token.
pub struct WallClockContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// Time budget, if any
    timeout: Option<Duration>,

    /// External cancel flag, if any
    cancel: Option<CancelToken>,
}

impl WallClockContext {
    /// Creates a context with no budget and no cancel flag.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            timeout: None,
            cancel: None,
        }
    }

    /// Creates a context that interrupts once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new()
        }
    }

    /// Attaches a cancel token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl Default for WallClockContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SolveContext for WallClockContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn check(&self) -> Result<(), EnvError> {
        if let Some(token) = &self.cancel {
            token.check()?;
        }
        if let Some(budget) = self.timeout {
            if self.start.elapsed() >= budget {
                return Err(EnvError::timeout(budget));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();

        assert!(token.check().is_ok());
        handle.cancel();

        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(EnvError::Cancelled(_))));
    }

    #[test]
    fn test_wall_clock_zero_budget_times_out() {
        let ctx = WallClockContext::with_timeout(Duration::ZERO);
        assert_eq!(ctx.check(), Err(EnvError::Timeout(0)));
    }

    #[test]
    fn test_wall_clock_generous_budget_runs() {
        let ctx = WallClockContext::with_timeout(Duration::from_secs(3600));
        assert!(ctx.check().is_ok());
        assert!(ctx.now() < Duration::from_secs(3600));
    }

    #[test]
    fn test_wall_clock_honours_cancel_token() {
        let token = CancelToken::new();
        let ctx = WallClockContext::new().with_cancel_token(token.clone());

        assert!(ctx.check().is_ok());
        token.cancel();
        assert!(matches!(ctx.check(), Err(EnvError::Cancelled(_))));
    }

    #[test]
    fn test_wall_clock_context_seed() {
        let ctx = WallClockContext::new();
        assert_eq!(ctx.seed(), 0);
    }
}
