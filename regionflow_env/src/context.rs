//! Core solve-context trait for RegionFlow engines.

use crate::EnvError;
use std::time::Duration;

/// The interface between an iterative solver and its environment.
///
/// Solvers never look at clocks or flags directly. They hold a
/// `&dyn SolveContext` (or a generic `C: SolveContext`) and ask it at every
/// iteration boundary whether to continue.
///
/// # Implementations
///
/// - **Production**: `WallClockContext` - `Instant`-based deadline + cancel flag
/// - **No limits**: `Unbounded` - never interrupts
/// - **Simulation**: `SimContext` (in `regionflow_sim`) - virtual clock
pub trait SolveContext: Send + Sync {
    /// Returns the time elapsed since the context was created.
    ///
    /// In simulation, this is virtual time.
    fn now(&self) -> Duration;

    /// Returns `Err` when the running solve should stop.
    ///
    /// Called once per iteration; implementations must be cheap.
    fn check(&self) -> Result<(), EnvError>;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// Production contexts are not seeded and return 0.
    fn seed(&self) -> u64 {
        0
    }
}

/// A context that never interrupts a solve.
///
/// Used by the plain entry points (`ras_balance`, `gravity_solve`) where the
/// iteration cap is the only bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl SolveContext for Unbounded {
    fn now(&self) -> Duration {
        Duration::ZERO
    }

    fn check(&self) -> Result<(), EnvError> {
        Ok(())
    }
}

impl<T: SolveContext + ?Sized> SolveContext for &T {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn check(&self) -> Result<(), EnvError> {
        (**self).check()
    }

    fn seed(&self) -> u64 {
        (**self).seed()
    }
}

impl<T: SolveContext + ?Sized> SolveContext for std::sync::Arc<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn check(&self) -> Result<(), EnvError> {
        (**self).check()
    }

    fn seed(&self) -> u64 {
        (**self).seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unbounded_never_interrupts() {
        let ctx = Unbounded;
        for _ in 0..1000 {
            assert!(ctx.check().is_ok());
        }
        assert_eq!(ctx.seed(), 0);
    }

    #[test]
    fn test_context_through_arc_and_ref() {
        let ctx = Arc::new(Unbounded);
        assert!(ctx.check().is_ok());

        let by_ref: &dyn SolveContext = &Unbounded;
        assert!(by_ref.check().is_ok());
        assert_eq!(by_ref.now(), Duration::ZERO);
    }
}
