//! Error types for the RegionFlow environment abstraction.

use thiserror::Error;

/// Reasons an environment asks a running solve to stop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// A caller raised the cancel flag
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The solve exceeded its time budget
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a cancellation error.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    /// Creates a timeout error from the budget that was exceeded.
    pub fn timeout(budget: std::time::Duration) -> Self {
        Self::Timeout(budget.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EnvError::cancelled("operator request").to_string(),
            "Cancelled: operator request"
        );
        assert_eq!(
            EnvError::timeout(Duration::from_millis(1500)).to_string(),
            "Timeout after 1500ms"
        );
    }
}
