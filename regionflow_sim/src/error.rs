//! Harness error types.

use regionflow_core::ConfigError;
use thiserror::Error;

/// Failures outside the scenarios themselves.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode export: {0}")]
    Json(#[from] serde_json::Error),
}
