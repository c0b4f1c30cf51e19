//! Engine configuration.
//!
//! Every tunable the engines use lives here and is passed into each entry
//! point explicitly. Defaults reproduce the legacy constants.

use crate::error::BalanceError;
use crate::validation::QcPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] BalanceError),
}

/// RAS balancer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasConfig {
    /// Iteration cap (default: 10 000)
    pub max_iterations: usize,

    /// Absolute tolerance on row and column errors (default: 1e-5)
    pub epsilon: f64,

    /// Keep a per-iteration `(iteration, row_error, col_error)` trace
    pub record_trace: bool,
}

impl Default for RasConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            epsilon: 1e-5,
            record_trace: false,
        }
    }
}

impl RasConfig {
    pub fn validate(&self) -> Result<(), BalanceError> {
        if self.max_iterations == 0 {
            return Err(BalanceError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(BalanceError::InvalidConfig(format!(
                "epsilon must be finite and positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Impedance-to-cost transform: `alpha * d^beta * exp(gamma * d)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostFunction {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Default for CostFunction {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: -1.1,
            gamma: 0.0,
        }
    }
}

impl CostFunction {
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self { alpha, beta, gamma }
    }

    /// Cost of one impedance value. May be non-finite (e.g. `0^-1.1`).
    pub fn apply(&self, impedance: f64) -> f64 {
        // 0 * inf is NaN; an unreachable pair must cost 0, not NaN
        let decay = if self.gamma == 0.0 {
            1.0
        } else {
            (self.gamma * impedance).exp()
        };
        self.alpha * impedance.powf(self.beta) * decay
    }

    pub fn validate(&self) -> Result<(), BalanceError> {
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta), ("gamma", self.gamma)] {
            if !value.is_finite() {
                return Err(BalanceError::InvalidConfig(format!(
                    "cost function {} must be finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Stopping rule for the balancing-factor fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedPointRule {
    /// Run exactly this many rounds (legacy: 100); the result counts as
    /// converged only if its residual ends below `rounds_tolerance`
    Rounds(usize),

    /// Stop once supply and demand are reproduced within `tolerance`
    /// (max absolute residual), or after `max_rounds`
    Converge { tolerance: f64, max_rounds: usize },
}

impl Default for FixedPointRule {
    fn default() -> Self {
        FixedPointRule::Rounds(100)
    }
}

impl FixedPointRule {
    /// Upper bound on rounds.
    pub fn max_rounds(&self) -> usize {
        match *self {
            FixedPointRule::Rounds(n) => n,
            FixedPointRule::Converge { max_rounds, .. } => max_rounds,
        }
    }

    pub fn validate(&self) -> Result<(), BalanceError> {
        match *self {
            FixedPointRule::Rounds(0) => Err(BalanceError::InvalidConfig(
                "fixed-point rounds must be at least 1".to_string(),
            )),
            FixedPointRule::Converge { tolerance, max_rounds } => {
                if max_rounds == 0 {
                    return Err(BalanceError::InvalidConfig(
                        "max_rounds must be at least 1".to_string(),
                    ));
                }
                if !tolerance.is_finite() || tolerance <= 0.0 {
                    return Err(BalanceError::InvalidConfig(format!(
                        "fixed-point tolerance must be finite and positive, got {}",
                        tolerance
                    )));
                }
                Ok(())
            }
            FixedPointRule::Rounds(_) => Ok(()),
        }
    }
}

/// Gravity trade model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityConfig {
    pub cost: CostFunction,

    pub fixed_point: FixedPointRule,

    /// Residual below which a fixed-round solve counts as converged
    /// (default: 1e-6)
    pub rounds_tolerance: f64,

    /// Largest acceptable `|total shipped supply - total shipped demand|`
    /// (default: 1.0 flow unit)
    pub conservation_tolerance: f64,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            cost: CostFunction::default(),
            fixed_point: FixedPointRule::default(),
            rounds_tolerance: 1e-6,
            conservation_tolerance: 1.0,
        }
    }
}

impl GravityConfig {
    pub fn validate(&self) -> Result<(), BalanceError> {
        self.cost.validate()?;
        self.fixed_point.validate()?;
        if !self.rounds_tolerance.is_finite() || self.rounds_tolerance <= 0.0 {
            return Err(BalanceError::InvalidConfig(format!(
                "rounds_tolerance must be finite and positive, got {}",
                self.rounds_tolerance
            )));
        }
        if !self.conservation_tolerance.is_finite() || self.conservation_tolerance < 0.0 {
            return Err(BalanceError::InvalidConfig(format!(
                "conservation_tolerance must be finite and >= 0, got {}",
                self.conservation_tolerance
            )));
        }
        Ok(())
    }
}

/// Top-level configuration for a RegionFlow run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ras: RasConfig,
    pub gravity: GravityConfig,
    pub qc: QcPolicy,
}

impl EngineConfig {
    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), BalanceError> {
        self.ras.validate()?;
        self.gravity.validate()?;
        self.qc.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_match_legacy_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.ras.max_iterations, 10_000);
        assert_eq!(config.ras.epsilon, 1e-5);
        assert_eq!(config.gravity.cost, CostFunction::new(1.0, -1.1, 0.0));
        assert_eq!(config.gravity.fixed_point, FixedPointRule::Rounds(100));
        assert_eq!(config.gravity.rounds_tolerance, 1e-6);
        assert_eq!(config.gravity.conservation_tolerance, 1.0);
        assert_eq!(config.qc.border_tolerance, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{
                "ras": { "epsilon": 0.001 },
                "gravity": { "fixed_point": { "converge": { "tolerance": 1e-6, "max_rounds": 500 } } },
                "qc": { "border_tolerance": 0.01 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.ras.epsilon, 0.001);
        assert_eq!(config.ras.max_iterations, 10_000);
        assert_eq!(
            config.gravity.fixed_point,
            FixedPointRule::Converge { tolerance: 1e-6, max_rounds: 500 }
        );
        assert_eq!(config.gravity.cost.beta, -1.1);
        assert_eq!(config.qc.border_tolerance, 0.01);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = EngineConfig::default();
        config.gravity.fixed_point = FixedPointRule::Rounds(40);
        config.qc.control_total = Some(1234.5);

        let json = config.to_json_pretty().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "ras": { "max_iterations": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(BalanceError::InvalidConfig(_))));

        let err = EngineConfig::from_json_str(r#"{ "gravity": { "fixed_point": { "rounds": 0 } } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_json_str(r#"{ "gravity": { "rounds_tolerance": 0.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(BalanceError::InvalidConfig(_))));

        let err = EngineConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_cost_function_default_decay() {
        let cost = CostFunction::default();
        assert_relative_eq!(cost.apply(1.0), 1.0);
        assert_relative_eq!(cost.apply(10.0), 10f64.powf(-1.1), epsilon = 1e-12);
        assert!(cost.apply(0.0).is_infinite());
        assert_eq!(cost.apply(f64::INFINITY), 0.0);
    }
}
