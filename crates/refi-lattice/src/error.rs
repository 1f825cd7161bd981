//! Error types for lattice valuation.

use std::fmt;

use refi_config::ConfigError;
use refi_math::MathError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trigger::TriggerTrial;

/// A specialized Result type for lattice operations.
pub type LatticeResult<T> = Result<T, LatticeError>;

/// Which end of the search range the trigger search ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerBoundary {
    /// No contract rate in the range makes refinancing optimal.
    NeverOptimal,
    /// Refinancing is already optimal at the lower bound.
    AlwaysOptimal,
}

impl fmt::Display for TriggerBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverOptimal => write!(f, "refinancing is never optimal in range"),
            Self::AlwaysOptimal => write!(f, "refinancing is already optimal at lower bound"),
        }
    }
}

/// Errors that can occur while building or valuing the lattice.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LatticeError {
    /// Invalid model or search parameters.
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// Description of what's invalid.
        reason: String,
    },

    /// Results were requested before the model was solved.
    #[error("Model has not been solved; call solve_model() first")]
    Uninitialized,

    /// Node index outside the lattice.
    #[error("Node ({t}, {j}) is outside a lattice of {steps} steps")]
    OutOfRange {
        /// Time step.
        t: usize,
        /// Up-move count.
        j: usize,
        /// Number of steps in the lattice.
        steps: usize,
    },

    /// Period past the end of the loan.
    #[error("Period {period} is beyond the loan term of {term} periods")]
    PeriodOutOfRange {
        /// Requested period.
        period: u32,
        /// Loan term.
        term: u32,
    },

    /// Node values were discarded by root-only retention.
    #[error("Values at step {t} were not retained; solve with full-tree retention")]
    NodeNotRetained {
        /// Requested time step.
        t: usize,
    },

    /// Trigger search found no threshold in the range.
    #[error("No trigger rate in [{lower:.6}, {upper:.6}]: {boundary}")]
    TriggerNotFound {
        /// Lower contract rate searched.
        lower: f64,
        /// Upper contract rate searched.
        upper: f64,
        /// Which side the search ran into.
        boundary: TriggerBoundary,
        /// Grid evaluations made before giving up.
        trials: Vec<TriggerTrial>,
    },

    /// Root-finding failure.
    #[error("Solver error: {0}")]
    Solver(#[from] MathError),
}

impl LatticeError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Creates an out-of-range node error.
    #[must_use]
    pub fn out_of_range(t: usize, j: usize, steps: usize) -> Self {
        Self::OutOfRange { t, j, steps }
    }
}

impl From<ConfigError> for LatticeError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LatticeError::out_of_range(3, 5, 10);
        assert_eq!(err.to_string(), "Node (3, 5) is outside a lattice of 10 steps");

        let err = LatticeError::TriggerNotFound {
            lower: 0.08,
            upper: 0.18,
            boundary: TriggerBoundary::NeverOptimal,
            trials: Vec::new(),
        };
        assert!(err.to_string().contains("never optimal"));
    }

    #[test]
    fn test_from_config_error() {
        let err: LatticeError = ConfigError::Validation {
            field: "prob_up".into(),
            message: "out of range".into(),
        }
        .into();
        assert!(matches!(err, LatticeError::Configuration { .. }));
        assert!(err.to_string().contains("prob_up"));
    }

    #[test]
    fn test_from_math_error() {
        let err: LatticeError = MathError::convergence_failed(100, 1e-3).into();
        assert!(matches!(err, LatticeError::Solver(_)));
    }
}
