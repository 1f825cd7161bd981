//! Trigger-rate search configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Validate, ValidationError};

/// Distance above the market rate searched when no upper bound is given.
pub const DEFAULT_SEARCH_WIDTH: f64 = 0.10;

/// Settings for the optimal trigger-rate search.
///
/// Bounds are annual contract rates. Missing bounds resolve against the
/// market rate: `[initial_rate, initial_rate + 0.10]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSearchConfig {
    /// Lowest contract rate to scan.
    #[serde(default)]
    pub lower_rate: Option<f64>,

    /// Highest contract rate to scan.
    #[serde(default)]
    pub upper_rate: Option<f64>,

    /// Grid spacing for the initial scan.
    #[serde(default = "default_step")]
    pub step: f64,

    /// Bisection tolerance on the contract rate.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Maximum bisection iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_step() -> f64 {
    0.0025 // 25 bp
}

fn default_tolerance() -> f64 {
    1e-6 // 0.01 bp
}

fn default_max_iterations() -> u32 {
    100
}

impl Default for TriggerSearchConfig {
    fn default() -> Self {
        Self {
            lower_rate: None,
            upper_rate: None,
            step: default_step(),
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl TriggerSearchConfig {
    /// Sets explicit search bounds.
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_rate = Some(lower);
        self.upper_rate = Some(upper);
        self
    }

    /// Sets the scan step.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Sets the bisection tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the bisection iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Resolves the search interval against a market rate.
    pub fn resolve_bounds(&self, initial_rate: f64) -> (f64, f64) {
        let lower = self.lower_rate.unwrap_or(initial_rate);
        let upper = self
            .upper_rate
            .unwrap_or(initial_rate + DEFAULT_SEARCH_WIDTH);
        (lower, upper)
    }
}

impl Validate for TriggerSearchConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if !self.step.is_finite() || self.step <= 0.0 {
            errors.push(ValidationError::with_rule(
                "step",
                format!("Search step must be positive, got {}", self.step),
                "positive_step",
            ));
        }

        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            errors.push(ValidationError::with_rule(
                "tolerance",
                format!("Tolerance must be positive, got {}", self.tolerance),
                "positive_tolerance",
            ));
        }

        if self.max_iterations == 0 {
            errors.push(ValidationError::with_rule(
                "max_iterations",
                "Max iterations must be at least 1",
                "positive_iterations",
            ));
        }

        for (field, bound) in [("lower_rate", self.lower_rate), ("upper_rate", self.upper_rate)] {
            if let Some(rate) = bound {
                if !rate.is_finite() || rate < 0.0 {
                    errors.push(ValidationError::with_rule(
                        field,
                        format!("Contract rate bound must be finite and non-negative, got {rate}"),
                        "non_negative_rate",
                    ));
                }
            }
        }

        if let (Some(lower), Some(upper)) = (self.lower_rate, self.upper_rate) {
            if upper <= lower {
                errors.push(ValidationError::with_rule(
                    "upper_rate",
                    format!("Upper bound {upper} must exceed lower bound {lower}"),
                    "ordered_bounds",
                ));
            }
        }

        errors
    }
}
