//! Root-finding algorithms.
//!
//! This module provides the bracketing tools used to locate refinancing
//! thresholds:
//!
//! - [`grid_points`] / [`first_upcrossing`]: coarse grid search for the
//!   first point where a function turns non-negative
//! - [`bisect_bracket`]: refinement of a bracket down to a configured width
//!
//! Objectives are `FnMut` so a caller can log every evaluation.
//!
//! # Example
//!
//! ```rust
//! use refi_math::solvers::{bisect_bracket, first_upcrossing, grid_points, SolverConfig};
//!
//! let f = |x: f64| x * x - 2.0;
//!
//! let samples: Vec<(f64, f64)> = grid_points(0.0, 3.0, 0.5)
//!     .unwrap()
//!     .into_iter()
//!     .map(|x| (x, f(x)))
//!     .collect();
//! let bracket = first_upcrossing(&samples).unwrap();
//! assert!(bracket.lower < std::f64::consts::SQRT_2);
//!
//! let result = bisect_bracket(f, &bracket, &SolverConfig::default()).unwrap();
//! assert!((result.root - std::f64::consts::SQRT_2).abs() < 1e-9);
//! ```

mod bisection;
mod bracket;

pub use bisection::bisect_bracket;
pub use bracket::{first_upcrossing, grid_points, Bracket};

/// Default tolerance (bracket half-width) for root-finding algorithms.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Default maximum iterations for root-finding algorithms.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Configuration for root-finding algorithms.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Convergence tolerance on the bracket half-width.
    pub tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    /// Creates a new solver configuration.
    #[must_use]
    pub fn new(tolerance: f64, max_iterations: u32) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Sets the tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Result of a root-finding iteration.
#[derive(Debug, Clone, Copy)]
pub struct SolverResult {
    /// The root found (midpoint of the final bracket).
    pub root: f64,
    /// Number of iterations used.
    pub iterations: u32,
    /// Function value at the last evaluated point.
    pub residual: f64,
    /// Final bracket `(lower, upper)` with `f(lower) < 0 <= f(upper)` for
    /// increasing functions.
    pub bracket: (f64, f64),
}
