//! # Refi Math
//!
//! Numerical utilities for the Refi refinancing-option library.
//!
//! This crate provides:
//!
//! - **Solvers**: bracketing root-finding (bisection with a mutable objective)
//! - **Bracket scanning**: grid search for the first sign change of a function
//!
//! The lattice engine is expensive to evaluate, so every solver here accepts
//! `FnMut` objectives. Callers can record each evaluation (for trial tables)
//! without interior mutability.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::doc_markdown)]

pub mod error;
pub mod solvers;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{MathError, MathResult};
    pub use crate::solvers::{
        bisect_bracket, first_upcrossing, grid_points, Bracket, SolverConfig, SolverResult,
        DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE,
    };
}

pub use error::{MathError, MathResult};
