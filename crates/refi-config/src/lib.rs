//! Refi Configuration Layer
//!
//! This crate provides the configuration for a refinancing-option valuation:
//! loan terms, short-rate process parameters, transaction costs, lattice
//! size, and the policy switches that pick between modelling alternatives.
//!
//! # Features
//!
//! - **Model Configuration**: annual inputs, converted to periodic rates on demand
//! - **Policies**: rate dynamics, lender valuation, value-table retention
//! - **Trigger Search**: bounds, grid step and tolerance for the IRD search
//! - **Loading**: JSON and TOML documents, validated on load
//!
//! # Example
//!
//! ```rust
//! use refi_config::{ModelConfig, RateDynamics, Validate};
//!
//! let config = ModelConfig::demo_refinance()
//!     .with_rate_dynamics(RateDynamics::Normal)
//!     .with_volatility(0.01)
//!     .with_rate_floor(0.0);
//!
//! assert!(config.is_valid());
//! ```
//!
//! # Presets
//!
//! - `chen_ling_1989` - 10% loan, 8% market, 15% volatility, 12 steps
//! - `demo_refinance` - 12% loan, 6% market, refinancing is optimal now
//! - `demo_wait` - 8% loan, 8% market, waiting is optimal

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod model;
mod trigger;

pub use error::{ConfigError, ConfigResult, Validate, ValidationError};
pub use model::{LenderValuation, ModelConfig, RateDynamics, Retention};
pub use trigger::{TriggerSearchConfig, DEFAULT_SEARCH_WIDTH};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ConfigError, ConfigResult, Validate};
    pub use crate::model::{LenderValuation, ModelConfig, RateDynamics, Retention};
    pub use crate::trigger::TriggerSearchConfig;
}
