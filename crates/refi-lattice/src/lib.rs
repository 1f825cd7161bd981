//! # Refi Lattice
//!
//! Binomial lattice valuation of the prepayment option embedded in a
//! fixed-rate, level-payment mortgage.
//!
//! The borrower may refinance at any period by paying off the outstanding
//! balance plus a proportional cost. Treating this as an American option on
//! a recombining short-rate tree, the engine computes at every node:
//!
//! - `G`: intrinsic value of refinancing now
//! - `W`: value of waiting one more period
//! - `V`: option value, `max(G, W)`
//! - `M`: borrower's liability under the optimal policy
//! - `LM`: lender's market value of the loan
//!
//! and searches for the minimum contract-over-market differential that
//! makes immediate refinancing optimal.
//!
//! ## Quick Start
//!
//! ```rust
//! use refi_config::{ModelConfig, TriggerSearchConfig};
//! use refi_lattice::prelude::*;
//!
//! let mut model = RefinancingModel::new(ModelConfig::demo_refinance()).unwrap();
//! let root = model.solve_model().unwrap();
//! assert_eq!(root.decision(), RefinanceDecision::Refinance);
//!
//! let trigger = RefinancingModel::new(ModelConfig::chen_ling_1989())
//!     .unwrap()
//!     .optimal_trigger_rate(&TriggerSearchConfig::default())
//!     .unwrap();
//! assert!(trigger.min_ird_bps > 0.0);
//! ```
//!
//! ## Features
//!
//! - `parallel`: scan trigger-rate candidates on the rayon thread pool

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::doc_markdown)]

pub mod amortization;
pub mod engine;
pub mod error;
pub mod lattice;
pub mod model;
pub mod results;
pub mod trigger;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::amortization::AmortizationSchedule;
    pub use crate::engine::{PricingEngine, ValuationGrid};
    pub use crate::error::{LatticeError, LatticeResult, TriggerBoundary};
    pub use crate::lattice::{LatticeParameters, RateLattice};
    pub use crate::model::RefinancingModel;
    pub use crate::results::{NodeResults, NodeValues, RefinanceDecision, RootResults};
    pub use crate::trigger::{TrialPhase, TriggerRateResult, TriggerRateSolver, TriggerTrial};
}

pub use error::{LatticeError, LatticeResult, TriggerBoundary};
pub use model::RefinancingModel;
pub use results::{NodeResults, NodeValues, RefinanceDecision, RootResults};
pub use trigger::{TriggerRateResult, TriggerRateSolver};
