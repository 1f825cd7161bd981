//! Refinancing model facade.
//!
//! [`RefinancingModel`] owns a validated configuration together with its
//! amortization schedule and rate lattice, runs the pricing engine on
//! demand, and serves results from the retained value tables.

use refi_config::{ModelConfig, TriggerSearchConfig, Validate};

use crate::amortization::AmortizationSchedule;
use crate::engine::{PricingEngine, ValuationGrid};
use crate::error::{LatticeError, LatticeResult};
use crate::lattice::RateLattice;
use crate::results::{NodeResults, RootResults};
use crate::trigger::{TriggerRateResult, TriggerRateSolver};

/// A single valuation run of the refinancing option.
///
/// # Example
///
/// ```rust
/// use refi_config::ModelConfig;
/// use refi_lattice::{RefinanceDecision, RefinancingModel};
///
/// let mut model = RefinancingModel::new(ModelConfig::demo_wait()).unwrap();
/// let root = model.solve_model().unwrap();
///
/// assert_eq!(root.decision(), RefinanceDecision::Wait);
/// assert!(root.w > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct RefinancingModel {
    config: ModelConfig,
    schedule: AmortizationSchedule,
    lattice: RateLattice,
    grid: Option<ValuationGrid>,
}

impl RefinancingModel {
    /// Validates the configuration and builds the schedule and lattice.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::Configuration` for an invalid configuration.
    pub fn new(config: ModelConfig) -> LatticeResult<Self> {
        config.validate_or_error()?;
        let schedule = AmortizationSchedule::new(
            config.initial_balance,
            config.periodic_contract_rate(),
            config.original_term,
        )?;
        let lattice = RateLattice::from_config(&config)?;
        Ok(Self {
            config,
            schedule,
            lattice,
            grid: None,
        })
    }

    /// Runs backward induction and returns the root values.
    ///
    /// Calling it again recomputes the same tables.
    pub fn solve_model(&mut self) -> LatticeResult<RootResults> {
        let grid = PricingEngine::from_config(&self.config, &self.lattice, &self.schedule).run()?;
        let root = self.root_from(&grid)?;
        self.grid = Some(grid);
        Ok(root)
    }

    /// Discards the value tables.
    pub fn reset(&mut self) {
        self.grid = None;
    }

    /// Returns true once `solve_model` has run.
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.grid.is_some()
    }

    fn grid(&self) -> LatticeResult<&ValuationGrid> {
        self.grid.as_ref().ok_or(LatticeError::Uninitialized)
    }

    fn root_from(&self, grid: &ValuationGrid) -> LatticeResult<RootResults> {
        Ok(RootResults::new(
            grid.root(),
            self.lattice.rate_at(0, 0)?,
            self.node_balance(0)?,
        ))
    }

    fn node_balance(&self, t: usize) -> LatticeResult<f64> {
        let t = u32::try_from(t).map_err(|_| LatticeError::out_of_range(t, 0, self.lattice.steps()))?;
        self.schedule.balance_at(self.config.current_time + t)
    }

    /// Values at the root node.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::Uninitialized` before `solve_model`.
    pub fn root_results(&self) -> LatticeResult<RootResults> {
        self.root_from(self.grid()?)
    }

    /// Values at node `(t, j)`.
    ///
    /// # Errors
    ///
    /// `Uninitialized` before `solve_model`, `OutOfRange` for an invalid
    /// node, `NodeNotRetained` for `t > 0` under root-only retention.
    pub fn node_results(&self, t: usize, j: usize) -> LatticeResult<NodeResults> {
        let values = self.grid()?.node(t, j)?;
        Ok(NodeResults::new(
            t,
            j,
            self.lattice.reach_probability(t, j)?,
            values,
            self.lattice.rate_at(t, j)?,
            self.node_balance(t)?,
        ))
    }

    /// Remaining principal after `period` payments from origination.
    ///
    /// Available without solving.
    pub fn balance_at(&self, period: u32) -> LatticeResult<f64> {
        self.schedule.balance_at(period)
    }

    /// Searches for the contract rate at which refinancing becomes optimal,
    /// holding every other input fixed.
    pub fn optimal_trigger_rate(
        &self,
        search: &TriggerSearchConfig,
    ) -> LatticeResult<TriggerRateResult> {
        TriggerRateSolver::with_lattice(&self.config, self.lattice.clone()).solve(search)
    }

    /// Runs the trigger search with the configuration's own
    /// `trigger_search` settings.
    pub fn configured_trigger_rate(&self) -> LatticeResult<TriggerRateResult> {
        self.optimal_trigger_rate(&self.config.trigger_search)
    }

    /// Model configuration.
    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Amortization schedule of the existing loan.
    #[must_use]
    pub fn schedule(&self) -> &AmortizationSchedule {
        &self.schedule
    }

    /// Short-rate lattice.
    #[must_use]
    pub fn lattice(&self) -> &RateLattice {
        &self.lattice
    }

    /// Periodic contract rate `c0`.
    #[must_use]
    pub fn periodic_contract_rate(&self) -> f64 {
        self.schedule.periodic_rate()
    }

    /// Periodic market rate `r0`.
    #[must_use]
    pub fn periodic_market_rate(&self) -> f64 {
        self.config.periodic_initial_rate()
    }
}
