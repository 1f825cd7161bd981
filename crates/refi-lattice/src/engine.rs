//! Backward induction over the rate lattice.
//!
//! At each node, with `k` payments left and balance `B`:
//!
//! ```text
//! Vnc = B * A(r, k) / A(c0, k)        (= PMT * A(r, k))
//! G   = Vnc - (1 + α) B
//! W   = df * [p * max(V_up, 0) + (1-p) * max(V_dn, 0)]     (0 at t = N)
//! V   = max(G, W)
//! M   = Vnc - max(V, 0)
//! ```
//!
//! `LM` follows the configured [`LenderValuation`] policy.

use refi_config::{LenderValuation, ModelConfig, Retention};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amortization::{annuity_factor, AmortizationSchedule};
use crate::error::{LatticeError, LatticeResult};
use crate::lattice::RateLattice;
use crate::results::{NodeValues, RefinanceDecision};

/// Value tables produced by a [`PricingEngine`] run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationGrid {
    steps: usize,
    retention: Retention,
    /// Full tree: one slice per step. Root only: the root slice alone.
    slices: Vec<Vec<NodeValues>>,
}

impl ValuationGrid {
    /// Values at the root.
    #[must_use]
    pub fn root(&self) -> NodeValues {
        self.slices[0][0]
    }

    /// Values at node `(t, j)`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` for an invalid node; `NodeNotRetained` for `t > 0` under
    /// root-only retention.
    pub fn node(&self, t: usize, j: usize) -> LatticeResult<NodeValues> {
        if j > t {
            return Err(LatticeError::out_of_range(t, j, self.steps));
        }
        Ok(self.slice(t)?[j])
    }

    /// All values at step `t`.
    pub fn slice(&self, t: usize) -> LatticeResult<&[NodeValues]> {
        if t > self.steps {
            return Err(LatticeError::out_of_range(t, 0, self.steps));
        }
        self.slices
            .get(t)
            .map(Vec::as_slice)
            .ok_or(LatticeError::NodeNotRetained { t })
    }

    /// Number of lattice steps.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Retention used for this run.
    #[must_use]
    pub fn retention(&self) -> Retention {
        self.retention
    }
}

/// Balance and remaining term shared by every node of a slice.
#[derive(Debug, Clone, Copy)]
struct SliceTerms {
    balance: f64,
    remaining: u32,
    /// `A(c0, k)`; zero once the loan is paid off.
    contract_annuity: f64,
}

/// Backward-induction pricer for the refinancing option.
///
/// Borrows its lattice and schedule, so many engines can share one lattice.
#[derive(Debug, Clone, Copy)]
pub struct PricingEngine<'a> {
    lattice: &'a RateLattice,
    schedule: &'a AmortizationSchedule,
    current_time: u32,
    refinancing_cost: f64,
    lender_valuation: LenderValuation,
    retention: Retention,
}

impl<'a> PricingEngine<'a> {
    /// Creates an engine with no refinancing cost, a new loan, realized
    /// lender valuation and full-tree retention.
    #[must_use]
    pub fn new(lattice: &'a RateLattice, schedule: &'a AmortizationSchedule) -> Self {
        Self {
            lattice,
            schedule,
            current_time: 0,
            refinancing_cost: 0.0,
            lender_valuation: LenderValuation::default(),
            retention: Retention::default(),
        }
    }

    /// Creates an engine with the settings of a model configuration.
    #[must_use]
    pub fn from_config(
        config: &ModelConfig,
        lattice: &'a RateLattice,
        schedule: &'a AmortizationSchedule,
    ) -> Self {
        Self::new(lattice, schedule)
            .with_current_time(config.current_time)
            .with_refinancing_cost(config.refinancing_cost_pct)
            .with_lender_valuation(config.lender_valuation)
            .with_retention(config.retention)
    }

    /// Sets the loan age at the root.
    #[must_use]
    pub fn with_current_time(mut self, periods: u32) -> Self {
        self.current_time = periods;
        self
    }

    /// Sets the refinancing cost fraction `α`.
    #[must_use]
    pub fn with_refinancing_cost(mut self, alpha: f64) -> Self {
        self.refinancing_cost = alpha;
        self
    }

    /// Sets the lender valuation policy.
    #[must_use]
    pub fn with_lender_valuation(mut self, policy: LenderValuation) -> Self {
        self.lender_valuation = policy;
        self
    }

    /// Sets the retention policy.
    #[must_use]
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    fn slice_terms(&self, t: usize) -> LatticeResult<SliceTerms> {
        let age = self.current_time + t as u32;
        let remaining = self.schedule.remaining_periods(age)?;
        Ok(SliceTerms {
            balance: self.schedule.balance_at(age)?,
            remaining,
            contract_annuity: annuity_factor(self.schedule.periodic_rate(), remaining),
        })
    }

    /// Returns `(Vnc, G)` for a node.
    ///
    /// Scaling the balance by the annuity ratio makes `Vnc == B` exactly when
    /// the node rate equals the contract rate.
    fn intrinsic(&self, rate: f64, terms: SliceTerms) -> (f64, f64) {
        if terms.remaining == 0 {
            return (0.0, 0.0);
        }
        let vnc =
            terms.balance * annuity_factor(rate, terms.remaining) / terms.contract_annuity;
        let g = vnc - (1.0 + self.refinancing_cost) * terms.balance;
        (vnc, g)
    }

    fn terminal_node(&self, rate: f64, terms: SliceTerms) -> NodeValues {
        let (vnc, g) = self.intrinsic(rate, terms);
        let m = vnc - g.max(0.0);
        let lm = match self.lender_valuation {
            LenderValuation::Realized => m,
            LenderValuation::BorrowerExercise if g > 0.0 => terms.balance,
            LenderValuation::BorrowerExercise => vnc,
        };
        NodeValues {
            g,
            w: 0.0,
            v: g,
            m,
            lm,
            vnc,
        }
    }

    fn interior_node(
        &self,
        rate: f64,
        terms: SliceTerms,
        up: &NodeValues,
        down: &NodeValues,
    ) -> NodeValues {
        let p = self.lattice.prob_up();
        let df = 1.0 / (1.0 + rate);
        let (vnc, g) = self.intrinsic(rate, terms);

        let w = df * (p * up.v.max(0.0) + (1.0 - p) * down.v.max(0.0));
        let v = g.max(w);
        let m = vnc - v.max(0.0);

        let lm_realized = df * (self.schedule.payment() + p * up.lm + (1.0 - p) * down.lm);
        let lm = match self.lender_valuation {
            LenderValuation::BorrowerExercise
                if RefinanceDecision::from_values(g, w).is_refinance() =>
            {
                terms.balance
            }
            _ => lm_realized,
        };

        NodeValues {
            g,
            w,
            v,
            m,
            lm,
            vnc,
        }
    }

    /// Runs backward induction from `t = N` to the root.
    ///
    /// # Errors
    ///
    /// `PeriodOutOfRange` if the lattice horizon runs past the loan term.
    pub fn run(&self) -> LatticeResult<ValuationGrid> {
        let steps = self.lattice.steps();
        let term = self.schedule.term();
        let horizon = u32::try_from(steps)
            .ok()
            .and_then(|s| self.current_time.checked_add(s));
        match horizon {
            Some(age) if age <= term => {}
            _ => {
                return Err(LatticeError::PeriodOutOfRange {
                    period: horizon.unwrap_or(u32::MAX),
                    term,
                })
            }
        }

        let terms = self.slice_terms(steps)?;
        let mut next: Vec<NodeValues> = self
            .lattice
            .rates_at(steps)?
            .iter()
            .map(|&rate| self.terminal_node(rate, terms))
            .collect();

        let mut retained: Vec<Vec<NodeValues>> = match self.retention {
            Retention::FullTree => Vec::with_capacity(steps + 1),
            Retention::RootOnly => Vec::new(),
        };

        for t in (0..steps).rev() {
            let terms = self.slice_terms(t)?;
            let current: Vec<NodeValues> = self
                .lattice
                .rates_at(t)?
                .iter()
                .enumerate()
                .map(|(j, &rate)| self.interior_node(rate, terms, &next[j + 1], &next[j]))
                .collect();

            let finished = std::mem::replace(&mut next, current);
            if self.retention == Retention::FullTree {
                retained.push(finished);
            }
        }
        retained.push(next);
        retained.reverse();

        let grid = ValuationGrid {
            steps,
            retention: self.retention,
            slices: retained,
        };

        let root = grid.root();
        debug!(
            steps,
            current_time = self.current_time,
            c0 = self.schedule.periodic_rate(),
            r0 = self.lattice.rates_at(0)?[0],
            g = root.g,
            w = root.w,
            "backward induction complete"
        );

        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::LatticeParameters;
    use approx::assert_relative_eq;
    use refi_config::RateDynamics;

    fn lattice(r0: f64, sigma: f64, steps: usize) -> RateLattice {
        RateLattice::new(&LatticeParameters {
            dynamics: RateDynamics::Lognormal,
            initial_rate: r0,
            volatility: sigma,
            drift: 0.0,
            prob_up: 0.5,
            steps,
            rate_floor: None,
        })
        .unwrap()
    }

    #[test]
    fn test_one_step_by_hand() {
        let lattice = lattice(0.005, 0.10, 1);
        let schedule = AmortizationSchedule::new(100.0, 0.01, 96).unwrap();
        let grid = PricingEngine::new(&lattice, &schedule)
            .with_refinancing_cost(0.02)
            .run()
            .unwrap();

        let pmt = schedule.payment();
        let b1 = schedule.balance_at(1).unwrap();
        let terminal_v = |j: usize| {
            let r = lattice.rate_at(1, j).unwrap();
            pmt * annuity_factor(r, 95) - 1.02 * b1
        };
        let df = 1.0 / 1.005;
        let w = df * 0.5 * (terminal_v(1).max(0.0) + terminal_v(0).max(0.0));
        let g = pmt * annuity_factor(0.005, 96) - 102.0;

        let root = grid.root();
        assert_relative_eq!(root.g, g, epsilon = 1e-10);
        assert_relative_eq!(root.w, w, epsilon = 1e-10);
        assert_relative_eq!(root.v, g.max(w), epsilon = 1e-10);
        assert_relative_eq!(root.m, root.vnc - root.v.max(0.0), epsilon = 1e-10);
    }

    #[test]
    fn test_terminal_boundary() {
        let lattice = lattice(0.08 / 12.0, 0.15, 12);
        let schedule = AmortizationSchedule::new(100.0, 0.10 / 12.0, 96).unwrap();
        let grid = PricingEngine::new(&lattice, &schedule)
            .with_refinancing_cost(0.02)
            .run()
            .unwrap();

        for node in grid.slice(12).unwrap() {
            assert_eq!(node.w, 0.0);
            assert_eq!(node.v, node.g);
        }
    }

    #[test]
    fn test_option_value_dominates_both_parts() {
        let lattice = lattice(0.08 / 12.0, 0.15, 12);
        let schedule = AmortizationSchedule::new(100.0, 0.10 / 12.0, 96).unwrap();
        let grid = PricingEngine::new(&lattice, &schedule)
            .with_refinancing_cost(0.02)
            .run()
            .unwrap();

        for t in 0..12 {
            for node in grid.slice(t).unwrap() {
                assert!(node.w >= 0.0);
                assert!(node.v >= node.g && node.v >= node.w);
            }
        }
    }

    #[test]
    fn test_exercise_liability_is_cost_inclusive_balance() {
        let lattice = lattice(0.06 / 12.0, 0.10, 6);
        let schedule = AmortizationSchedule::new(100.0, 0.01, 96).unwrap();
        let grid = PricingEngine::new(&lattice, &schedule)
            .with_refinancing_cost(0.02)
            .run()
            .unwrap();

        let mut exercised = 0;
        for t in 0..=6 {
            let balance = schedule.balance_at(t as u32).unwrap();
            for node in grid.slice(t).unwrap() {
                if node.decision().is_refinance() {
                    exercised += 1;
                    assert_relative_eq!(node.m, 1.02 * balance, epsilon = 1e-9);
                }
            }
        }
        assert!(exercised > 0);
    }

    #[test]
    fn test_root_only_matches_full_tree() {
        let lattice = lattice(0.08 / 12.0, 0.15, 24);
        let schedule = AmortizationSchedule::new(100.0, 0.10 / 12.0, 96).unwrap();
        let engine = PricingEngine::new(&lattice, &schedule).with_refinancing_cost(0.02);

        let full = engine.run().unwrap();
        let root_only = engine.with_retention(Retention::RootOnly).run().unwrap();

        assert_eq!(full.root(), root_only.root());
        assert_eq!(root_only.retention(), Retention::RootOnly);
        assert!(matches!(
            root_only.node(1, 0),
            Err(LatticeError::NodeNotRetained { t: 1 })
        ));
        assert!(full.node(24, 24).is_ok());
    }

    #[test]
    fn test_node_out_of_range() {
        let lattice = lattice(0.08 / 12.0, 0.15, 4);
        let schedule = AmortizationSchedule::new(100.0, 0.10 / 12.0, 96).unwrap();
        let grid = PricingEngine::new(&lattice, &schedule).run().unwrap();

        assert!(matches!(grid.node(5, 0), Err(LatticeError::OutOfRange { .. })));
        assert!(matches!(grid.node(2, 3), Err(LatticeError::OutOfRange { .. })));
    }

    #[test]
    fn test_borrower_exercise_pays_balance() {
        let lattice = lattice(0.06 / 12.0, 0.10, 6);
        let schedule = AmortizationSchedule::new(100.0, 0.01, 96).unwrap();
        let grid = PricingEngine::new(&lattice, &schedule)
            .with_refinancing_cost(0.02)
            .with_lender_valuation(LenderValuation::BorrowerExercise)
            .run()
            .unwrap();

        let root = grid.root();
        assert!(root.decision().is_refinance());
        assert_relative_eq!(root.lm, 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_horizon_reaching_maturity() {
        // Last lattice step coincides with the final payment
        let lattice = lattice(0.08 / 12.0, 0.15, 12);
        let schedule = AmortizationSchedule::new(100.0, 0.10 / 12.0, 24).unwrap();
        let grid = PricingEngine::new(&lattice, &schedule)
            .with_current_time(12)
            .run()
            .unwrap();

        for node in grid.slice(12).unwrap() {
            assert_eq!((node.vnc, node.g, node.m), (0.0, 0.0, 0.0));
        }
        assert!(grid.root().vnc > 0.0);
    }

    #[test]
    fn test_zero_differential_without_cost_is_exactly_flat() {
        let lattice = lattice(0.08 / 12.0, 0.0, 12);
        let schedule = AmortizationSchedule::new(100.0, 0.08 / 12.0, 96).unwrap();
        let grid = PricingEngine::new(&lattice, &schedule).run().unwrap();

        for t in 0..=12 {
            for node in grid.slice(t).unwrap() {
                assert_eq!(node.g, 0.0);
                assert_eq!(node.w, 0.0);
                assert_eq!(node.decision(), RefinanceDecision::Wait);
            }
        }
        assert_relative_eq!(grid.root().vnc, 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_horizon_past_term() {
        let lattice = lattice(0.08 / 12.0, 0.15, 12);
        let schedule = AmortizationSchedule::new(100.0, 0.10 / 12.0, 24).unwrap();
        let result = PricingEngine::new(&lattice, &schedule)
            .with_current_time(13)
            .run();
        assert!(matches!(
            result,
            Err(LatticeError::PeriodOutOfRange { period: 25, term: 24 })
        ));
    }
}
