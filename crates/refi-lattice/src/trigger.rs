//! Optimal trigger-rate search.
//!
//! Holds the market rate fixed and varies the contract rate to find the
//! smallest interest-rate differential at which refinancing immediately is
//! optimal. The search scans a grid of contract rates, then bisects the
//! first wait-to-refinance transition on
//!
//! ```text
//! f(c) = min(G - W, G)        f >= 0  <=>  refinance
//! ```
//!
//! with `f` pushed below zero wherever `G = 0`, since a worthless exercise
//! never refinances.
//!
//! With a positive refinancing cost the search is repeated at zero cost.
//! The gap between the two trigger differentials is the band of inaction
//! the cost creates; it closes as the cost goes to zero. The break-even rate
//! where `G` alone crosses zero is reported alongside.

use refi_config::{ModelConfig, Retention, TriggerSearchConfig, Validate};
use refi_math::solvers::{bisect_bracket, first_upcrossing, grid_points, Bracket, SolverConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::amortization::AmortizationSchedule;
use crate::engine::PricingEngine;
use crate::error::{LatticeError, LatticeResult, TriggerBoundary};
use crate::lattice::RateLattice;
use crate::results::{NodeValues, RefinanceDecision};

/// Basis points per unit rate.
const BPS: f64 = 10_000.0;

/// Search phase that produced a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialPhase {
    /// Initial grid scan.
    Scan,
    /// Bisection refinement.
    Refine,
}

/// One evaluation of the model at a trial contract rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerTrial {
    /// Annual contract rate.
    pub contract_rate: f64,
    /// Interest-rate differential in basis points.
    pub ird_bps: f64,
    /// Root intrinsic value.
    pub g: f64,
    /// Root waiting value.
    pub w: f64,
    /// Root decision.
    pub decision: RefinanceDecision,
    /// Phase that produced this trial.
    pub phase: TrialPhase,
}

impl TriggerTrial {
    /// Trigger objective, non-negative exactly when the decision is to
    /// refinance.
    #[must_use]
    pub fn objective(&self) -> f64 {
        let f = (self.g - self.w).min(self.g);
        if self.decision.is_refinance() {
            f
        } else {
            // G = W = 0 would otherwise sit on the refinance side
            f.min(-f64::MIN_POSITIVE)
        }
    }
}

/// Outcome of the trigger search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRateResult {
    /// Smallest annual contract rate found to trigger refinancing.
    pub trigger_rate: f64,
    /// Minimum interest-rate differential in basis points.
    pub min_ird_bps: f64,
    /// Annual market rate held fixed during the search.
    pub market_rate: f64,
    /// Contract rate at which `G` crosses zero, if bracketed.
    pub break_even_rate: Option<f64>,
    /// Differential at the break-even rate, in basis points.
    pub break_even_ird_bps: Option<f64>,
    /// Trigger rate with the refinancing cost set to zero, if found in range.
    pub cost_free_rate: Option<f64>,
    /// Differential at the cost-free trigger rate, in basis points.
    pub cost_free_ird_bps: Option<f64>,
    /// Every evaluation made, in order.
    pub trials: Vec<TriggerTrial>,
    /// Bisection iterations spent on the trigger rate.
    pub iterations: u32,
}

impl TriggerRateResult {
    /// Width of the band of inaction created by the refinancing cost: how
    /// far the trigger differential sits above its zero-cost value.
    #[must_use]
    pub fn inaction_band_bps(&self) -> Option<f64> {
        self.cost_free_ird_bps.map(|free| self.min_ird_bps - free)
    }
}

/// Trigger and break-even rates of one search, before the cost-free pass.
struct SearchOutcome {
    trigger_rate: f64,
    break_even_rate: Option<f64>,
    trials: Vec<TriggerTrial>,
    iterations: u32,
}

/// Drives repeated valuations over candidate contract rates.
///
/// The rate lattice does not depend on the contract rate, so it is built
/// once and shared by every trial.
#[derive(Debug, Clone)]
pub struct TriggerRateSolver {
    config: ModelConfig,
    lattice: RateLattice,
}

impl TriggerRateSolver {
    /// Creates a solver around a base configuration.
    pub fn new(config: &ModelConfig) -> LatticeResult<Self> {
        config.validate_or_error()?;
        let config = config.clone().with_retention(Retention::RootOnly);
        let lattice = RateLattice::from_config(&config)?;
        Ok(Self { config, lattice })
    }

    /// Creates a solver that reuses an already built lattice.
    pub(crate) fn with_lattice(config: &ModelConfig, lattice: RateLattice) -> Self {
        Self {
            config: config.clone().with_retention(Retention::RootOnly),
            lattice,
        }
    }

    fn market_rate(&self) -> f64 {
        self.config.initial_rate
    }

    /// Values the loan at one annual contract rate.
    pub fn evaluate(&self, contract_rate: f64, phase: TrialPhase) -> LatticeResult<TriggerTrial> {
        let periodic = contract_rate / f64::from(self.config.periods_per_year);
        let schedule = AmortizationSchedule::new(
            self.config.initial_balance,
            periodic,
            self.config.original_term,
        )?;
        let root: NodeValues = PricingEngine::from_config(&self.config, &self.lattice, &schedule)
            .run()?
            .root();

        Ok(TriggerTrial {
            contract_rate,
            ird_bps: (contract_rate - self.market_rate()) * BPS,
            g: root.g,
            w: root.w,
            decision: root.decision(),
            phase,
        })
    }

    #[cfg(feature = "parallel")]
    fn scan(&self, grid: &[f64]) -> LatticeResult<Vec<TriggerTrial>> {
        use rayon::prelude::*;

        grid.par_iter()
            .map(|&c| self.evaluate(c, TrialPhase::Scan))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn scan(&self, grid: &[f64]) -> LatticeResult<Vec<TriggerTrial>> {
        grid.iter()
            .map(|&c| self.evaluate(c, TrialPhase::Scan))
            .collect()
    }

    /// Bisects `bracket` on `objective`, appending each evaluation to
    /// `trials`.
    fn refine<F>(
        &self,
        bracket: &Bracket,
        solver: &SolverConfig,
        objective: F,
        trials: &mut Vec<TriggerTrial>,
    ) -> LatticeResult<(f64, u32)>
    where
        F: Fn(&TriggerTrial) -> f64,
    {
        let mut failure: Option<LatticeError> = None;
        let result = bisect_bracket(
            |c| match self.evaluate(c, TrialPhase::Refine) {
                Ok(trial) => {
                    trials.push(trial);
                    objective(&trial)
                }
                Err(e) => {
                    failure.get_or_insert(e);
                    f64::NAN
                }
            },
            bracket,
            solver,
        );
        if let Some(e) = failure {
            return Err(e);
        }
        let result = result?;
        // Upper end is the smallest rate seen on the non-negative side
        Ok((result.bracket.1, result.iterations))
    }

    fn resolve_bounds(&self, search: &TriggerSearchConfig) -> LatticeResult<(f64, f64)> {
        search.validate_or_error()?;
        let (lower, upper) = search.resolve_bounds(self.market_rate());
        if lower < 0.0 {
            return Err(LatticeError::configuration(format!(
                "lower contract rate {lower} is negative; set lower_rate explicitly"
            )));
        }
        if upper <= lower {
            return Err(LatticeError::configuration(format!(
                "upper contract rate {upper} must exceed lower contract rate {lower}"
            )));
        }
        Ok((lower, upper))
    }

    /// Scans and refines one trigger rate for the solver's own cost.
    fn search(&self, search: &TriggerSearchConfig) -> LatticeResult<SearchOutcome> {
        let (lower, upper) = self.resolve_bounds(search)?;
        let grid = grid_points(lower, upper, search.step)?;
        let mut trials = self.scan(&grid)?;

        let boundary = if trials[0].decision.is_refinance() {
            Some(TriggerBoundary::AlwaysOptimal)
        } else {
            None
        };
        let trigger_samples: Vec<(f64, f64)> = trials
            .iter()
            .map(|t| (t.contract_rate, t.objective()))
            .collect();
        let trigger_bracket = match (boundary, first_upcrossing(&trigger_samples)) {
            (None, Some(bracket)) => bracket,
            (boundary, _) => {
                return Err(LatticeError::TriggerNotFound {
                    lower,
                    upper,
                    boundary: boundary.unwrap_or(TriggerBoundary::NeverOptimal),
                    trials,
                })
            }
        };

        let g_samples: Vec<(f64, f64)> = trials.iter().map(|t| (t.contract_rate, t.g)).collect();
        let break_even_bracket = first_upcrossing(&g_samples);

        let solver = SolverConfig::new(search.tolerance, search.max_iterations);
        let (trigger_rate, iterations) =
            self.refine(&trigger_bracket, &solver, TriggerTrial::objective, &mut trials)?;

        let break_even_rate = match break_even_bracket {
            Some(bracket) => Some(self.refine(&bracket, &solver, |t| t.g, &mut trials)?.0),
            None => None,
        };

        Ok(SearchOutcome {
            trigger_rate,
            break_even_rate,
            trials,
            iterations,
        })
    }

    /// Trigger rate with the refinancing cost removed, or `None` when the
    /// range does not bracket it.
    fn cost_free_rate(&self, search: &TriggerSearchConfig) -> LatticeResult<Option<f64>> {
        let free = Self {
            config: self.config.clone().with_refinancing_cost_pct(0.0),
            lattice: self.lattice.clone(),
        };
        match free.search(search) {
            Ok(outcome) => Ok(Some(outcome.trigger_rate)),
            Err(LatticeError::TriggerNotFound { boundary, .. }) => {
                debug!(%boundary, "no cost-free trigger rate in range");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Searches for the optimal trigger rate.
    ///
    /// # Errors
    ///
    /// - `Configuration` for invalid search settings or bounds.
    /// - `TriggerNotFound` when refinancing is optimal at the lower bound or
    ///   nowhere in the range; the error carries the scan trials.
    /// - `Solver` if bisection runs out of iterations.
    pub fn solve(&self, search: &TriggerSearchConfig) -> LatticeResult<TriggerRateResult> {
        let outcome = match self.search(search) {
            Ok(outcome) => outcome,
            Err(err) => {
                if let LatticeError::TriggerNotFound {
                    lower,
                    upper,
                    boundary,
                    ..
                } = &err
                {
                    warn!(lower, upper, %boundary, "trigger rate search failed");
                }
                return Err(err);
            }
        };

        let cost_free_rate = if self.config.refinancing_cost_pct > 0.0 {
            self.cost_free_rate(search)?
        } else {
            Some(outcome.trigger_rate)
        };

        let market = self.market_rate();
        let to_bps = |c: f64| (c - market) * BPS;
        let result = TriggerRateResult {
            trigger_rate: outcome.trigger_rate,
            min_ird_bps: to_bps(outcome.trigger_rate),
            market_rate: market,
            break_even_rate: outcome.break_even_rate,
            break_even_ird_bps: outcome.break_even_rate.map(to_bps),
            cost_free_rate,
            cost_free_ird_bps: cost_free_rate.map(to_bps),
            trials: outcome.trials,
            iterations: outcome.iterations,
        };

        info!(
            trigger_rate = result.trigger_rate,
            min_ird_bps = result.min_ird_bps,
            break_even_ird_bps = ?result.break_even_ird_bps,
            inaction_band_bps = ?result.inaction_band_bps(),
            trials = result.trials.len(),
            "found optimal trigger rate"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn trial(g: f64, w: f64) -> TriggerTrial {
        TriggerTrial {
            contract_rate: 0.08,
            ird_bps: 0.0,
            g,
            w,
            decision: RefinanceDecision::from_values(g, w),
            phase: TrialPhase::Scan,
        }
    }

    #[test]
    fn test_objective_sign_follows_decision() {
        assert!(trial(2.0, 1.0).objective() > 0.0);
        assert_eq!(trial(1.0, 1.0).objective(), 0.0);
        assert!(trial(1.0, 2.0).objective() < 0.0);
        assert!(trial(-1.0, 0.0).objective() < 0.0);
        // Worthless exercise waits even though G - W = 0
        assert_eq!(trial(0.0, 0.0).decision, RefinanceDecision::Wait);
        assert!(trial(0.0, 0.0).objective() < 0.0);
    }

    #[test]
    fn test_trigger_above_break_even() {
        let solver = TriggerRateSolver::new(&ModelConfig::chen_ling_1989()).unwrap();
        let result = solver.solve(&TriggerSearchConfig::default()).unwrap();

        assert!(result.min_ird_bps > 0.0);
        let break_even = result.break_even_ird_bps.unwrap();
        assert!(result.min_ird_bps > break_even);
        assert!(result.inaction_band_bps().unwrap() > 0.0);

        let scans = result
            .trials
            .iter()
            .filter(|t| t.phase == TrialPhase::Scan)
            .count();
        assert_eq!(scans, 41);
        assert!(result.trials.len() > scans);
    }

    #[test]
    fn test_trigger_brackets_decision() {
        let config = ModelConfig::chen_ling_1989();
        let search = TriggerSearchConfig::default();
        let solver = TriggerRateSolver::new(&config).unwrap();
        let result = solver.solve(&search).unwrap();

        let at = solver
            .evaluate(result.trigger_rate, TrialPhase::Refine)
            .unwrap();
        assert!(at.decision.is_refinance());

        let below = solver
            .evaluate(result.trigger_rate - 2.0 * search.tolerance, TrialPhase::Refine)
            .unwrap();
        assert_eq!(below.decision, RefinanceDecision::Wait);
    }

    #[test]
    fn test_zero_cost_band_is_empty() {
        let config = ModelConfig::chen_ling_1989().with_refinancing_cost_pct(0.0);
        let solver = TriggerRateSolver::new(&config).unwrap();
        let result = solver.solve(&TriggerSearchConfig::default()).unwrap();

        assert_eq!(result.cost_free_rate, Some(result.trigger_rate));
        assert_eq!(result.inaction_band_bps(), Some(0.0));
    }

    #[test]
    fn test_flat_rates_without_cost_do_not_refinance_at_par() {
        // σ = 0, α = 0: at c = r the intrinsic value is exactly zero
        let config = ModelConfig::chen_ling_1989()
            .with_volatility(0.0)
            .with_refinancing_cost_pct(0.0);
        let solver = TriggerRateSolver::new(&config).unwrap();

        let at_par = solver.evaluate(0.08, TrialPhase::Scan).unwrap();
        assert_eq!(at_par.g, 0.0);
        assert_eq!(at_par.decision, RefinanceDecision::Wait);

        let search = TriggerSearchConfig::default().with_bounds(0.08, 0.10);
        let result = solver.solve(&search).unwrap();
        assert!(result.min_ird_bps > 0.0);
        assert!(result.min_ird_bps < 0.05);
        assert_relative_eq!(result.trigger_rate, 0.08, epsilon = 5e-6);
        assert!(result.break_even_rate.is_none());
    }

    #[test]
    fn test_always_optimal_at_lower_bound() {
        let solver = TriggerRateSolver::new(&ModelConfig::chen_ling_1989()).unwrap();
        let search = TriggerSearchConfig::default().with_bounds(0.16, 0.20);
        let Err(LatticeError::TriggerNotFound {
            boundary, trials, ..
        }) = solver.solve(&search)
        else {
            panic!("expected TriggerNotFound");
        };
        assert_eq!(boundary, TriggerBoundary::AlwaysOptimal);
        assert_eq!(trials.len(), 17);
        assert!(trials[0].decision.is_refinance());
    }

    #[test]
    fn test_never_optimal_in_range() {
        let solver = TriggerRateSolver::new(&ModelConfig::chen_ling_1989()).unwrap();
        let search = TriggerSearchConfig::default().with_bounds(0.08, 0.10);
        let Err(LatticeError::TriggerNotFound {
            boundary, trials, ..
        }) = solver.solve(&search)
        else {
            panic!("expected TriggerNotFound");
        };
        assert_eq!(boundary, TriggerBoundary::NeverOptimal);
        assert_eq!(trials.len(), 9);
        assert!(trials.iter().all(|t| t.phase == TrialPhase::Scan));
        assert!(trials.iter().all(|t| t.w > t.g));
    }

    #[test]
    fn test_invalid_search_settings() {
        let solver = TriggerRateSolver::new(&ModelConfig::chen_ling_1989()).unwrap();
        let search = TriggerSearchConfig::default().with_step(0.0);
        assert!(matches!(
            solver.solve(&search),
            Err(LatticeError::Configuration { .. })
        ));
    }
}
