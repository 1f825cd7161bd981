//! Recombining binomial short-rate lattice.
//!
//! The rate at node `(t, j)` depends only on the step `t` and the number of
//! up-moves `j`, so the tree holds `(N+1)(N+2)/2` nodes instead of `2^N`
//! paths.
//!
//! # Calibration
//!
//! One lattice step is one loan period, so `Δt = 1` and `σ`, `μ` are
//! per-period quantities. Periods per year only annualize rates for input
//! and reporting. With up-probability `p`, each step moves the state by
//! `d + h` (up) or `d - h` (down), where
//!
//! ```text
//! h = σ / (2 √(p(1-p)))
//! d = μ - (2p - 1) h
//! ```
//!
//! The step mean is `μ` and its variance is exactly `σ²` for any `p`.
//! Under lognormal dynamics the state is `ln r`:
//!
//! ```text
//! r(t, j) = r0 * exp(t·d + (2j - t)·h)
//! ```
//!
//! Under normal dynamics the state is the periodic rate itself, so `σ` and
//! `μ` are in periodic-rate units, with an optional explicit floor.
//!
//! ```text
//!                    (0,0)
//!                   /     \
//!              (1,1)       (1,0)
//!             /    \      /    \
//!         (2,2)   (2,1)  (2,1)  (2,0)
//! ```

use refi_config::{ModelConfig, RateDynamics};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LatticeError, LatticeResult};

/// Inputs for building a [`RateLattice`].
///
/// Every field is per period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeParameters {
    /// Short-rate dynamics.
    pub dynamics: RateDynamics,
    /// Periodic rate at the root.
    pub initial_rate: f64,
    /// Volatility per step.
    pub volatility: f64,
    /// Drift per step.
    pub drift: f64,
    /// Probability of an up-move.
    pub prob_up: f64,
    /// Number of steps.
    pub steps: usize,
    /// Optional periodic floor (normal dynamics only).
    pub rate_floor: Option<f64>,
}

impl LatticeParameters {
    /// Extracts lattice inputs from a model configuration.
    #[must_use]
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            dynamics: config.rate_dynamics,
            initial_rate: config.periodic_initial_rate(),
            volatility: config.volatility,
            drift: config.drift_mean,
            prob_up: config.prob_up,
            steps: config.time_periods as usize,
            rate_floor: config.periodic_rate_floor(),
        }
    }

    fn check(&self) -> LatticeResult<()> {
        let finite = self.initial_rate.is_finite()
            && self.volatility.is_finite()
            && self.drift.is_finite()
            && self.prob_up.is_finite()
            && self.rate_floor.map_or(true, f64::is_finite);
        if !finite {
            return Err(LatticeError::configuration("lattice inputs must be finite"));
        }
        if self.steps < 1 {
            return Err(LatticeError::configuration("lattice needs at least 1 step"));
        }
        if self.prob_up <= 0.0 || self.prob_up >= 1.0 {
            return Err(LatticeError::configuration(format!(
                "up probability must lie in (0, 1), got {}",
                self.prob_up
            )));
        }
        if self.volatility < 0.0 {
            return Err(LatticeError::configuration(format!(
                "volatility cannot be negative, got {}",
                self.volatility
            )));
        }
        if self.initial_rate <= -1.0 {
            return Err(LatticeError::configuration(format!(
                "periodic rate must exceed -100%, got {}",
                self.initial_rate
            )));
        }
        if self.dynamics == RateDynamics::Lognormal {
            if self.initial_rate <= 0.0 {
                return Err(LatticeError::configuration(format!(
                    "lognormal dynamics need a positive initial rate, got {}",
                    self.initial_rate
                )));
            }
            if self.rate_floor.is_some() {
                return Err(LatticeError::configuration(
                    "rate floor only applies to normal dynamics",
                ));
            }
        }
        Ok(())
    }
}

/// A recombining binomial short-rate lattice.
///
/// `rates[t][j]` is the periodic short rate after `t` steps with `j`
/// up-moves. `reach[t][j]` is the probability of arriving there from the
/// root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLattice {
    dynamics: RateDynamics,
    steps: usize,
    prob_up: f64,
    up_step: f64,
    drift_step: f64,
    rate_floor: Option<f64>,
    rates: Vec<Vec<f64>>,
    reach: Vec<Vec<f64>>,
}

impl RateLattice {
    /// Builds the lattice for a model configuration.
    pub fn from_config(config: &ModelConfig) -> LatticeResult<Self> {
        Self::new(&LatticeParameters::from_config(config))
    }

    /// Builds the lattice.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::Configuration` if `steps < 1`, `p` is outside
    /// `(0, 1)`, `σ < 0`, an input is non-finite, or any node rate would be
    /// at or below `-100%`.
    pub fn new(params: &LatticeParameters) -> LatticeResult<Self> {
        params.check()?;

        let p = params.prob_up;
        let up_step = params.volatility / (2.0 * (p * (1.0 - p)).sqrt());
        let drift_step = params.drift - (2.0 * p - 1.0) * up_step;

        let r0 = params.initial_rate;
        let mut rates = Vec::with_capacity(params.steps + 1);
        for t in 0..=params.steps {
            let slice: Vec<f64> = (0..=t)
                .map(|j| {
                    let shift = t as f64 * drift_step + (2.0 * j as f64 - t as f64) * up_step;
                    match params.dynamics {
                        RateDynamics::Lognormal => r0 * shift.exp(),
                        RateDynamics::Normal => {
                            let rate = r0 + shift;
                            params.rate_floor.map_or(rate, |floor| rate.max(floor))
                        }
                    }
                })
                .collect();

            if let Some(j) = slice.iter().position(|r| !r.is_finite() || *r <= -1.0) {
                return Err(LatticeError::configuration(format!(
                    "node ({t}, {j}) has rate {} at or below -100%",
                    slice[j]
                )));
            }
            rates.push(slice);
        }

        let reach = reach_probabilities(p, params.steps);

        debug!(
            steps = params.steps,
            dynamics = ?params.dynamics,
            r0,
            up_step,
            drift_step,
            "built rate lattice"
        );

        Ok(Self {
            dynamics: params.dynamics,
            steps: params.steps,
            prob_up: p,
            up_step,
            drift_step,
            rate_floor: params.rate_floor,
            rates,
            reach,
        })
    }

    fn check_node(&self, t: usize, j: usize) -> LatticeResult<()> {
        if t > self.steps || j > t {
            return Err(LatticeError::out_of_range(t, j, self.steps));
        }
        Ok(())
    }

    /// Periodic short rate at node `(t, j)`.
    pub fn rate_at(&self, t: usize, j: usize) -> LatticeResult<f64> {
        self.check_node(t, j)?;
        Ok(self.rates[t][j])
    }

    /// Probability of reaching node `(t, j)` from the root.
    pub fn reach_probability(&self, t: usize, j: usize) -> LatticeResult<f64> {
        self.check_node(t, j)?;
        Ok(self.reach[t][j])
    }

    /// One-period discount factor `1 / (1 + r)` at node `(t, j)`.
    pub fn discount_factor(&self, t: usize, j: usize) -> LatticeResult<f64> {
        Ok(1.0 / (1.0 + self.rate_at(t, j)?))
    }

    /// All rates at step `t`, indexed by up-move count.
    pub fn rates_at(&self, t: usize) -> LatticeResult<&[f64]> {
        self.rates
            .get(t)
            .map(Vec::as_slice)
            .ok_or_else(|| LatticeError::out_of_range(t, 0, self.steps))
    }

    /// Reach-weighted mean rate at step `t`.
    pub fn expected_rate(&self, t: usize) -> LatticeResult<f64> {
        let rates = self.rates_at(t)?;
        Ok(rates
            .iter()
            .zip(&self.reach[t])
            .map(|(rate, prob)| rate * prob)
            .sum())
    }

    /// Applies one move to an unfloored rate.
    ///
    /// Any ordering of the same moves lands on the same rate.
    #[must_use]
    pub fn step_rate(&self, rate: f64, up: bool) -> f64 {
        let shift = if up {
            self.drift_step + self.up_step
        } else {
            self.drift_step - self.up_step
        };
        match self.dynamics {
            RateDynamics::Lognormal => rate * shift.exp(),
            RateDynamics::Normal => rate + shift,
        }
    }

    /// Number of nodes at step `t`; always `t + 1`.
    #[must_use]
    pub fn states_at(&self, t: usize) -> usize {
        t + 1
    }

    /// Number of steps.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Up-move probability.
    #[must_use]
    pub fn prob_up(&self) -> f64 {
        self.prob_up
    }

    /// Half the spread between up and down moves, `h`.
    #[must_use]
    pub fn up_step(&self) -> f64 {
        self.up_step
    }

    /// Per-step drift term, `d`.
    #[must_use]
    pub fn drift_step(&self) -> f64 {
        self.drift_step
    }

    /// Rate dynamics.
    #[must_use]
    pub fn dynamics(&self) -> RateDynamics {
        self.dynamics
    }

    /// Periodic rate floor, if any.
    #[must_use]
    pub fn rate_floor(&self) -> Option<f64> {
        self.rate_floor
    }
}

/// Binomial reach probabilities by forward recurrence.
fn reach_probabilities(p: f64, steps: usize) -> Vec<Vec<f64>> {
    let mut reach: Vec<Vec<f64>> = Vec::with_capacity(steps + 1);
    reach.push(vec![1.0]);
    for t in 0..steps {
        let prev = &reach[t];
        let next: Vec<f64> = (0..=t + 1)
            .map(|j| {
                let from_down = if j <= t { prev[j] * (1.0 - p) } else { 0.0 };
                let from_up = if j > 0 { prev[j - 1] * p } else { 0.0 };
                from_down + from_up
            })
            .collect();
        reach.push(next);
    }
    reach
}
