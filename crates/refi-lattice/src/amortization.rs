//! Level-payment amortization.
//!
//! Remaining principal of a fully amortizing fixed-rate loan:
//!
//! ```text
//! B(t) = P0 * [(1+c)^n - (1+c)^t] / [(1+c)^n - 1]     c > 0
//! B(t) = P0 * (1 - t/n)                               c = 0
//! ```
//!
//! Balances are computed once for every period and served from a cache.

use serde::{Deserialize, Serialize};

use crate::error::{LatticeError, LatticeResult};

/// Rates closer to zero than this use the zero-rate limit.
const ZERO_RATE_EPSILON: f64 = 1e-12;

/// Present value of `periods` unit payments in arrears at a periodic `rate`.
///
/// Returns `periods` when the rate is zero. `rate` must exceed `-1`.
///
/// ```rust
/// use refi_lattice::amortization::annuity_factor;
///
/// assert_eq!(annuity_factor(0.0, 12), 12.0);
/// assert!((annuity_factor(0.01, 12) - 11.255_077).abs() < 1e-6);
/// ```
#[must_use]
pub fn annuity_factor(rate: f64, periods: u32) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    let k = f64::from(periods);
    if rate.abs() < ZERO_RATE_EPSILON {
        return k;
    }
    // 1 - (1+r)^-k, kept precise for small periodic rates
    -(-k * rate.ln_1p()).exp_m1() / rate
}

/// Amortization schedule of a level-payment loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    initial_balance: f64,
    periodic_rate: f64,
    term: u32,
    payment: f64,
    balances: Vec<f64>,
}

impl AmortizationSchedule {
    /// Builds the schedule for principal `initial_balance`, periodic contract
    /// rate `periodic_rate` and `term` periods.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::Configuration` when the balance is not positive,
    /// the rate is negative or non-finite, or the term is zero.
    pub fn new(initial_balance: f64, periodic_rate: f64, term: u32) -> LatticeResult<Self> {
        if !initial_balance.is_finite() || initial_balance <= 0.0 {
            return Err(LatticeError::configuration(format!(
                "initial balance must be positive, got {initial_balance}"
            )));
        }
        if !periodic_rate.is_finite() || periodic_rate < 0.0 {
            return Err(LatticeError::configuration(format!(
                "contract rate must be non-negative, got {periodic_rate}"
            )));
        }
        if term == 0 {
            return Err(LatticeError::configuration("loan term must be at least 1 period"));
        }

        let n = f64::from(term);
        let balances: Vec<f64> = if periodic_rate < ZERO_RATE_EPSILON {
            (0..=term)
                .map(|t| initial_balance * (1.0 - f64::from(t) / n))
                .collect()
        } else {
            // (1+c)^n - (1+c)^t = (1+c)^t * [(1+c)^(n-t) - 1]
            let log_growth = periodic_rate.ln_1p();
            let denominator = (n * log_growth).exp_m1();
            (0..=term)
                .map(|t| {
                    let t = f64::from(t);
                    let growth_t = (t * log_growth).exp();
                    initial_balance * growth_t * ((n - t) * log_growth).exp_m1() / denominator
                })
                .collect()
        };

        Ok(Self {
            initial_balance,
            periodic_rate,
            term,
            payment: initial_balance / annuity_factor(periodic_rate, term),
            balances,
        })
    }

    /// Remaining principal after `period` payments.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::PeriodOutOfRange` if `period` exceeds the term.
    pub fn balance_at(&self, period: u32) -> LatticeResult<f64> {
        self.balances
            .get(period as usize)
            .copied()
            .ok_or(LatticeError::PeriodOutOfRange {
                period,
                term: self.term,
            })
    }

    /// Level periodic payment.
    #[must_use]
    pub fn payment(&self) -> f64 {
        self.payment
    }

    /// Number of payments left after `period`.
    ///
    /// # Errors
    ///
    /// Returns `LatticeError::PeriodOutOfRange` if `period` exceeds the term.
    pub fn remaining_periods(&self, period: u32) -> LatticeResult<u32> {
        self.term
            .checked_sub(period)
            .ok_or(LatticeError::PeriodOutOfRange {
                period,
                term: self.term,
            })
    }

    /// All balances `B(0..=n)`.
    #[must_use]
    pub fn balances(&self) -> &[f64] {
        &self.balances
    }

    /// Original principal.
    #[must_use]
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Periodic contract rate.
    #[must_use]
    pub fn periodic_rate(&self) -> f64 {
        self.periodic_rate
    }

    /// Term in periods.
    #[must_use]
    pub fn term(&self) -> u32 {
        self.term
    }
}
