//! Valuation results at the root and at individual nodes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Borrower's optimal action at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinanceDecision {
    /// Refinance now.
    Refinance,
    /// Keep the existing loan.
    Wait,
}

impl RefinanceDecision {
    /// Refinance iff the intrinsic value is positive and at least the value
    /// of waiting.
    #[must_use]
    pub fn from_values(intrinsic: f64, waiting: f64) -> Self {
        if intrinsic >= waiting && intrinsic > 0.0 {
            Self::Refinance
        } else {
            Self::Wait
        }
    }

    /// Returns true for [`RefinanceDecision::Refinance`].
    #[must_use]
    pub fn is_refinance(self) -> bool {
        self == Self::Refinance
    }
}

impl fmt::Display for RefinanceDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refinance => write!(f, "refinance"),
            Self::Wait => write!(f, "wait"),
        }
    }
}

/// The value functions stored at each lattice node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeValues {
    /// Intrinsic refinancing value, `G`.
    pub g: f64,
    /// Value of waiting, `W`.
    pub w: f64,
    /// Option value, `V = max(G, W)`.
    pub v: f64,
    /// Borrower's liability under the optimal policy, `M`.
    pub m: f64,
    /// Lender's market value of the loan, `LM`.
    pub lm: f64,
    /// Remaining scheduled payments valued at the node rate.
    pub vnc: f64,
}

impl NodeValues {
    /// Optimal action at this node.
    #[must_use]
    pub fn decision(&self) -> RefinanceDecision {
        RefinanceDecision::from_values(self.g, self.w)
    }
}

/// Values at the root node `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootResults {
    /// Intrinsic refinancing value.
    pub g: f64,
    /// Value of waiting.
    pub w: f64,
    /// Option value.
    pub v: f64,
    /// Borrower's liability.
    pub m: f64,
    /// Lender's market value.
    pub lm: f64,
    /// Non-callable value of the remaining payments.
    pub vnc: f64,
    /// Periodic market rate at the root.
    pub rate: f64,
    /// Outstanding balance at valuation.
    pub balance: f64,
}

impl RootResults {
    pub(crate) fn new(values: NodeValues, rate: f64, balance: f64) -> Self {
        Self {
            g: values.g,
            w: values.w,
            v: values.v,
            m: values.m,
            lm: values.lm,
            vnc: values.vnc,
            rate,
            balance,
        }
    }

    /// Optimal action at the valuation date.
    #[must_use]
    pub fn decision(&self) -> RefinanceDecision {
        RefinanceDecision::from_values(self.g, self.w)
    }

    /// Value of the prepayment option as seen by the borrower, `Vnc - M`.
    #[must_use]
    pub fn option_value(&self) -> f64 {
        self.vnc - self.m
    }
}

/// Values at an arbitrary node `(t, j)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeResults {
    /// Time step.
    pub t: usize,
    /// Up-move count.
    pub j: usize,
    /// Probability of reaching the node from the root.
    pub reach_probability: f64,
    /// Intrinsic refinancing value.
    pub g: f64,
    /// Value of waiting.
    pub w: f64,
    /// Option value.
    pub v: f64,
    /// Borrower's liability.
    pub m: f64,
    /// Lender's market value.
    pub lm: f64,
    /// Non-callable value of the remaining payments.
    pub vnc: f64,
    /// Periodic market rate at the node.
    pub rate: f64,
    /// Outstanding balance at the node.
    pub balance: f64,
}

impl NodeResults {
    pub(crate) fn new(
        t: usize,
        j: usize,
        reach_probability: f64,
        values: NodeValues,
        rate: f64,
        balance: f64,
    ) -> Self {
        Self {
            t,
            j,
            reach_probability,
            g: values.g,
            w: values.w,
            v: values.v,
            m: values.m,
            lm: values.lm,
            vnc: values.vnc,
            rate,
            balance,
        }
    }

    /// Optimal action at this node.
    #[must_use]
    pub fn decision(&self) -> RefinanceDecision {
        RefinanceDecision::from_values(self.g, self.w)
    }
}
