//! Bisection root-finding algorithm.

use crate::error::{MathError, MathResult};
use crate::solvers::{Bracket, SolverConfig, SolverResult};

/// Bisects a bracket whose endpoint values are already known.
///
/// Repeatedly halves the interval and keeps the half whose endpoints have
/// opposite signs. The endpoint values usually come from a grid scan, so
/// they are not evaluated again. The returned [`SolverResult::bracket`]
/// keeps the sign orientation of the input, so for an increasing function
/// the upper end is the smallest point seen with `f >= 0`.
///
/// Requires: `f_lower * f_upper <= 0`; tolerance is on the bracket
/// half-width.
///
/// # Example
///
/// ```rust
/// use refi_math::solvers::{bisect_bracket, Bracket, SolverConfig};
///
/// let f = |x: f64| x * x - 2.0;
/// let bracket = Bracket { lower: 1.0, upper: 2.0, f_lower: f(1.0), f_upper: f(2.0) };
///
/// let result = bisect_bracket(f, &bracket, &SolverConfig::default()).unwrap();
/// assert!((result.root - std::f64::consts::SQRT_2).abs() < 1e-10);
/// ```
pub fn bisect_bracket<F>(
    mut f: F,
    bracket: &Bracket,
    config: &SolverConfig,
) -> MathResult<SolverResult>
where
    F: FnMut(f64) -> f64,
{
    if config.tolerance <= 0.0 || !config.tolerance.is_finite() {
        return Err(MathError::invalid_input(format!(
            "tolerance must be positive, got {}",
            config.tolerance
        )));
    }

    let mut lo = bracket.lower;
    let mut hi = bracket.upper;
    let f_lo = bracket.f_lower;
    let f_hi = bracket.f_upper;

    if f_lo * f_hi > 0.0 {
        return Err(MathError::InvalidBracket {
            a: lo,
            b: hi,
            fa: f_lo,
            fb: f_hi,
        });
    }

    if f_lo == 0.0 {
        return Ok(SolverResult {
            root: lo,
            iterations: 0,
            residual: f_lo,
            bracket: (lo, lo),
        });
    }
    let lo_negative = f_lo < 0.0;
    let mut residual = f_hi;

    for iteration in 0..config.max_iterations {
        if (hi - lo) / 2.0 < config.tolerance {
            return Ok(SolverResult {
                root: (lo + hi) / 2.0,
                iterations: iteration,
                residual,
                bracket: (lo, hi),
            });
        }

        let mid = (lo + hi) / 2.0;
        let f_mid = f(mid);
        residual = f_mid;
        log::trace!("bisection iter {iteration}: x = {mid:.10}, f = {f_mid:.6e}");

        // Keep the half that still straddles the sign change; zero counts as
        // the non-negative side.
        if (f_mid < 0.0) == lo_negative {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    if (hi - lo) / 2.0 < config.tolerance {
        return Ok(SolverResult {
            root: (lo + hi) / 2.0,
            iterations: config.max_iterations,
            residual,
            bracket: (lo, hi),
        });
    }

    Err(MathError::convergence_failed(config.max_iterations, hi - lo))
}
