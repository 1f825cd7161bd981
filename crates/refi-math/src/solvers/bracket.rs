//! Grid scanning for bracketing intervals.

use crate::error::{MathError, MathResult};

/// Upper bound on grid size, guards against a tiny step over a wide range.
const MAX_GRID_POINTS: usize = 100_000;

/// A bracketing interval with the function values at both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    /// Lower end of the interval.
    pub lower: f64,
    /// Upper end of the interval.
    pub upper: f64,
    /// Function value at `lower`.
    pub f_lower: f64,
    /// Function value at `upper`.
    pub f_upper: f64,
}

impl Bracket {
    /// Width of the interval.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Builds an evenly spaced grid from `lower` to `upper` inclusive.
///
/// The last point is always exactly `upper`, even when the range is not a
/// whole multiple of `step`.
pub fn grid_points(lower: f64, upper: f64, step: f64) -> MathResult<Vec<f64>> {
    if !lower.is_finite() || !upper.is_finite() || !step.is_finite() {
        return Err(MathError::invalid_input("grid bounds and step must be finite"));
    }
    if upper <= lower {
        return Err(MathError::invalid_input(format!(
            "grid upper bound {upper} must exceed lower bound {lower}"
        )));
    }
    if step <= 0.0 {
        return Err(MathError::invalid_input(format!(
            "grid step must be positive, got {step}"
        )));
    }

    let intervals = ((upper - lower) / step - 1e-9).ceil().max(1.0);
    if intervals as usize >= MAX_GRID_POINTS {
        return Err(MathError::invalid_input(format!(
            "grid of {intervals} intervals exceeds limit of {MAX_GRID_POINTS}"
        )));
    }

    let n = intervals as usize;
    let mut points: Vec<f64> = (0..n).map(|i| lower + i as f64 * step).collect();
    points.push(upper);
    Ok(points)
}

/// Returns the first adjacent pair where `f` moves from negative to
/// non-negative.
///
/// `samples` must be ordered by abscissa. Returns `None` when no such
/// transition exists, including when the first sample is already
/// non-negative.
pub fn first_upcrossing(samples: &[(f64, f64)]) -> Option<Bracket> {
    samples.windows(2).find_map(|w| {
        let (a, fa) = w[0];
        let (b, fb) = w[1];
        (fa < 0.0 && fb >= 0.0).then_some(Bracket {
            lower: a,
            upper: b,
            f_lower: fa,
            f_upper: fb,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_grid_includes_upper() {
        let grid = grid_points(0.0, 1.0, 0.3).unwrap();
        assert_eq!(grid.len(), 5);
        assert!((grid[3] - 0.9).abs() < 1e-12);
        assert!((grid[4] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_grid_exact_multiple() {
        let grid = grid_points(0.0, 1.0, 0.25).unwrap();
        assert_eq!(grid.len(), 5);
    }

    #[test]
    fn test_grid_rejects_bad_input() {
        assert!(grid_points(1.0, 0.0, 0.1).is_err());
        assert!(grid_points(0.0, 1.0, 0.0).is_err());
        assert!(grid_points(0.0, 1.0, -0.1).is_err());
        assert!(grid_points(0.0, f64::NAN, 0.1).is_err());
        assert!(grid_points(0.0, 1.0, 1e-9).is_err());
    }

    #[test]
    fn test_first_upcrossing() {
        let samples = [(0.0, -2.0), (1.0, -1.0), (2.0, 0.0), (3.0, 1.0)];
        let bracket = first_upcrossing(&samples).unwrap();
        assert_eq!(bracket.lower, 1.0);
        assert_eq!(bracket.upper, 2.0);
        assert_eq!(bracket.f_upper, 0.0);
    }

    #[test]
    fn test_no_upcrossing_when_already_positive() {
        let samples = [(0.0, 1.0), (1.0, 2.0)];
        assert!(first_upcrossing(&samples).is_none());
    }

    #[test]
    fn test_no_upcrossing_when_always_negative() {
        let samples = [(0.0, -1.0), (1.0, -0.5)];
        assert!(first_upcrossing(&samples).is_none());
    }

    #[test]
    fn test_downcrossing_ignored() {
        let samples = [(0.0, 1.0), (1.0, -1.0), (2.0, 1.0)];
        let bracket = first_upcrossing(&samples).unwrap();
        assert_eq!(bracket.lower, 1.0);
    }

    proptest! {
        #[test]
        fn prop_grid_is_increasing_and_bounded(
            lower in -1.0f64..1.0,
            width in 0.01f64..2.0,
            step in 0.001f64..0.5,
        ) {
            let upper = lower + width;
            let grid = grid_points(lower, upper, step).unwrap();
            prop_assert!(grid.len() >= 2);
            prop_assert_eq!(grid[0], lower);
            prop_assert_eq!(*grid.last().unwrap(), upper);
            for w in grid.windows(2) {
                prop_assert!(w[1] > w[0]);
                prop_assert!(w[1] - w[0] <= step * (1.0 + 1e-8));
            }
        }
    }
}
