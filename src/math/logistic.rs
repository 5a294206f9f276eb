//! Three-parameter logistic growth curve.
//!
//! `f(t) = L / (1 + exp(-k (t - x0)))`
//!
//! Numerical notes:
//! - For large negative `k (t - x0)` the exponential overflows to `inf`, which
//!   yields `f = 0` and a zero sensitivity. That is the correct limit, so no
//!   special casing is needed.
//! - `L` enters linearly; a negative `L` (e.g. a lower confidence envelope)
//!   simply mirrors the curve below zero.

use crate::domain::PARAM_COUNT;
use crate::math::lm::ResidualModel;

/// Logistic sigmoid `1 / (1 + exp(-z))`.
pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Evaluate the logistic curve at day index `t`.
pub fn logistic(t: f64, l: f64, x0: f64, k: f64) -> f64 {
    l * sigmoid(k * (t - x0))
}

/// Partial derivatives of `f` with respect to `(L, x0, k)` at `t`.
pub fn logistic_gradient(t: f64, l: f64, x0: f64, k: f64) -> [f64; PARAM_COUNT] {
    let dt = t - x0;
    let s = sigmoid(k * dt);
    let ds = s * (1.0 - s);
    [s, -l * k * ds, l * dt * ds]
}

/// The logistic curve as a least-squares model over `[L, x0, k]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logistic;

impl ResidualModel for Logistic {
    fn value(&self, t: f64, p: &[f64; PARAM_COUNT]) -> f64 {
        logistic(t, p[0], p[1], p[2])
    }

    fn gradient(&self, t: f64, p: &[f64; PARAM_COUNT]) -> [f64; PARAM_COUNT] {
        logistic_gradient(t, p[0], p[1], p[2])
    }
}

/// First index at which `values` reaches half of their maximum.
///
/// Used as a data-driven guess for the inflection offset `x0`.
pub fn half_max_index(values: &[f64]) -> Option<usize> {
    let max = values.iter().copied().filter(|v| v.is_finite()).fold(f64::NAN, f64::max);
    if !max.is_finite() {
        return None;
    }
    values.iter().position(|&v| v >= 0.5 * max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn midpoint_is_half_capacity() {
        assert_relative_eq!(logistic(50.0, 1000.0, 50.0, 0.2), 500.0);
    }

    #[test]
    fn saturates_without_overflow() {
        assert_relative_eq!(logistic(1e6, 1000.0, 0.0, 3.0), 1000.0);
        assert_eq!(logistic(-1e6, 1000.0, 0.0, 3.0), 0.0);
        let g = logistic_gradient(-1e6, 1000.0, 0.0, 3.0);
        assert!(g.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn negative_capacity_evaluates_below_zero() {
        assert!(logistic(10.0, -50.0, 5.0, 0.3) < 0.0);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let p = [800.0, 12.0, 0.25];
        let t = 9.0;
        let g = logistic_gradient(t, p[0], p[1], p[2]);
        for i in 0..PARAM_COUNT {
            let h = 1e-6 * p[i].abs().max(1.0);
            let mut up = p;
            let mut dn = p;
            up[i] += h;
            dn[i] -= h;
            let fd = (logistic(t, up[0], up[1], up[2]) - logistic(t, dn[0], dn[1], dn[2])) / (2.0 * h);
            assert_relative_eq!(g[i], fd, max_relative = 1e-6);
        }
    }

    #[test]
    fn half_max_index_finds_crossing() {
        assert_eq!(half_max_index(&[1.0, 2.0, 6.0, 9.0, 10.0]), Some(2));
        assert_eq!(half_max_index(&[]), None);
    }
}
