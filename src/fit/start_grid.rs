//! Start-point generation for the logistic fit.
//!
//! Levenberg–Marquardt is local, and the logistic surface has flat regions
//! (a saturated sigmoid has no sensitivity to `x0` or `k`). We therefore solve
//! from a small deterministic grid of data-driven starts and keep the best.
//!
//! A series still growing exponentially pins `L` to its upper bound, and the
//! path there runs along a narrow valley. The grid therefore also carries
//! starts with `L` at its cap and `x0` placed so the curve passes through the
//! last observation.

use crate::domain::{PARAM_COUNT, ParamBounds};
use crate::error::{AppError, EXIT_INPUT};
use crate::math::half_max_index;

/// Multipliers applied to the largest observed count to seed `L`.
pub const CAPACITY_FACTORS: [f64; 3] = [1.0, 1.5, 3.0];

/// Growth-rate seeds: log-spaced over this range.
pub const RATE_MIN: f64 = 0.02;
pub const RATE_MAX: f64 = 1.0;
pub const RATE_STEPS: usize = 5;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::new(
            EXIT_INPUT,
            format!("Invalid range: min={min}, max={max} (must be finite, >0, and max>min)."),
        ));
    }
    if steps < 2 {
        return Err(AppError::new(EXIT_INPUT, "Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    Ok((0..steps).map(|i| (ln_min + step * i as f64).exp()).collect())
}

/// Start points `[L, x0, k]` for one series, clamped into `bounds`.
///
/// Ordered capacity-major so ties between equally good candidates resolve to
/// the smallest capacity seed.
pub fn start_grid(
    days: &[f64],
    counts: &[f64],
    bounds: &ParamBounds,
) -> Result<Vec<[f64; PARAM_COUNT]>, AppError> {
    let max_count = counts
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    if max_count <= 0.0 {
        return Err(AppError::new(EXIT_INPUT, "Cannot seed a fit from a series with no positive counts."));
    }

    let x0_seed = half_max_index(counts)
        .and_then(|i| days.get(i).copied())
        .unwrap_or(0.0);
    let rates = log_space(RATE_MIN, RATE_MAX, RATE_STEPS)?;

    let mut out = Vec::with_capacity((CAPACITY_FACTORS.len() + 1) * rates.len());
    for factor in CAPACITY_FACTORS {
        for &k in &rates {
            let mut p = [max_count * factor, x0_seed, k];
            bounds.project(&mut p);
            out.push(p);
        }
    }

    let cap = bounds.upper[0];
    let last_day = days.last().copied().unwrap_or(0.0);
    if max_count < cap {
        for &k in &rates {
            let mut p = [cap, last_day + (cap / max_count - 1.0).ln() / k, k];
            bounds.project(&mut p);
            out.push(p);
        }
    }
    Ok(out)
}
