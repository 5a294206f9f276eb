//! Box-constrained Levenberg–Marquardt for small nonlinear least-squares
//! problems.
//!
//! Given observations `(t_i, y_i)` and a model `f(t; p)` with three
//! parameters, we minimize
//!
//! ```text
//! SSE(p) = Σ (y_i - f(t_i; p))^2   subject to   lower ≤ p ≤ upper
//! ```
//!
//! Each iteration solves the damped Gauss–Newton system with Marquardt
//! scaling `D = sqrt(diag(JᵀJ))` and projects the trial point back into the
//! box. Coordinates sitting on a bound whose gradient points outward are held
//! fixed for that iteration; the step is solved over the remaining free
//! coordinates only. Trial points that do not lower the SSE raise the damping
//! and are retried from the same point.
//!
//! Convergence (any of):
//! - relative SSE reduction `≤ ftol`
//! - relative step `≤ xtol`
//! - scaled gradient over the free coordinates `≤ gtol · ‖r‖` (no free
//!   coordinate counts as converged)

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::domain::{PARAM_COUNT, ParamBounds};
use crate::math::ols::{normal_inverse, solve_least_squares};

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.3;
/// Floor for Marquardt scale entries whose Jacobian column vanished.
const SCALE_FLOOR: f64 = 1e-12;

/// A model that can be fit by [`solve`].
pub trait ResidualModel {
    fn value(&self, t: f64, p: &[f64; PARAM_COUNT]) -> f64;
    fn gradient(&self, t: f64, p: &[f64; PARAM_COUNT]) -> [f64; PARAM_COUNT];
}

/// Solver controls.
#[derive(Debug, Clone, Copy)]
pub struct LmSettings {
    pub max_iterations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

/// Why a solve did not produce a usable optimum.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("input length mismatch: {t} day indices, {y} observations")]
    LengthMismatch { t: usize, y: usize },
    #[error("need more observations ({n}) than parameters ({PARAM_COUNT})")]
    Underdetermined { n: usize },
    #[error("parameter bounds are not well formed")]
    InvalidBounds,
    #[error("non-finite residuals at the start point")]
    NonFiniteStart,
    #[error("damped step could not be solved")]
    SingularStep,
    #[error("damping exceeded its limit without reducing the cost")]
    Stalled,
    #[error("no convergence within {0} iterations")]
    MaxIterations(usize),
}

/// A converged solution.
#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: [f64; PARAM_COUNT],
    pub sse: f64,
    pub iterations: usize,
    /// Parameter covariance `(JᵀJ)⁻¹ · SSE / (n - p)`; `None` when the
    /// Jacobian at the solution is rank deficient.
    pub covariance: Option<DMatrix<f64>>,
}

impl LmSolution {
    /// Square roots of the covariance diagonal; `+∞` when the covariance could
    /// not be estimated.
    pub fn std_errors(&self) -> [f64; PARAM_COUNT] {
        let mut out = [f64::INFINITY; PARAM_COUNT];
        if let Some(cov) = &self.covariance {
            for (i, v) in out.iter_mut().enumerate() {
                let var = cov[(i, i)];
                *v = if var >= 0.0 { var.sqrt() } else { f64::NAN };
            }
        }
        out
    }
}

/// Fit `model` to `(t, y)` starting at `start` (clamped into `bounds`).
pub fn solve<M: ResidualModel>(
    model: &M,
    t: &[f64],
    y: &[f64],
    start: [f64; PARAM_COUNT],
    bounds: &ParamBounds,
    settings: &LmSettings,
) -> Result<LmSolution, SolveError> {
    if t.len() != y.len() {
        return Err(SolveError::LengthMismatch { t: t.len(), y: y.len() });
    }
    let n = t.len();
    if n <= PARAM_COUNT {
        return Err(SolveError::Underdetermined { n });
    }
    if !bounds.is_well_formed() {
        return Err(SolveError::InvalidBounds);
    }

    let mut p = start;
    bounds.project(&mut p);

    let mut r = residuals(model, t, y, &p);
    let mut sse = r.norm_squared();
    if !sse.is_finite() {
        return Err(SolveError::NonFiniteStart);
    }

    let mut lambda = LAMBDA_INIT;

    for iter in 1..=settings.max_iterations {
        let j = jacobian(model, t, &p);
        let g = j.transpose() * &r;
        let scale: Vec<f64> = (0..PARAM_COUNT)
            .map(|c| j.column(c).norm().max(SCALE_FLOOR))
            .collect();

        let free = free_coordinates(&g, &p, bounds);
        let r_norm = r.norm();
        if free
            .iter()
            .all(|&i| (g[i] / scale[i]).abs() <= settings.gtol * r_norm)
        {
            return Ok(finish(model, t, p, sse, iter - 1));
        }

        // Inner loop: raise damping until the SSE decreases.
        loop {
            let step = damped_step(&j, &r, &scale, lambda, &free).ok_or(SolveError::SingularStep)?;

            let mut trial = p;
            for i in 0..PARAM_COUNT {
                trial[i] += step[i];
            }
            bounds.project(&mut trial);

            let taken: [f64; PARAM_COUNT] = std::array::from_fn(|i| trial[i] - p[i]);
            let small_step = relative_step(&taken, &p) <= settings.xtol;

            let r_trial = residuals(model, t, y, &trial);
            let sse_trial = r_trial.norm_squared();

            if sse_trial.is_finite() && sse_trial < sse {
                let reduction = sse - sse_trial;
                p = trial;
                r = r_trial;
                let converged = reduction <= settings.ftol * sse || small_step;
                sse = sse_trial;
                lambda = (lambda * LAMBDA_DOWN).max(LAMBDA_MIN);
                if converged {
                    return Ok(finish(model, t, p, sse, iter));
                }
                break;
            }

            // No decrease. A vanishing step means we are sitting on the optimum
            // to working precision.
            if small_step {
                return Ok(finish(model, t, p, sse, iter));
            }
            lambda *= LAMBDA_UP;
            if lambda > LAMBDA_MAX {
                return Err(SolveError::Stalled);
            }
        }
    }

    Err(SolveError::MaxIterations(settings.max_iterations))
}

fn finish<M: ResidualModel>(
    model: &M,
    t: &[f64],
    params: [f64; PARAM_COUNT],
    sse: f64,
    iterations: usize,
) -> LmSolution {
    let j = jacobian(model, t, &params);
    let dof = (t.len() - PARAM_COUNT) as f64;
    let covariance = normal_inverse(&j).map(|inv| inv * (sse / dof));
    LmSolution {
        params,
        sse,
        iterations,
        covariance,
    }
}

fn residuals<M: ResidualModel>(model: &M, t: &[f64], y: &[f64], p: &[f64; PARAM_COUNT]) -> DVector<f64> {
    DVector::from_iterator(
        t.len(),
        t.iter().zip(y.iter()).map(|(&ti, &yi)| yi - model.value(ti, p)),
    )
}

fn jacobian<M: ResidualModel>(model: &M, t: &[f64], p: &[f64; PARAM_COUNT]) -> DMatrix<f64> {
    let mut j = DMatrix::<f64>::zeros(t.len(), PARAM_COUNT);
    for (i, &ti) in t.iter().enumerate() {
        let row = model.gradient(ti, p);
        for c in 0..PARAM_COUNT {
            j[(i, c)] = row[c];
        }
    }
    j
}

/// Solve `[J_F; sqrt(λ) D_F] δ_F ≈ [r; 0]` over the free columns `F`.
/// Held coordinates get a zero step.
fn damped_step(
    j: &DMatrix<f64>,
    r: &DVector<f64>,
    scale: &[f64],
    lambda: f64,
    free: &[usize],
) -> Option<[f64; PARAM_COUNT]> {
    let n = j.nrows();
    let nf = free.len();
    let mut a = DMatrix::<f64>::zeros(n + nf, nf);
    let damp = lambda.sqrt();
    for (col, &c) in free.iter().enumerate() {
        a.column_mut(col).rows_mut(0, n).copy_from(&j.column(c));
        a[(n + col, col)] = damp * scale[c];
    }
    let mut b = DVector::<f64>::zeros(n + nf);
    b.rows_mut(0, n).copy_from(r);

    let delta = solve_least_squares(&a, &b)?;
    let mut out = [0.0; PARAM_COUNT];
    for (col, &c) in free.iter().enumerate() {
        out[c] = delta[col];
    }
    Some(out)
}

fn relative_step(step: &[f64; PARAM_COUNT], p: &[f64; PARAM_COUNT]) -> f64 {
    step.iter()
        .zip(p.iter())
        .map(|(s, x)| s.abs() / (x.abs() + 1.0))
        .fold(0.0, f64::max)
}

/// Coordinates not held by an active bound.
///
/// Descent direction is `+g`; a coordinate on its lower bound with `g < 0`, or
/// on its upper bound with `g > 0`, would be pushed out of the box.
fn free_coordinates(g: &DVector<f64>, p: &[f64; PARAM_COUNT], bounds: &ParamBounds) -> Vec<usize> {
    (0..PARAM_COUNT)
        .filter(|&i| {
            let gi = g[i];
            let blocked = (p[i] <= bounds.lower[i] && gi < 0.0) || (p[i] >= bounds.upper[i] && gi > 0.0);
            !blocked
        })
        .collect()
}
