//! Logistic fit for a single prepared region.
//!
//! Given:
//! - day indices `t_i` (0 at the first nonzero observation)
//! - cumulative counts `y_i`
//! - box constraints on `(L, x0, k)`
//!
//! we solve the bounded least-squares problem from every start in the start
//! grid and keep the lowest-SSE converged candidate. Standard errors come from
//! the covariance at that optimum.

use tracing::debug;

use crate::domain::{
    FitOptions, FitParameters, FitQuality, PARAM_COUNT, PreparedSeries, RawRegionFit, RegionOutcome, SkipReason,
};
use crate::fit::start_grid::start_grid;
use crate::math::{LmSettings, LmSolution, Logistic, SolveError, solve};

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    solution: LmSolution,
}

impl From<&FitOptions> for LmSettings {
    fn from(opts: &FitOptions) -> Self {
        LmSettings {
            max_iterations: opts.max_iterations,
            ftol: opts.ftol,
            xtol: opts.xtol,
            gtol: opts.gtol,
        }
    }
}

/// Fit one region.
///
/// - `Err(InsufficientData)` is the not-fit sentinel for short series; no
///   solve is attempted.
/// - A solver failure on every start yields the all-NaN record, which the
///   batch filter later classifies as a convergence failure.
pub fn fit_region(prepared: &PreparedSeries, opts: &FitOptions) -> RegionOutcome<RawRegionFit> {
    let n = prepared.len();
    if n < opts.min_observations.max(PARAM_COUNT + 1) {
        return Err(SkipReason::InsufficientData { observations: n });
    }

    let undefined = || RawRegionFit {
        params: FitParameters::undefined(prepared.region_id.as_str()),
        epoch_offset: prepared.epoch_offset,
        quality: None,
    };

    let starts = match start_grid(&prepared.days, &prepared.counts, &opts.bounds) {
        Ok(s) => s,
        Err(e) => {
            debug!(region = %prepared.region_id, error = %e, "no usable start point");
            return Ok(undefined());
        }
    };

    let settings = LmSettings::from(opts);
    let mut last_error: Option<SolveError> = None;
    let mut candidates = Vec::with_capacity(starts.len());
    for (idx, start) in starts.into_iter().enumerate() {
        match solve(&Logistic, &prepared.days, &prepared.counts, start, &opts.bounds, &settings) {
            Ok(solution) if solution.sse.is_finite() => candidates.push(Candidate { idx, solution }),
            Ok(_) => {}
            Err(e) => last_error = Some(e),
        }
    }

    let Some(best) = select_best(&candidates) else {
        debug!(
            region = %prepared.region_id,
            error = ?last_error,
            "solver failed from every start"
        );
        return Ok(undefined());
    };

    let sol = &best.solution;
    let [l, x0, k] = sol.params;
    let [l_std, x0_std, k_std] = sol.std_errors();

    Ok(RawRegionFit {
        params: FitParameters {
            region_id: prepared.region_id.clone(),
            l,
            x0,
            k,
            l_std,
            x0_std,
            k_std,
        },
        epoch_offset: prepared.epoch_offset,
        quality: Some(FitQuality {
            sse: sol.sse,
            rmse: (sol.sse / n as f64).sqrt(),
            n,
            iterations: sol.iterations,
        }),
    })
}

/// Deterministic selection: minimum SSE; ties broken by start index.
fn select_best(candidates: &[Candidate]) -> Option<&Candidate> {
    let mut iter = candidates.iter();
    let mut best = iter.next()?;
    for c in iter {
        let sse = c.solution.sse;
        let best_sse = best.solution.sse;
        if sse < best_sse || (sse == best_sse && c.idx < best.idx) {
            best = c;
        }
    }
    Some(best)
}
