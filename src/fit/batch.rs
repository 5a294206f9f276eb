//! Batch fitting across regions and the validity filter.
//!
//! Each region is fit independently on the rayon pool. Only after every
//! worker has finished do we classify the results, because the filter is
//! defined over the full result set.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{BatchReport, FitOptions, FittedRegion, PreparedSeries, RawRegionFit, RegionOutcome, SkipReason};
use crate::fit::fitter::fit_region;
use crate::prep::PreparedBatch;

/// Fit every prepared region in parallel.
///
/// Output order matches input order.
pub fn fit_all(prepared: &[PreparedSeries], opts: &FitOptions) -> Vec<(String, RegionOutcome<RawRegionFit>)> {
    prepared
        .par_iter()
        .map(|p| (p.region_id.clone(), fit_region(p, opts)))
        .collect()
}

/// Classify one raw fit.
///
/// Checks run in a fixed order: solver failure first, then non-finite
/// fields, then the statistical check `L_std <= L`.
pub fn classify(raw: RawRegionFit) -> RegionOutcome<FittedRegion> {
    let params = &raw.params;
    if params.is_undefined() {
        return Err(SkipReason::ConvergenceFailure);
    }
    if !params.is_finite() {
        return Err(SkipReason::NonFiniteParameters);
    }
    if params.l_std > params.l {
        return Err(SkipReason::UnreliableFit {
            l: params.l,
            l_std: params.l_std,
        });
    }
    Ok(FittedRegion {
        params: raw.params,
        epoch_offset: raw.epoch_offset,
        quality: raw.quality,
    })
}

/// Apply the validity filter to a completed set of raw fits.
pub fn filter_valid(raw: Vec<RawRegionFit>) -> (BTreeMap<String, FittedRegion>, BTreeMap<String, SkipReason>) {
    let mut fits = BTreeMap::new();
    let mut skipped = BTreeMap::new();
    for r in raw {
        let id = r.params.region_id.clone();
        match classify(r) {
            Ok(f) => {
                fits.insert(id, f);
            }
            Err(reason) => {
                debug!(region = %id, %reason, "fit rejected");
                skipped.insert(id, reason);
            }
        }
    }
    (fits, skipped)
}

/// Fit a prepared batch and assemble the report.
///
/// Regions already skipped during preparation are carried through unchanged.
pub fn run_batch(batch: PreparedBatch, opts: &FitOptions) -> BatchReport {
    let results = fit_all(&batch.ready, opts);

    let mut skipped: BTreeMap<String, SkipReason> = batch.skipped.into_iter().collect();
    let mut raw = Vec::with_capacity(results.len());
    for (id, outcome) in results {
        match outcome {
            Ok(r) => raw.push(r),
            Err(reason) => {
                skipped.insert(id, reason);
            }
        }
    }

    let (fits, rejected) = filter_valid(raw);
    skipped.extend(rejected);

    let report = BatchReport { fits, skipped };
    info!(
        regions = report.total_regions(),
        fitted = report.fits.len(),
        insufficient = report.count_skipped(|r| matches!(r, SkipReason::InsufficientData { .. })),
        unconverged = report.count_skipped(|r| matches!(r, SkipReason::ConvergenceFailure)),
        non_finite = report.count_skipped(|r| matches!(r, SkipReason::NonFiniteParameters)),
        unreliable = report.count_skipped(|r| matches!(r, SkipReason::UnreliableFit { .. })),
        "batch fit complete"
    );
    report
}
