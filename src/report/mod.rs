//! Reporting utilities: capacity rankings and formatted terminal output.
//!
//! Formatting lives here so the fitting code stays free of presentation.

pub mod format;

pub use format::*;

use crate::domain::{BatchReport, FittedRegion};

/// Valid fits ordered by carrying capacity, largest first (top-N).
pub fn rank_by_capacity(report: &BatchReport, top_n: usize) -> Vec<&FittedRegion> {
    let mut sorted: Vec<&FittedRegion> = report.fits.values().collect();
    sorted.sort_by(|a, b| {
        b.params
            .l
            .partial_cmp(&a.params.l)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(top_n);
    sorted
}
