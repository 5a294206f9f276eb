//! Synthetic cumulative-case tables built from noisy logistic curves.
//!
//! Used by `epi sample` to produce demo inputs and by tests that need data
//! with known generating parameters.

use chrono::{Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{CaseTable, Observation, RegionSeries};
use crate::error::{AppError, EXIT_INPUT};
use crate::math::logistic;

/// Generating parameters for one synthetic region.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSpec {
    pub l: f64,
    /// Inflection day, counted from the first nonzero day.
    pub x0: f64,
    pub k: f64,
    /// Number of days after the lead-in of zeros.
    pub days: usize,
    /// Zero-count days before the outbreak starts.
    pub lead_zeros: usize,
    /// Relative standard deviation of multiplicative noise.
    pub noise_rel: f64,
}

/// Ranges used when drawing random region specs.
#[derive(Debug, Clone)]
pub struct SampleRanges {
    pub l_min: f64,
    pub l_max: f64,
    pub k_min: f64,
    pub k_max: f64,
    pub max_lead_zeros: usize,
    pub noise_rel: f64,
}

impl Default for SampleRanges {
    fn default() -> Self {
        Self {
            l_min: 1e3,
            l_max: 1e6,
            k_min: 0.08,
            k_max: 0.35,
            max_lead_zeros: 20,
            noise_rel: 0.02,
        }
    }
}

/// Noisy, non-decreasing, integer-valued cumulative counts for one region.
///
/// The series starts with `lead_zeros` zeros; every count after that is at
/// least 1 so the outbreak day is exactly `lead_zeros`.
pub fn noisy_logistic_counts(spec: &SampleSpec, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, spec.noise_rel.max(0.0)).ok();

    let mut out = vec![0.0; spec.lead_zeros];
    out.reserve(spec.days);

    let mut running: f64 = 1.0;
    for t in 0..spec.days {
        let clean = logistic(t as f64, spec.l, spec.x0, spec.k);
        let eps = noise.as_ref().map(|n| n.sample(&mut rng)).unwrap_or(0.0);
        let noisy = (clean * (1.0 + eps)).round();
        running = running.max(noisy);
        out.push(running);
    }
    out
}

/// Build a case table with one column per spec on a shared daily axis.
///
/// Shorter regions simply stop early: their trailing cells are absent.
pub fn synthetic_table(start: NaiveDate, specs: &[(String, SampleSpec)], seed: u64) -> CaseTable {
    let len = specs
        .iter()
        .map(|(_, s)| s.lead_zeros + s.days)
        .max()
        .unwrap_or(0);
    let dates: Vec<NaiveDate> = (0..len).map(|i| start + Duration::days(i as i64)).collect();

    let regions = specs
        .iter()
        .enumerate()
        .map(|(i, (id, spec))| {
            let counts = noisy_logistic_counts(spec, seed.wrapping_add(i as u64));
            let observations = dates
                .iter()
                .zip(counts)
                .map(|(&date, count)| Observation::new(date, count))
                .collect();
            RegionSeries::new(id.clone(), observations)
        })
        .collect();

    CaseTable { dates, regions }
}

/// Draw `count` random region specs of `days` days each.
pub fn random_specs(
    count: usize,
    days: usize,
    ranges: &SampleRanges,
    seed: u64,
) -> Result<Vec<(String, SampleSpec)>, AppError> {
    if count == 0 {
        return Err(AppError::new(EXIT_INPUT, "Region count must be > 0."));
    }
    if days < 2 {
        return Err(AppError::new(EXIT_INPUT, "Sample length must be at least 2 days."));
    }
    if !(ranges.l_min > 0.0 && ranges.l_max > ranges.l_min && ranges.k_min > 0.0 && ranges.k_max > ranges.k_min) {
        return Err(AppError::new(EXIT_INPUT, "Invalid sample parameter ranges."));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let (ln_lo, ln_hi) = (ranges.l_min.ln(), ranges.l_max.ln());
    let x0_hi = (days as f64 * 0.6).max(2.0);

    Ok((0..count)
        .map(|i| {
            let spec = SampleSpec {
                l: rng.gen_range(ln_lo..ln_hi).exp().round(),
                x0: rng.gen_range(1.0..x0_hi),
                k: rng.gen_range(ranges.k_min..ranges.k_max),
                days,
                lead_zeros: rng.gen_range(0..=ranges.max_lead_zeros),
                noise_rel: ranges.noise_rel,
            };
            (format!("Region {:03}", i + 1), spec)
        })
        .collect())
}
