//! Confidence band projection.
//!
//! The envelope propagates uncertainty through the carrying capacity only:
//!
//! ```text
//! lower(t) = f(t; L - z·L_std, x0, k)
//! upper(t) = f(t; L + z·L_std, x0, k)
//! ```
//!
//! with `x0` and `k` held at their point estimates. `x0_std` and `k_std` are
//! carried in the parameter table but do not widen the band.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::domain::{FitParameters, FittedRegion, ProjectionPoint};
use crate::error::{AppError, EXIT_INPUT, EXIT_NO_DATA};
use crate::math::{inverse_normal_cdf, logistic};

/// Two-sided critical value `Φ⁻¹(1 - (1 - c)/2)` for confidence level `c`.
pub fn z_star(confidence_level: f64) -> Result<f64, AppError> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(AppError::new(
            EXIT_INPUT,
            format!("Confidence level must be in (0, 1), got {confidence_level}."),
        ));
    }
    Ok(inverse_normal_cdf(1.0 - (1.0 - confidence_level) / 2.0))
}

/// Zero-based day index of `date` in the fit's frame.
pub fn day_index(date: NaiveDate, study_start: NaiveDate, epoch_offset: i64) -> f64 {
    ((date - study_start).num_days() - epoch_offset) as f64
}

/// Point and envelope at one day index for a precomputed `z`.
pub fn band_at(params: &FitParameters, t: f64, z: f64) -> (f64, f64, f64) {
    let half = z * params.l_std;
    (
        logistic(t, params.l, params.x0, params.k),
        logistic(t, params.l - half, params.x0, params.k),
        logistic(t, params.l + half, params.x0, params.k),
    )
}

/// Project one fit onto calendar dates.
pub fn project_params(
    params: &FitParameters,
    epoch_offset: i64,
    study_start: NaiveDate,
    dates: &[NaiveDate],
    confidence_level: f64,
) -> Result<Vec<ProjectionPoint>, AppError> {
    let z = z_star(confidence_level)?;
    Ok(dates
        .iter()
        .map(|&date| {
            let t = day_index(date, study_start, epoch_offset);
            let (predicted, lower, upper) = band_at(params, t, z);
            ProjectionPoint {
                date,
                predicted,
                lower,
                upper,
            }
        })
        .collect())
}

/// Inclusive daily axis from `from` to `to`.
pub fn date_range(from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, AppError> {
    if to < from {
        return Err(AppError::new(EXIT_INPUT, format!("Date range is empty: {from} > {to}.")));
    }
    let n = (to - from).num_days();
    Ok((0..=n).map(|i| from + Duration::days(i)).collect())
}

/// Read interface over a set of valid fits on a shared calendar.
#[derive(Debug, Clone)]
pub struct Projector {
    study_start: NaiveDate,
    fits: BTreeMap<String, FittedRegion>,
}

impl Projector {
    pub fn new(study_start: NaiveDate, fits: BTreeMap<String, FittedRegion>) -> Self {
        Self { study_start, fits }
    }

    pub fn study_start(&self) -> NaiveDate {
        self.study_start
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.fits.keys().map(String::as_str)
    }

    pub fn fit(&self, region_id: &str) -> Option<&FittedRegion> {
        self.fits.get(region_id)
    }

    /// Predicted counts and confidence envelope for `region_id` on `dates`.
    pub fn project(
        &self,
        region_id: &str,
        dates: &[NaiveDate],
        confidence_level: f64,
    ) -> Result<Vec<ProjectionPoint>, AppError> {
        let fit = self.fits.get(region_id).ok_or_else(|| {
            AppError::new(EXIT_NO_DATA, format!("No valid fit for region '{region_id}'."))
        })?;
        project_params(&fit.params, fit.epoch_offset, self.study_start, dates, confidence_level)
    }
}
