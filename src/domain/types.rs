//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during preparation and fitting
//! - exported to CSV/JSON
//! - reloaded later for projection

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// First day of the shared calendar all epoch offsets are measured from.
pub const DEFAULT_STUDY_START: NaiveDate = match NaiveDate::from_ymd_opt(2020, 1, 22) {
    Some(date) => date,
    None => panic!("invalid default study start"),
};

/// Minimum number of post-trim observations required to attempt a fit.
pub const MIN_OBSERVATIONS: usize = 30;

/// Number of free parameters in the logistic model (`L`, `x0`, `k`).
pub const PARAM_COUNT: usize = 3;

/// Row labels of the persisted parameter table, in storage order.
pub const PARAM_NAMES: [&str; 6] = ["L", "x0", "k", "L_std", "x0_std", "k_std"];

/// One daily cumulative-count observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub count: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, count: f64) -> Self {
        Self { date, count }
    }
}

/// Cumulative-case series for one region, ordered by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSeries {
    pub region_id: String,
    pub observations: Vec<Observation>,
}

impl RegionSeries {
    pub fn new(region_id: impl Into<String>, observations: Vec<Observation>) -> Self {
        Self {
            region_id: region_id.into(),
            observations,
        }
    }

    /// Build a series from consecutive daily counts starting at `start`.
    pub fn from_daily_counts(region_id: impl Into<String>, start: NaiveDate, counts: &[f64]) -> Self {
        let observations = start
            .iter_days()
            .zip(counts.iter())
            .map(|(date, &count)| Observation::new(date, count))
            .collect();
        Self::new(region_id, observations)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Wide cumulative-case table: one series per region over a shared date axis.
///
/// Cells missing from the source table are simply absent from the region's
/// observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseTable {
    pub dates: Vec<NaiveDate>,
    pub regions: Vec<RegionSeries>,
}

impl CaseTable {
    pub fn region(&self, region_id: &str) -> Option<&RegionSeries> {
        self.regions.iter().find(|r| r.region_id == region_id)
    }

    pub fn region_ids(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|r| r.region_id.as_str())
    }
}

/// A trimmed series ready for fitting.
///
/// `days[i]` is the calendar distance in days from `epoch_date`, so the first
/// retained sample always sits at day 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedSeries {
    pub region_id: String,
    /// First date with a nonzero count.
    pub epoch_date: NaiveDate,
    /// Days from the study start to `epoch_date`.
    pub epoch_offset: i64,
    pub days: Vec<f64>,
    pub counts: Vec<f64>,
}

impl PreparedSeries {
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Why a region is absent from the valid-fit set.
///
/// None of these are errors: short or noisy regions are expected in every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer post-trim observations than the fit requires.
    InsufficientData { observations: usize },
    /// No start point produced a converged, feasible solution.
    ConvergenceFailure,
    /// The solver returned an infinite or NaN parameter or standard error.
    NonFiniteParameters,
    /// Converged, but the carrying-capacity uncertainty exceeds the capacity.
    UnreliableFit { l: f64, l_std: f64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InsufficientData { observations } => {
                write!(f, "insufficient data ({observations} observations)")
            }
            SkipReason::ConvergenceFailure => write!(f, "solver did not converge"),
            SkipReason::NonFiniteParameters => write!(f, "non-finite parameters"),
            SkipReason::UnreliableFit { l, l_std } => {
                write!(f, "unreliable fit (L_std {l_std:.1} > L {l:.1})")
            }
        }
    }
}

/// Result of a per-region stage: usable output or the reason the region drops out.
pub type RegionOutcome<T> = Result<T, SkipReason>;

/// Fitted logistic parameters and their covariance-derived standard errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParameters {
    pub region_id: String,
    #[serde(rename = "L")]
    pub l: f64,
    pub x0: f64,
    pub k: f64,
    #[serde(rename = "L_std")]
    pub l_std: f64,
    pub x0_std: f64,
    pub k_std: f64,
}

impl FitParameters {
    /// All-NaN record standing in for a fit the solver could not produce.
    pub fn undefined(region_id: impl Into<String>) -> Self {
        Self {
            region_id: region_id.into(),
            l: f64::NAN,
            x0: f64::NAN,
            k: f64::NAN,
            l_std: f64::NAN,
            x0_std: f64::NAN,
            k_std: f64::NAN,
        }
    }

    /// Build from values in [`PARAM_NAMES`] order.
    pub fn from_values(region_id: impl Into<String>, values: [f64; 6]) -> Self {
        let [l, x0, k, l_std, x0_std, k_std] = values;
        Self {
            region_id: region_id.into(),
            l,
            x0,
            k,
            l_std,
            x0_std,
            k_std,
        }
    }

    /// Values in [`PARAM_NAMES`] order.
    pub fn values(&self) -> [f64; 6] {
        [self.l, self.x0, self.k, self.l_std, self.x0_std, self.k_std]
    }

    pub fn is_undefined(&self) -> bool {
        self.values().iter().all(|v| v.is_nan())
    }

    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }

    /// All six fields finite and `L_std <= L`.
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.l_std <= self.l
    }
}

/// Goodness-of-fit diagnostics for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
    pub iterations: usize,
}

/// Per-region fit before the batch validity filter.
///
/// `params` may be the all-NaN record when the solver failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRegionFit {
    pub params: FitParameters,
    pub epoch_offset: i64,
    pub quality: Option<FitQuality>,
}

/// A fit that passed the validity filter, with the offset needed to place it
/// back on the shared calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedRegion {
    pub params: FitParameters,
    pub epoch_offset: i64,
    pub quality: Option<FitQuality>,
}

/// Output of a batch run: every input region lands in exactly one of the maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub fits: BTreeMap<String, FittedRegion>,
    pub skipped: BTreeMap<String, SkipReason>,
}

impl BatchReport {
    pub fn total_regions(&self) -> usize {
        self.fits.len() + self.skipped.len()
    }

    pub fn count_skipped(&self, pred: impl Fn(&SkipReason) -> bool) -> usize {
        self.skipped.values().filter(|r| pred(r)).count()
    }
}

/// One projected point on the shared calendar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    pub date: NaiveDate,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Box constraints on `(L, x0, k)`, passed to the solver as hard limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub lower: [f64; PARAM_COUNT],
    pub upper: [f64; PARAM_COUNT],
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            lower: [0.0, -365.0, 0.0],
            upper: [1e7, 365.0, 3.0],
        }
    }
}

impl ParamBounds {
    pub fn contains(&self, p: &[f64; PARAM_COUNT]) -> bool {
        (0..PARAM_COUNT).all(|i| p[i] >= self.lower[i] && p[i] <= self.upper[i])
    }

    /// Clamp each coordinate into its interval.
    pub fn project(&self, p: &mut [f64; PARAM_COUNT]) {
        for i in 0..PARAM_COUNT {
            p[i] = p[i].clamp(self.lower[i], self.upper[i]);
        }
    }

    pub fn is_well_formed(&self) -> bool {
        (0..PARAM_COUNT).all(|i| {
            self.lower[i].is_finite() && self.upper[i].is_finite() && self.lower[i] < self.upper[i]
        })
    }
}

/// Series preparation options.
#[derive(Debug, Clone, PartialEq)]
pub struct PrepOptions {
    pub min_observations: usize,
    /// Accept downward corrections in cumulative counts instead of rejecting
    /// the region as malformed.
    pub allow_decreasing: bool,
}

impl Default for PrepOptions {
    fn default() -> Self {
        Self {
            min_observations: MIN_OBSERVATIONS,
            allow_decreasing: false,
        }
    }
}

/// Solver options for the logistic fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub bounds: ParamBounds,
    pub min_observations: usize,
    pub max_iterations: usize,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Projected-gradient tolerance (scaled).
    pub gtol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            bounds: ParamBounds::default(),
            min_observations: MIN_OBSERVATIONS,
            max_iterations: 400,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// Derived from environment + CLI flags (plus defaults).
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub study_start: NaiveDate,
    pub data_dir: PathBuf,
    pub prep: PrepOptions,
    pub fit: FitOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            study_start: DEFAULT_STUDY_START,
            data_dir: PathBuf::from("data"),
            prep: PrepOptions::default(),
            fit: FitOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Set the length threshold used by both preparation and the fit engine.
    pub fn with_min_observations(mut self, min_observations: usize) -> Self {
        self.prep.min_observations = min_observations;
        self.fit.min_observations = min_observations;
        self
    }
}
