//! Turn raw cumulative-count series into fit-ready `PreparedSeries`.
//!
//! No interpolation, smoothing, or gap-filling happens here. A missing date
//! stays missing: the day index is the calendar distance from the epoch date,
//! so gaps leave holes in the index rather than shifting later samples.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{
    CaseTable, Observation, PrepOptions, PreparedSeries, RegionOutcome, RegionSeries, SkipReason,
};
use crate::error::AppError;

/// Check that a series is something we are willing to fit.
///
/// Rejects unordered or duplicate dates, negative or non-finite counts, and
/// (unless `allow_decreasing`) drops in a cumulative count.
pub fn validate_series(series: &RegionSeries, opts: &PrepOptions) -> Result<(), AppError> {
    let id = series.region_id.as_str();
    if id.trim().is_empty() {
        return Err(AppError::malformed(id, "empty region id"));
    }

    let mut prev: Option<&Observation> = None;
    for obs in &series.observations {
        if !obs.count.is_finite() {
            return Err(AppError::malformed(id, format!("non-finite count on {}", obs.date)));
        }
        if obs.count < 0.0 {
            return Err(AppError::malformed(
                id,
                format!("negative count {} on {}", obs.count, obs.date),
            ));
        }
        if let Some(p) = prev {
            if obs.date <= p.date {
                return Err(AppError::malformed(
                    id,
                    format!("dates out of order or duplicated at {}", obs.date),
                ));
            }
            if !opts.allow_decreasing && obs.count < p.count {
                return Err(AppError::malformed(
                    id,
                    format!(
                        "cumulative count decreases from {} to {} on {}",
                        p.count, obs.count, obs.date
                    ),
                ));
            }
        }
        prev = Some(obs);
    }
    Ok(())
}

/// Drop every leading observation whose count is zero.
///
/// Stable: trimming an already trimmed slice returns it unchanged.
pub fn trim_leading_zeros(observations: &[Observation]) -> &[Observation] {
    let first = observations
        .iter()
        .position(|o| o.count != 0.0)
        .unwrap_or(observations.len());
    &observations[first..]
}

/// Days from the study start to `epoch_date` (negative if the epoch is earlier).
pub fn epoch_offset(epoch_date: NaiveDate, study_start: NaiveDate) -> i64 {
    (epoch_date - study_start).num_days()
}

/// Trim a validated series and index it by days since its first nonzero count.
///
/// Returns `None` for a series with no nonzero counts.
pub fn index_series(series: &RegionSeries, study_start: NaiveDate) -> Option<PreparedSeries> {
    let trimmed = trim_leading_zeros(&series.observations);
    let epoch_date = trimmed.first()?.date;

    let days = trimmed
        .iter()
        .map(|o| (o.date - epoch_date).num_days() as f64)
        .collect();
    let counts = trimmed.iter().map(|o| o.count).collect();

    Some(PreparedSeries {
        region_id: series.region_id.clone(),
        epoch_date,
        epoch_offset: epoch_offset(epoch_date, study_start),
        days,
        counts,
    })
}

/// Return the series unchanged if it is long enough to fit, else the
/// not-fit sentinel.
pub fn filter_by_length(prepared: PreparedSeries, min_observations: usize) -> RegionOutcome<PreparedSeries> {
    if prepared.len() < min_observations {
        return Err(SkipReason::InsufficientData {
            observations: prepared.len(),
        });
    }
    Ok(prepared)
}

/// Validate, trim, index, and length-filter one region.
///
/// The outer `Result` is a hard error (malformed input). The inner outcome is
/// the normal "too short to fit" case.
pub fn prepare_series(
    series: &RegionSeries,
    study_start: NaiveDate,
    opts: &PrepOptions,
) -> Result<RegionOutcome<PreparedSeries>, AppError> {
    validate_series(series, opts)?;

    let Some(prepared) = index_series(series, study_start) else {
        return Ok(Err(SkipReason::InsufficientData { observations: 0 }));
    };
    Ok(filter_by_length(prepared, opts.min_observations))
}

/// Prepared regions plus the regions that were too short to fit.
#[derive(Debug, Clone, Default)]
pub struct PreparedBatch {
    pub ready: Vec<PreparedSeries>,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Prepare every region of a table.
///
/// A single malformed region fails the whole batch: fitting garbage silently
/// is worse than refusing.
pub fn prepare_all(
    table: &CaseTable,
    study_start: NaiveDate,
    opts: &PrepOptions,
) -> Result<PreparedBatch, AppError> {
    let mut batch = PreparedBatch::default();
    for series in &table.regions {
        match prepare_series(series, study_start, opts)? {
            Ok(prepared) => batch.ready.push(prepared),
            Err(reason) => {
                debug!(region = %series.region_id, %reason, "region not fit");
                batch.skipped.push((series.region_id.clone(), reason));
            }
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_STUDY_START;

    fn day(n: i64) -> NaiveDate {
        DEFAULT_STUDY_START + chrono::Duration::days(n)
    }

    fn ramp(zeros: usize, len: usize) -> Vec<f64> {
        let mut v = vec![0.0; zeros];
        v.extend((1..=len).map(|i| (i * i) as f64));
        v
    }

    #[test]
    fn trim_drops_only_leading_zeros() {
        let s = RegionSeries::from_daily_counts("A", day(0), &[0.0, 0.0, 3.0, 0.0, 4.0]);
        let t = trim_leading_zeros(&s.observations);
        assert_eq!(t.len(), 3);
        assert_eq!(t[0].date, day(2));
        assert_eq!(t[1].count, 0.0);
    }

    #[test]
    fn trim_is_idempotent() {
        let s = RegionSeries::from_daily_counts("A", day(0), &ramp(5, 40));
        let once = trim_leading_zeros(&s.observations);
        let twice = trim_leading_zeros(once);
        assert_eq!(once, twice);

        let opts = PrepOptions::default();
        let p1 = prepare_series(&s, day(0), &opts).unwrap().unwrap();
        let retrimmed = RegionSeries::new("A", once.to_vec());
        let p2 = prepare_series(&retrimmed, day(0), &opts).unwrap().unwrap();
        assert_eq!(p1, p2);
    }

    #[test]
    fn epoch_offset_counts_from_study_start() {
        let s = RegionSeries::from_daily_counts("A", day(0), &ramp(7, 35));
        let p = prepare_series(&s, day(0), &PrepOptions::default()).unwrap().unwrap();
        assert_eq!(p.epoch_date, day(7));
        assert_eq!(p.epoch_offset, 7);
        assert_eq!(p.days[0], 0.0);
        assert_eq!(p.len(), 35);
    }

    #[test]
    fn epoch_offset_may_be_negative() {
        assert_eq!(epoch_offset(day(-3), day(0)), -3);
    }

    #[test]
    fn gaps_stay_gaps() {
        let obs = vec![
            Observation::new(day(0), 1.0),
            Observation::new(day(1), 2.0),
            Observation::new(day(5), 9.0),
        ];
        let p = index_series(&RegionSeries::new("A", obs), day(0)).unwrap();
        assert_eq!(p.days, vec![0.0, 1.0, 5.0]);
        assert_eq!(p.counts, vec![1.0, 2.0, 9.0]);
    }

    #[test]
    fn short_series_is_not_fit() {
        let s = RegionSeries::from_daily_counts("A", day(0), &ramp(10, 29));
        let out = prepare_series(&s, day(0), &PrepOptions::default()).unwrap();
        assert_eq!(out, Err(SkipReason::InsufficientData { observations: 29 }));
    }

    #[test]
    fn all_zero_series_is_insufficient_data() {
        let s = RegionSeries::from_daily_counts("A", day(0), &[0.0; 90]);
        let out = prepare_series(&s, day(0), &PrepOptions::default()).unwrap();
        assert_eq!(out, Err(SkipReason::InsufficientData { observations: 0 }));
    }

    #[test]
    fn negative_count_is_malformed() {
        let s = RegionSeries::from_daily_counts("Bad", day(0), &[0.0, 2.0, -1.0]);
        let err = validate_series(&s, &PrepOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Bad"));
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn decreasing_counts_rejected_unless_allowed() {
        let s = RegionSeries::from_daily_counts("Dip", day(0), &[1.0, 5.0, 4.0, 6.0]);
        assert!(validate_series(&s, &PrepOptions::default()).is_err());

        let lenient = PrepOptions {
            allow_decreasing: true,
            ..PrepOptions::default()
        };
        assert!(validate_series(&s, &lenient).is_ok());
    }

    #[test]
    fn unordered_dates_are_malformed() {
        let obs = vec![Observation::new(day(1), 1.0), Observation::new(day(1), 2.0)];
        let err = validate_series(&RegionSeries::new("Dup", obs), &PrepOptions::default()).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn prepare_all_splits_ready_and_skipped() {
        let table = CaseTable {
            dates: Vec::new(),
            regions: vec![
                RegionSeries::from_daily_counts("Long", day(0), &ramp(2, 45)),
                RegionSeries::from_daily_counts("Short", day(0), &ramp(2, 5)),
                RegionSeries::from_daily_counts("Zero", day(0), &[0.0; 60]),
            ],
        };
        let batch = prepare_all(&table, day(0), &PrepOptions::default()).unwrap();
        assert_eq!(batch.ready.len(), 1);
        assert_eq!(batch.ready[0].region_id, "Long");
        assert_eq!(batch.skipped.len(), 2);
    }

    #[test]
    fn prepare_all_fails_loudly_on_malformed_region() {
        let table = CaseTable {
            dates: Vec::new(),
            regions: vec![
                RegionSeries::from_daily_counts("Fine", day(0), &ramp(0, 40)),
                RegionSeries::from_daily_counts("Broken", day(0), &[1.0, -2.0]),
            ],
        };
        let err = prepare_all(&table, day(0), &PrepOptions::default()).unwrap_err();
        assert!(err.message().contains("Broken"));
    }
}
