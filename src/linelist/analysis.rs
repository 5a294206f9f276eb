//! Pure summaries over a [`LineList`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::linelist::LineList;

/// Width of each age bin in years.
pub const AGE_BIN_YEARS: f64 = 10.0;
/// Number of age groups: ten decades plus the open `100+` group.
pub const AGE_GROUPS: u8 = 11;
/// Oldest age that still falls in the `100+` group.
pub const MAX_AGE: f64 = 200.0;

/// Age bin `[10·i, 10·i + 10)`; the last bin is `[100, 200]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgeGroup(u8);

impl AgeGroup {
    /// Bin for `age`, or `None` outside `[0, 200]`.
    pub fn of(age: f64) -> Option<Self> {
        if !(0.0..=MAX_AGE).contains(&age) {
            return None;
        }
        let idx = (age / AGE_BIN_YEARS).floor() as u8;
        Some(Self(idx.min(AGE_GROUPS - 1)))
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 + 1 == AGE_GROUPS {
            return write!(f, "100+");
        }
        let lo = u32::from(self.0) * 10;
        write!(f, "{} - {}", lo, lo + 9)
    }
}

impl Serialize for AgeGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Share of symptom-reporting cases that had one symptom.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymptomRate {
    pub symptom: String,
    pub rate: f64,
}

/// Cases and deaths for one (age group, gender) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeGenderRow {
    pub age_group: AgeGroup,
    pub gender: String,
    pub counts: usize,
    /// `counts` over all binned cases.
    pub proportion: f64,
    pub deaths: usize,
    /// `deaths` over all binned deaths; 0 when there are none.
    pub death_rate: f64,
}

/// Exposure-to-onset delays in days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnsetSummary {
    pub cases: usize,
    pub mean: f64,
    pub median: f64,
    pub min: i64,
    pub max: i64,
}

/// Symptom rates, highest first. Empty when no case reported symptoms.
///
/// The denominator is the number of cases with a non-blank symptom list; the
/// numerator counts `true` indicators.
pub fn symptom_rates(list: &LineList) -> Vec<SymptomRate> {
    let reported = list.cases.iter().filter(|c| c.symptoms.is_some()).count();
    if reported == 0 {
        return Vec::new();
    }

    let mut rates: Vec<SymptomRate> = list
        .symptom_columns
        .iter()
        .enumerate()
        .map(|(col, column)| {
            let hits = list
                .cases
                .iter()
                .filter(|c| c.experienced.get(col).copied().flatten() == Some(true))
                .count();
            SymptomRate {
                symptom: LineList::symptom_name(column),
                rate: hits as f64 / reported as f64,
            }
        })
        .collect();
    rates.sort_by(|a, b| b.rate.total_cmp(&a.rate).then_with(|| a.symptom.cmp(&b.symptom)));
    rates
}

/// Case and death shares per (age group, gender), in age then gender order.
///
/// Cases without a binnable age or without a gender are left out. Only
/// non-empty cells are returned.
pub fn age_gender_table(list: &LineList) -> Vec<AgeGenderRow> {
    let mut cells: BTreeMap<(AgeGroup, &str), (usize, usize)> = BTreeMap::new();
    for case in &list.cases {
        let (Some(group), Some(gender)) = (case.age.and_then(AgeGroup::of), case.gender.as_deref()) else {
            continue;
        };
        let cell = cells.entry((group, gender)).or_default();
        cell.0 += 1;
        cell.1 += usize::from(case.death);
    }

    let total: usize = cells.values().map(|c| c.0).sum();
    let total_deaths: usize = cells.values().map(|c| c.1).sum();

    cells
        .into_iter()
        .map(|((age_group, gender), (counts, deaths))| AgeGenderRow {
            age_group,
            gender: gender.to_string(),
            counts,
            proportion: counts as f64 / total as f64,
            deaths,
            death_rate: if total_deaths == 0 {
                0.0
            } else {
                deaths as f64 / total_deaths as f64
            },
        })
        .collect()
}

/// Days from exposure start to symptom onset, for cases with both dates.
pub fn onset_delays(list: &LineList) -> Vec<i64> {
    list.cases
        .iter()
        .filter_map(|c| Some((c.symptom_onset? - c.exposure_start?).num_days()))
        .collect()
}

/// Summary statistics of [`onset_delays`]; `None` when there are none.
pub fn summarize_delays(delays: &[i64]) -> Option<OnsetSummary> {
    let mut sorted = delays.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let (&min, &max) = (sorted.first()?, sorted.last()?);

    let mean = sorted.iter().sum::<i64>() as f64 / n as f64;
    let median = if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
    };
    Some(OnsetSummary {
        cases: n,
        mean,
        median,
        min,
        max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linelist::CaseRecord;
    use chrono::NaiveDate;

    fn case(age: Option<f64>, gender: &str, death: bool) -> CaseRecord {
        CaseRecord {
            age,
            gender: (!gender.is_empty()).then(|| gender.to_string()),
            death,
            ..CaseRecord::default()
        }
    }

    #[test]
    fn age_bins_are_left_closed_with_open_top() {
        assert_eq!(AgeGroup::of(0.0).unwrap().to_string(), "0 - 9");
        assert_eq!(AgeGroup::of(9.9).unwrap().to_string(), "0 - 9");
        assert_eq!(AgeGroup::of(10.0).unwrap().to_string(), "10 - 19");
        assert_eq!(AgeGroup::of(99.5).unwrap().to_string(), "90 - 99");
        assert_eq!(AgeGroup::of(100.0).unwrap().to_string(), "100+");
        assert_eq!(AgeGroup::of(200.0).unwrap().to_string(), "100+");
        assert!(AgeGroup::of(-1.0).is_none());
        assert!(AgeGroup::of(200.5).is_none());
        assert!(AgeGroup::of(f64::NAN).is_none());
    }

    #[test]
    fn symptom_rates_use_reporting_cases_as_denominator() {
        let list = LineList {
            symptom_columns: vec!["experienced_fever".into(), "experienced_sore_throat".into()],
            cases: vec![
                CaseRecord {
                    symptoms: Some("fever, sore throat".into()),
                    experienced: vec![Some(true), Some(true)],
                    ..CaseRecord::default()
                },
                CaseRecord {
                    symptoms: Some("fever".into()),
                    experienced: vec![Some(true), Some(false)],
                    ..CaseRecord::default()
                },
                CaseRecord {
                    symptoms: Some("cough".into()),
                    experienced: vec![Some(false), Some(false)],
                    ..CaseRecord::default()
                },
                // No symptom report: excluded from the denominator.
                CaseRecord {
                    experienced: vec![None, None],
                    ..CaseRecord::default()
                },
            ],
        };

        let rates = symptom_rates(&list);
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].symptom, "fever");
        assert!((rates[0].rate - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(rates[1].symptom, "sore throat");
        assert!((rates[1].rate - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn no_symptom_reports_give_no_rates() {
        let list = LineList {
            symptom_columns: vec!["experienced_fever".into()],
            cases: vec![case(Some(30.0), "male", false)],
        };
        assert!(symptom_rates(&list).is_empty());
    }

    #[test]
    fn age_gender_shares_and_death_rates() {
        let list = LineList {
            symptom_columns: Vec::new(),
            cases: vec![
                case(Some(34.0), "male", false),
                case(Some(38.0), "male", true),
                case(Some(31.0), "female", false),
                case(Some(82.0), "male", true),
                case(Some(105.0), "female", true),
                // Dropped: no age, no gender, age out of range.
                case(None, "male", true),
                case(Some(50.0), "", true),
                case(Some(250.0), "female", false),
            ],
        };

        let rows = age_gender_table(&list);
        let labels: Vec<(String, &str)> = rows.iter().map(|r| (r.age_group.to_string(), r.gender.as_str())).collect();
        assert_eq!(
            labels,
            vec![
                ("30 - 39".to_string(), "female"),
                ("30 - 39".to_string(), "male"),
                ("80 - 89".to_string(), "male"),
                ("100+".to_string(), "female"),
            ]
        );
        assert_eq!(rows[1].counts, 2);
        assert!((rows[1].proportion - 0.4).abs() < 1e-12);
        assert_eq!(rows[1].deaths, 1);
        assert!((rows[1].death_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(rows[0].death_rate, 0.0);
        let share: f64 = rows.iter().map(|r| r.proportion).sum();
        assert!((share - 1.0).abs() < 1e-12);
    }

    #[test]
    fn death_rate_is_zero_without_deaths() {
        let list = LineList {
            symptom_columns: Vec::new(),
            cases: vec![case(Some(20.0), "female", false)],
        };
        let rows = age_gender_table(&list);
        assert_eq!(rows[0].death_rate, 0.0);
        assert_eq!(rows[0].proportion, 1.0);
    }

    #[test]
    fn onset_delay_needs_both_dates() {
        let d = |day| NaiveDate::from_ymd_opt(2020, 1, day);
        let with = |exposure, onset| CaseRecord {
            exposure_start: exposure,
            symptom_onset: onset,
            ..CaseRecord::default()
        };
        let list = LineList {
            symptom_columns: Vec::new(),
            cases: vec![with(d(3), d(10)), with(d(5), None), with(None, d(9)), with(d(1), d(5))],
        };
        assert_eq!(onset_delays(&list), vec![7, 4]);
    }

    #[test]
    fn delay_summary_uses_midpoint_median() {
        let s = summarize_delays(&[7, 4, 1, 10]).unwrap();
        assert_eq!(s.cases, 4);
        assert_eq!(s.median, 5.5);
        assert_eq!(s.mean, 5.5);
        assert_eq!((s.min, s.max), (1, 10));
        assert!(summarize_delays(&[]).is_none());
    }
}
