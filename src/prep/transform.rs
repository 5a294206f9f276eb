//! Post-load table transforms.
//!
//! These are plain functions over a `CaseTable`; the caller decides which ones
//! to apply and in what order.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{CaseTable, Observation, RegionSeries};

/// Separator between a sub-national unit and its country in a region id.
pub const REGION_SEPARATOR: &str = ", ";

/// Split `"Hubei, China"` into `("Hubei", "China")`.
///
/// Uses the last separator so multi-part names keep their prefix intact.
pub fn split_region_id(region_id: &str) -> Option<(&str, &str)> {
    let (sub, country) = region_id.rsplit_once(REGION_SEPARATOR)?;
    let (sub, country) = (sub.trim(), country.trim());
    if sub.is_empty() || country.is_empty() {
        return None;
    }
    Some((sub, country))
}

/// Add a country-level total for every country that only appears through its
/// sub-national columns.
///
/// Each date of the total sums the sub-regions that report on that date; a
/// date no sub-region reports is absent. Countries that already have their
/// own column are left untouched. New columns are appended sorted by name.
pub fn with_country_totals(mut table: CaseTable) -> CaseTable {
    let mut totals: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();

    for series in &table.regions {
        let Some((_, country)) = split_region_id(&series.region_id) else {
            continue;
        };
        if table.region(country).is_some() {
            continue;
        }
        let by_date = totals.entry(country.to_string()).or_default();
        for obs in &series.observations {
            *by_date.entry(obs.date).or_insert(0.0) += obs.count;
        }
    }

    for (country, by_date) in totals {
        let observations = by_date
            .into_iter()
            .map(|(date, count)| Observation::new(date, count))
            .collect();
        table.regions.push(RegionSeries::new(country, observations));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_STUDY_START;

    #[test]
    fn split_uses_last_separator() {
        assert_eq!(split_region_id("Hubei, China"), Some(("Hubei", "China")));
        assert_eq!(
            split_region_id("King County, Washington, US"),
            Some(("King County, Washington", "US"))
        );
        assert_eq!(split_region_id("Italy"), None);
        assert_eq!(split_region_id(", China"), None);
    }

    #[test]
    fn totals_sum_sub_regions_per_date() {
        let d0 = DEFAULT_STUDY_START;
        let table = CaseTable {
            dates: vec![d0, d0.succ_opt().unwrap()],
            regions: vec![
                RegionSeries::from_daily_counts("Hubei, China", d0, &[10.0, 20.0]),
                RegionSeries::from_daily_counts("Anhui, China", d0, &[1.0, 2.0]),
                RegionSeries::from_daily_counts("Italy", d0, &[0.0, 3.0]),
            ],
        };
        let out = with_country_totals(table);
        let china = out.region("China").unwrap();
        assert_eq!(china.observations.len(), 2);
        assert_eq!(china.observations[0].count, 11.0);
        assert_eq!(china.observations[1].count, 22.0);
        assert_eq!(out.regions.len(), 4);
    }

    #[test]
    fn existing_country_column_is_kept() {
        let d0 = DEFAULT_STUDY_START;
        let table = CaseTable {
            dates: vec![d0],
            regions: vec![
                RegionSeries::from_daily_counts("Greenland, Denmark", d0, &[1.0]),
                RegionSeries::from_daily_counts("Denmark", d0, &[7.0]),
            ],
        };
        let out = with_country_totals(table.clone());
        assert_eq!(out, table);
    }
}
