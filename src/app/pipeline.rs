//! Shared fit pipeline used by the `fit` and `project` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> (country totals) -> prepare -> fit -> validity filter
//!
//! The command handlers then only deal with printing and exports.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::domain::{BatchReport, CaseTable, FitParameters, FittedRegion, PipelineConfig};
use crate::error::{AppError, EXIT_NO_DATA};
use crate::fit::run_batch;
use crate::io::ingest::load_case_table;
use crate::prep::{index_series, prepare_all, with_country_totals};
use crate::project::Projector;

/// Resolve a case-table path: as given if it exists, else under `data_dir`.
pub fn resolve_cases_path(path: &Path, data_dir: &Path) -> PathBuf {
    if path.is_relative() && !path.exists() {
        let candidate = data_dir.join(path);
        if candidate.exists() {
            return candidate;
        }
    }
    path.to_path_buf()
}

/// Load the case table and apply optional post-load transforms.
pub fn load_cases(path: &Path, config: &PipelineConfig, country_totals: bool) -> Result<CaseTable, AppError> {
    let path = resolve_cases_path(path, &config.data_dir);
    let table = load_case_table(&path)?;
    if !country_totals {
        return Ok(table);
    }
    let before = table.regions.len();
    let table = with_country_totals(table);
    debug!(added = table.regions.len() - before, "added country totals");
    Ok(table)
}

/// Prepare and fit every region of `table`.
pub fn run_fit(config: &PipelineConfig, table: &CaseTable) -> Result<BatchReport, AppError> {
    let batch = prepare_all(table, config.study_start, &config.prep)?;
    info!(
        ready = batch.ready.len(),
        too_short = batch.skipped.len(),
        "prepared series"
    );
    Ok(run_batch(batch, &config.fit))
}

/// Build a projector from a reloaded parameter table.
///
/// Epoch offsets are not stored with the parameters; they are recomputed from
/// the case table. Regions missing from the table, or with no nonzero count,
/// are dropped with a warning.
pub fn projector_from_tables(
    params: BTreeMap<String, FitParameters>,
    table: &CaseTable,
    study_start: NaiveDate,
) -> Result<Projector, AppError> {
    let mut fits = BTreeMap::new();
    for (region_id, params) in params {
        if !params.is_valid() {
            warn!(region = %region_id, "parameter table entry fails the validity filter; skipping");
            continue;
        }
        let Some(series) = table.region(&region_id) else {
            warn!(region = %region_id, "region not present in case table; skipping");
            continue;
        };
        let Some(prepared) = index_series(series, study_start) else {
            warn!(region = %region_id, "region has no nonzero counts; skipping");
            continue;
        };
        fits.insert(
            region_id,
            FittedRegion {
                params,
                epoch_offset: prepared.epoch_offset,
                quality: None,
            },
        );
    }

    if fits.is_empty() {
        return Err(AppError::new(
            EXIT_NO_DATA,
            "No fitted region in the parameter table matches the case table.",
        ));
    }
    Ok(Projector::new(study_start, fits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SampleSpec, synthetic_table};
    use crate::domain::{DEFAULT_STUDY_START, SkipReason};

    fn spec(l: f64, lead_zeros: usize, days: usize) -> SampleSpec {
        SampleSpec {
            l,
            x0: 40.0,
            k: 0.15,
            days,
            lead_zeros,
            noise_rel: 0.01,
        }
    }

    fn table() -> CaseTable {
        let specs = vec![
            ("Alpha".to_string(), spec(50_000.0, 5, 100)),
            ("Beta".to_string(), spec(8_000.0, 12, 90)),
            ("Short".to_string(), spec(500.0, 0, 10)),
        ];
        synthetic_table(DEFAULT_STUDY_START, &specs, 7)
    }

    #[test]
    fn run_fit_splits_fitted_and_skipped() {
        let report = run_fit(&PipelineConfig::default(), &table()).unwrap();
        assert_eq!(report.total_regions(), 3);
        assert!(report.fits.contains_key("Alpha"));
        assert!(report.fits.contains_key("Beta"));
        assert_eq!(
            report.skipped.get("Short"),
            Some(&SkipReason::InsufficientData { observations: 10 })
        );
        assert_eq!(report.fits["Beta"].epoch_offset, 12);
    }

    #[test]
    fn projector_recomputes_epoch_offsets() {
        let table = table();
        let report = run_fit(&PipelineConfig::default(), &table).unwrap();
        let params = report
            .fits
            .iter()
            .map(|(id, f)| (id.clone(), f.params.clone()))
            .collect();

        let projector = projector_from_tables(params, &table, DEFAULT_STUDY_START).unwrap();
        for (id, fit) in &report.fits {
            assert_eq!(projector.fit(id).unwrap().epoch_offset, fit.epoch_offset);
        }
    }

    #[test]
    fn projector_drops_unknown_regions() {
        let mut params = BTreeMap::new();
        params.insert(
            "Nowhere".to_string(),
            FitParameters::from_values("Nowhere", [100.0, 10.0, 0.2, 1.0, 1.0, 0.01]),
        );
        params.insert(
            "Alpha".to_string(),
            FitParameters::from_values("Alpha", [50_000.0, 40.0, 0.15, 100.0, 1.0, 0.01]),
        );
        let projector = projector_from_tables(params, &table(), DEFAULT_STUDY_START).unwrap();
        assert_eq!(projector.regions().collect::<Vec<_>>(), vec!["Alpha"]);
        assert_eq!(projector.fit("Alpha").unwrap().epoch_offset, 5);
    }

    #[test]
    fn projector_without_matches_is_no_data() {
        let mut params = BTreeMap::new();
        params.insert(
            "Nowhere".to_string(),
            FitParameters::from_values("Nowhere", [100.0, 10.0, 0.2, 1.0, 1.0, 0.01]),
        );
        let err = projector_from_tables(params, &table(), DEFAULT_STUDY_START).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_NO_DATA);
    }
}
