//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs the log subscriber
//! - parses CLI arguments
//! - builds the pipeline configuration (flags > environment > defaults)
//! - runs fitting, projection or line-list summaries and prints reports
//! - writes optional exports

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{CaseArgs, Command, FitArgs, LineListArgs, ProjectArgs, SampleArgs};
use crate::data::{SampleRanges, random_specs, synthetic_table};
use crate::domain::PipelineConfig;
use crate::error::{AppError, EXIT_INPUT, EXIT_NO_DATA};
use crate::io::export::{
    read_params_csv, write_case_table_csv, write_params_csv, write_projection_csv, write_report_json,
};
use crate::io::ingest::parse_date;
use crate::io::linelist::{AGE_GENDER_FILE, SYMPTOM_RATES_FILE, load_line_list, write_rows_csv};
use crate::linelist::{age_gender_table, onset_delays, summarize_delays, symptom_rates};
use crate::project::date_range;
use crate::report::{format_batch_summary, format_line_list, format_projection};

pub mod pipeline;

/// Environment variable overriding the study start date.
pub const ENV_START_DATE: &str = "EPI_START_DATE";
/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "EPI_DATA_DIR";

/// Default length of a projection when `--to` is not given.
const DEFAULT_PROJECTION_DAYS: i64 = 90;

/// Entry point for the `epi` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();
    let base = config_from_env(|key| std::env::var(key).ok());

    match cli.command {
        Command::Fit(args) => handle_fit(args, base),
        Command::Project(args) => handle_project(args, base),
        Command::Sample(args) => handle_sample(args, base),
        Command::LineList(args) => handle_line_list(args, base),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Build the base configuration from environment values.
///
/// Unparseable values are ignored with a warning.
pub fn config_from_env(lookup: impl Fn(&str) -> Option<String>) -> PipelineConfig {
    let mut config = PipelineConfig::default();

    if let Some(raw) = lookup(ENV_START_DATE) {
        match parse_date(&raw) {
            Ok(date) => config.study_start = date,
            Err(e) => warn!(var = ENV_START_DATE, "{e}; using {}", config.study_start),
        }
    }
    if let Some(raw) = lookup(ENV_DATA_DIR) {
        if raw.trim().is_empty() {
            warn!(var = ENV_DATA_DIR, "empty value; using {}", config.data_dir.display());
        } else {
            config.data_dir = PathBuf::from(raw.trim());
        }
    }
    config
}

/// Apply case-table flags on top of the base configuration.
pub fn apply_case_args(mut config: PipelineConfig, args: &CaseArgs) -> PipelineConfig {
    if let Some(date) = args.start_date {
        config.study_start = date;
    }
    if let Some(n) = args.min_observations {
        config = config.with_min_observations(n);
    }
    config.prep.allow_decreasing = args.allow_decreasing;
    config
}

fn handle_fit(args: FitArgs, base: PipelineConfig) -> Result<(), AppError> {
    let mut config = apply_case_args(base, &args.cases);
    if let Some(n) = args.max_iterations {
        config.fit.max_iterations = n;
    }

    let table = pipeline::load_cases(&args.cases.cases, &config, args.cases.country_totals)?;
    let report = pipeline::run_fit(&config, &table)?;

    println!("{}", format_batch_summary(&report, &config, args.top));

    if let Some(path) = &args.out {
        write_params_csv(path, &report.fits)?;
        info!(path = %path.display(), regions = report.fits.len(), "wrote parameter table");
    }
    if let Some(path) = &args.report {
        write_report_json(path, &report)?;
        info!(path = %path.display(), "wrote batch report");
    }
    Ok(())
}

fn handle_project(args: ProjectArgs, base: PipelineConfig) -> Result<(), AppError> {
    let config = apply_case_args(base, &args.cases);
    let table = pipeline::load_cases(&args.cases.cases, &config, args.cases.country_totals)?;
    let params = read_params_csv(&args.params)?;
    let projector = pipeline::projector_from_tables(params, &table, config.study_start)?;

    let fit = projector.fit(&args.region).ok_or_else(|| {
        AppError::new(EXIT_NO_DATA, format!("No valid fit for region '{}'.", args.region))
    })?;
    let epoch_date = config.study_start + Duration::days(fit.epoch_offset);
    let from = args.from.unwrap_or(epoch_date);
    let to = args.to.unwrap_or(from + Duration::days(DEFAULT_PROJECTION_DAYS));
    let dates = date_range(from, to)?;

    let points = projector.project(&args.region, &dates, args.confidence)?;
    match &args.export {
        Some(path) => {
            write_projection_csv(path, &args.region, &points)?;
            info!(path = %path.display(), rows = points.len(), "wrote projection");
        }
        None => println!("{}", format_projection(&args.region, args.confidence, &points)),
    }
    Ok(())
}

fn handle_sample(args: SampleArgs, base: PipelineConfig) -> Result<(), AppError> {
    let ranges = SampleRanges {
        noise_rel: args.noise,
        ..SampleRanges::default()
    };
    let specs = random_specs(args.regions, args.days, &ranges, args.seed)?;
    let start: NaiveDate = args.start_date.unwrap_or(base.study_start);
    let table = synthetic_table(start, &specs, args.seed);

    write_case_table_csv(&args.out, &table)?;
    info!(
        path = %args.out.display(),
        regions = table.regions.len(),
        dates = table.dates.len(),
        "wrote synthetic case table"
    );
    Ok(())
}

fn handle_line_list(args: LineListArgs, base: PipelineConfig) -> Result<(), AppError> {
    let path = pipeline::resolve_cases_path(&args.cases, &base.data_dir);
    let list = load_line_list(&path)?;

    let rates = symptom_rates(&list);
    let age_gender = age_gender_table(&list);
    let onset = summarize_delays(&onset_delays(&list));
    if rates.is_empty() {
        warn!("no case reported symptoms; symptom rates are empty");
    }
    println!("{}", format_line_list(list.cases.len(), &rates, &age_gender, onset.as_ref()));

    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::new(EXIT_INPUT, format!("Failed to create output directory '{}': {e}", dir.display()))
        })?;
        write_rows_csv(&dir.join(SYMPTOM_RATES_FILE), &rates)?;
        write_rows_csv(&dir.join(AGE_GENDER_FILE), &age_gender)?;
        info!(dir = %dir.display(), "wrote line-list summaries");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_STUDY_START;

    fn case_args() -> CaseArgs {
        CaseArgs {
            cases: PathBuf::from("cases.csv"),
            start_date: None,
            country_totals: false,
            allow_decreasing: false,
            min_observations: None,
        }
    }

    #[test]
    fn env_overrides_defaults() {
        let config = config_from_env(|key| match key {
            ENV_START_DATE => Some("2020-03-01".to_string()),
            ENV_DATA_DIR => Some("/tmp/cases".to_string()),
            _ => None,
        });
        assert_eq!(config.study_start, NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
        assert_eq!(config.data_dir, PathBuf::from("/tmp/cases"));
    }

    #[test]
    fn bad_env_values_fall_back() {
        let config = config_from_env(|key| match key {
            ENV_START_DATE => Some("March 1st".to_string()),
            ENV_DATA_DIR => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.study_start, DEFAULT_STUDY_START);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn flags_override_env() {
        let base = config_from_env(|key| (key == ENV_START_DATE).then(|| "2020-03-01".to_string()));
        let mut args = case_args();
        args.start_date = NaiveDate::from_ymd_opt(2020, 2, 1);
        args.min_observations = Some(12);
        args.allow_decreasing = true;

        let config = apply_case_args(base, &args);
        assert_eq!(config.study_start, NaiveDate::from_ymd_opt(2020, 2, 1).unwrap());
        assert_eq!(config.prep.min_observations, 12);
        assert_eq!(config.fit.min_observations, 12);
        assert!(config.prep.allow_decreasing);
    }
}
