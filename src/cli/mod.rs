//! Command-line parsing for the logistic growth fitter.
//!
//! Argument parsing and command dispatch stay separate from the fitting code.
//! Flags left unset fall back to the environment, then to built-in defaults
//! (see `app::config_from_env`).

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::io::ingest::parse_date;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "epi", version, about = "Logistic growth curve fitting for regional case counts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every region in a case table and print fitted/skipped regions.
    Fit(FitArgs),
    /// Project one fitted region onto a date range with a confidence band.
    Project(ProjectArgs),
    /// Write a synthetic noisy logistic case table.
    Sample(SampleArgs),
    /// Summarize a case-level line list: symptom rates, age/gender shares,
    /// and symptom onset delay.
    #[command(name = "linelist")]
    LineList(LineListArgs),
}

/// Options shared by commands that read a case table.
#[derive(Debug, Args, Clone)]
pub struct CaseArgs {
    /// Wide case-table CSV (`date,<region>,...`). Relative paths that do not
    /// exist are looked up under the data directory.
    #[arg(long, value_name = "CSV")]
    pub cases: PathBuf,

    /// Study start date (YYYY-MM-DD); overrides EPI_START_DATE.
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub start_date: Option<NaiveDate>,

    /// Add country totals summed from "<province>, <country>" columns.
    #[arg(long)]
    pub country_totals: bool,

    /// Accept cumulative series that decrease between days.
    #[arg(long)]
    pub allow_decreasing: bool,

    /// Minimum observations after trimming leading zeros.
    #[arg(long, value_name = "N")]
    pub min_observations: Option<usize>,
}

/// Options for `epi fit`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub cases: CaseArgs,

    /// Write the parameter table CSV here.
    #[arg(long, value_name = "CSV")]
    pub out: Option<PathBuf>,

    /// Write the full batch report (fits + skip reasons) as JSON.
    #[arg(long, value_name = "JSON")]
    pub report: Option<PathBuf>,

    /// Solver iteration cap per start point.
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Number of regions listed in the summary table.
    #[arg(long, default_value_t = 20)]
    pub top: usize,
}

/// Options for `epi project`.
#[derive(Debug, Args, Clone)]
pub struct ProjectArgs {
    #[command(flatten)]
    pub cases: CaseArgs,

    /// Parameter table CSV written by `epi fit --out`.
    #[arg(long, value_name = "CSV")]
    pub params: PathBuf,

    /// Region to project.
    #[arg(long)]
    pub region: String,

    /// First projected date (default: the region's first nonzero day).
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Last projected date (default: 90 days after --from).
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub to: Option<NaiveDate>,

    /// Two-sided confidence level in (0, 1).
    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    /// Write projection rows to CSV instead of printing a table.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

/// Options for `epi sample`.
#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Number of synthetic regions.
    #[arg(long, default_value_t = 10)]
    pub regions: usize,

    /// Days of outbreak per region (after the lead-in of zeros).
    #[arg(long, default_value_t = 120)]
    pub days: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Relative noise level.
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    /// First date of the generated table (default: study start).
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub start_date: Option<NaiveDate>,

    /// Output CSV.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,
}

/// Options for `epi linelist`.
#[derive(Debug, Args, Clone)]
pub struct LineListArgs {
    /// Line-list CSV. Relative paths that do not exist are looked up under
    /// the data directory.
    #[arg(long, value_name = "CSV")]
    pub cases: PathBuf,

    /// Write `symptom_rates.csv` and `line_list_analysis.csv` here.
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_flags() {
        let cli = Cli::parse_from([
            "epi",
            "fit",
            "--cases",
            "cases.csv",
            "--country-totals",
            "--min-observations",
            "10",
            "--start-date",
            "2020-03-01",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert!(args.cases.country_totals);
        assert!(!args.cases.allow_decreasing);
        assert_eq!(args.cases.min_observations, Some(10));
        assert_eq!(args.cases.start_date, NaiveDate::from_ymd_opt(2020, 3, 1));
        assert!(args.out.is_none());
    }

    #[test]
    fn project_requires_region_and_params() {
        assert!(Cli::try_parse_from(["epi", "project", "--cases", "c.csv"]).is_err());

        let cli = Cli::try_parse_from([
            "epi", "project", "--cases", "c.csv", "--params", "p.csv", "--region", "Italy",
        ])
        .unwrap();
        let Command::Project(args) = cli.command else {
            panic!("expected project");
        };
        assert_eq!(args.region, "Italy");
        assert_eq!(args.confidence, 0.95);
    }

    #[test]
    fn parses_linelist_command() {
        let cli = Cli::try_parse_from(["epi", "linelist", "--cases", "line_list.csv", "--out-dir", "out"]).unwrap();
        let Command::LineList(args) = cli.command else {
            panic!("expected linelist");
        };
        assert_eq!(args.cases, PathBuf::from("line_list.csv"));
        assert_eq!(args.out_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn bad_date_is_a_parse_error() {
        let res = Cli::try_parse_from(["epi", "fit", "--cases", "c.csv", "--start-date", "22/01/2020"]);
        assert!(res.is_err());
    }
}
