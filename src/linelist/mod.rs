//! Case-level line-list data and its summaries.
//!
//! A line list has one row per reported case. The summaries here are:
//! - symptom rates among cases that reported symptoms
//! - case and death shares by age group and gender
//! - delay from exposure to symptom onset

pub mod analysis;

pub use analysis::*;

use chrono::NaiveDate;

/// Prefix of the per-symptom indicator columns.
pub const SYMPTOM_PREFIX: &str = "experienced_";

/// One reported case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseRecord {
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub death: bool,
    /// Free-text symptom list; `None` when the case reported no symptoms.
    pub symptoms: Option<String>,
    /// One entry per [`LineList::symptom_columns`]; `None` when blank.
    pub experienced: Vec<Option<bool>>,
    pub exposure_start: Option<NaiveDate>,
    pub symptom_onset: Option<NaiveDate>,
}

/// A parsed line list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineList {
    /// Indicator column headers, in file order (e.g. `experienced_fever`).
    pub symptom_columns: Vec<String>,
    pub cases: Vec<CaseRecord>,
}

impl LineList {
    /// Human-readable symptom name for an indicator column.
    pub fn symptom_name(column: &str) -> String {
        column
            .strip_prefix(SYMPTOM_PREFIX)
            .unwrap_or(column)
            .replace('_', " ")
    }
}
