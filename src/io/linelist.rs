//! CSV ingest and export for case-level line lists.
//!
//! Recognized columns (any order, all optional):
//! `age`, `gender`, `death`, `symptoms` (or `symptom`), `exposure_start`,
//! `symptom_onset`, and any number of `experienced_*` indicator columns.
//! Other columns are ignored. Blank cells are missing values.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, EXIT_INPUT, EXIT_NO_DATA};
use crate::io::ingest::parse_date;
use crate::linelist::{CaseRecord, LineList, SYMPTOM_PREFIX};

/// File name of the symptom-rate export.
pub const SYMPTOM_RATES_FILE: &str = "symptom_rates.csv";
/// File name of the age/gender export.
pub const AGE_GENDER_FILE: &str = "line_list_analysis.csv";

#[derive(Debug, Default)]
struct Columns {
    age: Option<usize>,
    gender: Option<usize>,
    death: Option<usize>,
    symptoms: Option<usize>,
    exposure_start: Option<usize>,
    symptom_onset: Option<usize>,
    experienced: Vec<usize>,
}

/// Load a line list from a CSV file.
pub fn load_line_list(path: &Path) -> Result<LineList, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to open line list '{}': {e}", path.display())))?;
    let list = read_line_list(file)?;
    debug!(
        path = %path.display(),
        cases = list.cases.len(),
        symptoms = list.symptom_columns.len(),
        "loaded line list"
    );
    Ok(list)
}

/// Parse a line list from any reader.
pub fn read_line_list<R: Read>(reader: R) -> Result<LineList, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to read line-list headers: {e}")))?
        .clone();

    let mut cols = Columns::default();
    let mut symptom_columns = Vec::new();
    for (i, name) in headers.iter().enumerate() {
        match name {
            "age" => cols.age = Some(i),
            "gender" => cols.gender = Some(i),
            "death" => cols.death = Some(i),
            "symptoms" | "symptom" => cols.symptoms = Some(i),
            "exposure_start" => cols.exposure_start = Some(i),
            "symptom_onset" => cols.symptom_onset = Some(i),
            _ if name.starts_with(SYMPTOM_PREFIX) => {
                cols.experienced.push(i);
                symptom_columns.push(name.to_string());
            }
            _ => {}
        }
    }
    if cols.age.is_none() && cols.symptoms.is_none() && cols.symptom_onset.is_none() && cols.experienced.is_empty() {
        return Err(AppError::new(
            EXIT_INPUT,
            "Line list has none of the columns age, symptoms, symptom_onset, experienced_*.",
        ));
    }

    let mut cases = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record =
            result.map_err(|e| AppError::new(EXIT_INPUT, format!("Line-list parse error on line {line}: {e}")))?;
        let cell = |col: Option<usize>| col.and_then(|i| record.get(i)).filter(|s| !s.is_empty());
        let bad = |what: &str, value: &str| AppError::new(EXIT_INPUT, format!("Line {line}: bad {what} '{value}'."));

        let age = cell(cols.age)
            .map(|v| v.parse::<f64>().map_err(|_| bad("age", v)))
            .transpose()?;
        let experienced = cols
            .experienced
            .iter()
            .zip(&symptom_columns)
            .map(|(&i, name)| cell(Some(i)).map(|v| parse_flag(v).ok_or_else(|| bad(name.as_str(), v))).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        cases.push(CaseRecord {
            age,
            gender: cell(cols.gender).map(str::to_string),
            death: cell(cols.death).is_some_and(parse_death),
            symptoms: cell(cols.symptoms).map(str::to_string),
            experienced,
            exposure_start: cell(cols.exposure_start)
                .map(|v| parse_case_date(v).ok_or_else(|| bad("exposure_start", v)))
                .transpose()?,
            symptom_onset: cell(cols.symptom_onset)
                .map(|v| parse_case_date(v).ok_or_else(|| bad("symptom_onset", v)))
                .transpose()?,
        });
    }

    if cases.is_empty() {
        return Err(AppError::new(EXIT_NO_DATA, "Line list has no rows."));
    }
    Ok(LineList { symptom_columns, cases })
}

/// `true`/`false`, `1`/`0`, `yes`/`no`, case-insensitive.
fn parse_flag(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// A death cell is either a flag or the date of death.
fn parse_death(s: &str) -> bool {
    parse_flag(s).unwrap_or(true)
}

/// Dates may carry a time part (`2020-01-03 00:00:00`).
fn parse_case_date(s: &str) -> Option<NaiveDate> {
    let date = s.split([' ', 'T']).next().unwrap_or(s);
    parse_date(date).ok()
}

/// Write serializable rows as a headed CSV file.
pub fn write_rows_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create CSV '{}': {e}", path.display())))?;
    write_rows(file, rows)
}

pub fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(writer);
    for row in rows {
        w.serialize(row)
            .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write CSV row: {e}")))?;
    }
    w.flush()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to flush CSV: {e}")))
}
