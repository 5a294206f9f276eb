//! Persisted outputs.
//!
//! - case table CSV: the wide layout read by `ingest`
//! - parameter table CSV: one row per parameter name, one column per valid region
//! - projection CSV: one row per (date, region)
//! - batch report JSON: fits, epoch offsets, diagnostics, and skip reasons

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::domain::{BatchReport, CaseTable, FitParameters, FittedRegion, PARAM_NAMES, ProjectionPoint};
use crate::error::{AppError, EXIT_INPUT, EXIT_NO_DATA};
use crate::io::ingest::DATE_FORMAT;

/// Header of the label column in the parameter table.
pub const PARAMS_INDEX_HEADER: &str = "parameters";

/// Write a wide case table. Absent observations become empty cells.
pub fn write_case_table_csv(path: &Path, table: &CaseTable) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(EXIT_INPUT, format!("Failed to create case CSV '{}': {e}", path.display()))
    })?;
    write_case_table(file, table)
}

pub fn write_case_table<W: Write>(writer: W, table: &CaseTable) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(writer);
    let write_err = |e: csv::Error| AppError::new(EXIT_INPUT, format!("Failed to write case CSV: {e}"));

    let mut header = vec!["date".to_string()];
    header.extend(table.region_ids().map(str::to_string));
    w.write_record(&header).map_err(write_err)?;

    // Per-region cursors; observations are date-ordered.
    let mut cursors = vec![0usize; table.regions.len()];
    for date in &table.dates {
        let mut record = vec![date.format(DATE_FORMAT).to_string()];
        for (series, cursor) in table.regions.iter().zip(cursors.iter_mut()) {
            match series.observations.get(*cursor) {
                Some(o) if o.date == *date => {
                    record.push(o.count.to_string());
                    *cursor += 1;
                }
                _ => record.push(String::new()),
            }
        }
        w.write_record(&record).map_err(write_err)?;
    }

    w.flush()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to flush case CSV: {e}")))
}

/// Write the parameter table for all valid fits.
pub fn write_params_csv(path: &Path, fits: &BTreeMap<String, FittedRegion>) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(EXIT_INPUT, format!("Failed to create parameter CSV '{}': {e}", path.display()))
    })?;
    write_params(file, fits)
}

/// Write the parameter table to any writer.
pub fn write_params<W: Write>(writer: W, fits: &BTreeMap<String, FittedRegion>) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(writer);
    let write_err = |e: csv::Error| AppError::new(EXIT_INPUT, format!("Failed to write parameter CSV: {e}"));

    let mut header = vec![PARAMS_INDEX_HEADER.to_string()];
    header.extend(fits.keys().cloned());
    w.write_record(&header).map_err(write_err)?;

    for (row, name) in PARAM_NAMES.iter().enumerate() {
        let mut record = vec![name.to_string()];
        record.extend(fits.values().map(|f| f.params.values()[row].to_string()));
        w.write_record(&record).map_err(write_err)?;
    }

    w.flush()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to flush parameter CSV: {e}")))
}

/// Read a parameter table written by [`write_params_csv`].
pub fn read_params_csv(path: &Path) -> Result<BTreeMap<String, FitParameters>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(EXIT_INPUT, format!("Failed to open parameter CSV '{}': {e}", path.display()))
    })?;
    read_params(file)
}

/// Read a parameter table from any reader.
///
/// Rows may appear in any order; every name in [`PARAM_NAMES`] must be present.
pub fn read_params<R: Read>(reader: R) -> Result<BTreeMap<String, FitParameters>, AppError> {
    let mut r = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = r
        .headers()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to read parameter CSV headers: {e}")))?
        .clone();
    let regions: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    if regions.is_empty() {
        return Err(AppError::new(EXIT_NO_DATA, "Parameter table has no region columns."));
    }

    let mut values = vec![[f64::NAN; 6]; regions.len()];
    let mut seen = [false; 6];
    for result in r.records() {
        let record =
            result.map_err(|e| AppError::new(EXIT_INPUT, format!("Parameter CSV parse error: {e}")))?;
        let name = record.get(0).unwrap_or("");
        let Some(row) = PARAM_NAMES.iter().position(|p| *p == name) else {
            return Err(AppError::new(EXIT_INPUT, format!("Unknown parameter row '{name}'.")));
        };
        seen[row] = true;
        for (col, region) in regions.iter().enumerate() {
            let cell = record.get(col + 1).unwrap_or("");
            values[col][row] = cell.parse().map_err(|_| {
                AppError::new(EXIT_INPUT, format!("Bad value '{cell}' for {name} of region '{region}'."))
            })?;
        }
    }

    if let Some(missing) = PARAM_NAMES.iter().zip(seen).find(|(_, s)| !s).map(|(n, _)| n) {
        return Err(AppError::new(EXIT_INPUT, format!("Parameter table is missing the '{missing}' row.")));
    }

    Ok(regions
        .into_iter()
        .zip(values)
        .map(|(id, v)| {
            let params = FitParameters::from_values(id.as_str(), v);
            (id, params)
        })
        .collect())
}

/// Write projection rows for one region.
pub fn write_projection_csv(path: &Path, region_id: &str, points: &[ProjectionPoint]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(EXIT_INPUT, format!("Failed to create projection CSV '{}': {e}", path.display()))
    })?;
    write_projection(file, region_id, points)
}

pub fn write_projection<W: Write>(writer: W, region_id: &str, points: &[ProjectionPoint]) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(writer);
    let write_err = |e: csv::Error| AppError::new(EXIT_INPUT, format!("Failed to write projection CSV: {e}"));

    w.write_record(["date", "region", "predicted", "lower", "upper"])
        .map_err(write_err)?;
    for p in points {
        w.write_record([
            p.date.format(DATE_FORMAT).to_string(),
            region_id.to_string(),
            format!("{:.4}", p.predicted),
            format!("{:.4}", p.lower),
            format!("{:.4}", p.upper),
        ])
        .map_err(write_err)?;
    }
    w.flush()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to flush projection CSV: {e}")))
}

/// Write the full batch report as pretty JSON.
pub fn write_report_json(path: &Path, report: &BatchReport) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(EXIT_INPUT, format!("Failed to create report JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write report JSON: {e}")))
}
