//! CSV ingest for wide cumulative-case tables.
//!
//! Expected layout:
//!
//! ```text
//! date,Hubei, China,Italy,...
//! 2020-01-22,444,0,...
//! ```
//!
//! (region headers are quoted when they contain commas). Empty cells are
//! absent observations, not zeros.
//!
//! Structural problems (no `date` column, duplicate or empty region headers,
//! rows longer than the header, unparseable dates) fail the whole load. Short
//! rows are allowed; their missing trailing cells are absent observations. Cell-level problems name the
//! offending region. Value checks beyond "is a number" belong to series
//! preparation.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{CaseTable, Observation, RegionSeries};
use crate::error::{AppError, EXIT_INPUT, EXIT_NO_DATA};

/// Date format used in every table this crate reads or writes.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Load a wide case table from a CSV file.
pub fn load_case_table(path: &Path) -> Result<CaseTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let table = read_case_table(file)?;
    debug!(
        path = %path.display(),
        regions = table.regions.len(),
        dates = table.dates.len(),
        "loaded case table"
    );
    Ok(table)
}

/// Parse a wide case table from any reader.
pub fn read_case_table<R: Read>(reader: R) -> Result<CaseTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let region_ids = parse_headers(&headers)?;
    let mut columns: Vec<Vec<Observation>> = vec![Vec::new(); region_ids.len()];
    let mut dates = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // +2: header is line 1, CSV lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(EXIT_INPUT, format!("CSV parse error on line {line}: {e}")))?;

        if record.len() > region_ids.len() + 1 {
            return Err(AppError::new(
                EXIT_INPUT,
                format!(
                    "Line {line}: expected at most {} cells, found {}.",
                    region_ids.len() + 1,
                    record.len()
                ),
            ));
        }

        let raw_date = record.get(0).unwrap_or("");
        if raw_date.is_empty() && record.iter().all(str::is_empty) {
            continue;
        }
        let date = parse_date(raw_date)
            .map_err(|e| AppError::new(EXIT_INPUT, format!("Line {line}: {e}")))?;
        dates.push(date);

        for (col, region_id) in region_ids.iter().enumerate() {
            let cell = record.get(col + 1).unwrap_or("");
            if cell.is_empty() {
                continue;
            }
            let count: f64 = cell.parse().map_err(|_| {
                AppError::malformed(region_id, format!("'{cell}' is not a number (line {line})"))
            })?;
            columns[col].push(Observation::new(date, count));
        }
    }

    if dates.is_empty() {
        return Err(AppError::new(EXIT_NO_DATA, "Case table has no rows."));
    }

    let regions = region_ids
        .into_iter()
        .zip(columns)
        .map(|(id, observations)| RegionSeries::new(id, observations))
        .collect();

    Ok(CaseTable { dates, regions })
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|e| format!("invalid date '{s}': {e}"))
}

fn parse_headers(headers: &csv::StringRecord) -> Result<Vec<String>, AppError> {
    let mut iter = headers.iter();
    match iter.next() {
        Some(first) if first.eq_ignore_ascii_case("date") => {}
        _ => {
            return Err(AppError::new(
                EXIT_INPUT,
                "Case table must start with a 'date' column.",
            ));
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (i, name) in iter.enumerate() {
        if name.is_empty() {
            return Err(AppError::new(EXIT_INPUT, format!("Empty region header in column {}.", i + 2)));
        }
        if !seen.insert(name.to_string()) {
            return Err(AppError::new(EXIT_INPUT, format!("Duplicate region header '{name}'.")));
        }
        out.push(name.to_string());
    }
    if out.is_empty() {
        return Err(AppError::new(EXIT_NO_DATA, "Case table has no region columns."));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
date,\"Hubei, China\",Italy
2020-01-22,444,0
2020-01-23,444,
2020-01-24,549,2
";

    #[test]
    fn reads_wide_table() {
        let t = read_case_table(SAMPLE.as_bytes()).unwrap();
        assert_eq!(t.dates.len(), 3);
        assert_eq!(t.region_ids().collect::<Vec<_>>(), vec!["Hubei, China", "Italy"]);

        let hubei = t.region("Hubei, China").unwrap();
        assert_eq!(hubei.len(), 3);
        assert_eq!(hubei.observations[2].count, 549.0);
    }

    #[test]
    fn empty_cells_are_absent_not_zero() {
        let t = read_case_table(SAMPLE.as_bytes()).unwrap();
        let italy = t.region("Italy").unwrap();
        assert_eq!(italy.len(), 2);
        assert_eq!(italy.observations[1].date, NaiveDate::from_ymd_opt(2020, 1, 24).unwrap());
    }

    #[test]
    fn missing_date_column_is_structural_error() {
        let err = read_case_table("day,Italy\n2020-01-22,1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("date"));
    }

    #[test]
    fn duplicate_region_is_structural_error() {
        let err = read_case_table("date,Italy,Italy\n2020-01-22,1,2\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn bad_cell_names_the_region() {
        let err = read_case_table("date,Italy\n2020-01-22,lots\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Italy"));
    }

    #[test]
    fn bad_date_is_rejected() {
        let err = read_case_table("date,Italy\n01/22/2020,1\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }

    #[test]
    fn row_longer_than_header_is_rejected() {
        let err = read_case_table("date,Italy\n2020-01-22,1\n2020-01-23,1,2\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(err.to_string().contains("Line 3"), "{err}");
    }

    #[test]
    fn short_rows_leave_trailing_regions_absent() {
        let t = read_case_table("date,Italy,Spain\n2020-01-22,1\n2020-01-23,2,5\n".as_bytes()).unwrap();
        assert_eq!(t.region("Italy").unwrap().len(), 2);
        assert_eq!(t.region("Spain").unwrap().len(), 1);
    }

    #[test]
    fn header_only_table_has_no_data() {
        let err = read_case_table("date,Italy\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_NO_DATA);
    }
}
