//! Column store for one station's CSV file.
//!
//! Supported format:
//! - UTF-8, comma-separated
//! - Mandatory header row naming every column
//! - Double-quoted fields may hold commas, doubled quotes and line breaks
//! - Empty, `NaN` and `nan` cells read as `f64::NAN`
//!
//! A column is numeric when every cell parses as `f64`; anything else is kept
//! as text (the date column, station names, ...).

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::error::{FlowError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    fn slice(&self, range: Range<usize>) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(v[range].to_vec()),
            Column::Text(v) => Column::Text(v[range].to_vec()),
        }
    }

    /// Text view of the column; numeric cells are formatted back.
    fn to_text(&self) -> Vec<String> {
        match self {
            Column::Numeric(v) => v.iter().map(|x| x.to_string()).collect(),
            Column::Text(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StationFrame {
    pub station: String,
    header: Vec<String>,
    columns: BTreeMap<String, Column>,
    len: usize,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl StationFrame {
    /// Reads `path` and names the frame after the file stem.
    pub fn from_csv_path(path: &Path) -> Result<StationFrame> {
        let text = std::fs::read_to_string(path).map_err(|e| FlowError::io(path, e))?;
        let station = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        StationFrame::from_csv_str(&station, &text)
    }

    pub fn from_csv_str(station: &str, text: &str) -> Result<StationFrame> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let header: Vec<String> = reader
            .headers()
            .map_err(record_error)?
            .iter()
            .map(str::to_string)
            .collect();
        if header.iter().all(String::is_empty) {
            return Err(FlowError::Csv {
                line: 1,
                message: "file is empty; a header row is required".into(),
            });
        }

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); header.len()];
        for record in reader.records() {
            let record = record.map_err(record_error)?;
            for (col, cell) in raw.iter_mut().zip(record.iter()) {
                col.push(cell.to_string());
            }
        }

        let len = raw.first().map_or(0, |c| c.len());
        let mut columns = BTreeMap::new();
        for (name, cells) in header.iter().zip(raw) {
            if columns.contains_key(name) {
                return Err(FlowError::Csv {
                    line: 1,
                    message: format!("duplicate column '{name}'"),
                });
            }
            columns.insert(name.clone(), classify(cells));
        }

        Ok(StationFrame { station: station.to_string(), header, columns, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Column names in file order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        match self.columns.get(name) {
            Some(Column::Numeric(v)) => Ok(v),
            Some(Column::Text(_)) => Err(FlowError::NonNumericColumn(name.to_string())),
            None => Err(FlowError::MissingColumn(name.to_string())),
        }
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut Vec<f64>> {
        match self.columns.get_mut(name) {
            Some(Column::Numeric(v)) => Ok(v),
            Some(Column::Text(_)) => Err(FlowError::NonNumericColumn(name.to_string())),
            None => Err(FlowError::MissingColumn(name.to_string())),
        }
    }

    /// The row labels from `name`, as text.
    pub fn dates(&self, name: &str) -> Result<Vec<String>> {
        self.columns
            .get(name)
            .map(Column::to_text)
            .ok_or_else(|| FlowError::MissingColumn(name.to_string()))
    }

    /// Rows `range` as a new frame.
    pub fn slice(&self, range: Range<usize>) -> StationFrame {
        let columns = self
            .columns
            .iter()
            .map(|(k, c)| (k.clone(), c.slice(range.clone())))
            .collect();
        StationFrame {
            station: self.station.clone(),
            header: self.header.clone(),
            columns,
            len: range.len(),
        }
    }

    /// Warns about dates that do not parse or do not strictly increase.
    /// Returns the number of offending rows.
    pub fn check_chronological(&self, date_column: &str) -> Result<usize> {
        let dates = self.dates(date_column)?;
        let mut bad = 0;
        let mut prev: Option<NaiveDateTime> = None;

        for (row, raw) in dates.iter().enumerate() {
            match parse_date(raw) {
                Some(ts) => {
                    if let Some(p) = prev {
                        if ts <= p {
                            bad += 1;
                            warn!(station = %self.station, row, date = %raw, "date does not increase");
                        }
                    }
                    prev = Some(ts);
                }
                None => {
                    bad += 1;
                    warn!(station = %self.station, row, date = %raw, "unparseable date");
                }
            }
        }

        Ok(bad)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn classify(cells: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = cells.iter().map(|c| parse_cell(c)).collect();
    match parsed {
        Some(values) => Column::Numeric(values),
        None => Column::Text(cells.into_iter().map(|c| c.trim().to_string()).collect()),
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    let t = cell.trim();
    if t.is_empty() || t == "NaN" || t == "nan" {
        return Some(f64::NAN);
    }
    t.parse::<f64>().ok()
}

fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts);
    }
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn record_error(e: csv::Error) -> FlowError {
    let line = e.position().map_or(0, |p| p.line() as usize);
    let message = match e.kind() {
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            format!("expected {expected_len} cells, got {len}")
        }
        _ => e.to_string(),
    };
    FlowError::Csv { line, message }
}
