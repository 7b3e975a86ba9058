//! CSV writers for predictions and error metrics.
//!
//! Output is comma-separated UTF-8 with a header row; cells are quoted only
//! when they need it.

use std::fs::File;
use std::path::Path;

use crate::error::{FlowError, Result};
use crate::eval::metrics::ErrorMetrics;

/// Writes a `date,discharge` series.
pub fn write_series(path: &Path, dates: &[String], values: &[f64]) -> Result<()> {
    if dates.len() != values.len() {
        return Err(FlowError::Shape(format!(
            "{} dates vs {} values for '{}'",
            dates.len(),
            values.len(),
            path.display()
        )));
    }
    write_rows(path, |w| {
        w.write_record(["date", "discharge"])?;
        for (date, value) in dates.iter().zip(values) {
            w.write_record([date.clone(), value.to_string()])?;
        }
        Ok(())
    })
}

/// Writes one metrics row under the `ErrorMetrics::HEADER` columns.
pub fn write_metrics(path: &Path, metrics: &ErrorMetrics) -> Result<()> {
    write_rows(path, |w| {
        w.write_record(ErrorMetrics::HEADER)?;
        w.write_record(metrics.values().map(|v| v.to_string()))
    })
}

/// Writes one metrics row per station, prefixed with the station id.
pub fn write_summary(path: &Path, rows: &[(String, ErrorMetrics)]) -> Result<()> {
    write_rows(path, |w| {
        w.write_record(std::iter::once("station").chain(ErrorMetrics::HEADER))?;
        for (station, metrics) in rows {
            let cells = metrics.values().map(|v| v.to_string());
            w.write_record(std::iter::once(station.clone()).chain(cells))?;
        }
        Ok(())
    })
}

fn write_rows<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<File>) -> csv::Result<()>,
{
    let failed = |source| FlowError::CsvFile { path: path.to_path_buf(), source };
    let mut writer = csv::Writer::from_path(path).map_err(failed)?;
    body(&mut writer).map_err(failed)?;
    writer.flush().map_err(|e| FlowError::io(path, e))
}
