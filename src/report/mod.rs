//! Report output
//!
//! Serializes the permission matrix of a run to a file.

mod csv_sink;
mod json_sink;

pub use csv_sink::CsvSink;
pub use json_sink::JsonSink;

use crate::config::ReportFormat;
use crate::error::ReportError;
use crate::permissions::{PermissionRecord, RunSummary};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Everything a sink writes
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub organization: &'a str,
    pub project: &'a str,
    pub summary: &'a RunSummary,
    pub records: &'a [PermissionRecord],
}

/// A report serializer
pub trait ReportSink {
    fn write(&mut self, report: &Report<'_>) -> Result<(), ReportError>;
}

/// Write `report` to `path` in the given format, replacing any existing file
pub fn write_report(
    path: &Path,
    format: ReportFormat,
    report: &Report<'_>,
) -> Result<(), ReportError> {
    let writer = BufWriter::new(File::create(path)?);

    match format {
        ReportFormat::Csv => CsvSink::new(writer).write(report)?,
        ReportFormat::Json => JsonSink::new(writer).write(report)?,
    }

    info!(
        path = %path.display(),
        format = ?format,
        records = report.records.len(),
        "Report written"
    );
    Ok(())
}
