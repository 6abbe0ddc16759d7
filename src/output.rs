//! Output formatting and persistence for load summaries and report tables.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::loader::LoadOutcome;
use crate::pipeline::PipelineReport;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs a pipeline report using Rust's debug pretty-print format.
pub fn print_pretty(report: &PipelineReport) {
    debug!("{:#?}", report);
}

/// Logs a pipeline report as pretty-printed JSON.
pub fn print_json(report: &PipelineReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Appends one CSV row per [`LoadOutcome`].
///
/// Creates the file with headers if it does not already exist.
pub fn append_outcomes(path: &Path, outcomes: &[LoadOutcome]) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for outcome in outcomes {
        writer.serialize(outcome)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes `rows` to a fresh CSV file, replacing any previous one.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = rows.len(), "Wrote CSV table");
    Ok(())
}
