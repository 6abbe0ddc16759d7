//! Full ingestion run: Schema Reset, then every file of the load plan.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

use crate::error::{LoadError, PipelineError};
use crate::loader::{LoadOutcome, LoadStatus, load_file};
use crate::plan::LoadPlan;
use crate::reset::reset_schema;
use crate::store::FeedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Reset,
    /// Append on top of whatever the tables hold.
    SkipReset,
}

/// Per-file outcomes of one run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<LoadOutcome>,
}

impl PipelineReport {
    fn with_status(&self, status: LoadStatus) -> impl Iterator<Item = &LoadOutcome> {
        self.outcomes.iter().filter(move |o| o.status == status)
    }

    pub fn loaded(&self) -> Vec<&LoadOutcome> {
        self.with_status(LoadStatus::Loaded).collect()
    }

    pub fn skipped(&self) -> Vec<&LoadOutcome> {
        self.with_status(LoadStatus::Skipped).collect()
    }

    pub fn failed(&self) -> Vec<&LoadOutcome> {
        self.with_status(LoadStatus::Failed).collect()
    }

    pub fn total_rows_loaded(&self) -> u64 {
        self.outcomes.iter().map(|o| o.rows_loaded).sum()
    }

    pub fn total_rows_filtered(&self) -> usize {
        self.outcomes.iter().map(|o| o.rows_filtered).sum()
    }

    pub fn outcome(&self, table: &str) -> Option<&LoadOutcome> {
        self.outcomes.iter().find(|o| o.table == table)
    }
}

/// Runs the plan against `store`.
///
/// A reset failure, or the store becoming unreachable, aborts the run. Every
/// other per-file error is recorded in the report and the next file is loaded.
#[tracing::instrument(skip(store, data_dir, plan), fields(data_dir = %data_dir.display()))]
pub async fn run_pipeline<S: FeedStore + ?Sized>(
    store: &S,
    data_dir: &Path,
    plan: &LoadPlan,
    mode: ResetMode,
) -> Result<PipelineReport, PipelineError> {
    plan.validate()?;
    let started_at = Utc::now();

    if mode == ResetMode::Reset {
        reset_schema(store, &plan.reset_tables).await?;
    }

    let mut outcomes = Vec::with_capacity(plan.files.len());
    for entry in &plan.files {
        match load_file(store, data_dir, entry).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) if e.is_fatal() => {
                error!(file = %entry.file, error = %e, "Store unavailable, aborting");
                return Err(PipelineError::StoreUnavailable {
                    file: entry.file.clone(),
                    source: e,
                });
            }
            Err(e) => {
                match &e {
                    LoadError::MissingFile { .. } => {
                        warn!(file = %entry.file, "File not found, skipping")
                    }
                    _ => error!(file = %entry.file, error = %e, "Failed to load file"),
                }
                outcomes.push(LoadOutcome::from_error(entry, &e));
            }
        }
    }

    let report = PipelineReport {
        started_at,
        finished_at: Utc::now(),
        outcomes,
    };

    info!(
        loaded = report.loaded().len(),
        skipped = report.skipped().len(),
        failed = report.failed().len(),
        rows_loaded = report.total_rows_loaded(),
        rows_filtered = report.total_rows_filtered(),
        "Pipeline complete"
    );

    Ok(report)
}
