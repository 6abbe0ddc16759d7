//! Feed Loader: one GTFS file into one destination table.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::error::LoadError;
use crate::feed::read_feed_file;
use crate::plan::FileLoad;
use crate::store::{Column, FeedStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Loaded,
    /// Source file absent; optional files such as `shapes.txt` may be.
    Skipped,
    Failed,
}

/// Result of loading a single file, one row of the end-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct LoadOutcome {
    pub file: String,
    pub table: String,
    pub status: LoadStatus,
    pub rows_read: usize,
    pub rows_filtered: usize,
    pub rows_loaded: u64,
    pub columns_loaded: usize,
    pub error_message: Option<String>,
}

impl LoadOutcome {
    /// Outcome for a file that did not load.
    pub fn from_error(entry: &FileLoad, error: &LoadError) -> Self {
        let status = match error {
            LoadError::MissingFile { .. } => LoadStatus::Skipped,
            _ => LoadStatus::Failed,
        };
        Self {
            file: entry.file.clone(),
            table: entry.table.clone(),
            status,
            rows_read: 0,
            rows_filtered: 0,
            rows_loaded: 0,
            columns_loaded: 0,
            error_message: Some(error.to_string()),
        }
    }
}

/// Source columns that also exist in the destination, in source header order.
pub fn shared_columns(headers: &[String], destination: &[Column]) -> Vec<Column> {
    headers
        .iter()
        .filter_map(|h| destination.iter().find(|c| &c.name == h).cloned())
        .collect()
}

/// Loads `data_dir/entry.file` into `entry.table`.
///
/// Rows are appended; existing rows are left alone. When the entry carries a
/// foreign key, rows whose key is missing from the parent table are dropped
/// first and counted in [`LoadOutcome::rows_filtered`]. A file without the
/// key column fails with [`LoadError::MissingColumn`].
#[tracing::instrument(skip(store, data_dir), fields(file = %entry.file, table = %entry.table))]
pub async fn load_file<S: FeedStore + ?Sized>(
    store: &S,
    data_dir: &Path,
    entry: &FileLoad,
) -> Result<LoadOutcome, LoadError> {
    let path = data_dir.join(&entry.file);
    let mut feed = read_feed_file(&path)?;
    let rows_read = feed.len();
    debug!(rows_read, "Read source file");

    let rows_filtered = match &entry.foreign_key {
        Some(fk) => {
            if feed.column_index(&fk.column).is_none() {
                return Err(LoadError::MissingColumn {
                    file: entry.file.clone(),
                    column: fk.column.clone(),
                });
            }
            let valid = store.key_values(&fk.parent_table, &fk.parent_column).await?;
            let dropped = feed
                .retain_valid_keys(&fk.column, &valid)
                .unwrap_or_default();
            if dropped > 0 {
                info!(
                    dropped,
                    column = %fk.column,
                    parent = %fk.parent_table,
                    "Filtered rows without a parent key"
                );
            }
            dropped
        }
        None => 0,
    };

    let destination = store.table_columns(&entry.table).await?;
    if destination.is_empty() {
        return Err(LoadError::UnknownTable {
            table: entry.table.clone(),
        });
    }

    let columns = shared_columns(&feed.headers, &destination);
    if columns.is_empty() {
        return Err(LoadError::NoSharedColumns {
            file: entry.file.clone(),
            table: entry.table.clone(),
        });
    }
    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    let rows = feed.project(&names);

    let rows_loaded = store.append_rows(&entry.table, &columns, &rows).await?;

    info!(
        rows_read,
        rows_filtered,
        rows_loaded,
        columns = columns.len(),
        "Loaded file"
    );

    Ok(LoadOutcome {
        file: entry.file.clone(),
        table: entry.table.clone(),
        status: LoadStatus::Loaded,
        rows_read,
        rows_filtered,
        rows_loaded,
        columns_loaded: columns.len(),
        error_message: None,
    })
}
