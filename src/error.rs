//! Error taxonomy for the ingestion pipeline.
//!
//! Foreign-key mismatches are deliberately absent: dropped orphan rows are a
//! count in [`crate::loader::LoadOutcome`], not a failure.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a [`crate::store::FeedStore`] implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached, or the connection dropped mid-operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A single statement failed (constraint violation, type cast, missing table...).
    #[error("statement failed on {table}: {message}")]
    Query { table: String, message: String },
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Per-file failure. Every variant is recoverable at the pipeline level except
/// [`LoadError::Store`] wrapping [`StoreError::Unavailable`].
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("file not found: {}", path.display())]
    MissingFile { path: PathBuf },
    #[error("malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("table '{table}' has no columns in the destination schema")]
    UnknownTable { table: String },
    #[error("{file} has no '{column}' column")]
    MissingColumn { file: String, column: String },
    #[error("{file} shares no columns with table '{table}'")]
    NoSharedColumns { file: String, table: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LoadError {
    /// Whether the whole pipeline must stop rather than skip this file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoadError::Store(e) if e.is_unavailable())
    }
}

/// Schema Reset failed on `table`; tables earlier in the order stay cleared.
#[derive(Error, Debug)]
#[error("failed to reset table '{table}': {source}")]
pub struct ResetError {
    pub table: String,
    #[source]
    pub source: StoreError,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Reset(#[from] ResetError),
    #[error("store became unavailable while loading {file}: {source}")]
    StoreUnavailable {
        file: String,
        #[source]
        source: LoadError,
    },
    #[error("invalid load plan: {0}")]
    InvalidPlan(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("environment variable {0} must be set")]
    MissingEnv(&'static str),
    #[error("invalid port '{0}'")]
    InvalidPort(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_fatal() {
        let e = LoadError::MissingFile {
            path: PathBuf::from("feed/feed_info.txt"),
        };
        assert!(!e.is_fatal());
        assert!(e.to_string().contains("feed_info.txt"));
    }

    #[test]
    fn test_unavailable_store_is_fatal() {
        let e = LoadError::from(StoreError::Unavailable("connection refused".into()));
        assert!(e.is_fatal());

        let e = LoadError::from(StoreError::Query {
            table: "trips".into(),
            message: "null value in column".into(),
        });
        assert!(!e.is_fatal());
    }

    #[test]
    fn test_missing_column_names_file_and_column() {
        let e = LoadError::MissingColumn {
            file: "trips.txt".into(),
            column: "service_id".into(),
        };
        assert!(!e.is_fatal());
        assert_eq!(e.to_string(), "trips.txt has no 'service_id' column");
    }
}
