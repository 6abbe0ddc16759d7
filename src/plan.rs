//! The fixed GTFS load order.
//!
//! Foreign-key filtering reads the parent table from the store, so a parent
//! must be loaded before any file that references it. [`LoadPlan::validate`]
//! checks that against the list itself.

use crate::error::PipelineError;

/// Tables cleared by Schema Reset, children first.
pub const RESET_ORDER: &[&str] = &[
    "stop_times",
    "calendar_dates",
    "trips",
    "shapes",
    "stops",
    "routes",
    "calendar",
    "feed_info",
    "agency",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub parent_table: String,
    pub parent_column: String,
}

/// One GTFS file and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoad {
    pub file: String,
    pub table: String,
    pub foreign_key: Option<ForeignKey>,
}

impl FileLoad {
    pub fn new(file: &str, table: &str) -> Self {
        Self {
            file: file.to_string(),
            table: table.to_string(),
            foreign_key: None,
        }
    }

    /// Only rows whose `column` value exists in `parent_table.parent_column` are loaded.
    pub fn validated(mut self, column: &str, parent_table: &str, parent_column: &str) -> Self {
        self.foreign_key = Some(ForeignKey {
            column: column.to_string(),
            parent_table: parent_table.to_string(),
            parent_column: parent_column.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub reset_tables: Vec<String>,
    pub files: Vec<FileLoad>,
}

impl LoadPlan {
    /// agency → calendar → routes → stops → shapes → trips → stop_times →
    /// calendar_dates → feed_info.
    pub fn gtfs() -> Self {
        Self {
            reset_tables: RESET_ORDER.iter().map(|t| t.to_string()).collect(),
            files: vec![
                FileLoad::new("agency.txt", "agency"),
                FileLoad::new("calendar.txt", "calendar"),
                FileLoad::new("routes.txt", "routes"),
                FileLoad::new("stops.txt", "stops"),
                FileLoad::new("shapes.txt", "shapes"),
                FileLoad::new("trips.txt", "trips").validated("service_id", "calendar", "service_id"),
                FileLoad::new("stop_times.txt", "stop_times").validated(
                    "trip_id",
                    "trips",
                    "trip_id",
                ),
                FileLoad::new("calendar_dates.txt", "calendar_dates").validated(
                    "service_id",
                    "calendar",
                    "service_id",
                ),
                FileLoad::new("feed_info.txt", "feed_info"),
            ],
        }
    }

    /// Every FK parent must be loaded by an earlier entry.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (i, entry) in self.files.iter().enumerate() {
            let Some(fk) = &entry.foreign_key else {
                continue;
            };
            let parent_loaded_earlier = self.files[..i].iter().any(|f| f.table == fk.parent_table);
            if !parent_loaded_earlier {
                return Err(PipelineError::InvalidPlan(format!(
                    "{} references {} which is not loaded before it",
                    entry.file, fk.parent_table
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gtfs_plan_is_valid() {
        assert!(LoadPlan::gtfs().validate().is_ok());
    }

    #[test]
    fn test_gtfs_plan_order() {
        let tables: Vec<_> = LoadPlan::gtfs()
            .files
            .into_iter()
            .map(|f| f.table)
            .collect();
        assert_eq!(
            tables,
            [
                "agency",
                "calendar",
                "routes",
                "stops",
                "shapes",
                "trips",
                "stop_times",
                "calendar_dates",
                "feed_info"
            ]
        );
    }

    #[test]
    fn test_child_before_parent_is_rejected() {
        let plan = LoadPlan {
            reset_tables: vec![],
            files: vec![
                FileLoad::new("trips.txt", "trips").validated("service_id", "calendar", "service_id"),
                FileLoad::new("calendar.txt", "calendar"),
            ],
        };
        assert!(matches!(plan.validate(), Err(PipelineError::InvalidPlan(_))));
    }
}
