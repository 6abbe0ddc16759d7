use chrono::NaiveDate;
use gtfs_loader::error::{PipelineError, StoreError};
use gtfs_loader::feed::FieldValue;
use gtfs_loader::loader::LoadStatus;
use gtfs_loader::pipeline::{ResetMode, run_pipeline};
use gtfs_loader::plan::LoadPlan;
use gtfs_loader::store::{Column, FeedStore, MemoryStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn fixture_feed() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/feed")
}

fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.to_string())
}

#[tokio::test]
async fn test_full_pipeline() {
    let store = MemoryStore::gtfs();
    let report = run_pipeline(&store, &fixture_feed(), &LoadPlan::gtfs(), ResetMode::Reset)
        .await
        .expect("pipeline should complete");

    assert_eq!(report.loaded().len(), 8);
    assert!(report.failed().is_empty());

    // Every loaded table holds exactly the rows that survived FK filtering.
    for outcome in report.loaded() {
        assert_eq!(
            store.row_count(&outcome.table),
            outcome.rows_read - outcome.rows_filtered,
            "row count mismatch for {}",
            outcome.table
        );
        assert_eq!(outcome.rows_loaded as usize, store.row_count(&outcome.table));
    }
}

#[tokio::test]
async fn test_orphans_are_counted_exactly() {
    let store = MemoryStore::gtfs();
    let report = run_pipeline(&store, &fixture_feed(), &LoadPlan::gtfs(), ResetMode::Reset)
        .await
        .unwrap();

    let trips = report.outcome("trips").unwrap();
    assert_eq!((trips.rows_read, trips.rows_filtered), (5, 2));

    // Trip 3001 was dropped with its service, so its stop_times go too.
    let stop_times = report.outcome("stop_times").unwrap();
    assert_eq!((stop_times.rows_read, stop_times.rows_filtered), (10, 3));

    let calendar_dates = report.outcome("calendar_dates").unwrap();
    assert_eq!((calendar_dates.rows_read, calendar_dates.rows_filtered), (3, 1));

    let trip_ids: HashSet<_> = store.column_values("trips", "trip_id").into_iter().collect();
    assert_eq!(trip_ids, HashSet::from([text("1001"), text("1002"), text("2001")]));
}

#[tokio::test]
async fn test_missing_feed_info_does_not_abort() {
    let store = MemoryStore::gtfs();
    let report = run_pipeline(&store, &fixture_feed(), &LoadPlan::gtfs(), ResetMode::Reset)
        .await
        .unwrap();

    let feed_info = report.outcome("feed_info").unwrap();
    assert_eq!(feed_info.status, LoadStatus::Skipped);
    assert!(feed_info.error_message.as_deref().unwrap().contains("feed_info.txt"));
    assert_eq!(store.row_count("feed_info"), 0);
    assert_eq!(store.row_count("agency"), 1);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let store = MemoryStore::gtfs();
    let plan = LoadPlan::gtfs();

    run_pipeline(&store, &fixture_feed(), &plan, ResetMode::Reset)
        .await
        .unwrap();
    let first = store.snapshot();

    run_pipeline(&store, &fixture_feed(), &plan, ResetMode::Reset)
        .await
        .unwrap();
    assert_eq!(store.snapshot(), first);
}

#[tokio::test]
async fn test_skip_reset_appends() {
    let store = MemoryStore::gtfs();
    let plan = LoadPlan::gtfs();

    run_pipeline(&store, &fixture_feed(), &plan, ResetMode::Reset)
        .await
        .unwrap();
    run_pipeline(&store, &fixture_feed(), &plan, ResetMode::SkipReset)
        .await
        .unwrap();

    assert_eq!(store.row_count("agency"), 2);
}

#[tokio::test]
async fn test_dates_and_identifiers_are_normalized() {
    let store = MemoryStore::gtfs();
    run_pipeline(&store, &fixture_feed(), &LoadPlan::gtfs(), ResetMode::Reset)
        .await
        .unwrap();

    let start_dates = store.column_values("calendar", "start_date");
    assert_eq!(
        start_dates[0],
        FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
    );
    // "bad-date" becomes null instead of failing the file.
    assert_eq!(store.column_values("calendar", "end_date")[2], FieldValue::Null);

    let route_ids = store.column_values("routes", "route_id");
    assert!(route_ids.contains(&text("1")));
    assert!(route_ids.contains(&text("01")));
    assert_eq!(store.column_values("stops", "stop_id")[0], text("0001"));
    assert_eq!(store.column_values("shapes", "shape_id")[0], text("010"));
}

#[tokio::test]
async fn test_extra_and_missing_columns() {
    let store = MemoryStore::gtfs();
    let report = run_pipeline(&store, &fixture_feed(), &LoadPlan::gtfs(), ResetMode::Reset)
        .await
        .unwrap();

    // platform_code has no destination column; stop_code is not in the file.
    let stops = report.outcome("stops").unwrap();
    assert_eq!(stops.columns_loaded, 4);
    assert!(
        store
            .column_values("stops", "stop_code")
            .iter()
            .all(FieldValue::is_null)
    );
}

/// Wraps a [`MemoryStore`] and fails every append to one table.
struct FailingStore {
    inner: MemoryStore,
    table: &'static str,
    unavailable: bool,
}

#[async_trait::async_trait]
impl FeedStore for FailingStore {
    async fn truncate_cascade(&self, table: &str) -> Result<(), StoreError> {
        self.inner.truncate_cascade(table).await
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<Column>, StoreError> {
        self.inner.table_columns(table).await
    }

    async fn key_values(&self, table: &str, column: &str) -> Result<HashSet<String>, StoreError> {
        self.inner.key_values(table, column).await
    }

    async fn append_rows(
        &self,
        table: &str,
        columns: &[Column],
        rows: &[Vec<FieldValue>],
    ) -> Result<u64, StoreError> {
        if table != self.table {
            return self.inner.append_rows(table, columns, rows).await;
        }
        if self.unavailable {
            Err(StoreError::Unavailable("connection reset by peer".into()))
        } else {
            Err(StoreError::Query {
                table: table.to_string(),
                message: "duplicate key value violates unique constraint".into(),
            })
        }
    }
}

#[tokio::test]
async fn test_statement_failure_skips_only_that_file() {
    let store = FailingStore {
        inner: MemoryStore::gtfs(),
        table: "shapes",
        unavailable: false,
    };
    let report = run_pipeline(&store, &fixture_feed(), &LoadPlan::gtfs(), ResetMode::Reset)
        .await
        .unwrap();

    assert_eq!(report.failed().len(), 1);
    assert_eq!(report.outcome("shapes").unwrap().status, LoadStatus::Failed);
    assert_eq!(report.outcome("trips").unwrap().status, LoadStatus::Loaded);
    assert_eq!(store.inner.row_count("stop_times"), 7);
}

#[tokio::test]
async fn test_unavailable_store_aborts_pipeline() {
    let store = FailingStore {
        inner: MemoryStore::gtfs(),
        table: "routes",
        unavailable: true,
    };
    let result = run_pipeline(&store, &fixture_feed(), &LoadPlan::gtfs(), ResetMode::Reset).await;

    match result {
        Err(PipelineError::StoreUnavailable { file, .. }) => assert_eq!(file, "routes.txt"),
        other => panic!("expected StoreUnavailable, got {other:?}"),
    }
    assert_eq!(store.inner.row_count("agency"), 1);
    assert_eq!(store.inner.row_count("stops"), 0);
}

#[tokio::test]
async fn test_reset_failure_is_fatal() {
    let store = MemoryStore::new();
    let result = run_pipeline(&store, &fixture_feed(), &LoadPlan::gtfs(), ResetMode::Reset).await;
    assert!(matches!(result, Err(PipelineError::Reset(_))));
}
