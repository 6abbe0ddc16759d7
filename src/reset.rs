//! Schema Reset: empties every feed table before a load.

use tracing::info;

use crate::error::ResetError;
use crate::store::FeedStore;

/// Truncates `tables` in order with cascade, each in its own statement.
///
/// Stops at the first failure; tables already truncated stay empty.
#[tracing::instrument(skip_all, fields(tables = tables.len()))]
pub async fn reset_schema<S, T>(store: &S, tables: &[T]) -> Result<(), ResetError>
where
    S: FeedStore + ?Sized,
    T: AsRef<str>,
{
    for table in tables {
        let table = table.as_ref();
        store
            .truncate_cascade(table)
            .await
            .map_err(|source| ResetError {
                table: table.to_string(),
                source,
            })?;
        info!(table, "Cleared table");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FieldValue;
    use crate::plan::RESET_ORDER;
    use crate::store::{Column, MemoryStore};

    #[tokio::test]
    async fn test_reset_clears_all_tables() {
        let store = MemoryStore::gtfs();
        let id = vec![Column::new("stop_id", "text")];
        store
            .append_rows("stops", &id, &[vec![FieldValue::Text("S1".into())]])
            .await
            .unwrap();

        reset_schema(&store, RESET_ORDER).await.unwrap();

        assert_eq!(store.row_count("stops"), 0);
    }

    #[tokio::test]
    async fn test_reset_fails_loudly_on_missing_table() {
        let store = MemoryStore::gtfs();
        let err = reset_schema(&store, &["stops", "fare_rules", "agency"])
            .await
            .unwrap_err();
        assert_eq!(err.table, "fare_rules");
    }
}
