//! Destination store abstraction.
//!
//! [`FeedStore`] is the seam between the loader and the relational engine.
//! [`PgStore`] talks to PostgreSQL; [`MemoryStore`] keeps tables in process
//! with the standard GTFS column sets, for dry runs and tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::collections::HashSet;

use crate::error::StoreError;
use crate::feed::FieldValue;

/// Rows per append statement.
pub const BATCH_SIZE: usize = 1000;

/// A destination column as reported by the live schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Store type name (Postgres `udt_name`, e.g. `text`, `date`, `int4`).
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait FeedStore: Send + Sync {
    /// Removes every row from `table` and from tables referencing it.
    async fn truncate_cascade(&self, table: &str) -> Result<(), StoreError>;

    /// Columns of `table` in ordinal order. Empty when the table does not exist.
    async fn table_columns(&self, table: &str) -> Result<Vec<Column>, StoreError>;

    /// Distinct non-null values of `table.column`, as text.
    async fn key_values(&self, table: &str, column: &str) -> Result<HashSet<String>, StoreError>;

    /// Appends `rows` (already projected onto `columns`) in batches of at most
    /// [`BATCH_SIZE`] rows, each batch its own committed unit. Returns the
    /// number of rows written.
    async fn append_rows(
        &self,
        table: &str,
        columns: &[Column],
        rows: &[Vec<FieldValue>],
    ) -> Result<u64, StoreError>;
}
