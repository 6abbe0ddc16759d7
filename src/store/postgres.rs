use std::collections::HashSet;

use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

use super::{BATCH_SIZE, Column, FeedStore};
use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::feed::FieldValue;

/// Postgres caps bind parameters per statement at 65535.
const MAX_BIND_PARAMS: usize = 65_535;

/// [`FeedStore`] backed by PostgreSQL.
///
/// Every operation opens its own connection and drops it when done; statements
/// run in autocommit mode.
pub struct PgStore {
    url: String,
}

impl PgStore {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            url: config.connection_url(),
        }
    }

    /// Opens a short-lived connection. The driver task ends once the returned
    /// client is dropped.
    pub async fn connect(&self) -> Result<Client, StoreError> {
        let (client, connection) = tokio_postgres::connect(&self.url, NoTls)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Postgres connection error");
            }
        });

        Ok(client)
    }
}

/// Quotes an SQL identifier, doubling embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Statement-level failures carry a database error; anything else means the
/// connection itself is gone.
fn classify(table: &str, e: tokio_postgres::Error) -> StoreError {
    if e.as_db_error().is_some() {
        StoreError::Query {
            table: table.to_string(),
            message: e.to_string(),
        }
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

/// Builds a multi-row `INSERT` where every parameter is bound as text and cast
/// to the destination column type.
fn insert_statement(table: &str, columns: &[Column], row_count: usize) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut values = Vec::with_capacity(row_count);
    for r in 0..row_count {
        let tuple = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("${}::{}", r * columns.len() + i + 1, quote_ident(&c.type_name)))
            .collect::<Vec<_>>()
            .join(", ");
        values.push(format!("({tuple})"));
    }

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        column_list,
        values.join(", ")
    )
}

/// Rows per statement: [`BATCH_SIZE`], shrunk for very wide tables.
fn rows_per_statement(column_count: usize) -> usize {
    BATCH_SIZE.min(MAX_BIND_PARAMS / column_count.max(1)).max(1)
}

#[async_trait::async_trait]
impl FeedStore for PgStore {
    #[tracing::instrument(skip(self))]
    async fn truncate_cascade(&self, table: &str) -> Result<(), StoreError> {
        let client = self.connect().await?;
        client
            .batch_execute(&format!("TRUNCATE TABLE {} CASCADE", quote_ident(table)))
            .await
            .map_err(|e| classify(table, e))
    }

    #[tracing::instrument(skip(self))]
    async fn table_columns(&self, table: &str) -> Result<Vec<Column>, StoreError> {
        let client = self.connect().await?;
        let rows = client
            .query(
                "SELECT column_name::text, udt_name::text \
                 FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 \
                 ORDER BY ordinal_position",
                &[&table],
            )
            .await
            .map_err(|e| classify(table, e))?;

        rows.iter()
            .map(|row| -> Result<Column, StoreError> {
                let name: String = row.try_get(0).map_err(|e| classify(table, e))?;
                let type_name: String = row.try_get(1).map_err(|e| classify(table, e))?;
                Ok(Column { name, type_name })
            })
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn key_values(&self, table: &str, column: &str) -> Result<HashSet<String>, StoreError> {
        let client = self.connect().await?;
        let column = quote_ident(column);
        let rows = client
            .query(
                format!(
                    "SELECT DISTINCT {column}::text FROM {} WHERE {column} IS NOT NULL",
                    quote_ident(table)
                )
                .as_str(),
                &[],
            )
            .await
            .map_err(|e| classify(table, e))?;

        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(|e| classify(table, e)))
            .collect()
    }

    #[tracing::instrument(skip(self, columns, rows), fields(row_count = rows.len()))]
    async fn append_rows(
        &self,
        table: &str,
        columns: &[Column],
        rows: &[Vec<FieldValue>],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let client = self.connect().await?;
        let chunk_size = rows_per_statement(columns.len());
        let mut written = 0u64;

        for chunk in rows.chunks(chunk_size) {
            let sql = insert_statement(table, columns, chunk.len());
            let types = vec![Type::TEXT; chunk.len() * columns.len()];
            let statement = client
                .prepare_typed(&sql, &types)
                .await
                .map_err(|e| classify(table, e))?;

            let values: Vec<Option<String>> = chunk
                .iter()
                .flat_map(|row| row.iter().map(FieldValue::as_text))
                .collect();
            let params: Vec<&(dyn ToSql + Sync)> =
                values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

            written += client
                .execute(&statement, &params)
                .await
                .map_err(|e| classify(table, e))?;
            debug!(table, written, "Batch committed");
        }

        Ok(written)
    }
}
