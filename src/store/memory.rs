use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{BATCH_SIZE, Column, FeedStore};
use crate::error::StoreError;
use crate::feed::FieldValue;

#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<Column>,
    /// Tables this one references; truncating any of them cascades here.
    references: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
}

impl MemoryTable {
    fn new(columns: Vec<Column>, references: &[&str]) -> Self {
        Self {
            columns,
            references: references.iter().map(|r| r.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

/// In-process [`FeedStore`].
///
/// Tables are declared up front with their columns and the tables they
/// reference, mirroring `ON DELETE CASCADE` foreign keys. Appended values are
/// checked against the declared column type the way a cast would be.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, MemoryTable>>,
}

/// Standard GTFS tables: `(name, references, [(column, type)])`.
const GTFS_TABLES: &[(&str, &[&str], &[(&str, &str)])] = &[
    (
        "agency",
        &[],
        &[
            ("agency_id", "text"),
            ("agency_name", "text"),
            ("agency_url", "text"),
            ("agency_timezone", "text"),
            ("agency_lang", "text"),
            ("agency_phone", "text"),
            ("agency_fare_url", "text"),
            ("agency_email", "text"),
        ],
    ),
    (
        "calendar",
        &[],
        &[
            ("service_id", "text"),
            ("monday", "int4"),
            ("tuesday", "int4"),
            ("wednesday", "int4"),
            ("thursday", "int4"),
            ("friday", "int4"),
            ("saturday", "int4"),
            ("sunday", "int4"),
            ("start_date", "date"),
            ("end_date", "date"),
        ],
    ),
    (
        "routes",
        &["agency"],
        &[
            ("route_id", "text"),
            ("agency_id", "text"),
            ("route_short_name", "text"),
            ("route_long_name", "text"),
            ("route_desc", "text"),
            ("route_type", "int4"),
            ("route_url", "text"),
            ("route_color", "text"),
            ("route_text_color", "text"),
            ("route_sort_order", "int4"),
        ],
    ),
    (
        "stops",
        &[],
        &[
            ("stop_id", "text"),
            ("stop_code", "text"),
            ("stop_name", "text"),
            ("stop_desc", "text"),
            ("stop_lat", "float8"),
            ("stop_lon", "float8"),
            ("zone_id", "text"),
            ("stop_url", "text"),
            ("location_type", "int4"),
            ("parent_station", "text"),
            ("wheelchair_boarding", "int4"),
        ],
    ),
    (
        "shapes",
        &[],
        &[
            ("shape_id", "text"),
            ("shape_pt_lat", "float8"),
            ("shape_pt_lon", "float8"),
            ("shape_pt_sequence", "int4"),
            ("shape_dist_traveled", "float8"),
        ],
    ),
    (
        "trips",
        &["routes", "calendar"],
        &[
            ("route_id", "text"),
            ("service_id", "text"),
            ("trip_id", "text"),
            ("trip_headsign", "text"),
            ("trip_short_name", "text"),
            ("direction_id", "int4"),
            ("block_id", "text"),
            ("shape_id", "text"),
            ("wheelchair_accessible", "int4"),
            ("bikes_allowed", "int4"),
        ],
    ),
    (
        "stop_times",
        &["trips", "stops"],
        &[
            ("trip_id", "text"),
            ("arrival_time", "text"),
            ("departure_time", "text"),
            ("stop_id", "text"),
            ("stop_sequence", "int4"),
            ("stop_headsign", "text"),
            ("pickup_type", "int4"),
            ("drop_off_type", "int4"),
            ("shape_dist_traveled", "float8"),
            ("timepoint", "int4"),
        ],
    ),
    (
        "calendar_dates",
        &["calendar"],
        &[
            ("service_id", "text"),
            ("date", "date"),
            ("exception_type", "int4"),
        ],
    ),
    (
        "feed_info",
        &[],
        &[
            ("feed_publisher_name", "text"),
            ("feed_publisher_url", "text"),
            ("feed_lang", "text"),
            ("feed_start_date", "date"),
            ("feed_end_date", "date"),
            ("feed_version", "text"),
            ("feed_contact_email", "text"),
        ],
    ),
];

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding empty tables for every standard GTFS file.
    pub fn gtfs() -> Self {
        let tables = GTFS_TABLES
            .iter()
            .map(|(name, references, columns)| {
                let columns = columns.iter().map(|(c, t)| Column::new(*c, *t)).collect();
                (name.to_string(), MemoryTable::new(columns, references))
            })
            .collect();
        Self {
            tables: Mutex::new(tables),
        }
    }

    /// Declares (or replaces) an empty table.
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<Column>,
        references: &[&str],
    ) -> Result<(), StoreError> {
        self.lock()?
            .insert(name.to_string(), MemoryTable::new(columns, references));
        Ok(())
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|t| t.get(table).map(|t| t.rows.len()))
            .unwrap_or(0)
    }

    /// Every value of `column` in `table`, in insertion order.
    pub fn column_values(&self, table: &str, column: &str) -> Vec<FieldValue> {
        let Ok(tables) = self.lock() else {
            return Vec::new();
        };
        let Some(t) = tables.get(table) else {
            return Vec::new();
        };
        let Some(idx) = t.columns.iter().position(|c| c.name == column) else {
            return Vec::new();
        };
        t.rows.iter().map(|r| r[idx].clone()).collect()
    }

    /// Full contents of every table, keyed by table name.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Vec<FieldValue>>> {
        self.lock()
            .map(|tables| {
                tables
                    .iter()
                    .map(|(name, t)| (name.clone(), t.rows.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, MemoryTable>>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn missing_table(table: &str) -> StoreError {
    StoreError::Query {
        table: table.to_string(),
        message: format!("relation \"{table}\" does not exist"),
    }
}

/// Mirrors the cast a relational store would apply to a text parameter.
fn check_value(table: &str, column: &Column, value: &FieldValue) -> Result<(), StoreError> {
    let text = match value {
        FieldValue::Null => return Ok(()),
        FieldValue::Date(_) if column.type_name == "date" => return Ok(()),
        FieldValue::Date(d) => d.to_string(),
        FieldValue::Text(s) => s.clone(),
    };

    let ok = match column.type_name.as_str() {
        "int2" | "int4" | "int8" => text.parse::<i64>().is_ok(),
        "float4" | "float8" | "numeric" => text.parse::<f64>().is_ok(),
        "date" => false,
        _ => true,
    };

    if ok {
        Ok(())
    } else {
        Err(StoreError::Query {
            table: table.to_string(),
            message: format!(
                "invalid input syntax for type {}: \"{}\" (column {})",
                column.type_name, text, column.name
            ),
        })
    }
}

#[async_trait::async_trait]
impl FeedStore for MemoryStore {
    async fn truncate_cascade(&self, table: &str) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        if !tables.contains_key(table) {
            return Err(missing_table(table));
        }

        let mut pending = vec![table.to_string()];
        let mut cleared = HashSet::new();
        while let Some(name) = pending.pop() {
            if !cleared.insert(name.clone()) {
                continue;
            }
            for (other, t) in tables.iter() {
                if t.references.contains(&name) {
                    pending.push(other.clone());
                }
            }
        }

        for name in cleared {
            if let Some(t) = tables.get_mut(&name) {
                t.rows.clear();
            }
        }
        Ok(())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<Column>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn key_values(&self, table: &str, column: &str) -> Result<HashSet<String>, StoreError> {
        let tables = self.lock()?;
        let t = tables.get(table).ok_or_else(|| missing_table(table))?;
        let idx = t
            .columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| StoreError::Query {
                table: table.to_string(),
                message: format!("column \"{column}\" does not exist"),
            })?;

        Ok(t.rows.iter().filter_map(|r| r[idx].as_text()).collect())
    }

    async fn append_rows(
        &self,
        table: &str,
        columns: &[Column],
        rows: &[Vec<FieldValue>],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let mut tables = self.lock()?;
        let t = tables.get_mut(table).ok_or_else(|| missing_table(table))?;

        let mut slots = Vec::with_capacity(columns.len());
        for c in columns {
            let idx = t
                .columns
                .iter()
                .position(|tc| tc.name == c.name)
                .ok_or_else(|| StoreError::Query {
                    table: table.to_string(),
                    message: format!("column \"{}\" does not exist", c.name),
                })?;
            slots.push(idx);
        }

        let mut written = 0u64;
        for batch in rows.chunks(BATCH_SIZE) {
            let mut staged = Vec::with_capacity(batch.len());
            for row in batch {
                let mut full = vec![FieldValue::Null; t.columns.len()];
                for (value, &slot) in row.iter().zip(&slots) {
                    check_value(table, &t.columns[slot], value)?;
                    full[slot] = value.clone();
                }
                staged.push(full);
            }
            written += staged.len() as u64;
            t.rows.extend(staged);
        }

        Ok(written)
    }
}
