//! Reading GTFS text files into normalized in-memory tables.

use chrono::NaiveDate;
use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::LoadError;

/// Columns holding `YYYYMMDD` dates anywhere in a GTFS feed.
pub const DATE_COLUMNS: &[&str] = &[
    "start_date",
    "end_date",
    "date",
    "feed_start_date",
    "feed_end_date",
];

/// Identifier columns, always kept as text.
pub const ID_COLUMNS: &[&str] = &["trip_id", "route_id", "stop_id", "service_id", "shape_id"];

/// A single normalized cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Null,
    Text(String),
    Date(NaiveDate),
}

impl FieldValue {
    /// Text form used for key comparison and for binding to the store.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

/// Parsed contents of one GTFS file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl FeedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keeps only rows whose `column` value is in `valid` and returns the
    /// number of rows dropped, or `None` (rows untouched) when the file has no
    /// such column.
    pub fn retain_valid_keys(
        &mut self,
        column: &str,
        valid: &std::collections::HashSet<String>,
    ) -> Option<usize> {
        let idx = self.column_index(column)?;
        let before = self.rows.len();
        self.rows.retain(|row| {
            row.get(idx)
                .and_then(FieldValue::as_text)
                .is_some_and(|key| valid.contains(&key))
        });
        Some(before - self.rows.len())
    }

    /// Projects onto `columns` (which must be a subset of the headers, in any order).
    pub fn project(&self, columns: &[String]) -> Vec<Vec<FieldValue>> {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();

        self.rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(FieldValue::Null))
                    .collect()
            })
            .collect()
    }
}

/// Parses a GTFS `YYYYMMDD` date. Anything other than eight digits forming a
/// real calendar date yields `None`.
pub fn parse_gtfs_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y%m%d").ok()
}

/// Reads and normalizes a GTFS file from disk.
///
/// # Errors
///
/// [`LoadError::MissingFile`] when the file does not exist, [`LoadError::Csv`]
/// when it cannot be parsed.
pub fn read_feed_file(path: &Path) -> Result<FeedTable, LoadError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::MissingFile {
            path: path.to_path_buf(),
        },
        _ => LoadError::Csv {
            path: path.to_path_buf(),
            source: csv::Error::from(e),
        },
    })?;

    parse_feed(file).map_err(|source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses delimited GTFS data with a header row and normalizes date columns.
///
/// Short rows are padded with nulls. A row with more fields than the header
/// is an error.
pub fn parse_feed<R: io::Read>(reader: R) -> Result<FeedTable, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    let date_mask: Vec<bool> = headers
        .iter()
        .map(|h| DATE_COLUMNS.contains(&h.as_str()))
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.len() > headers.len() {
            let line = record.position().map_or(0, |p| p.line());
            return Err(csv::Error::from(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "line {line}: expected {} fields, saw {}",
                    headers.len(),
                    record.len()
                ),
            )));
        }
        let row = headers
            .iter()
            .enumerate()
            .map(|(i, _)| match record.get(i) {
                None | Some("") => FieldValue::Null,
                Some(raw) if date_mask[i] => {
                    parse_gtfs_date(raw).map_or(FieldValue::Null, FieldValue::Date)
                }
                Some(raw) => FieldValue::Text(raw.to_string()),
            })
            .collect();
        rows.push(row);
    }

    Ok(FeedTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> FieldValue {
        FieldValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_parse_gtfs_date_valid() {
        assert_eq!(
            parse_gtfs_date("20240115"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn test_parse_gtfs_date_rejects_malformed() {
        assert_eq!(parse_gtfs_date("2024-01-15"), None);
        assert_eq!(parse_gtfs_date("20241332"), None);
        assert_eq!(parse_gtfs_date("abcdefgh"), None);
        assert_eq!(parse_gtfs_date("2024011"), None);
        assert_eq!(parse_gtfs_date(""), None);
    }

    #[test]
    fn test_parse_feed_normalizes_dates_and_keeps_ids_as_text() {
        let data = "\u{feff}service_id,monday,start_date,end_date\n\
                    007,1,20240115,not-a-date\n";
        let table = parse_feed(data.as_bytes()).unwrap();

        assert_eq!(table.headers[0], "service_id");
        assert_eq!(table.rows[0][0], FieldValue::Text("007".into()));
        assert_eq!(table.rows[0][2], date(2024, 1, 15));
        assert_eq!(table.rows[0][3], FieldValue::Null);
    }

    #[test]
    fn test_parse_feed_empty_cells_are_null() {
        let data = "stop_id,stop_name,stop_lat\nS1,,44.6\n";
        let table = parse_feed(data.as_bytes()).unwrap();
        assert_eq!(table.rows[0][1], FieldValue::Null);
    }

    #[test]
    fn test_retain_valid_keys_counts_orphans() {
        let data = "trip_id,service_id\nT1,WK\nT2,SAT\nT3,GONE\nT4,\n";
        let mut table = parse_feed(data.as_bytes()).unwrap();
        let valid: HashSet<String> = ["WK".to_string(), "SAT".to_string()].into();

        let dropped = table.retain_valid_keys("service_id", &valid);

        assert_eq!(dropped, Some(2));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_retain_valid_keys_without_column_leaves_rows() {
        let data = "trip_id,route_id\nT1,R1\n";
        let mut table = parse_feed(data.as_bytes()).unwrap();
        let dropped = table.retain_valid_keys("service_id", &HashSet::new());
        assert_eq!(dropped, None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_parse_feed_pads_short_rows() {
        let data = "stop_id,stop_name,stop_lat,stop_lon\nS1,Main,44.6,-63.5\nS2,Side\n";
        let table = parse_feed(data.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.rows[1],
            vec![
                FieldValue::Text("S2".into()),
                FieldValue::Text("Side".into()),
                FieldValue::Null,
                FieldValue::Null,
            ]
        );
    }

    #[test]
    fn test_parse_feed_rejects_long_rows() {
        let data = "stop_id,stop_name\nS1,Main\nS2,Side,extra\n";
        let err = parse_feed(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("expected 2 fields, saw 3"));
    }

    #[test]
    fn test_project_reorders_and_drops() {
        let data = "a,b,c\n1,2,3\n";
        let table = parse_feed(data.as_bytes()).unwrap();
        let rows = table.project(&["c".to_string(), "a".to_string()]);
        assert_eq!(
            rows,
            vec![vec![FieldValue::Text("3".into()), FieldValue::Text("1".into())]]
        );
    }

    #[test]
    fn test_read_missing_file() {
        let path = std::env::temp_dir().join("gtfs_loader_definitely_missing.txt");
        let result = read_feed_file(&path);
        assert!(matches!(result, Err(LoadError::MissingFile { .. })));
    }
}
