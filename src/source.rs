//! Raw table sources.
//!
//! A [`RawTable`] is the untyped, rectangular view handed over by a file
//! parser: ordered raw labels plus rows of [`Cell`]s. Two loaders are provided,
//! CSV (every field is text) and JSON records (cells keep their JSON types, the
//! shape a spreadsheet extractor produces).

use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::debug;
use thiserror::Error;

use crate::{data::Cell, io_utils};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("input is not tabular: {0}")]
    NotTabular(String),
    #[error("row {row} has {found} field(s) but the header declares {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("input declares no columns")]
    NoColumns,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        if headers.is_empty() {
            return Err(TableError::NoColumns);
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(TableError::Ragged {
                    row: idx,
                    expected: headers.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { headers, rows })
    }

    /// Builds a table from a JSON array of objects. Columns appear in first-seen
    /// key order and keys missing from a record become empty cells.
    pub fn from_json_records(value: &serde_json::Value) -> Result<Self, TableError> {
        let records = value
            .as_array()
            .ok_or_else(|| TableError::NotTabular("expected a JSON array of records".into()))?;
        let mut headers: Vec<String> = Vec::new();
        for (idx, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or_else(|| {
                TableError::NotTabular(format!("record {idx} is not a JSON object"))
            })?;
            for key in object.keys() {
                if !headers.iter().any(|existing| existing == key) {
                    headers.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            let Some(object) = record.as_object() else {
                continue;
            };
            let row = headers
                .iter()
                .map(|header| match object.get(header) {
                    Some(value) => Cell::from_json(value).map_err(|err| {
                        TableError::NotTabular(format!("record {idx}, field '{header}': {err}"))
                    }),
                    None => Ok(Cell::Empty),
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        Self::new(headers, rows)
    }

    pub fn from_json_str(text: &str) -> Result<Self, TableError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|err| TableError::NotTabular(format!("invalid JSON: {err}")))?;
        Self::from_json_records(&value)
    }

    pub fn from_csv_reader<R: std::io::Read>(
        reader: R,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader(reader, delimiter);
        let headers = io_utils::reader_headers(&mut reader, encoding)?;
        let mut rows = Vec::new();
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    if let csv::ErrorKind::UnequalLengths {
                        expected_len, len, ..
                    } = err.kind()
                    {
                        return Err(TableError::Ragged {
                            row: row_idx,
                            expected: *expected_len as usize,
                            found: *len as usize,
                        }
                        .into());
                    }
                    return Err(
                        anyhow::Error::new(err).context(format!("Reading row {}", row_idx + 2))
                    );
                }
            };
            let decoded = io_utils::decode_record(&record, encoding)
                .with_context(|| format!("Decoding row {}", row_idx + 2))?;
            rows.push(
                decoded
                    .into_iter()
                    .map(|field| {
                        if field.is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(field)
                        }
                    })
                    .collect(),
            );
        }
        Ok(Self::new(headers, rows)?)
    }

    /// Loads a table from disk, dispatching on the `.json` extension.
    pub fn load(path: &Path, delimiter: Option<u8>, encoding: &'static Encoding) -> Result<Self> {
        let table = if io_utils::has_json_extension(path) {
            let text = io_utils::read_to_string(path)?;
            Self::from_json_str(&text)?
        } else {
            let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
            Self::from_csv_reader(io_utils::open_input(path)?, delimiter, encoding)
                .with_context(|| format!("Reading table from {path:?}"))?
        };
        debug!(
            "Loaded {} row(s) across {} column(s) from {:?}",
            table.row_count(),
            table.headers.len(),
            path
        );
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.headers, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;
    use serde_json::json;

    #[test]
    fn json_records_union_keys_in_first_seen_order() {
        let table = RawTable::from_json_records(&json!([
            {"b": 1, "a": "x"},
            {"a": "y", "c": true}
        ]))
        .unwrap();
        assert_eq!(table.headers(), ["b", "a", "c"]);
        assert_eq!(
            table.rows()[1],
            vec![Cell::Empty, Cell::text("y"), Cell::Boolean(true)]
        );
    }

    #[test]
    fn json_scalar_is_not_tabular() {
        let err = RawTable::from_json_str("\"hello\"").unwrap_err();
        assert!(matches!(err, TableError::NotTabular(_)));
        let err = RawTable::from_json_records(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, TableError::NotTabular(_)));
    }

    #[test]
    fn empty_record_list_has_no_columns() {
        let err = RawTable::from_json_records(&json!([])).unwrap_err();
        assert!(matches!(err, TableError::NoColumns));
    }

    #[test]
    fn csv_fields_become_text_cells() {
        let input = "id,name\n1,\n2,Bob\n";
        let table = RawTable::from_csv_reader(input.as_bytes(), b',', UTF_8).unwrap();
        assert_eq!(table.headers(), ["id", "name"]);
        assert_eq!(table.rows()[0], vec![Cell::text("1"), Cell::Empty]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn ragged_csv_is_fatal() {
        let input = "id,name\n1,Ann,extra\n";
        let err = RawTable::from_csv_reader(input.as_bytes(), b',', UTF_8).unwrap_err();
        let table_err = err.downcast_ref::<TableError>().expect("table error");
        assert!(matches!(table_err, TableError::Ragged { row: 0, .. }));
    }
}
