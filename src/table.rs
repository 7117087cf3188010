//! The cleaned, column-typed table.
//!
//! Columns are stored in typed vectors so the runtime type of a column is the
//! variant of its [`ColumnData`]. Nullable variants use `None` for values that
//! failed coercion; string columns carry no nulls.

use std::collections::HashSet;

use anyhow::{Result, bail, ensure};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::data::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum ColumnData {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    DateTime(Vec<Option<NaiveDateTime>>),
    Boolean(Vec<Option<bool>>),
    String(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Integer(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, row: usize) -> Option<Value> {
        match self {
            ColumnData::Integer(v) => v.get(row).copied().flatten().map(Value::Integer),
            ColumnData::Float(v) => v.get(row).copied().flatten().map(Value::Float),
            ColumnData::DateTime(v) => v.get(row).copied().flatten().map(Value::DateTime),
            ColumnData::Boolean(v) => v.get(row).copied().flatten().map(Value::Boolean),
            ColumnData::String(v) => v.get(row).cloned().map(Value::String),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Integer(_) | ColumnData::Float(_))
    }

    /// Non-null numeric values in row order, or `None` for non-numeric columns.
    pub fn numeric_values(&self) -> Option<Vec<f64>> {
        match self {
            ColumnData::Integer(v) => Some(v.iter().flatten().map(|i| *i as f64).collect()),
            ColumnData::Float(v) => Some(v.iter().flatten().copied().collect()),
            _ => None,
        }
    }

    pub fn datetime_values(&self) -> Option<Vec<NaiveDateTime>> {
        match self {
            ColumnData::DateTime(v) => Some(v.iter().flatten().copied().collect()),
            _ => None,
        }
    }

    /// Keeps the rows whose flag is set.
    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        fn filter<T>(values: &mut Vec<T>, keep: &[bool]) {
            let mut flags = keep.iter();
            values.retain(|_| flags.next().copied().unwrap_or(false));
        }
        match self {
            ColumnData::Integer(v) => filter(v, keep),
            ColumnData::Float(v) => filter(v, keep),
            ColumnData::DateTime(v) => filter(v, keep),
            ColumnData::Boolean(v) => filter(v, keep),
            ColumnData::String(v) => filter(v, keep),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

#[derive(Deserialize)]
struct TableParts {
    columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableParts")]
pub struct CanonicalTable {
    columns: Vec<Column>,
}

impl TryFrom<TableParts> for CanonicalTable {
    type Error = anyhow::Error;

    fn try_from(parts: TableParts) -> Result<Self> {
        CanonicalTable::new(parts.columns)
    }
}

impl CanonicalTable {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        ensure!(!columns.is_empty(), "A table requires at least one column");
        let row_count = columns[0].data.len();
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            ensure!(!column.name.is_empty(), "Column identifiers cannot be empty");
            if !seen.insert(column.name.as_str()) {
                bail!("Duplicate column identifier '{}'", column.name);
            }
            ensure!(
                column.data.len() == row_count,
                "Column '{}' holds {} value(s) but the table has {} row(s)",
                column.name,
                column.data.len(),
                row_count
            );
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn row(&self, index: usize) -> Vec<Option<Value>> {
        self.columns.iter().map(|c| c.data.get(index)).collect()
    }

    /// Rows as JSON records keyed by column identifier, limited to `limit` rows.
    pub fn records(&self, limit: usize) -> Vec<serde_json::Map<String, serde_json::Value>> {
        (0..self.row_count().min(limit))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| {
                        let value = column
                            .data
                            .get(row)
                            .map_or(serde_json::Value::Null, |v| v.to_json());
                        (column.name.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.data.is_numeric())
    }

    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            column.data.retain_rows(keep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CanonicalTable {
        CanonicalTable::new(vec![
            Column::new("id", ColumnData::Integer(vec![Some(1), None, Some(3)])),
            Column::new(
                "name",
                ColumnData::String(vec!["a".into(), "b".into(), "".into()]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn new_rejects_duplicate_and_ragged_columns() {
        let dup = CanonicalTable::new(vec![
            Column::new("a", ColumnData::Boolean(vec![Some(true)])),
            Column::new("a", ColumnData::Boolean(vec![Some(false)])),
        ]);
        assert!(dup.is_err());
        let ragged = CanonicalTable::new(vec![
            Column::new("a", ColumnData::Boolean(vec![Some(true)])),
            Column::new("b", ColumnData::Boolean(vec![])),
        ]);
        assert!(ragged.is_err());
    }

    #[test]
    fn records_render_nulls_and_respect_limit() {
        let table = sample();
        let records = table.records(2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["id"], serde_json::Value::Null);
        assert_eq!(records[1]["name"], serde_json::json!("b"));
    }

    #[test]
    fn retain_rows_filters_every_column() {
        let mut table = sample();
        table.retain_rows(&[true, false, true]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.row(1),
            vec![Some(Value::Integer(3)), Some(Value::String(String::new()))]
        );
    }

    #[test]
    fn serde_round_trip_revalidates() {
        let table = sample();
        let json = serde_json::to_string(&table).unwrap();
        let back: CanonicalTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
        let broken = r#"{"columns":[]}"#;
        assert!(serde_json::from_str::<CanonicalTable>(broken).is_err());
    }
}
