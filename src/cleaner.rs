//! Raw table → canonical table.
//!
//! Steps run in a fixed order because later row counts depend on earlier
//! ones: drop fully-empty rows, normalize headers, drop raw duplicates, infer
//! column types, then settle rows that coercion made empty or identical.
//! Row positions in the result are contiguous from 0.

use std::collections::HashSet;

use anyhow::Result;
use log::{debug, info};
use serde::Serialize;

use crate::{
    data::{Cell, Value},
    headers::normalize_headers,
    inference::{InferenceRule, infer_column},
    source::RawTable,
    table::{CanonicalTable, Column},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub empty_rows_removed: usize,
    pub duplicate_rows_removed: usize,
    /// Rows dropped after coercion left them empty or equal to an earlier row.
    pub rows_settled: usize,
    pub output_rows: usize,
    pub coercion_failures: usize,
}

#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub table: CanonicalTable,
    pub report: CleaningReport,
}

pub fn clean_table(raw: RawTable) -> Result<CleanedTable> {
    let (labels, rows) = raw.into_parts();
    let mut report = CleaningReport {
        input_rows: rows.len(),
        ..CleaningReport::default()
    };

    let rows: Vec<Vec<Cell>> = rows
        .into_iter()
        .filter(|row| !row.iter().all(Cell::is_empty))
        .collect();
    report.empty_rows_removed = report.input_rows - rows.len();

    let identifiers = normalize_headers(&labels);

    let before_dedupe = rows.len();
    let mut seen: HashSet<Vec<Option<String>>> = HashSet::with_capacity(rows.len());
    let rows: Vec<Vec<Cell>> = rows
        .into_iter()
        .filter(|row| seen.insert(row.iter().map(Cell::raw_repr).collect()))
        .collect();
    report.duplicate_rows_removed = before_dedupe - rows.len();

    let total_rows = rows.len();
    let mut columns = Vec::with_capacity(identifiers.len());
    for (idx, identifier) in identifiers.into_iter().enumerate() {
        let cells: Vec<Cell> = rows.iter().map(|row| row[idx].clone()).collect();
        let inferred = infer_column(&cells, total_rows);
        debug!(
            "Column '{identifier}' inferred via {:?} ({} coercion failure(s))",
            inferred.rule, inferred.coercion_failures
        );
        if inferred.rule != InferenceRule::Text {
            report.coercion_failures += inferred.coercion_failures;
        }
        columns.push(Column::new(identifier, inferred.data));
    }

    let mut table = CanonicalTable::new(columns)?;
    report.rows_settled = settle_rows(&mut table);
    report.output_rows = table.row_count();

    info!(
        "Cleaned {} row(s) into {} row(s) across {} column(s)",
        report.input_rows,
        report.output_rows,
        table.columns().len()
    );
    Ok(CleanedTable { table, report })
}

/// Drops rows that coercion turned fully empty or into copies of an earlier
/// row. Returns the number of rows removed.
fn settle_rows(table: &mut CanonicalTable) -> usize {
    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(table.row_count());
    let keep: Vec<bool> = (0..table.row_count())
        .map(|idx| {
            let row = table.row(idx);
            if row.iter().all(|v| v.as_ref().is_none_or(Value::is_blank)) {
                return false;
            }
            seen.insert(row.iter().map(row_key).collect())
        })
        .collect();
    let removed = keep.iter().filter(|k| !**k).count();
    if removed > 0 {
        table.retain_rows(&keep);
    }
    removed
}

fn row_key(value: &Option<Value>) -> String {
    match value {
        None => "\u{0}null".to_string(),
        Some(v) => v.as_display(),
    }
}
