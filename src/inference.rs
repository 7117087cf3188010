//! Per-column type inference and coercion.
//!
//! Policy, first match wins:
//!
//! 1. every non-empty cell already carries one upstream type (numeric,
//!    boolean or date/time) → keep it;
//! 2. more than [`TYPE_MAJORITY_RATIO`] of the rows parse as numbers →
//!    numeric, unparseable cells become null;
//! 3. same rule for date/time values;
//! 4. otherwise every cell, nulls included, becomes its string form.
//!
//! The ratio is measured against the total row count, so empty cells count
//! against a type.

use log::debug;

use crate::{
    data::{Cell, Numeric, parse_numeric, parse_temporal},
    table::ColumnData,
};

/// A column adopts a coerced type only when strictly more than this share of
/// its rows coerce successfully.
pub const TYPE_MAJORITY_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceRule {
    Upstream,
    Numeric,
    Temporal,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferredColumn {
    pub data: ColumnData,
    pub rule: InferenceRule,
    /// Non-empty cells that became null during coercion.
    pub coercion_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpstreamKind {
    Integer,
    Float,
    Boolean,
    DateTime,
}

pub fn exceeds_majority(successes: usize, total_rows: usize) -> bool {
    successes > 0 && successes as f64 > total_rows as f64 * TYPE_MAJORITY_RATIO
}

pub fn infer_column(cells: &[Cell], total_rows: usize) -> InferredColumn {
    if let Some(kind) = upstream_kind(cells) {
        return InferredColumn {
            data: keep_upstream(cells, kind),
            rule: InferenceRule::Upstream,
            coercion_failures: 0,
        };
    }

    let numeric: Vec<Option<Numeric>> = cells.iter().map(coerce_numeric).collect();
    let parsed = numeric.iter().flatten().count();
    if exceeds_majority(parsed, total_rows) {
        let all_integral = numeric
            .iter()
            .flatten()
            .all(|n| matches!(n, Numeric::Integer(_)));
        let data = if all_integral {
            ColumnData::Integer(
                numeric
                    .into_iter()
                    .map(|n| match n {
                        Some(Numeric::Integer(i)) => Some(i),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            ColumnData::Float(numeric.into_iter().map(|n| n.map(Numeric::as_f64)).collect())
        };
        return InferredColumn {
            data,
            rule: InferenceRule::Numeric,
            coercion_failures: non_empty(cells) - parsed,
        };
    }

    let temporal: Vec<_> = cells.iter().map(coerce_temporal).collect();
    let parsed_temporal = temporal.iter().flatten().count();
    if exceeds_majority(parsed_temporal, total_rows) {
        return InferredColumn {
            data: ColumnData::DateTime(temporal),
            rule: InferenceRule::Temporal,
            coercion_failures: non_empty(cells) - parsed_temporal,
        };
    }

    debug!(
        "Falling back to string: {parsed} numeric and {parsed_temporal} temporal value(s) out of {total_rows} row(s)"
    );
    InferredColumn {
        data: ColumnData::String(cells.iter().map(Cell::as_display).collect()),
        rule: InferenceRule::Text,
        coercion_failures: 0,
    }
}

fn non_empty(cells: &[Cell]) -> usize {
    cells.iter().filter(|c| !c.is_empty()).count()
}

fn upstream_kind(cells: &[Cell]) -> Option<UpstreamKind> {
    let mut kind: Option<UpstreamKind> = None;
    for cell in cells.iter().filter(|c| !c.is_empty()) {
        let observed = match cell {
            Cell::Integer(_) => UpstreamKind::Integer,
            Cell::Float(_) => UpstreamKind::Float,
            Cell::Boolean(_) => UpstreamKind::Boolean,
            Cell::DateTime(_) => UpstreamKind::DateTime,
            Cell::Text(_) | Cell::Empty => return None,
        };
        kind = match (kind, observed) {
            (None, observed) => Some(observed),
            (Some(current), observed) if current == observed => Some(current),
            (Some(UpstreamKind::Integer), UpstreamKind::Float)
            | (Some(UpstreamKind::Float), UpstreamKind::Integer) => Some(UpstreamKind::Float),
            _ => return None,
        };
    }
    kind
}

fn keep_upstream(cells: &[Cell], kind: UpstreamKind) -> ColumnData {
    match kind {
        UpstreamKind::Integer => ColumnData::Integer(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect(),
        ),
        UpstreamKind::Float => ColumnData::Float(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Integer(i) => Some(*i as f64),
                    Cell::Float(f) => Some(*f),
                    _ => None,
                })
                .collect(),
        ),
        UpstreamKind::Boolean => ColumnData::Boolean(
            cells
                .iter()
                .map(|c| match c {
                    Cell::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect(),
        ),
        UpstreamKind::DateTime => ColumnData::DateTime(
            cells
                .iter()
                .map(|c| match c {
                    Cell::DateTime(dt) => Some(*dt),
                    _ => None,
                })
                .collect(),
        ),
    }
}

fn coerce_numeric(cell: &Cell) -> Option<Numeric> {
    match cell {
        Cell::Integer(i) => Some(Numeric::Integer(*i)),
        Cell::Float(f) if f.is_finite() => Some(Numeric::Float(*f)),
        Cell::Text(text) => parse_numeric(text),
        _ => None,
    }
}

fn coerce_temporal(cell: &Cell) -> Option<chrono::NaiveDateTime> {
    match cell {
        Cell::DateTime(dt) => Some(*dt),
        Cell::Text(text) => parse_temporal(text),
        _ => None,
    }
}
