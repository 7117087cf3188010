//! Column label canonicalization.
//!
//! Raw labels become lower-case `[a-z0-9_]` identifiers. Labels that normalize
//! to nothing fall back to `column_<position>`, and identifiers that collide
//! with an earlier one receive the smallest free `_<n>` suffix, so the result is
//! always unique.

use std::collections::HashSet;

use log::{debug, warn};

/// Share of blank or spreadsheet-placeholder labels above which the header row
/// probably spans several physical rows.
const MULTI_ROW_HEADER_THRESHOLD_PERCENT: usize = 30;

/// Normalizes one label without regard to its neighbours. Returns `None` when
/// nothing survives normalization.
pub fn normalize_label(label: &str) -> Option<String> {
    let lowered = label.to_lowercase();
    let mut result = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                result.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            if ch == '_' && result.ends_with('_') {
                continue;
            }
            result.push(ch);
        }
    }
    // Stripping characters can leave fresh underscore runs behind ("a _ b").
    let mut collapsed = String::with_capacity(result.len());
    for ch in result.chars() {
        if ch == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(ch);
    }
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Canonicalizes an ordered label sequence into unique identifiers of the same
/// length and order.
pub fn normalize_headers<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    warn_on_multi_row_header(labels);
    let mut taken: HashSet<String> = HashSet::with_capacity(labels.len());
    let mut identifiers = Vec::with_capacity(labels.len());
    for (position, label) in labels.iter().enumerate() {
        let base =
            normalize_label(label.as_ref()).unwrap_or_else(|| format!("column_{position}"));
        let identifier = disambiguate(&base, &taken);
        if identifier != base {
            debug!(
                "Header '{}' collides with an earlier column; renamed to '{identifier}'",
                label.as_ref()
            );
        }
        taken.insert(identifier.clone());
        identifiers.push(identifier);
    }
    identifiers
}

fn disambiguate(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut suffix = 1usize;
    loop {
        let candidate = format!("{base}_{suffix}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

fn warn_on_multi_row_header<S: AsRef<str>>(labels: &[S]) {
    if labels.is_empty() {
        return;
    }
    let placeholders = labels
        .iter()
        .filter(|label| {
            let trimmed = label.as_ref().trim();
            trimmed.is_empty() || trimmed.starts_with("Unnamed")
        })
        .count();
    if placeholders * 100 > labels.len() * MULTI_ROW_HEADER_THRESHOLD_PERCENT {
        warn!(
            "{placeholders} of {} header label(s) are blank or unnamed; the source may use a multi-row header",
            labels.len()
        );
    }
}
