//! Strict insight records validated from loosely-typed producer output.

use std::fmt;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_TITLE: &str = "Untitled Insight";
pub const DEFAULT_DESCRIPTION: &str = "No description available";
pub const INVALID_TITLE: &str = "Insight non valido";
pub const INVALID_DESCRIPTION: &str = "Impossibile processare questo insight";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightItem {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub metric_value: Option<f64>,
    #[serde(default)]
    pub metric_label: Option<String>,
}

impl InsightItem {
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
            metric_value: None,
            metric_label: None,
        }
    }

    pub fn invalid_placeholder() -> Self {
        Self::new(INVALID_TITLE, INVALID_DESCRIPTION, Severity::Low)
    }
}

/// Wire shape of one insight as the producer emits it. Absent fields fall back
/// to defaults. An explicit null title, description or severity is rejected
/// like a value of the wrong type; the metric fields accept null.
#[derive(Debug, Deserialize)]
struct RawInsight {
    #[serde(default, deserialize_with = "non_null")]
    title: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    description: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    severity: Option<Severity>,
    #[serde(default, deserialize_with = "lenient_number")]
    metric_value: Option<f64>,
    #[serde(default)]
    metric_label: Option<String>,
}

impl From<RawInsight> for InsightItem {
    fn from(raw: RawInsight) -> Self {
        Self {
            title: non_blank(raw.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: non_blank(raw.description)
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            severity: raw.severity.unwrap_or_default(),
            metric_value: raw.metric_value,
            metric_label: raw.metric_label,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

/// Only runs for present fields, so `None` always means absent.
fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Accepts JSON numbers and numeric strings such as `"12.5"`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("'{text}' is not a number"))),
    }
}

pub fn validate_insight(item: &Value) -> InsightItem {
    match RawInsight::deserialize(item) {
        Ok(raw) => raw.into(),
        Err(err) => {
            warn!("Failed to validate insight: {item}. Error: {err}");
            InsightItem::invalid_placeholder()
        }
    }
}

/// Validates the `insights` list of a producer output. The result has one
/// entry per raw item, in order. A missing or non-list entry yields nothing.
pub fn validate_insights(raw: &Map<String, Value>) -> Vec<InsightItem> {
    match raw.get("insights") {
        Some(Value::Array(items)) => items.iter().map(validate_insight).collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            warn!("Ignoring 'insights' entry that is not a list: {other}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn absent_fields_take_defaults() {
        let items = validate_insights(&output(json!({"insights": [{}]})));
        assert_eq!(
            items,
            vec![InsightItem::new(
                DEFAULT_TITLE,
                DEFAULT_DESCRIPTION,
                Severity::Medium
            )]
        );
    }

    #[test]
    fn valid_item_is_kept_verbatim() {
        let items = validate_insights(&output(json!({"insights": [{
            "title": "Sales up",
            "description": "Q3 grew 12%",
            "severity": "high",
            "metric_value": 12,
            "metric_label": "growth %"
        }]})));
        assert_eq!(items[0].title, "Sales up");
        assert_eq!(items[0].severity, Severity::High);
        assert_eq!(items[0].metric_value, Some(12.0));
        assert_eq!(items[0].metric_label.as_deref(), Some("growth %"));
    }

    #[test]
    fn invalid_items_become_placeholders_in_place() {
        let items = validate_insights(&output(json!({"insights": [
            {"title": "ok"},
            {"title": "bad", "severity": "critical"},
            "just text",
            {"title": 42},
            {"title": "bad metric", "metric_value": "lots"}
        ]})));
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].title, "ok");
        for item in &items[1..] {
            assert_eq!(item, &InsightItem::invalid_placeholder());
        }
    }

    #[test]
    fn null_core_fields_become_placeholders() {
        let item = validate_insight(&json!({"title": "t", "description": "d", "severity": null}));
        assert_eq!(item, InsightItem::invalid_placeholder());
        assert_eq!(item.severity, Severity::Low);
        assert_eq!(
            validate_insight(&json!({"title": null})),
            InsightItem::invalid_placeholder()
        );
        assert_eq!(
            validate_insight(&json!({"title": "t", "description": null})),
            InsightItem::invalid_placeholder()
        );
    }

    #[test]
    fn null_metric_fields_are_accepted() {
        let item = validate_insight(&json!({
            "title": "t",
            "severity": "high",
            "metric_value": null,
            "metric_label": null
        }));
        assert_eq!(item.title, "t");
        assert_eq!(item.severity, Severity::High);
        assert_eq!(item.metric_value, None);
        assert_eq!(item.metric_label, None);
    }

    #[test]
    fn numeric_strings_are_accepted_as_metric_values() {
        let item = validate_insight(&json!({"metric_value": " 3.5 ", "title": ""}));
        assert_eq!(item.metric_value, Some(3.5));
        assert_eq!(item.title, DEFAULT_TITLE);
    }

    #[test]
    fn missing_insights_list_yields_nothing() {
        assert!(validate_insights(&output(json!({"chart_data": []}))).is_empty());
        assert!(validate_insights(&output(json!({"insights": "oops"}))).is_empty());
    }
}
