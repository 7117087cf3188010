//! Chart variant selection and chart configuration assembly.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::SchemaDescriptor;

pub const PROFESSIONAL_COLORS: [&str; 5] = ["#1e40af", "#0f172a", "#475569", "#3b82f6", "#60a5fa"];

pub const DEFAULT_CHART_TITLE: &str = "Analysis Chart";
pub const CHART_ERROR_DESCRIPTION: &str = "Chart configuration error";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    #[default]
    Bar,
    Pie,
    Area,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Pie => "pie",
            ChartType::Area => "area",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["line", "bar", "pie", "area"]
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact, case-sensitive match on the wire tokens.
impl FromStr for ChartType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "line" => Ok(ChartType::Line),
            "bar" => Ok(ChartType::Bar),
            "pie" => Ok(ChartType::Pie),
            "area" => Ok(ChartType::Area),
            _ => Err(anyhow!(
                "Unknown chart type '{value}'. Supported types: {}",
                ChartType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub chart_type: ChartType,
    pub data: Vec<Map<String, Value>>,
    #[serde(default)]
    pub x_axis: Option<String>,
    #[serde(default)]
    pub y_axis: Option<String>,
    #[serde(default = "palette")]
    pub colors: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn palette() -> Vec<String> {
    PROFESSIONAL_COLORS.iter().map(|c| c.to_string()).collect()
}

/// Honors a valid recommendation, otherwise picks by analysis type.
pub fn select_chart_type(
    _data: &[Value],
    analysis_type: &str,
    recommended: Option<&str>,
) -> ChartType {
    if let Some(chart) = recommended.and_then(|r| r.parse::<ChartType>().ok()) {
        return chart;
    }
    match analysis_type {
        "trend" => ChartType::Line,
        "anomaly" | "executive_summary" => ChartType::Bar,
        _ => ChartType::Bar,
    }
}

/// Builds a chart configuration. Axes come from the first record's keys in
/// order. Records that are not flat objects produce a minimal configuration
/// with no data.
pub fn generate_chart_config(
    chart_type: &str,
    data: &[Value],
    schema: &SchemaDescriptor,
    title: &str,
    description: Option<&str>,
) -> ChartConfig {
    match build_chart_config(chart_type, data, schema, title, description) {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to generate chart config: {err}");
            ChartConfig {
                chart_type: ChartType::Bar,
                data: Vec::new(),
                x_axis: None,
                y_axis: None,
                colors: palette(),
                title: title.to_string(),
                description: Some(CHART_ERROR_DESCRIPTION.to_string()),
            }
        }
    }
}

fn build_chart_config(
    chart_type: &str,
    data: &[Value],
    schema: &SchemaDescriptor,
    title: &str,
    description: Option<&str>,
) -> Result<ChartConfig> {
    let records = data
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            item.as_object()
                .cloned()
                .ok_or_else(|| anyhow!("chart record {idx} is not an object: {item}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut keys = records.first().into_iter().flat_map(|record| record.keys());
    let x_axis = keys.next().cloned();
    let y_axis = keys.next().cloned();
    for axis in x_axis.iter().chain(y_axis.iter()) {
        if schema.get(axis).is_none() {
            debug!("Chart axis '{axis}' is not a column of the source table");
        }
    }

    Ok(ChartConfig {
        chart_type: chart_type.parse().unwrap_or_default(),
        data: records,
        x_axis,
        y_axis,
        colors: palette(),
        title: title.to_string(),
        description: description.map(str::to_string),
    })
}

/// Re-asserts the palette and title-cases the title.
pub fn apply_professional_styling(mut config: ChartConfig) -> ChartConfig {
    config.colors = palette();
    config.title = if config.title.is_empty() {
        DEFAULT_CHART_TITLE.to_string()
    } else {
        title_case(&config.title)
    };
    config
}

/// Upper-cases the first letter of every run of letters and lower-cases the
/// rest, so `"3d sales"` becomes `"3D Sales"`.
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                result.extend(ch.to_lowercase());
            } else {
                result.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(ch);
            in_word = false;
        }
    }
    result
}
