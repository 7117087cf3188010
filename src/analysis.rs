//! Analysis orchestration: one record per requested analysis type.
//!
//! Request-level problems (unknown file, file not completed, no data) abort
//! the run. Anything that goes wrong inside one analysis type is contained:
//! a producer failure degrades to a "not available" output and every other
//! error is stored as a failed record before moving to the next type.

use std::{fmt, str::FromStr};

use anyhow::{Context, anyhow};
use chrono::Utc;
use heck::ToTitleCase;
use log::{error, info, warn};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    charts::{ChartConfig, apply_professional_styling, generate_chart_config, select_chart_type},
    insights::{InsightItem, Severity, validate_insights},
    metadata::enrich_metadata,
    producer::InsightProducer,
    prompt::PromptContext,
    response::parse_response,
    schema::SchemaDescriptor,
    settings::AnalysisSettings,
    store::{AnalysisRecord, FileRecord, FileStatus, ProcessedData, RecordMetadata, ResultStore},
};

pub const FAILED_TITLE: &str = "Analisi fallita";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Trend,
    Anomaly,
    ExecutiveSummary,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Trend => "trend",
            AnalysisType::Anomaly => "anomaly",
            AnalysisType::ExecutiveSummary => "executive_summary",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["trend", "anomaly", "executive_summary"]
    }

    /// Human title, e.g. `Executive Summary`.
    pub fn title(&self) -> String {
        self.as_str().to_title_case()
    }

    pub fn chart_title(&self) -> String {
        format!("{} Analysis", self.title())
    }

    pub fn chart_description(&self) -> String {
        format!("AI-generated {} insights", self.as_str())
    }

    /// Output used in place of a producer response that could not be obtained.
    pub fn unavailable_output(&self, reason: &str) -> Map<String, Value> {
        let value = match self {
            AnalysisType::Trend => json!({
                "insights": [{
                    "title": "Analisi non disponibile",
                    "description": format!("Errore durante l'analisi: {reason}"),
                    "severity": "low"
                }],
                "chart_data": [],
                "recommended_chart": "bar"
            }),
            AnalysisType::Anomaly => json!({
                "insights": [{
                    "title": "Analisi anomalie non disponibile",
                    "description": format!("Errore durante il rilevamento: {reason}"),
                    "severity": "low"
                }],
                "anomalies": []
            }),
            AnalysisType::ExecutiveSummary => json!({
                "insights": [{
                    "title": "Executive Summary non disponibile",
                    "description": format!("Errore durante la generazione: {reason}"),
                    "severity": "low"
                }],
                "key_metrics": [],
                "recommendations": []
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "trend" => Ok(AnalysisType::Trend),
            "anomaly" => Ok(AnalysisType::Anomaly),
            "executive_summary" => Ok(AnalysisType::ExecutiveSummary),
            _ => Err(anyhow!(
                "Unknown analysis type '{value}'. Supported types: {}",
                AnalysisType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("file {0} not found")]
    FileNotFound(Uuid),
    #[error("file must be in 'completed' status. Current status: {status}")]
    NotCompleted { id: Uuid, status: String },
    #[error("no processed data available for file {0}")]
    NoProcessedData(Uuid),
    #[error("file {0} has no cleaned data available")]
    EmptyData(Uuid),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub file_id: Uuid,
    /// Records appended during this run, in request order.
    pub results: Vec<AnalysisRecord>,
    pub message: String,
}

impl AnalysisOutcome {
    pub fn completed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|record| !record.metadata.is_failed())
            .count()
    }
}

pub struct AnalysisRunner<'a, P: ?Sized, S: ?Sized> {
    producer: &'a P,
    store: &'a mut S,
    settings: AnalysisSettings,
}

impl<'a, P, S> AnalysisRunner<'a, P, S>
where
    P: InsightProducer + ?Sized,
    S: ResultStore + ?Sized,
{
    pub fn new(producer: &'a P, store: &'a mut S, settings: AnalysisSettings) -> Self {
        Self {
            producer,
            store,
            settings,
        }
    }

    pub fn run(
        &mut self,
        file_id: Uuid,
        analysis_types: &[AnalysisType],
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let (file, processed) = load_inputs(&*self.store, file_id)?;

        let mut results = Vec::with_capacity(analysis_types.len());
        for analysis_type in analysis_types {
            match self.analyze(&file, &processed, *analysis_type) {
                Ok(record) => {
                    info!(
                        "Stored {} analysis {} with {} insight(s)",
                        analysis_type,
                        record.id,
                        record.insights.len()
                    );
                    results.push(record);
                }
                Err(err) => {
                    error!("Error processing {analysis_type} analysis: {err:#}");
                    let record = failed_record(file_id, *analysis_type, &format!("{err:#}"));
                    self.store.append_analysis(&record)?;
                    results.push(record);
                }
            }
        }

        let mut outcome = AnalysisOutcome {
            file_id,
            results,
            message: String::new(),
        };
        outcome.message = format!(
            "Successfully generated {} analysis results",
            outcome.completed_count()
        );
        info!("{}", outcome.message);
        Ok(outcome)
    }

    fn produce(
        &self,
        file: &FileRecord,
        processed: &ProcessedData,
        analysis_type: AnalysisType,
    ) -> Map<String, Value> {
        let response = build_prompt(file, processed, analysis_type, &self.settings)
            .and_then(|prompt| {
                Ok(self
                    .producer
                    .generate(analysis_type, &prompt, &self.settings)?)
            });
        match response {
            Ok(text) => parse_response(&text),
            Err(err) => {
                error!("Error in {analysis_type} analysis: {err:#}");
                analysis_type.unavailable_output(&format!("{err:#}"))
            }
        }
    }

    fn analyze(
        &mut self,
        file: &FileRecord,
        processed: &ProcessedData,
        analysis_type: AnalysisType,
    ) -> anyhow::Result<AnalysisRecord> {
        let raw = self.produce(file, processed, analysis_type);
        let insights = validate_insights(&raw);
        let chart_config = chart_from_output(&raw, analysis_type, &processed.data_schema);
        let metadata = enrich_metadata(&insights, &raw, analysis_type.as_str());
        let record = AnalysisRecord {
            id: Uuid::new_v4(),
            file_id: file.id,
            analysis_type,
            insights,
            chart_config,
            anomalies: optional_field(&raw, "anomalies")?,
            key_metrics: optional_field(&raw, "key_metrics")?,
            recommendations: optional_field(&raw, "recommendations")?,
            metadata: RecordMetadata::Completed(metadata),
            created_at: Utc::now(),
        };
        self.store.append_analysis(&record)?;
        Ok(record)
    }
}

/// Loads the file record and processed data an analysis run needs, rejecting
/// unknown files, files that are not completed and files without rows.
pub fn load_inputs<S: ResultStore + ?Sized>(
    store: &S,
    file_id: Uuid,
) -> Result<(FileRecord, ProcessedData), AnalysisError> {
    let file = store
        .file(file_id)?
        .ok_or(AnalysisError::FileNotFound(file_id))?;
    if file.status != FileStatus::Completed {
        return Err(AnalysisError::NotCompleted {
            id: file_id,
            status: file.status.as_str().to_string(),
        });
    }
    let processed = store
        .processed_data(file_id)?
        .ok_or(AnalysisError::NoProcessedData(file_id))?;
    if processed.cleaned_data.is_empty() {
        return Err(AnalysisError::EmptyData(file_id));
    }
    Ok((file, processed))
}

/// Prompt for one analysis type, as it is sent to the producer.
pub fn build_prompt(
    file: &FileRecord,
    processed: &ProcessedData,
    analysis_type: AnalysisType,
    settings: &AnalysisSettings,
) -> anyhow::Result<String> {
    PromptContext::build(
        analysis_type,
        &processed.cleaned_data,
        &processed.data_schema,
        Some(&file.filename),
        settings,
    )
    .render()
}

/// Builds a styled chart when the output carries a non-empty `chart_data` list.
/// A missing recommendation counts as `bar`.
pub fn chart_from_output(
    raw: &Map<String, Value>,
    analysis_type: AnalysisType,
    schema: &SchemaDescriptor,
) -> Option<ChartConfig> {
    let data = match raw.get("chart_data") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(Value::Array(_)) | Some(Value::Null) | None => return None,
        Some(other) => {
            warn!("Ignoring 'chart_data' entry that is not a list: {other}");
            return None;
        }
    };
    let recommended = match raw.get("recommended_chart") {
        None => Some("bar"),
        Some(value) => value.as_str(),
    };
    let chart_type = select_chart_type(data, analysis_type.as_str(), recommended);
    let config = generate_chart_config(
        chart_type.as_str(),
        data,
        schema,
        &analysis_type.chart_title(),
        Some(&analysis_type.chart_description()),
    );
    Some(apply_professional_styling(config))
}

fn optional_field<T: DeserializeOwned>(
    raw: &Map<String, Value>,
    key: &str,
) -> anyhow::Result<Option<T>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .with_context(|| format!("Invalid '{key}' in analysis output")),
    }
}

fn failed_record(file_id: Uuid, analysis_type: AnalysisType, error: &str) -> AnalysisRecord {
    AnalysisRecord {
        id: Uuid::new_v4(),
        file_id,
        analysis_type,
        insights: vec![InsightItem::new(
            FAILED_TITLE,
            format!("Errore durante l'elaborazione: {error}"),
            Severity::Low,
        )],
        chart_config: None,
        anomalies: None,
        key_metrics: None,
        recommendations: None,
        metadata: RecordMetadata::failed(error),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_type_names() {
        assert_eq!(AnalysisType::ExecutiveSummary.title(), "Executive Summary");
        assert_eq!(
            AnalysisType::ExecutiveSummary.chart_title(),
            "Executive Summary Analysis"
        );
        assert_eq!(
            AnalysisType::Trend.chart_description(),
            "AI-generated trend insights"
        );
        assert_eq!(
            "executive-summary".parse::<AnalysisType>().unwrap(),
            AnalysisType::ExecutiveSummary
        );
        assert!("forecast".parse::<AnalysisType>().is_err());
        assert_eq!(
            serde_json::to_string(&AnalysisType::ExecutiveSummary).unwrap(),
            "\"executive_summary\""
        );
    }

    #[test]
    fn chart_only_for_non_empty_chart_data() {
        let schema = SchemaDescriptor::default();
        let empty = json!({"chart_data": []});
        assert!(chart_from_output(empty.as_object().unwrap(), AnalysisType::Trend, &schema).is_none());

        let raw = json!({"chart_data": [{"month": "Jan", "sales": 3}]});
        let chart =
            chart_from_output(raw.as_object().unwrap(), AnalysisType::Trend, &schema).unwrap();
        assert_eq!(chart.chart_type.as_str(), "bar");
        assert_eq!(chart.title, "Trend Analysis");
        assert_eq!(chart.description.as_deref(), Some("AI-generated trend insights"));

        let raw = json!({"chart_data": [{"x": 1}], "recommended_chart": null});
        let chart =
            chart_from_output(raw.as_object().unwrap(), AnalysisType::Trend, &schema).unwrap();
        assert_eq!(chart.chart_type.as_str(), "line");
    }

    #[test]
    fn unavailable_outputs_are_low_severity() {
        for analysis_type in [
            AnalysisType::Trend,
            AnalysisType::Anomaly,
            AnalysisType::ExecutiveSummary,
        ] {
            let raw = analysis_type.unavailable_output("timeout");
            let insights = validate_insights(&raw);
            assert_eq!(insights.len(), 1);
            assert_eq!(insights[0].severity, Severity::Low);
            assert!(insights[0].description.ends_with("timeout"));
        }
    }

    #[test]
    fn wrongly_typed_optional_fields_are_errors() {
        let raw = json!({"recommendations": [1, 2]});
        let parsed: anyhow::Result<Option<Vec<String>>> =
            optional_field(raw.as_object().unwrap(), "recommendations");
        assert!(parsed.is_err());
        let raw = json!({"recommendations": null});
        let parsed: Option<Vec<String>> =
            optional_field(raw.as_object().unwrap(), "recommendations").unwrap();
        assert!(parsed.is_none());
    }
}
