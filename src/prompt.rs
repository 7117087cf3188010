//! Prompt assembly for the insight producer.
//!
//! A [`PromptContext`] gathers everything one analysis type needs from the
//! cleaned table; [`PromptContext::render`] turns it into the instruction
//! text. Embedded JSON is pretty-printed with two-space indentation.

use anyhow::Result;
use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    analysis::AnalysisType,
    schema::SchemaDescriptor,
    settings::AnalysisSettings,
    stats::{
        AnomalyReport, ColumnMap, KeyMetric, TrendStats, anomaly_statistics, date_range,
        key_metrics, trend_statistics,
    },
    table::CanonicalTable,
};

pub const UNKNOWN_FILE_NAME: &str = "Unknown";

#[derive(Debug, Clone, PartialEq)]
pub enum PromptContext {
    Trend {
        schema: SchemaDescriptor,
        statistics: ColumnMap<TrendStats>,
        samples: Vec<Map<String, Value>>,
    },
    Anomaly {
        schema: SchemaDescriptor,
        report: AnomalyReport,
        samples: Vec<Map<String, Value>>,
    },
    ExecutiveSummary {
        file_name: String,
        schema: SchemaDescriptor,
        date_range: String,
        total_rows: usize,
        key_metrics: ColumnMap<KeyMetric>,
        samples: Vec<Map<String, Value>>,
    },
}

impl PromptContext {
    pub fn build(
        analysis_type: AnalysisType,
        table: &CanonicalTable,
        schema: &SchemaDescriptor,
        file_name: Option<&str>,
        settings: &AnalysisSettings,
    ) -> Self {
        let samples = |size: usize| table.records(settings.sample_window.min(size));
        match analysis_type {
            AnalysisType::Trend => PromptContext::Trend {
                schema: schema.clone(),
                statistics: trend_statistics(table),
                samples: samples(settings.samples.trend),
            },
            AnalysisType::Anomaly => PromptContext::Anomaly {
                schema: schema.clone(),
                report: anomaly_statistics(table),
                samples: samples(settings.samples.anomaly),
            },
            AnalysisType::ExecutiveSummary => PromptContext::ExecutiveSummary {
                file_name: file_name.unwrap_or(UNKNOWN_FILE_NAME).to_string(),
                schema: schema.clone(),
                date_range: date_range(table),
                total_rows: table.row_count(),
                key_metrics: key_metrics(table, settings.key_metric_columns),
                samples: samples(settings.samples.executive_summary),
            },
        }
    }

    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            PromptContext::Trend { .. } => AnalysisType::Trend,
            PromptContext::Anomaly { .. } => AnalysisType::Anomaly,
            PromptContext::ExecutiveSummary { .. } => AnalysisType::ExecutiveSummary,
        }
    }

    pub fn render(&self) -> Result<String> {
        let text = match self {
            PromptContext::Trend {
                schema,
                statistics,
                samples,
            } => format!(
                "Analizza questo dataset per identificare trend significativi.\n\
                 {columns}\n\
                 Schema: {schema}\n\
                 Statistiche: {statistics}\n\
                 Dati campione: {samples}\n\n\
                 Restituisci SOLO un JSON valido con questa struttura:\n\
                 {structure}\n\n\
                 Focus su: {focus}.\n\
                 Usa severità: high per trend significativi, medium per pattern interessanti, low per osservazioni minori.\n\
                 {closing}",
                columns = column_line(schema),
                schema = pretty(schema)?,
                statistics = pretty(statistics)?,
                samples = pretty(samples)?,
                structure = TREND_STRUCTURE,
                focus = ["crescita/decrescita", "stagionalità", "punti di inflessione"]
                    .iter()
                    .join(", "),
                closing = CLOSING,
            ),
            PromptContext::Anomaly {
                schema,
                report,
                samples,
            } => format!(
                "Identifica anomalie e outlier in questo dataset.\n\
                 {columns}\n\
                 Schema: {schema}\n\
                 Statistiche: {statistics}\n\
                 Anomalie rilevate (Z-score > 3): {anomalies}\n\
                 Dati campione: {samples}\n\n\
                 Restituisci SOLO un JSON valido con questa struttura:\n\
                 {structure}\n\n\
                 Usa metodi statistici: {methods}.\n\
                 Severità: high per anomalie critiche, medium per outlier significativi, low per variazioni minori.\n\
                 {closing}",
                columns = column_line(schema),
                schema = pretty(schema)?,
                statistics = pretty(&report.statistics)?,
                anomalies = pretty(&report.anomalies)?,
                samples = pretty(samples)?,
                structure = ANOMALY_STRUCTURE,
                methods = ["Z-score", "IQR", "deviazione standard"].iter().join(", "),
                closing = CLOSING,
            ),
            PromptContext::ExecutiveSummary {
                file_name,
                schema,
                date_range,
                total_rows,
                key_metrics,
                samples,
            } => format!(
                "Crea un executive summary professionale stile McKinsey.\n\
                 Dataset: {file_name}\n\
                 {columns}\n\
                 Schema: {schema}\n\
                 Periodo: {date_range}\n\
                 Righe totali: {total_rows}\n\
                 Metriche chiave: {metrics}\n\
                 Dati campione: {samples}\n\n\
                 Restituisci SOLO un JSON valido con questa struttura:\n\
                 {structure}\n\n\
                 Linguaggio: executive, quantitativo, orientato all'azione.\n\
                 Struttura: Situazione → Complicazione → Risoluzione.\n\
                 {closing}",
                columns = column_line(schema),
                schema = pretty(schema)?,
                metrics = pretty(key_metrics)?,
                samples = pretty(samples)?,
                structure = EXECUTIVE_STRUCTURE,
                closing = CLOSING,
            ),
        };
        Ok(text)
    }
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn column_line(schema: &SchemaDescriptor) -> String {
    format!(
        "Colonne ({}): {}",
        schema.len(),
        schema
            .iter()
            .map(|(name, ty)| format!("{name} ({ty})"))
            .join(", ")
    )
}

const CLOSING: &str = "Non includere markdown o testo extra, solo JSON.";

const TREND_STRUCTURE: &str = r#"{
  "insights": [
    {
      "title": "Trend principale identificato",
      "description": "Descrizione dettagliata con numeri",
      "severity": "high",
      "metric_value": 123.45,
      "metric_label": "etichetta metrica"
    }
  ],
  "chart_data": [
    {"x": "periodo", "y": 100}
  ],
  "recommended_chart": "line"
}"#;

const ANOMALY_STRUCTURE: &str = r#"{
  "insights": [
    {
      "title": "Anomalia rilevata",
      "description": "Spiegazione dettagliata con contesto",
      "severity": "high",
      "metric_value": 456.78,
      "metric_label": "deviazione standard"
    }
  ],
  "anomalies": [
    {"index": 5, "value": 1000, "expected": 100}
  ]
}"#;

const EXECUTIVE_STRUCTURE: &str = r#"{
  "insights": [
    {
      "title": "Key Takeaway #1",
      "description": "Implicazione business con numeri concreti",
      "severity": "high"
    }
  ],
  "key_metrics": [
    {"label": "Metrica principale", "value": 12345, "change": "+15%"}
  ],
  "recommendations": [
    "Azione concreta con impatto stimato"
  ]
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::detect_schema,
        table::{Column, ColumnData},
    };

    fn table() -> CanonicalTable {
        CanonicalTable::new(
            vec![
                Column::new("region", ColumnData::String((0..30).map(|i| format!("r{i}")).collect())),
                Column::new("sales", ColumnData::Integer((0..30).map(Some).collect())),
            ],
        )
        .unwrap()
    }

    #[test]
    fn trend_prompt_embeds_schema_statistics_and_samples() {
        let table = table();
        let schema = detect_schema(&table);
        let settings = AnalysisSettings::default();
        let context =
            PromptContext::build(AnalysisType::Trend, &table, &schema, None, &settings);
        let PromptContext::Trend { samples, .. } = &context else {
            panic!("expected trend context");
        };
        assert_eq!(samples.len(), 10);
        let text = context.render().unwrap();
        assert!(text.contains("\"sales\": \"integer\""));
        assert!(text.contains("\"recommended_chart\""));
        assert!(text.contains("Colonne (2): region (string), sales (integer)"));
    }

    #[test]
    fn executive_prompt_reports_rows_period_and_file() {
        let table = table();
        let schema = detect_schema(&table);
        let mut settings = AnalysisSettings::default();
        settings.samples.executive_summary = 2;
        let context = PromptContext::build(
            AnalysisType::ExecutiveSummary,
            &table,
            &schema,
            Some("sales.csv"),
            &settings,
        );
        assert_eq!(context.analysis_type(), AnalysisType::ExecutiveSummary);
        let text = context.render().unwrap();
        assert!(text.contains("Dataset: sales.csv"));
        assert!(text.contains("Periodo: N/A"));
        assert!(text.contains("Righe totali: 30"));
        assert!(text.contains("\"total\": 435.0"));
    }

    #[test]
    fn missing_file_name_is_unknown() {
        let table = table();
        let schema = detect_schema(&table);
        let context = PromptContext::build(
            AnalysisType::ExecutiveSummary,
            &table,
            &schema,
            None,
            &AnalysisSettings::default(),
        );
        assert!(context.render().unwrap().contains("Dataset: Unknown"));
    }
}
