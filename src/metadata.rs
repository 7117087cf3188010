//! Quality summary attached to every completed analysis record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::insights::{InsightItem, Severity};

pub const DATA_QUALITY_GOOD: &str = "good";

const BASE_CONFIDENCE: f64 = 0.5;
const INSIGHTS_PRESENT_BONUS: f64 = 0.2;
const HIGH_SEVERITY_BONUS: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub analysis_type: String,
    pub insight_count: usize,
    pub high_severity_count: usize,
    pub data_quality: String,
    pub has_recommendations: bool,
    pub has_chart_data: bool,
    pub confidence_score: f64,
}

pub fn enrich_metadata(
    insights: &[InsightItem],
    raw: &Map<String, Value>,
    analysis_type: &str,
) -> AnalysisMetadata {
    let insight_count = insights.len();
    let high_severity_count = insights
        .iter()
        .filter(|insight| insight.severity == Severity::High)
        .count();
    AnalysisMetadata {
        analysis_type: analysis_type.to_string(),
        insight_count,
        high_severity_count,
        data_quality: DATA_QUALITY_GOOD.to_string(),
        has_recommendations: raw.contains_key("recommendations"),
        has_chart_data: raw.contains_key("chart_data") || raw.contains_key("anomalies"),
        confidence_score: confidence_score(insight_count, high_severity_count),
    }
}

pub fn confidence_score(insight_count: usize, high_severity_count: usize) -> f64 {
    let mut score = BASE_CONFIDENCE;
    if insight_count > 0 {
        score += INSIGHTS_PRESENT_BONUS;
    }
    if high_severity_count > 0 {
        score += HIGH_SEVERITY_BONUS;
    }
    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn insight(severity: Severity) -> InsightItem {
        InsightItem::new("t", "d", severity)
    }

    #[test]
    fn confidence_steps() {
        let raw = Map::new();
        assert_eq!(enrich_metadata(&[], &raw, "trend").confidence_score, 0.5);
        let medium = enrich_metadata(&[insight(Severity::Medium)], &raw, "trend");
        assert!((medium.confidence_score - 0.7).abs() < 1e-12);
        let high = enrich_metadata(
            &[insight(Severity::High), insight(Severity::High)],
            &raw,
            "trend",
        );
        assert_eq!(high.high_severity_count, 2);
        assert!((high.confidence_score - 1.0).abs() < 1e-12);
        assert!(high.confidence_score <= 1.0);
    }

    #[test]
    fn presence_flags_follow_raw_keys() {
        let raw = json!({"anomalies": [], "recommendations": null});
        let meta = enrich_metadata(&[], raw.as_object().unwrap(), "anomaly");
        assert!(meta.has_chart_data);
        assert!(meta.has_recommendations);
        assert_eq!(meta.data_quality, "good");
        assert_eq!(meta.analysis_type, "anomaly");
    }
}
