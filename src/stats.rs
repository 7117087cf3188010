//! Descriptive statistics over the numeric columns of a cleaned table.
//!
//! Nulls are skipped. The standard deviation is the sample deviation
//! (`n - 1` denominator) and is undefined below two values.

use serde::{Deserialize, Serialize, Serializer};

use crate::{
    data::format_datetime,
    table::{CanonicalTable, Column},
};

/// A value is an outlier when its absolute z-score is strictly above this.
pub const Z_SCORE_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// `0.0` when the deviation is undefined.
    pub std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyStats {
    pub mean: f64,
    pub std: f64,
    pub outlier_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFinding {
    pub column: String,
    pub count: usize,
    pub max_zscore: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyMetric {
    pub total: f64,
    pub average: f64,
    pub max: f64,
    pub min: f64,
}

/// Per-column results in table order. Serializes as a map keyed by column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for ColumnMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ColumnMap<T> {
    pub fn get(&self, column: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: &str, value: T) {
        self.entries.push((name.to_string(), value));
    }
}

impl<T: Serialize> Serialize for ColumnMap<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.entries.iter().map(|(name, value)| (name, value)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub statistics: ColumnMap<AnomalyStats>,
    pub anomalies: Vec<AnomalyFinding>,
}

struct ColumnStats {
    values: Vec<f64>,
    sum: f64,
    min: f64,
    max: f64,
}

impl ColumnStats {
    fn from_column(column: &Column) -> Option<Self> {
        let values = column.data.numeric_values()?;
        if values.is_empty() {
            return None;
        }
        let mut stats = Self {
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            values: Vec::with_capacity(values.len()),
        };
        for value in values {
            stats.add_value(value);
        }
        Some(stats)
    }

    fn add_value(&mut self, value: f64) {
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.values.push(value);
    }

    fn count(&self) -> usize {
        self.values.len()
    }

    fn mean(&self) -> f64 {
        self.sum / self.count() as f64
    }

    fn std_dev(&self) -> Option<f64> {
        if self.count() < 2 {
            return None;
        }
        // Identical values must report exactly zero, rounding in the mean
        // would otherwise leave a tiny positive deviation.
        if self.min == self.max {
            return Some(0.0);
        }
        let mean = self.mean();
        let squares: f64 = self.values.iter().map(|v| (v - mean) * (v - mean)).sum();
        Some((squares / (self.count() as f64 - 1.0)).sqrt())
    }

    fn z_scores(&self, mean: f64, std: f64) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().map(move |v| (v - mean).abs() / std)
    }
}

pub fn trend_statistics(table: &CanonicalTable) -> ColumnMap<TrendStats> {
    let mut result = ColumnMap::default();
    for column in table.numeric_columns() {
        let Some(stats) = ColumnStats::from_column(column) else {
            continue;
        };
        result.push(
            &column.name,
            TrendStats {
                mean: stats.mean(),
                min: stats.min,
                max: stats.max,
                std: stats.std_dev().unwrap_or(0.0),
            },
        );
    }
    result
}

/// Z-score outlier scan. Columns with fewer than two values are skipped, and a
/// zero deviation yields no outliers.
pub fn anomaly_statistics(table: &CanonicalTable) -> AnomalyReport {
    let mut report = AnomalyReport::default();
    for column in table.numeric_columns() {
        let Some(stats) = ColumnStats::from_column(column) else {
            continue;
        };
        let Some(std) = stats.std_dev() else {
            continue;
        };
        let mean = stats.mean();
        if std == 0.0 {
            report.statistics.push(
                &column.name,
                AnomalyStats {
                    mean,
                    std: 0.0,
                    outlier_count: 0,
                },
            );
            continue;
        }
        let outlier_count = stats
            .z_scores(mean, std)
            .filter(|z| *z > Z_SCORE_THRESHOLD)
            .count();
        report.statistics.push(
            &column.name,
            AnomalyStats {
                mean,
                std,
                outlier_count,
            },
        );
        if outlier_count > 0 {
            let max_zscore = stats.z_scores(mean, std).fold(0.0_f64, f64::max);
            report.anomalies.push(AnomalyFinding {
                column: column.name.clone(),
                count: outlier_count,
                max_zscore,
            });
        }
    }
    report
}

/// Totals and extremes for the first `limit` numeric columns.
pub fn key_metrics(table: &CanonicalTable, limit: usize) -> ColumnMap<KeyMetric> {
    let mut result = ColumnMap::default();
    for column in table.numeric_columns().take(limit) {
        let Some(stats) = ColumnStats::from_column(column) else {
            continue;
        };
        result.push(
            &column.name,
            KeyMetric {
                total: stats.sum,
                average: stats.mean(),
                max: stats.max,
                min: stats.min,
            },
        );
    }
    result
}

/// `"<min> to <max>"` over the first date/time column, or `"N/A"`.
pub fn date_range(table: &CanonicalTable) -> String {
    let values = table
        .columns()
        .iter()
        .find_map(|column| column.data.datetime_values());
    match values {
        Some(values) => match (values.iter().min(), values.iter().max()) {
            (Some(min), Some(max)) => {
                format!("{} to {}", format_datetime(min), format_datetime(max))
            }
            _ => "N/A".to_string(),
        },
        None => "N/A".to_string(),
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

pub fn trend_rows(stats: &ColumnMap<TrendStats>) -> Vec<Vec<String>> {
    stats
        .iter()
        .map(|(name, s)| {
            vec![
                name.to_string(),
                format_number(s.mean),
                format_number(s.min),
                format_number(s.max),
                format_number(s.std),
            ]
        })
        .collect()
}

pub fn anomaly_rows(report: &AnomalyReport) -> Vec<Vec<String>> {
    report
        .statistics
        .iter()
        .map(|(name, s)| {
            let max_zscore = report
                .anomalies
                .iter()
                .find(|finding| finding.column == name)
                .map(|finding| format_number(finding.max_zscore))
                .unwrap_or_default();
            vec![
                name.to_string(),
                format_number(s.mean),
                format_number(s.std),
                s.outlier_count.to_string(),
                max_zscore,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnData;
    use chrono::NaiveDate;

    fn table(columns: Vec<Column>) -> CanonicalTable {
        CanonicalTable::new(columns).unwrap()
    }

    fn spike_column() -> Column {
        let mut values: Vec<Option<f64>> = vec![Some(10.0); 20];
        values.push(Some(1000.0));
        Column::new("amount", ColumnData::Float(values))
    }

    #[test]
    fn trend_statistics_use_sample_std() {
        let t = table(vec![
            Column::new("qty", ColumnData::Integer(vec![Some(2), Some(4), None, Some(6)])),
            Column::new("label", ColumnData::String(vec!["a".into(); 4])),
        ]);
        let stats = trend_statistics(&t);
        assert_eq!(stats.len(), 1);
        let qty = stats.get("qty").unwrap();
        assert_eq!(qty.mean, 4.0);
        assert_eq!(qty.min, 2.0);
        assert_eq!(qty.max, 6.0);
        assert!((qty.std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn single_value_has_zero_trend_std_and_no_anomaly_entry() {
        let t = table(vec![Column::new(
            "x",
            ColumnData::Integer(vec![Some(5), None]),
        )]);
        assert_eq!(trend_statistics(&t).get("x").unwrap().std, 0.0);
        let report = anomaly_statistics(&t);
        assert!(report.statistics.is_empty());
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn spike_is_flagged_with_its_zscore() {
        let t = table(vec![spike_column()]);
        let report = anomaly_statistics(&t);
        let stats = report.statistics.get("amount").unwrap();
        assert_eq!(stats.outlier_count, 1);
        assert_eq!(report.anomalies.len(), 1);
        let finding = &report.anomalies[0];
        assert_eq!(finding.column, "amount");
        assert_eq!(finding.count, 1);
        assert!(finding.max_zscore > Z_SCORE_THRESHOLD);

        let mean: f64 = (20.0 * 10.0 + 1000.0) / 21.0;
        let squares = 20.0 * (10.0 - mean) * (10.0 - mean) + (1000.0 - mean) * (1000.0 - mean);
        let std = (squares / 20.0).sqrt();
        assert!((stats.mean - mean).abs() < 1e-9);
        assert!((stats.std - std).abs() < 1e-9);
        assert!((finding.max_zscore - (1000.0 - mean).abs() / std).abs() < 1e-9);
    }

    #[test]
    fn constant_column_is_never_flagged() {
        let t = table(vec![Column::new(
            "rate",
            ColumnData::Float(vec![Some(0.1); 30]),
        )]);
        let report = anomaly_statistics(&t);
        let stats = report.statistics.get("rate").unwrap();
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.outlier_count, 0);
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn key_metrics_limit_columns() {
        let columns = (0..7)
            .map(|i| Column::new(format!("c{i}"), ColumnData::Integer(vec![Some(1), Some(3)])))
            .collect();
        let metrics = key_metrics(&table(columns), 5);
        assert_eq!(metrics.len(), 5);
        let first = metrics.get("c0").unwrap();
        assert_eq!(first.total, 4.0);
        assert_eq!(first.average, 2.0);
        assert!(metrics.get("c5").is_none());
    }

    #[test]
    fn date_range_uses_first_datetime_column() {
        let day = |d| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
        };
        let t = table(vec![
            Column::new("id", ColumnData::Integer(vec![Some(1), Some(2), Some(3)])),
            Column::new("at", ColumnData::DateTime(vec![day(9), None, day(2)])),
        ]);
        assert_eq!(date_range(&t), "2024-01-02 00:00:00 to 2024-01-09 00:00:00");
        let no_dates = table(vec![Column::new("id", ColumnData::Integer(vec![Some(1)]))]);
        assert_eq!(date_range(&no_dates), "N/A");
    }

    #[test]
    fn column_map_serializes_in_column_order() {
        let t = table(vec![
            Column::new("b", ColumnData::Integer(vec![Some(1), Some(1)])),
            Column::new("a", ColumnData::Integer(vec![Some(2), Some(2)])),
        ]);
        let json = serde_json::to_string(&trend_statistics(&t)).unwrap();
        assert!(json.starts_with(r#"{"b":"#));
    }
}
