//! The insight producer seam.
//!
//! The network call to a language model lives outside this crate. Callers
//! hand the runner an [`InsightProducer`]; [`ReplayProducer`] answers from
//! response files captured earlier.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use thiserror::Error;

use crate::{analysis::AnalysisType, settings::AnalysisSettings};

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("no response available for {0}")]
    Unavailable(String),
    #[error("reading response {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("producer failed: {0}")]
    Failed(String),
}

/// Turns a prompt into raw response text for one analysis type.
pub trait InsightProducer {
    fn generate(
        &self,
        analysis_type: AnalysisType,
        prompt: &str,
        settings: &AnalysisSettings,
    ) -> Result<String, ProducerError>;
}

/// Replays `<dir>/<analysis_type>.json`, falling back to `.txt`.
#[derive(Debug, Clone)]
pub struct ReplayProducer {
    dir: PathBuf,
}

impl ReplayProducer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn response_path(&self, analysis_type: AnalysisType) -> Option<PathBuf> {
        ["json", "txt"]
            .iter()
            .map(|ext| self.dir.join(format!("{}.{ext}", analysis_type.as_str())))
            .find(|path| path.is_file())
    }
}

impl InsightProducer for ReplayProducer {
    fn generate(
        &self,
        analysis_type: AnalysisType,
        prompt: &str,
        settings: &AnalysisSettings,
    ) -> Result<String, ProducerError> {
        let path = self
            .response_path(analysis_type)
            .ok_or_else(|| ProducerError::Unavailable(analysis_type.to_string()))?;
        debug!(
            "Replaying {path:?} for a {}-character prompt (model {})",
            prompt.chars().count(),
            settings.model
        );
        fs::read_to_string(&path).map_err(|source| ProducerError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replay_prefers_json_then_txt() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("trend.txt"), "text").unwrap();
        fs::write(dir.path().join("anomaly.txt"), "anomaly text").unwrap();
        fs::write(dir.path().join("trend.json"), "{}").unwrap();
        let producer = ReplayProducer::new(dir.path());
        let settings = AnalysisSettings::default();
        assert_eq!(
            producer.generate(AnalysisType::Trend, "p", &settings).unwrap(),
            "{}"
        );
        assert_eq!(
            producer.generate(AnalysisType::Anomaly, "p", &settings).unwrap(),
            "anomaly text"
        );
    }

    #[test]
    fn missing_response_is_unavailable() {
        let dir = tempdir().unwrap();
        let producer = ReplayProducer::new(dir.path());
        let err = producer
            .generate(
                AnalysisType::ExecutiveSummary,
                "p",
                &AnalysisSettings::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ProducerError::Unavailable(_)));
        assert_eq!(err.to_string(), "no response available for executive_summary");
    }
}
