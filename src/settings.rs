//! Analysis settings, optionally loaded from a YAML file.
//!
//! Every key is optional; a missing key keeps its default.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSettings {
    /// Model identifier passed through to the insight producer.
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    /// Rows kept from the head of the table before sampling for a prompt.
    pub sample_window: usize,
    pub samples: SampleSizes,
    /// Numeric columns summarized in executive-summary key metrics.
    pub key_metric_columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SampleSizes {
    pub trend: usize,
    pub anomaly: usize,
    pub executive_summary: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            max_output_tokens: 2048,
            sample_window: 100,
            samples: SampleSizes::default(),
            key_metric_columns: 5,
        }
    }
}

impl Default for SampleSizes {
    fn default() -> Self {
        Self {
            trend: 10,
            anomaly: 10,
            executive_summary: 5,
        }
    }
}

impl AnalysisSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Opening settings file {path:?}"))?;
        let settings = Self::from_yaml_str(&raw)
            .with_context(|| format!("Parsing settings file {path:?}"))?;
        debug!("Loaded analysis settings from {path:?}: {settings:?}");
        Ok(settings)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
