#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use pandada::analysis::AnalysisType;
use pandada::producer::{InsightProducer, ProducerError};
use pandada::settings::AnalysisSettings;
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("read fixture")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Producer answering from a fixed table of responses and recording prompts.
#[derive(Default)]
pub struct ScriptedProducer {
    responses: HashMap<AnalysisType, Result<String, String>>,
    pub prompts: RefCell<Vec<(AnalysisType, String)>>,
}

impl ScriptedProducer {
    pub fn respond(mut self, analysis_type: AnalysisType, text: &str) -> Self {
        self.responses.insert(analysis_type, Ok(text.to_string()));
        self
    }

    pub fn fail(mut self, analysis_type: AnalysisType, message: &str) -> Self {
        self.responses
            .insert(analysis_type, Err(message.to_string()));
        self
    }
}

impl InsightProducer for ScriptedProducer {
    fn generate(
        &self,
        analysis_type: AnalysisType,
        prompt: &str,
        _settings: &AnalysisSettings,
    ) -> Result<String, ProducerError> {
        self.prompts
            .borrow_mut()
            .push((analysis_type, prompt.to_string()));
        match self.responses.get(&analysis_type) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(message)) => Err(ProducerError::Failed(message.clone())),
            None => Err(ProducerError::Unavailable(analysis_type.to_string())),
        }
    }
}
