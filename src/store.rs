//! Persistence of file records, processed data and analysis records.
//!
//! Analysis records are append-only. [`MemoryStore`] keeps everything in
//! memory; [`DirectoryStore`] lays it out on disk as
//!
//! ```text
//! <root>/files/<id>.json
//! <root>/processed/<id>.json
//! <root>/analyses.jsonl
//! ```

use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    analysis::AnalysisType,
    charts::ChartConfig,
    cleaner::CleanedTable,
    insights::InsightItem,
    metadata::AnalysisMetadata,
    schema::{SchemaDescriptor, detect_schema},
    table::CanonicalTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Processing,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Tsv,
    Json,
}

impl FileType {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => FileType::Json,
            Some("tsv") => FileType::Tsv,
            _ => FileType::Csv,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub filename: String,
    pub file_type: FileType,
    pub file_size: u64,
    pub status: FileStatus,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(filename: impl Into<String>, file_type: FileType, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            file_type,
            file_size,
            status: FileStatus::Processing,
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedData {
    pub file_id: Uuid,
    pub cleaned_data: CanonicalTable,
    pub data_schema: SchemaDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureMetadata {
    pub error: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordMetadata {
    Completed(AnalysisMetadata),
    Failed(FailureMetadata),
}

impl RecordMetadata {
    pub fn failed(error: impl Into<String>) -> Self {
        RecordMetadata::Failed(FailureMetadata {
            error: error.into(),
            status: FileStatus::Failed.as_str().to_string(),
        })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RecordMetadata::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub file_id: Uuid,
    pub analysis_type: AnalysisType,
    pub insights: Vec<InsightItem>,
    #[serde(default)]
    pub chart_config: Option<ChartConfig>,
    #[serde(default)]
    pub anomalies: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub key_metrics: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
    pub metadata: RecordMetadata,
    pub created_at: DateTime<Utc>,
}

/// Generic save/query capability used by the analysis runner.
pub trait ResultStore {
    fn save_file(&mut self, record: &FileRecord) -> Result<()>;
    fn file(&self, id: Uuid) -> Result<Option<FileRecord>>;
    fn save_processed_data(&mut self, data: &ProcessedData) -> Result<()>;
    fn processed_data(&self, file_id: Uuid) -> Result<Option<ProcessedData>>;
    fn append_analysis(&mut self, record: &AnalysisRecord) -> Result<()>;
    /// Records stored for a file in insertion order.
    fn analyses(&self, file_id: Uuid) -> Result<Vec<AnalysisRecord>>;

    /// Records stored for a file, newest first.
    fn analyses_newest_first(&self, file_id: Uuid) -> Result<Vec<AnalysisRecord>> {
        let mut records = self.analyses(file_id)?;
        records.reverse();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Vec<FileRecord>,
    processed: Vec<ProcessedData>,
    analyses: Vec<AnalysisRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryStore {
    fn save_file(&mut self, record: &FileRecord) -> Result<()> {
        match self.files.iter_mut().find(|f| f.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => self.files.push(record.clone()),
        }
        Ok(())
    }

    fn file(&self, id: Uuid) -> Result<Option<FileRecord>> {
        Ok(self.files.iter().find(|f| f.id == id).cloned())
    }

    fn save_processed_data(&mut self, data: &ProcessedData) -> Result<()> {
        match self.processed.iter_mut().find(|p| p.file_id == data.file_id) {
            Some(existing) => *existing = data.clone(),
            None => self.processed.push(data.clone()),
        }
        Ok(())
    }

    fn processed_data(&self, file_id: Uuid) -> Result<Option<ProcessedData>> {
        Ok(self.processed.iter().find(|p| p.file_id == file_id).cloned())
    }

    fn append_analysis(&mut self, record: &AnalysisRecord) -> Result<()> {
        self.analyses.push(record.clone());
        Ok(())
    }

    fn analyses(&self, file_id: Uuid) -> Result<Vec<AnalysisRecord>> {
        Ok(self
            .analyses
            .iter()
            .filter(|a| a.file_id == file_id)
            .cloned()
            .collect())
    }
}

const ANALYSES_FILE: &str = "analyses.jsonl";

#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in ["files", "processed"] {
            let path = root.join(dir);
            fs::create_dir_all(&path)
                .with_context(|| format!("Creating store directory {path:?}"))?;
        }
        debug!("Opened store at {root:?}");
        Ok(Self { root })
    }

    fn file_path(&self, id: Uuid) -> PathBuf {
        self.root.join("files").join(format!("{id}.json"))
    }

    fn processed_path(&self, file_id: Uuid) -> PathBuf {
        self.root.join("processed").join(format!("{file_id}.json"))
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating {path:?}"))?;
        serde_json::to_writer(file, value).with_context(|| format!("Writing {path:?}"))
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(path).with_context(|| format!("Opening {path:?}"))?;
        let value = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing {path:?}"))?;
        Ok(Some(value))
    }
}

impl ResultStore for DirectoryStore {
    fn save_file(&mut self, record: &FileRecord) -> Result<()> {
        Self::write_json(&self.file_path(record.id), record)
    }

    fn file(&self, id: Uuid) -> Result<Option<FileRecord>> {
        Self::read_json(&self.file_path(id))
    }

    fn save_processed_data(&mut self, data: &ProcessedData) -> Result<()> {
        Self::write_json(&self.processed_path(data.file_id), data)
    }

    fn processed_data(&self, file_id: Uuid) -> Result<Option<ProcessedData>> {
        Self::read_json(&self.processed_path(file_id))
    }

    fn append_analysis(&mut self, record: &AnalysisRecord) -> Result<()> {
        let path = self.root.join(ANALYSES_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Opening {path:?} for append"))?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}").with_context(|| format!("Appending to {path:?}"))?;
        Ok(())
    }

    fn analyses(&self, file_id: Uuid) -> Result<Vec<AnalysisRecord>> {
        let path = self.root.join(ANALYSES_FILE);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).with_context(|| format!("Opening {path:?}"))?;
        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Reading {path:?}"))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: AnalysisRecord = serde_json::from_str(&line)
                .with_context(|| format!("Parsing {path:?} line {}", idx + 1))?;
            if record.file_id == file_id {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Registers a file, runs `clean` and persists the processed data. The file
/// record ends `completed` with a small summary, or `failed` with the error.
pub fn ingest<S, F>(
    store: &mut S,
    mut record: FileRecord,
    clean: F,
) -> Result<(FileRecord, CleanedTable)>
where
    S: ResultStore + ?Sized,
    F: FnOnce() -> Result<CleanedTable>,
{
    store.save_file(&record)?;
    let cleaned = match clean() {
        Ok(cleaned) => cleaned,
        Err(err) => {
            record.status = FileStatus::Failed;
            record
                .metadata
                .insert("error".to_string(), Value::String(format!("{err:#}")));
            store.save_file(&record)?;
            return Err(err.context(format!("Processing {}", record.filename)));
        }
    };

    let processed = ProcessedData {
        file_id: record.id,
        cleaned_data: cleaned.table.clone(),
        data_schema: detect_schema(&cleaned.table),
    };
    store.save_processed_data(&processed)?;

    record.status = FileStatus::Completed;
    record
        .metadata
        .insert("row_count".to_string(), Value::from(cleaned.table.row_count()));
    record.metadata.insert(
        "column_count".to_string(),
        Value::from(cleaned.table.columns().len()),
    );
    record.metadata.insert(
        "columns".to_string(),
        Value::from(cleaned.table.column_names()),
    );
    store.save_file(&record)?;
    info!("Stored {} as file {}", record.filename, record.id);
    Ok((record, cleaned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        insights::Severity,
        table::{Column, ColumnData},
    };
    use anyhow::anyhow;
    use tempfile::tempdir;

    fn cleaned() -> CleanedTable {
        CleanedTable {
            table: CanonicalTable::new(vec![Column::new(
                "val",
                ColumnData::Integer(vec![Some(1), Some(2)]),
            )])
            .unwrap(),
            report: Default::default(),
        }
    }

    fn failed_record(file_id: Uuid, created_at: DateTime<Utc>) -> AnalysisRecord {
        AnalysisRecord {
            id: Uuid::new_v4(),
            file_id,
            analysis_type: AnalysisType::Trend,
            insights: vec![InsightItem::new("Analisi fallita", "boom", Severity::Low)],
            chart_config: None,
            anomalies: None,
            key_metrics: None,
            recommendations: None,
            metadata: RecordMetadata::failed("boom"),
            created_at,
        }
    }

    #[test]
    fn ingest_marks_file_completed_and_saves_schema() {
        let mut store = MemoryStore::new();
        let record = FileRecord::new("sales.csv", FileType::Csv, 12);
        let (record, _) = ingest(&mut store, record, || Ok(cleaned())).unwrap();
        let stored = store.file(record.id).unwrap().unwrap();
        assert_eq!(stored.status, FileStatus::Completed);
        assert_eq!(stored.metadata["row_count"], 2);
        let processed = store.processed_data(record.id).unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&processed.data_schema).unwrap(),
            serde_json::json!({"val": "integer"})
        );
    }

    #[test]
    fn ingest_failure_marks_file_failed() {
        let mut store = MemoryStore::new();
        let record = FileRecord::new("broken.csv", FileType::Csv, 3);
        let id = record.id;
        assert!(ingest(&mut store, record, || Err(anyhow!("ragged"))).is_err());
        let stored = store.file(id).unwrap().unwrap();
        assert_eq!(stored.status, FileStatus::Failed);
        assert_eq!(stored.metadata["error"], "ragged");
        assert!(store.processed_data(id).unwrap().is_none());
    }

    #[test]
    fn directory_store_round_trips_and_appends() {
        let dir = tempdir().unwrap();
        let mut store = DirectoryStore::open(dir.path()).unwrap();
        let record = FileRecord::new("sales.json", FileType::Json, 40);
        let (record, _) = ingest(&mut store, record, || Ok(cleaned())).unwrap();

        let reopened = DirectoryStore::open(dir.path()).unwrap();
        assert_eq!(reopened.file(record.id).unwrap().unwrap(), record);
        assert!(reopened.processed_data(record.id).unwrap().is_some());

        let older = failed_record(record.id, Utc::now() - chrono::Duration::seconds(5));
        let newer = failed_record(record.id, Utc::now());
        store.append_analysis(&older).unwrap();
        store.append_analysis(&newer).unwrap();
        store.append_analysis(&failed_record(Uuid::new_v4(), Utc::now())).unwrap();

        let listed = reopened.analyses_newest_first(record.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert!(listed[1].metadata.is_failed());
    }

    #[test]
    fn file_type_follows_extension() {
        assert_eq!(FileType::from_path(Path::new("a.JSON")), FileType::Json);
        assert_eq!(FileType::from_path(Path::new("a.tsv")), FileType::Tsv);
        assert_eq!(FileType::from_path(Path::new("a")), FileType::Csv);
    }
}
