use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::analysis::AnalysisType;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Clean tabular data, infer its schema and turn model output into validated insights",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Clean a CSV/TSV/JSON table, report its schema and optionally store it
    Clean(CleanArgs),
    /// Print the schema descriptor of a cleaned table
    Schema(InputArgs),
    /// Print trend or anomaly statistics for the numeric columns of a table
    Stats(StatsArgs),
    /// Print the prompt that would be sent for one analysis type
    Prompt(PromptArgs),
    /// Run analyses for a stored file using captured model responses
    Analyze(AnalyzeArgs),
    /// List stored analysis records for a file, newest first
    Results(ResultsArgs),
    /// Print the effective analysis settings as YAML
    Settings(SettingsArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input table (.csv, .tsv or .json records; '-' reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Store directory; when set the cleaned table is saved under a new file id
    #[arg(long)]
    pub store: Option<PathBuf>,
    /// File name recorded in the store (defaults to the input file name)
    #[arg(long)]
    pub name: Option<String>,
    /// Write the cleaned rows as JSON records ('-' for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Report z-score outliers instead of trend statistics
    #[arg(long)]
    pub anomalies: bool,
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Store directory created by `clean --store`
    #[arg(long)]
    pub store: PathBuf,
    /// File id printed by `clean --store`
    #[arg(long = "file-id")]
    pub file_id: Uuid,
    /// Optional YAML file with analysis settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PromptArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Analysis type (trend, anomaly, executive_summary)
    #[arg(short = 't', long = "type", value_parser = parse_analysis_type)]
    pub analysis_type: AnalysisType,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Comma-separated analysis types to run in order
    #[arg(
        short = 't',
        long = "types",
        value_delimiter = ',',
        value_parser = parse_analysis_type,
        required = true
    )]
    pub types: Vec<AnalysisType>,
    /// Directory holding `<type>.json` or `<type>.txt` model responses
    #[arg(long)]
    pub responses: PathBuf,
}

#[derive(Debug, Args)]
pub struct ResultsArgs {
    /// Store directory created by `clean --store`
    #[arg(long)]
    pub store: PathBuf,
    /// File id printed by `clean --store`
    #[arg(long = "file-id")]
    pub file_id: Uuid,
    /// Print the records as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Optional YAML file with analysis settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn parse_analysis_type(value: &str) -> Result<AnalysisType, String> {
    value.parse().map_err(|err: anyhow::Error| err.to_string())
}
