pub mod analysis;
pub mod charts;
pub mod cleaner;
pub mod cli;
pub mod data;
pub mod headers;
pub mod inference;
pub mod insights;
pub mod io_utils;
pub mod metadata;
pub mod producer;
pub mod prompt;
pub mod render;
pub mod response;
pub mod schema;
pub mod settings;
pub mod source;
pub mod stats;
pub mod store;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info};

use crate::{
    analysis::AnalysisRunner,
    cleaner::{CleanedTable, clean_table},
    cli::{Cli, Commands},
    producer::ReplayProducer,
    schema::detect_schema,
    settings::AnalysisSettings,
    source::RawTable,
    store::{DirectoryStore, FileRecord, FileType, ResultStore, ingest},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("pandada", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Clean(args) => handle_clean(&args),
        Commands::Schema(args) => handle_schema(&args),
        Commands::Stats(args) => handle_stats(&args),
        Commands::Prompt(args) => handle_prompt(&args),
        Commands::Analyze(args) => handle_analyze(&args),
        Commands::Results(args) => handle_results(&args),
        Commands::Settings(args) => handle_settings(&args),
    }
}

fn load_and_clean(args: &cli::InputArgs) -> Result<CleanedTable> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    if !io_utils::has_json_extension(&args.input) {
        let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
        info!(
            "Reading '{}' with delimiter '{}'",
            args.input.display(),
            printable_delimiter(delimiter)
        );
    }
    let raw = RawTable::load(&args.input, args.delimiter, encoding)?;
    clean_table(raw).with_context(|| format!("Cleaning {:?}", args.input))
}

fn schema_rows(cleaned: &CleanedTable) -> Vec<Vec<String>> {
    detect_schema(&cleaned.table)
        .iter()
        .map(|(name, ty)| vec![name.to_string(), ty.to_string()])
        .collect()
}

fn handle_clean(args: &cli::CleanArgs) -> Result<()> {
    let cleaned = match &args.store {
        Some(root) => {
            let mut store = DirectoryStore::open(root)?;
            let record = FileRecord::new(
                display_name(&args.input.input, args.name.as_deref()),
                FileType::from_path(&args.input.input),
                file_size(&args.input.input),
            );
            let (record, cleaned) = ingest(&mut store, record, || load_and_clean(&args.input))?;
            println!("file_id: {}", record.id);
            cleaned
        }
        None => load_and_clean(&args.input)?,
    };

    render::print_table(&["column", "type"], &schema_rows(&cleaned));
    let report = &cleaned.report;
    render::print_table(
        &["input_rows", "empty_removed", "duplicates_removed", "settled", "output_rows"],
        &[vec![
            report.input_rows.to_string(),
            report.empty_rows_removed.to_string(),
            report.duplicate_rows_removed.to_string(),
            report.rows_settled.to_string(),
            report.output_rows.to_string(),
        ]],
    );

    if let Some(output) = &args.output {
        let records = cleaned.table.records(cleaned.table.row_count());
        io_utils::write_json_pretty(output, &records)?;
        debug!("Wrote {} record(s) to {output:?}", records.len());
    }
    Ok(())
}

fn handle_schema(args: &cli::InputArgs) -> Result<()> {
    let cleaned = load_and_clean(args)?;
    render::print_table(&["column", "type"], &schema_rows(&cleaned));
    Ok(())
}

fn handle_stats(args: &cli::StatsArgs) -> Result<()> {
    let cleaned = load_and_clean(&args.input)?;
    if args.anomalies {
        let report = stats::anomaly_statistics(&cleaned.table);
        render::print_table(
            &["column", "mean", "std", "outliers", "max_zscore"],
            &stats::anomaly_rows(&report),
        );
        info!(
            "{} column(s) with z-score outliers: {}",
            report.anomalies.len(),
            report.anomalies.iter().map(|a| &a.column).join(", ")
        );
    } else {
        let trend = stats::trend_statistics(&cleaned.table);
        render::print_table(
            &["column", "mean", "min", "max", "std"],
            &stats::trend_rows(&trend),
        );
    }
    Ok(())
}

fn handle_prompt(args: &cli::PromptArgs) -> Result<()> {
    let settings = AnalysisSettings::load_or_default(args.store.config.as_deref())?;
    let store = DirectoryStore::open(&args.store.store)?;
    let (file, processed) = analysis::load_inputs(&store, args.store.file_id)?;
    let prompt = analysis::build_prompt(&file, &processed, args.analysis_type, &settings)?;
    println!("{prompt}");
    Ok(())
}

fn handle_analyze(args: &cli::AnalyzeArgs) -> Result<()> {
    let settings = AnalysisSettings::load_or_default(args.store.config.as_deref())?;
    let mut store = DirectoryStore::open(&args.store.store)?;
    let producer = ReplayProducer::new(&args.responses);
    info!(
        "Running {} analysis type(s) for file {} with responses from {:?}",
        args.types.len(),
        args.store.file_id,
        producer.dir()
    );
    let mut runner = AnalysisRunner::new(&producer, &mut store, settings);
    let outcome = runner.run(args.store.file_id, &args.types)?;
    let rows = outcome
        .results
        .iter()
        .map(|record| {
            vec![
                record.id.to_string(),
                record.analysis_type.to_string(),
                record.insights.len().to_string(),
                record
                    .chart_config
                    .as_ref()
                    .map(|chart| chart.chart_type.to_string())
                    .unwrap_or_default(),
                status_label(record).to_string(),
            ]
        })
        .collect::<Vec<_>>();
    render::print_table(&["id", "type", "insights", "chart", "status"], &rows);
    println!("{}", outcome.message);
    Ok(())
}

fn handle_results(args: &cli::ResultsArgs) -> Result<()> {
    let store = DirectoryStore::open(&args.store)?;
    let records = store.analyses_newest_first(args.file_id)?;
    if args.json {
        io_utils::write_json_pretty(Path::new("-"), &records)?;
        println!();
        return Ok(());
    }
    let rows = records
        .iter()
        .flat_map(|record| {
            record.insights.iter().map(move |insight| {
                vec![
                    record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    record.analysis_type.to_string(),
                    status_label(record).to_string(),
                    insight.severity.to_string(),
                    insight.title.clone(),
                    insight.description.clone(),
                ]
            })
        })
        .collect::<Vec<_>>();
    render::print_table(
        &["created_at", "type", "status", "severity", "title", "description"],
        &rows,
    );
    info!(
        "{} analysis record(s) for file {}",
        records.len(),
        args.file_id
    );
    Ok(())
}

fn handle_settings(args: &cli::SettingsArgs) -> Result<()> {
    let settings = AnalysisSettings::load_or_default(args.config.as_deref())?;
    print!("{}", settings.to_yaml_string()?);
    Ok(())
}

fn status_label(record: &store::AnalysisRecord) -> &'static str {
    if record.metadata.is_failed() {
        "failed"
    } else {
        "completed"
    }
}

fn display_name(path: &Path, name: Option<&str>) -> String {
    match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stdin".to_string()),
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
