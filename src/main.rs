#![forbid(unsafe_code)]
//! # Text Mining CLI
//!
//! Command-line front end for the `text_mining` crate. Runs the full
//! pipeline over a table file (or a directory of them), prints a short
//! summary and exports the selected result tables.
//!
//! ## Example
//! ```bash
//! cargo run --release -- data/reviews.csv --period quarter --edge-score npmi --export-format json
//! ```
//!
//! See `--help` for all available options.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::{debug, error, warn};
use text_mining::tokenize::AnalyzerKind;
use text_mining::{
    EdgeScore, EvidenceService, ExportFormat, NoAnalyzer, PeriodUnit, PipelineConfig, PosMode,
    Result, Session, Sheet, StaticEvidenceService, TextSource, export_sheets, load_records,
    pipeline, spawn_batch,
};

const SUMMARY_TOKENS: usize = 20;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// File or directory with .csv, .tsv or .xlsx tables
    path: PathBuf,

    /// JSON configuration file; missing keys use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Period unit for the time tables
    #[arg(long)]
    period: Option<PeriodUnit>,

    /// Part-of-speech selection
    #[arg(long)]
    pos: Option<PosMode>,

    /// Record fields to tokenize
    #[arg(long)]
    text_source: Option<TextSource>,

    /// Edge association measure for the co-occurrence network
    #[arg(long)]
    edge_score: Option<EdgeScore>,

    /// Percentage of scored edges to keep (0-100)
    #[arg(long)]
    top_edge_pct: Option<f64>,

    /// Minimum co-occurrence count for an edge
    #[arg(long)]
    min_edge_weight: Option<usize>,

    /// Leave nodes with degree <= 1 out of the node table
    #[arg(long, default_value_t = false)]
    hide_isolates: bool,

    /// JSON file with pre-extracted evidence keyed by sentence id
    #[arg(long)]
    evidence: Option<PathBuf>,

    /// Output format for export (csv, tsv, json)
    #[arg(long)]
    export_format: Option<ExportFormat>,

    /// Comma separated table names to export (default: all)
    #[arg(long)]
    sheets: Option<String>,

    /// Also write tables without rows
    #[arg(long, default_value_t = false)]
    include_empty: bool,

    /// Directory for exported files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    // no analyzer ships with the binary
    config.tokenizer.analyzer = AnalyzerKind::Simple;
    if let Some(unit) = cli.period {
        config.frequency.period_unit = unit;
    }
    if let Some(pos) = cli.pos {
        config.tokenizer.pos_mode = pos;
    }
    if let Some(source) = cli.text_source {
        config.tokenizer.text_source = source;
    }
    if let Some(method) = cli.edge_score {
        config.network.method = method;
    }
    if let Some(pct) = cli.top_edge_pct {
        config.network.top_edge_pct = pct;
    }
    if let Some(weight) = cli.min_edge_weight {
        config.network.min_edge_weight = weight;
    }
    if cli.hide_isolates {
        config.network.hide_isolates = true;
    }
    if let Some(format) = cli.export_format {
        config.export.format = format;
    }
    if let Some(list) = &cli.sheets {
        config.export.sheets = Sheet::parse_list(list)?;
    }
    if cli.include_empty {
        config.export.include_empty = true;
    }
    config.validate()?;
    Ok(config)
}

fn session_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && *s != ".")
        .unwrap_or("text_mining")
        .to_string()
}

fn print_summary(session: &Session) {
    println!("=== Top {SUMMARY_TOKENS} tokens ===");
    for row in session.token_freq.iter().take(SUMMARY_TOKENS) {
        println!("{}\t{}\t{}", row.token, row.count, row.doc_freq);
    }

    println!("\n=== Toxicity ===");
    let levels: Vec<String> = session
        .level_counts()
        .iter()
        .map(|(level, n)| format!("{} {n}", level.as_str()))
        .collect();
    println!("{}", levels.join(" | "));

    println!("\n=== Sentiment ===");
    match session.mean_sentiment() {
        Some(mean) => println!(
            "mean score {mean:.2} over {} documents ({} sentences)",
            session.sentiment_doc.len(),
            session.sentiment_sentence.len()
        ),
        None => println!("no sentences scored"),
    }

    println!("\n=== Network ===");
    println!(
        "{} nodes, {} edges",
        session.network.nodes.len(),
        session.network.edges.len()
    );
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    let records = load_records(&cli.path, &config.columns)?;
    let evidence = cli
        .evidence
        .as_deref()
        .map(StaticEvidenceService::from_path)
        .transpose()?;
    debug!("evidence entries loaded: {}", evidence.as_ref().map_or(0, |e| e.len()));

    let job_config = config.clone();
    let handle = spawn_batch(move || {
        let service = evidence.as_ref().map(|s| s as &dyn EvidenceService);
        pipeline::run(records, &job_config, &NoAnalyzer, service)
    });
    let mut session = handle.wait()?;
    session.name = session_name(&cli.path);

    for note in &session.diagnostics {
        warn!("{note}");
    }
    print_summary(&session);

    let written = export_sheets(
        &session,
        &config.export.sheets,
        config.export.format,
        &cli.out_dir,
        config.export.include_empty,
    )?;
    println!("\n=== Exported ===");
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("Error: {e}");
        process::exit(1);
    }
}
