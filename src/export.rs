//! Named result tables and file export.

use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::Session;

/// Output format for exported tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Tsv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
        }
    }
}

/// A named table of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Sheet {
    TokenFreq,
    Top50Preview,
    MonthlyTopWords,
    AuditReport,
    EmptyDocReport,
    RemovedRows,
    BuzzPivot,
    ToxicityDetail,
    ToxicitySummary,
    SentimentSentence,
    SentimentDoc,
    SentimentMonth,
    Evidence,
    AprioriRules,
    NetworkNodes,
    NetworkEdges,
    Logs,
}

impl Sheet {
    pub const ALL: [Sheet; 17] = [
        Sheet::TokenFreq,
        Sheet::Top50Preview,
        Sheet::MonthlyTopWords,
        Sheet::AuditReport,
        Sheet::EmptyDocReport,
        Sheet::RemovedRows,
        Sheet::BuzzPivot,
        Sheet::ToxicityDetail,
        Sheet::ToxicitySummary,
        Sheet::SentimentSentence,
        Sheet::SentimentDoc,
        Sheet::SentimentMonth,
        Sheet::Evidence,
        Sheet::AprioriRules,
        Sheet::NetworkNodes,
        Sheet::NetworkEdges,
        Sheet::Logs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Sheet::TokenFreq => "token_freq",
            Sheet::Top50Preview => "top50_preview",
            Sheet::MonthlyTopWords => "monthly_top_words",
            Sheet::AuditReport => "audit_report",
            Sheet::EmptyDocReport => "empty_doc_report",
            Sheet::RemovedRows => "removed_rows",
            Sheet::BuzzPivot => "buzz_pivot",
            Sheet::ToxicityDetail => "toxicity_detail",
            Sheet::ToxicitySummary => "toxicity_summary",
            Sheet::SentimentSentence => "sentiment_sentence",
            Sheet::SentimentDoc => "sentiment_doc",
            Sheet::SentimentMonth => "sentiment_month",
            Sheet::Evidence => "evidence",
            Sheet::AprioriRules => "apriori_rules",
            Sheet::NetworkNodes => "network_nodes",
            Sheet::NetworkEdges => "network_edges",
            Sheet::Logs => "logs",
        }
    }

    /// Parses a comma separated list of sheet names.
    pub fn parse_list(list: &str) -> Result<Vec<Sheet>> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Sheet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Sheet::ALL
            .into_iter()
            .find(|sheet| sheet.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownSheet(s.to_string()))
    }
}

impl TryFrom<String> for Sheet {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Sheet> for String {
    fn from(sheet: Sheet) -> Self {
        sheet.name().to_string()
    }
}

/// Neutralizes spreadsheet formulas: a cell starting with `=`, `+`, `-` or
/// `@` gets a leading `'`. Numbers (negative scores) and cells already
/// starting with `'` are untouched.
///
/// # Example
/// ```
/// use text_mining::csv_safe_cell;
/// assert_eq!(csv_safe_cell("=SUM(A1)".to_string()), "'=SUM(A1)");
/// assert_eq!(csv_safe_cell("-0.5".to_string()), "-0.5");
/// assert_eq!(csv_safe_cell("배송".to_string()), "배송");
/// ```
pub fn csv_safe_cell(cell: String) -> String {
    match cell.chars().next() {
        Some('=' | '+' | '-' | '@') if cell.parse::<f64>().is_err() => format!("'{cell}"),
        _ => cell,
    }
}

/// Rows in a sheet of the session.
pub fn sheet_len(session: &Session, sheet: Sheet) -> usize {
    match sheet {
        Sheet::TokenFreq => session.token_freq.len(),
        Sheet::Top50Preview => session.top50.len(),
        Sheet::MonthlyTopWords => session.monthly_top.len(),
        Sheet::AuditReport => session.leak_audit.len(),
        Sheet::EmptyDocReport => session.empty_docs.len(),
        Sheet::RemovedRows => session.removed_rows.len(),
        Sheet::BuzzPivot => session.buzz_pivot.len(),
        Sheet::ToxicityDetail => session.toxicity_detail.len(),
        Sheet::ToxicitySummary => session.toxicity_summary.len(),
        Sheet::SentimentSentence => session.sentiment_sentence.len(),
        Sheet::SentimentDoc => session.sentiment_doc.len(),
        Sheet::SentimentMonth => session.sentiment_month.len(),
        Sheet::Evidence => session.evidence.len(),
        Sheet::AprioriRules => session.rules.len(),
        Sheet::NetworkNodes => session.network.nodes.len(),
        Sheet::NetworkEdges => session.network.edges.len(),
        Sheet::Logs => session.logs.len(),
    }
}

fn write_rows<T: Serialize>(rows: &[T], format: ExportFormat, path: &Path) -> Result<()> {
    match format {
        ExportFormat::Json => {
            let file = File::create(path).map_err(|e| Error::io(path, e))?;
            serde_json::to_writer_pretty(BufWriter::new(file), rows)?;
        }
        ExportFormat::Csv | ExportFormat::Tsv => {
            // serialize first so the header comes from the row type, then
            // rewrite every cell through the formula guard
            let mut staged = csv::Writer::from_writer(Vec::new());
            for row in rows {
                staged.serialize(row)?;
            }
            let data = staged.into_inner().map_err(|e| Error::io(path, e.into_error()))?;
            let delimiter = if format == ExportFormat::Tsv { b'\t' } else { b',' };
            let mut wtr = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .from_path(path)?;
            let mut rdr = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_reader(data.as_slice());
            for record in rdr.records() {
                let record = record?;
                wtr.write_record(record.iter().map(|c| csv_safe_cell(c.to_string())))?;
            }
            wtr.flush().map_err(|e| Error::io(path, e))?;
        }
    }
    Ok(())
}

fn write_sheet(session: &Session, sheet: Sheet, format: ExportFormat, path: &Path) -> Result<()> {
    match sheet {
        Sheet::TokenFreq => write_rows(&session.token_freq, format, path),
        Sheet::Top50Preview => write_rows(&session.top50, format, path),
        Sheet::MonthlyTopWords => write_rows(&session.monthly_top, format, path),
        Sheet::AuditReport => write_rows(&session.leak_audit, format, path),
        Sheet::EmptyDocReport => write_rows(&session.empty_docs, format, path),
        Sheet::RemovedRows => write_rows(&session.removed_rows, format, path),
        Sheet::BuzzPivot => write_rows(&session.buzz_pivot, format, path),
        Sheet::ToxicityDetail => write_rows(&session.toxicity_detail, format, path),
        Sheet::ToxicitySummary => write_rows(&session.toxicity_summary, format, path),
        Sheet::SentimentSentence => write_rows(&session.sentiment_sentence, format, path),
        Sheet::SentimentDoc => write_rows(&session.sentiment_doc, format, path),
        Sheet::SentimentMonth => write_rows(&session.sentiment_month, format, path),
        Sheet::Evidence => write_rows(&session.evidence, format, path),
        Sheet::AprioriRules => write_rows(&session.rules, format, path),
        Sheet::NetworkNodes => write_rows(&session.network.nodes, format, path),
        Sheet::NetworkEdges => write_rows(&session.network.edges, format, path),
        Sheet::Logs => write_rows(&session.logs, format, path),
    }
}

/// Writes one file per selected sheet to `out_dir`, named
/// `<session name>_<YYYYmmdd_HHMMSS>_<sheet>.<ext>`. Empty sheets are skipped
/// unless `include_empty` is set. Returns the written paths.
pub fn export_sheets(
    session: &Session,
    sheets: &[Sheet],
    format: ExportFormat,
    out_dir: &Path,
    include_empty: bool,
) -> Result<Vec<PathBuf>> {
    if sheets.is_empty() {
        return Err(Error::NoSheetsSelected);
    }
    fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
    let local: DateTime<Local> = Local::now();
    let stamp = local.format("%Y%m%d_%H%M%S").to_string();
    let stem = if session.name.is_empty() {
        "text_mining"
    } else {
        session.name.as_str()
    };

    let mut written = Vec::new();
    for &sheet in sheets {
        if !include_empty && sheet_len(session, sheet) == 0 {
            debug!("export: {sheet} is empty, skipped");
            continue;
        }
        let path = out_dir.join(format!("{stem}_{stamp}_{sheet}.{}", format.extension()));
        write_sheet(session, sheet, format, &path)?;
        written.push(path);
    }
    info!("export: {} file(s) written to {}", written.len(), out_dir.display());
    Ok(written)
}
