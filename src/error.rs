//! Error types.
//!
//! Every message starts with the stage that failed so it can be shown to an
//! operator as-is.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("input: cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input: cannot parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("input: no .csv, .tsv or .xlsx files found under {}", .0.display())]
    NoInputFiles(PathBuf),

    #[error("input: missing required column(s): {} - check the column mapping", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("preprocess: no rows left after filtering - relax the page type filter")]
    NoRows,

    #[error("period: no row has a parseable date - check the date column mapping")]
    NoValidDates,

    #[error("config: {0}")]
    Config(String),

    #[error("sentiment: no sentence-level text available - relax filters (minimum sentence length)")]
    NoSentences,

    #[error("sentiment: evidence extraction failed for {unit} on model {model}: {message}")]
    Evidence {
        unit: String,
        model: String,
        message: String,
    },

    #[error(
        "network: data too large ({documents} documents, {tokens} distinct tokens) - sample rows or raise stopwords/minimum frequency"
    )]
    NetworkTooLarge { documents: usize, tokens: usize },

    #[error("export: no tables selected")]
    NoSheetsSelected,

    #[error("export: unknown table name {0:?}")]
    UnknownSheet(String),

    #[error("export: {0}")]
    Csv(#[from] csv::Error),

    #[error("export: {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker: background job ended without reporting a result")]
    WorkerLost,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
