#![forbid(unsafe_code)]
//! # Text Mining
//!
//! Batch text-mining pipeline for Korean social and review data.
//!
//! Input rows are cleaned and tokenized, then aggregated into frequency
//! tables, scanned for profanity and its contextual role, scored with a
//! bounded rule-based sentiment model and linked into a token
//! co-occurrence network with communities. Every result is a named table
//! of a [`Session`] that can be exported as CSV, TSV or JSON.
//!
//! The morphological analyzer and the evidence-extraction service (an LLM)
//! are external; plug them in through [`MorphAnalyzer`] and
//! [`EvidenceService`].
//!
//! ## Example
//! ```no_run
//! use std::path::Path;
//! use text_mining::{pipeline, input, NoAnalyzer, PipelineConfig};
//!
//! let config = PipelineConfig::default();
//! let records = input::load_records(Path::new("reviews.csv"), &config.columns)?;
//! let session = pipeline::run(records, &config, &NoAnalyzer, None)?;
//! println!("{} tokens", session.token_freq.len());
//! # Ok::<(), text_mining::Error>(())
//! ```

pub mod association;
pub mod community;
pub mod config;
pub mod error;
pub mod evidence;
pub mod export;
pub mod frequency;
pub mod input;
pub mod network;
pub mod normalize;
pub mod period;
pub mod pipeline;
pub mod preprocess;
pub mod sentiment;
pub mod session;
pub mod tokenize;
pub mod toxicity;
pub mod worker;
mod xlsx;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use evidence::{EvidenceService, ServiceError, StaticEvidenceService};
pub use export::{ExportFormat, Sheet, csv_safe_cell, export_sheets};
pub use input::{ColumnMapping, Record, collect_files, load_records};
pub use network::EdgeScore;
pub use period::PeriodUnit;
pub use session::Session;
pub use tokenize::{AnalyzerError, MorphAnalyzer, NoAnalyzer, PosMode, TextSource};
pub use worker::spawn_batch;
