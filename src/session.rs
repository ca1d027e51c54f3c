//! Results of one pipeline run.

use log::info;
use serde::Serialize;

use crate::association::RuleRow;
use crate::evidence::EvidenceRow;
use crate::frequency::{FreqRow, MonthlyRow};
use crate::network::NetworkGraph;
use crate::period::PivotRow;
use crate::preprocess::RemovedRow;
use crate::sentiment::{DocSentimentRow, MonthSentimentRow, SentenceRow};
use crate::tokenize::{Document, EmptyDocRow, LeakRow};
use crate::toxicity::{Level, ToxicityDetailRow, ToxicitySummaryRow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub stage: String,
    pub message: String,
}

/// Every table produced by a run. A new run builds a new session; nothing
/// here is updated in place by later stages.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Prefix for exported file names.
    pub name: String,
    pub documents: Vec<Document>,
    pub removed_rows: Vec<RemovedRow>,
    pub token_freq: Vec<FreqRow>,
    pub top50: Vec<FreqRow>,
    pub monthly_top: Vec<MonthlyRow>,
    pub leak_audit: Vec<LeakRow>,
    pub empty_docs: Vec<EmptyDocRow>,
    pub buzz_pivot: Vec<PivotRow>,
    pub toxicity_detail: Vec<ToxicityDetailRow>,
    pub toxicity_summary: Vec<ToxicitySummaryRow>,
    pub sentiment_sentence: Vec<SentenceRow>,
    pub sentiment_doc: Vec<DocSentimentRow>,
    pub sentiment_month: Vec<MonthSentimentRow>,
    pub evidence: Vec<EvidenceRow>,
    /// Degrade-and-continue notes from evidence extraction.
    pub diagnostics: Vec<String>,
    pub rules: Vec<RuleRow>,
    pub network: NetworkGraph,
    pub logs: Vec<LogEntry>,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn log(&mut self, stage: &str, message: impl Into<String>) {
        let message = message.into();
        info!("{stage}: {message}");
        self.logs.push(LogEntry {
            stage: stage.to_string(),
            message,
        });
    }

    /// Number of documents per toxicity level (LOW, MED, HIGH).
    pub fn level_counts(&self) -> [(Level, usize); 3] {
        [Level::Low, Level::Med, Level::High]
            .map(|l| (l, self.toxicity_detail.iter().filter(|r| r.level == l).count()))
    }

    /// Mean document sentiment, if any unit was scored.
    pub fn mean_sentiment(&self) -> Option<f64> {
        if self.sentiment_doc.is_empty() {
            return None;
        }
        let sum: f64 = self.sentiment_doc.iter().map(|d| d.mean_score).sum();
        Some(sum / self.sentiment_doc.len() as f64)
    }
}
