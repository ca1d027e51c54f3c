//! Pipeline configuration.
//!
//! Every section and field has a default, so a config file only needs the
//! keys it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::association::{AssociationOptions, MAX_ITEMSET_LEN};
use crate::error::{Error, Result};
use crate::export::{ExportFormat, Sheet};
use crate::input::ColumnMapping;
use crate::network::NetworkOptions;
use crate::normalize::CleanOptions;
use crate::period::PeriodUnit;
use crate::preprocess::PreprocessOptions;
use crate::sentiment::ScoringPolicy;
use crate::tokenize::TokenizerOptions;
use crate::toxicity::ToxicityOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyOptions {
    pub min_freq: usize,
    pub top_n: usize,
    /// Tokens kept per month in the monthly table.
    pub monthly_top: usize,
    pub period_unit: PeriodUnit,
    /// Split the buzz pivot by page type.
    pub pivot_by_category: bool,
}

impl Default for FrequencyOptions {
    fn default() -> Self {
        Self {
            min_freq: 2,
            top_n: 50,
            monthly_top: 20,
            period_unit: PeriodUnit::Month,
            pivot_by_category: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentOptions {
    pub policy: ScoringPolicy,
    pub min_sentence_len: usize,
    /// Evidence models in priority order.
    pub models: Vec<String>,
}

impl Default for SentimentOptions {
    fn default() -> Self {
        Self {
            policy: ScoringPolicy::default(),
            min_sentence_len: 3,
            models: vec!["gemini-1.5-pro".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub sheets: Vec<Sheet>,
    pub include_empty: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Csv,
            sheets: Sheet::ALL.to_vec(),
            include_empty: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnMapping,
    pub preprocess: PreprocessOptions,
    pub cleaning: CleanOptions,
    pub tokenizer: TokenizerOptions,
    pub frequency: FrequencyOptions,
    pub toxicity: ToxicityOptions,
    pub sentiment: SentimentOptions,
    pub network: NetworkOptions,
    pub association: AssociationOptions,
    pub export: ExportOptions,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Rejects settings under which no table could be produced.
    pub fn validate(&self) -> Result<()> {
        let pct = self.network.top_edge_pct;
        if !(0.0..=100.0).contains(&pct) {
            return Err(Error::Config(format!(
                "network.top_edge_pct must be between 0 and 100, got {pct}"
            )));
        }
        if self.preprocess.similarity_threshold > 100 {
            return Err(Error::Config(
                "preprocess.similarity_threshold must be at most 100".to_string(),
            ));
        }
        if self.sentiment.models.is_empty() {
            return Err(Error::Config(
                "sentiment.models must name at least one model".to_string(),
            ));
        }
        if self.export.sheets.is_empty() {
            return Err(Error::NoSheetsSelected);
        }
        let assoc = &self.association;
        if !(0.0..=1.0).contains(&assoc.min_support) || !(0.0..=1.0).contains(&assoc.min_confidence) {
            return Err(Error::Config(
                "association.min_support and min_confidence must be between 0 and 1".to_string(),
            ));
        }
        if !(1..=MAX_ITEMSET_LEN).contains(&assoc.max_len) {
            return Err(Error::Config(format!(
                "association.max_len must be between 1 and {MAX_ITEMSET_LEN}, got {}",
                assoc.max_len
            )));
        }
        Ok(())
    }
}
