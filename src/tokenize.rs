//! Tokenizer adapter around an external morphological analyzer.
//!
//! The analyzer is an opaque capability (`MorphAnalyzer`). Whenever it fails
//! the adapter falls back to [`simple_tokenize`], so a broken or missing
//! analyzer never stops a run.

use std::collections::HashSet;
use std::sync::{LazyLock, OnceLock};

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frequency::{TokenCounter, TokenStatistics};
use crate::input::Record;
use crate::normalize::{self, CRY_CLASS, CleanOptions, LAUGH_CLASS, is_hangul_syllable};
use crate::period::{Period, PeriodUnit, parse_date};

pub const DEFAULT_STOPWORDS: &[&str] = &[
    "하다", "되다", "있다", "없다", "이다", "그리고", "하지만", "그러나",
];

const NOUN_TAGS: &[&str] = &["NNG", "NNP"];
const CONTENT_TAGS: &[&str] = &["NNG", "NNP", "VA", "VV", "XR", "MAG"];
const LEAK_AUDIT_LIMIT: usize = 100;
const SNIPPET_CHARS: usize = 120;

static LAUGH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LAUGH_CLASS).expect("valid laugh class"));
static CRY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(CRY_CLASS).expect("valid cry class"));

/// One analyzed morpheme: surface form plus a Sejong-style POS tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Morpheme {
    pub surface: String,
    pub tag: String,
}

impl Morpheme {
    pub fn new(surface: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            tag: tag.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("analyzer initialisation failed: {0}")]
    Init(String),
    #[error("analyzer failed: {0}")]
    Analyze(String),
    #[error("no morphological analyzer available")]
    Unavailable,
}

/// External morphological analyzer: `analyze(text) -> [(surface, tag)]`.
pub trait MorphAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<Morpheme>, AnalyzerError>;
}

/// Stand-in used when no analyzer is installed; every call fails, so the
/// adapter always takes the regex fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAnalyzer;

impl MorphAnalyzer for NoAnalyzer {
    fn analyze(&self, _text: &str) -> Result<Vec<Morpheme>, AnalyzerError> {
        Err(AnalyzerError::Unavailable)
    }
}

/// Builds the wrapped analyzer on first use. A failed initialisation is
/// remembered and reported on every later call.
pub struct LazyAnalyzer<A, F> {
    cell: OnceLock<Result<A, AnalyzerError>>,
    init: F,
}

impl<A, F> LazyAnalyzer<A, F>
where
    F: Fn() -> Result<A, AnalyzerError>,
{
    pub fn new(init: F) -> Self {
        Self {
            cell: OnceLock::new(),
            init,
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<A, F> MorphAnalyzer for LazyAnalyzer<A, F>
where
    A: MorphAnalyzer,
    F: Fn() -> Result<A, AnalyzerError>,
{
    fn analyze(&self, text: &str) -> Result<Vec<Morpheme>, AnalyzerError> {
        match self.cell.get_or_init(|| (self.init)()) {
            Ok(analyzer) => analyzer.analyze(text),
            Err(e) => Err(e.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum PosMode {
    /// General and proper nouns (NNG, NNP).
    #[default]
    #[serde(rename = "noun")]
    #[value(name = "noun")]
    Noun,
    /// Nouns plus adjectives, verbs, roots and general adverbs.
    #[serde(rename = "noun+adj+verb")]
    #[value(name = "noun+adj+verb")]
    NounAdjVerb,
}

impl PosMode {
    pub fn accepts(self, tag: &str) -> bool {
        let tags = match self {
            PosMode::Noun => NOUN_TAGS,
            PosMode::NounAdjVerb => CONTENT_TAGS,
        };
        tags.contains(&tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// External morphological analyzer, regex fallback on failure.
    #[default]
    Morph,
    /// Regex extractor only.
    Simple,
}

/// Which record fields are tokenized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    Title,
    Full,
    #[default]
    Both,
}

impl TextSource {
    pub fn text_of(self, record: &Record) -> String {
        match self {
            TextSource::Title => record.title.clone(),
            TextSource::Full => record.full_text.clone(),
            TextSource::Both => format!("{} {}", record.title, record.full_text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerOptions {
    pub analyzer: AnalyzerKind,
    pub pos_mode: PosMode,
    /// Tokens shorter than this (in characters) are dropped.
    pub min_length: usize,
    /// Minimum length for the strict pure-Korean check.
    pub token_min_len: usize,
    pub strict_korean_only: bool,
    /// User stopwords, added to [`DEFAULT_STOPWORDS`].
    pub stopwords: Vec<String>,
    /// Per-run drop list.
    pub custom_drop: Vec<String>,
    pub text_source: TextSource,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerKind::Morph,
            pos_mode: PosMode::Noun,
            min_length: 2,
            token_min_len: 2,
            strict_korean_only: true,
            stopwords: Vec::new(),
            custom_drop: Vec::new(),
            text_source: TextSource::Both,
        }
    }
}

/// Regex-only tokenizer: maximal runs of Hangul syllables of at least `min_len` characters.
///
/// # Example
/// ```
/// use text_mining::tokenize::simple_tokenize;
/// assert_eq!(simple_tokenize("배송 빨라요 굿 good", 2), vec!["배송", "빨라요"]);
/// ```
pub fn simple_tokenize(text: &str, min_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut run = String::new();
    let mut run_len = 0;
    for c in text.chars().chain(std::iter::once(' ')) {
        if is_hangul_syllable(c) {
            run.push(c);
            run_len += 1;
        } else {
            if run_len >= min_len.max(1) {
                out.push(std::mem::take(&mut run));
            }
            run.clear();
            run_len = 0;
        }
    }
    out
}

/// True when `token` consists only of Hangul syllables and has at least
/// `min_len` of them (`^[가-힣]{min_len,}$`).
pub fn is_pure_korean(token: &str, min_len: usize) -> bool {
    token.chars().count() >= min_len && token.chars().all(is_hangul_syllable)
}

/// Why a token failed the pure-Korean check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeakType {
    Digit,
    Latin,
    Laugh,
    Cry,
    Other,
}

impl LeakType {
    /// Fixed precedence: digit, laugh, cry, Latin, other. First match wins.
    pub fn classify(token: &str) -> Self {
        if token.chars().any(|c| c.is_ascii_digit()) {
            LeakType::Digit
        } else if LAUGH_RE.is_match(token) {
            LeakType::Laugh
        } else if CRY_RE.is_match(token) {
            LeakType::Cry
        } else if token.chars().any(|c| c.is_ascii_alphabetic()) {
            LeakType::Latin
        } else {
            LeakType::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LeakType::Digit => "DIGIT",
            LeakType::Latin => "LATIN",
            LeakType::Laugh => "LAUGH",
            LeakType::Cry => "CRY",
            LeakType::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakRow {
    pub token: String,
    pub count: usize,
    pub leak_type: LeakType,
}

/// Most frequent leaked tokens with their leak type.
pub fn leak_audit(leaked: &TokenCounter) -> Vec<LeakRow> {
    leaked
        .most_common(Some(LEAK_AUDIT_LIMIT))
        .into_iter()
        .map(|(token, count)| LeakRow {
            leak_type: LeakType::classify(&token),
            token,
            count,
        })
        .collect()
}

/// Result of tokenizing one text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    pub kept: Vec<String>,
    pub leaked: Vec<String>,
    pub fell_back: bool,
}

pub struct Tokenizer<'a> {
    analyzer: &'a dyn MorphAnalyzer,
    options: TokenizerOptions,
    stopwords: HashSet<String>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(analyzer: &'a dyn MorphAnalyzer, options: TokenizerOptions) -> Self {
        let stopwords = DEFAULT_STOPWORDS
            .iter()
            .map(|s| s.to_string())
            .chain(options.stopwords.iter().map(|s| s.trim().to_string()))
            .chain(options.custom_drop.iter().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            analyzer,
            options,
            stopwords,
        }
    }

    pub fn options(&self) -> &TokenizerOptions {
        &self.options
    }

    /// Surface forms kept by the POS filter and the minimum length, before
    /// stopword filtering. The flag reports whether the fallback was used.
    pub fn tokenize(&self, text: &str) -> (Vec<String>, bool) {
        let min_len = self.options.min_length;
        if text.trim().is_empty() {
            return (Vec::new(), false);
        }
        if self.options.analyzer == AnalyzerKind::Simple {
            return (simple_tokenize(text, min_len), false);
        }
        match self.analyzer.analyze(text) {
            Ok(morphemes) => {
                let tokens = morphemes
                    .into_iter()
                    .filter(|m| self.options.pos_mode.accepts(&m.tag))
                    .map(|m| m.surface)
                    .filter(|s| s.chars().count() >= min_len)
                    .collect();
                (tokens, false)
            }
            Err(e) => {
                debug!("tokenizer: {e}; using regex fallback");
                (simple_tokenize(text, min_len), true)
            }
        }
    }

    /// Drops stopwords and, in strict mode, routes every token that is not
    /// pure Korean to the leaked list.
    pub fn filter(&self, tokens: Vec<String>) -> (Vec<String>, Vec<String>) {
        let mut kept = Vec::new();
        let mut leaked = Vec::new();
        for tok in tokens {
            if self.stopwords.contains(&tok) {
                continue;
            }
            if self.options.strict_korean_only && !is_pure_korean(&tok, self.options.token_min_len)
            {
                leaked.push(tok);
            } else {
                kept.push(tok);
            }
        }
        (kept, leaked)
    }

    pub fn run(&self, text: &str) -> Tokens {
        let (raw, fell_back) = self.tokenize(text);
        let (kept, leaked) = self.filter(raw);
        Tokens {
            kept,
            leaked,
            fell_back,
        }
    }
}

/// A cleaned and tokenized input row. Built once per row, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub raw_text: String,
    pub clean_text: String,
    pub tokens: Vec<String>,
    pub date: Option<NaiveDateTime>,
    pub period: Period,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyDocRow {
    pub key: String,
    pub date: String,
    pub category: String,
    pub title: String,
    pub raw_snippet: String,
    pub clean_snippet: String,
    pub empty_clean: bool,
    pub empty_token: bool,
    pub reason_hint: String,
}

/// Output of the tokenization stage.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub documents: Vec<Document>,
    pub stats: TokenStatistics,
    pub leaked: TokenCounter,
    pub empty_docs: Vec<EmptyDocRow>,
    pub fallbacks: usize,
}

fn snippet(s: &str) -> String {
    s.chars().take(SNIPPET_CHARS).collect()
}

fn empty_reason(raw: &str, empty_clean: bool) -> String {
    if empty_clean {
        let script = whatlang::detect_script(raw)
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| "none".to_string());
        format!("Clean text empty (non-Korean/emoji removed, raw script: {script})")
    } else {
        "Tokens filtered out (stopwords, minimum length or non-Korean)".to_string()
    }
}

/// Cleans and tokenizes every record, accumulating global counters, the
/// leak audit and the empty-document report.
pub fn build_corpus(
    records: &[Record],
    clean_options: &CleanOptions,
    unit: PeriodUnit,
    tokenizer: &Tokenizer<'_>,
) -> Corpus {
    let source = tokenizer.options().text_source;
    let mut corpus = Corpus::default();
    for record in records {
        let base = source.text_of(record);
        let clean_text = normalize::clean(&base, clean_options);
        let out = tokenizer.run(&clean_text);
        if out.fell_back {
            corpus.fallbacks += 1;
        }
        corpus.leaked.extend(&out.leaked);

        let empty_clean = clean_text.is_empty();
        if empty_clean || out.kept.is_empty() {
            corpus.empty_docs.push(EmptyDocRow {
                key: record.key.clone(),
                date: record.date.clone(),
                category: record.page_type.clone(),
                title: record.title.clone(),
                raw_snippet: snippet(&record.full_text),
                clean_snippet: snippet(&clean_text),
                empty_clean,
                empty_token: out.kept.is_empty(),
                reason_hint: empty_reason(&base, empty_clean),
            });
        }
        corpus.stats.observe(&out.kept);

        let date = parse_date(&record.date);
        corpus.documents.push(Document {
            id: record.key.clone(),
            title: record.title.clone(),
            raw_text: base,
            clean_text,
            tokens: out.kept,
            period: unit.bucket(date.as_ref()),
            date,
            category: record.page_type.clone(),
        });
    }
    if corpus.fallbacks > 0 {
        warn!(
            "tokenizer: analyzer failed on {} document(s); regex fallback used",
            corpus.fallbacks
        );
    }
    info!(
        "tokenizer: {} documents, {} distinct tokens, {} leaked, {} empty",
        corpus.documents.len(),
        corpus.stats.distinct(),
        corpus.leaked.len(),
        corpus.empty_docs.len()
    );
    corpus
}
