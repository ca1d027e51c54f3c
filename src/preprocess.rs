//! Row filtering, stable keys and duplicate removal.

use std::collections::{BTreeSet, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::input::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessOptions {
    /// Page types to keep; empty keeps everything.
    pub page_types: Vec<String>,
    pub exclude_news: bool,
    pub remove_similar: bool,
    /// Similarity percentage (0..=100) at which a later row counts as a duplicate.
    pub similarity_threshold: u8,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            page_types: Vec::new(),
            exclude_news: false,
            remove_similar: false,
            similarity_threshold: 95,
        }
    }
}

/// Why a row was dropped before analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    PageType,
    ExactDuplicate,
    Similar,
}

/// A dropped input row, exported so the dedup can be audited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedRow {
    pub reason: RemovalReason,
    pub key: String,
    pub date: String,
    pub title: String,
    pub full_text: String,
    pub page_type: String,
    pub url: Option<String>,
}

impl RemovedRow {
    fn new(reason: RemovalReason, r: Record) -> Self {
        Self {
            reason,
            key: r.key,
            date: r.date,
            title: r.title,
            full_text: r.full_text,
            page_type: r.page_type,
            url: r.url,
        }
    }
}

fn page_type_allowed(r: &Record, allowed: &[String], exclude_news: bool) -> bool {
    (allowed.is_empty() || allowed.iter().any(|a| a == &r.page_type))
        && (!exclude_news || r.page_type.trim().to_lowercase() != "news")
}

pub fn filter_page_types(records: Vec<Record>, allowed: &[String], exclude_news: bool) -> Vec<Record> {
    records
        .into_iter()
        .filter(|r| page_type_allowed(r, allowed, exclude_news))
        .collect()
}

/// Hex xxh3 of the lower-cased, whitespace-collapsed `Date|Title|Full Text|Page Type`.
pub fn record_key(r: &Record) -> String {
    let joined = [&r.date, &r.title, &r.full_text, &r.page_type]
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("|")
        .trim()
        .to_lowercase();
    let normalized = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{:016x}", xxh3_64(normalized.as_bytes()))
}

pub fn generate_keys(records: &mut [Record]) {
    for r in records.iter_mut() {
        r.key = record_key(r);
    }
}

/// Keeps the first row of every key. Returns `(kept, removed)`.
pub fn remove_exact_duplicates(records: Vec<Record>) -> (Vec<Record>, Vec<Record>) {
    let mut seen = HashSet::new();
    let (kept, removed): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|r| seen.insert(r.key.clone()));
    if !removed.is_empty() {
        debug!("preprocess: {} exact duplicates removed", removed.len());
    }
    (kept, removed)
}

fn token_set(r: &Record) -> BTreeSet<String> {
    format!("{} {}", r.title, r.full_text)
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Token-set similarity in percent (Jaccard × 100). Two empty texts are identical.
pub fn similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 { 0.0 } else { inter / union * 100.0 }
}

/// Removes rows at least `threshold` percent similar to an earlier kept row.
pub fn remove_similar(records: Vec<Record>, threshold: u8) -> (Vec<Record>, Vec<Record>) {
    let sets: Vec<BTreeSet<String>> = records.iter().map(token_set).collect();
    let mut removed_idx = vec![false; records.len()];
    for i in 0..records.len() {
        if removed_idx[i] {
            continue;
        }
        for j in (i + 1)..records.len() {
            if !removed_idx[j] && similarity(&sets[i], &sets[j]) >= f64::from(threshold) {
                removed_idx[j] = true;
            }
        }
    }
    let mut kept = Vec::new();
    let mut removed = Vec::new();
    for (r, gone) in records.into_iter().zip(removed_idx) {
        if gone { removed.push(r) } else { kept.push(r) }
    }
    (kept, removed)
}

/// Key, filter and deduplicate. Returns the kept rows and every dropped row
/// tagged with the step that dropped it.
pub fn run(mut records: Vec<Record>, options: &PreprocessOptions) -> (Vec<Record>, Vec<RemovedRow>) {
    let before = records.len();
    generate_keys(&mut records);
    let (records, filtered): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|r| page_type_allowed(r, &options.page_types, options.exclude_news));
    let mut removed: Vec<RemovedRow> = filtered
        .into_iter()
        .map(|r| RemovedRow::new(RemovalReason::PageType, r))
        .collect();

    let (mut records, duplicates) = remove_exact_duplicates(records);
    removed.extend(duplicates.into_iter().map(|r| RemovedRow::new(RemovalReason::ExactDuplicate, r)));
    if options.remove_similar {
        let (kept, similar) = remove_similar(records, options.similarity_threshold);
        removed.extend(similar.into_iter().map(|r| RemovedRow::new(RemovalReason::Similar, r)));
        records = kept;
    }
    info!("preprocess: {} of {} rows kept", records.len(), before);
    (records, removed)
}
