//! Rule-based sentiment scoring.
//!
//! A unit's score combines evidence polarity with a profanity adjustment and
//! is always clamped to the five-point range `-2..=2`.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::evidence::{Evidence, EvidenceResponse};
use crate::normalize::{self, CleanOptions};
use crate::period::Period;
use crate::tokenize::Document;
use crate::toxicity::{ContextMode, Level, ProfanityRole, RoleDeltas, ToxicityDetector};

pub const MIN_SCORE: i32 = -2;
pub const MAX_SCORE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfanityMode {
    /// -2 once at least one match exists.
    #[default]
    #[serde(rename = "ONCE_FIXED")]
    OnceFixed,
    /// `per_hit_delta × matches`, bounded only by the final clamp.
    #[serde(rename = "COUNT_ACCUM")]
    CountAccum,
    /// `per_hit_delta × matches`, floored at -2.
    #[serde(rename = "COUNT_CAP_TO_2")]
    CountCapTo2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfanityScope {
    #[default]
    CleanTextOnly,
    RawTextOnly,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub profanity_mode: ProfanityMode,
    pub per_hit_delta: i32,
    pub profanity_scope: ProfanityScope,
    pub context_mode: ContextMode,
    pub role_deltas: RoleDeltas,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            profanity_mode: ProfanityMode::OnceFixed,
            per_hit_delta: -2,
            profanity_scope: ProfanityScope::CleanTextOnly,
            context_mode: ContextMode::ContextAware,
            role_deltas: RoleDeltas::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub evidence_scores: Vec<i32>,
    pub profanity_delta: i32,
    pub matches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentimentResult {
    pub unit_id: String,
    pub score_5: i32,
    pub profanity_count: usize,
    pub breakdown: Breakdown,
}

/// Deterministic scorer; performs no I/O.
pub struct RuleEngine {
    profanity: Vec<String>,
    policy: ScoringPolicy,
}

impl RuleEngine {
    pub fn new(profanity: Vec<String>, policy: ScoringPolicy) -> Self {
        let profanity = profanity.into_iter().filter(|p| !p.is_empty()).collect();
        Self { profanity, policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Lexicon entries occurring anywhere in the scoped text, each counted once.
    pub fn profanity_matches(&self, clean_text: &str, raw_text: &str) -> Vec<String> {
        let scoped = match self.policy.profanity_scope {
            ProfanityScope::CleanTextOnly => clean_text.to_string(),
            ProfanityScope::RawTextOnly => raw_text.to_string(),
            ProfanityScope::Both => format!("{raw_text} {clean_text}"),
        };
        self.profanity
            .iter()
            .filter(|p| scoped.contains(p.as_str()))
            .cloned()
            .collect()
    }

    fn mode_delta(&self, hits: usize) -> i32 {
        if hits == 0 {
            return 0;
        }
        let per_hit = self.policy.per_hit_delta.saturating_mul(hits as i32);
        match self.policy.profanity_mode {
            ProfanityMode::OnceFixed => -2,
            ProfanityMode::CountAccum => per_hit,
            ProfanityMode::CountCapTo2 => per_hit.max(-2),
        }
    }

    pub fn score(
        &self,
        unit_id: &str,
        evidence: &[Evidence],
        clean_text: &str,
        raw_text: &str,
        roles: &[ProfanityRole],
    ) -> SentimentResult {
        let evidence_scores: Vec<i32> = evidence.iter().map(Evidence::base_score).collect();
        let matches = self.profanity_matches(clean_text, raw_text);
        let profanity_delta =
            if self.policy.context_mode == ContextMode::ContextAware && !roles.is_empty() {
                self.policy.role_deltas.combined(roles)
            } else {
                self.mode_delta(matches.len())
            };
        let total = evidence_scores
            .iter()
            .fold(profanity_delta, |acc, s| acc.saturating_add(*s));
        SentimentResult {
            unit_id: unit_id.to_string(),
            score_5: total.clamp(MIN_SCORE, MAX_SCORE),
            profanity_count: matches.len(),
            breakdown: Breakdown {
                evidence_scores,
                profanity_delta,
                matches,
            },
        }
    }
}

/// Splits on `.`, `?`, `!` and line breaks; blank pieces are skipped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '?', '!', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// A sentence of one document, the unit of sentiment scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceUnit {
    pub id: String,
    pub document_id: String,
    pub raw_text: String,
    pub clean_text: String,
    pub period: Period,
    pub category: String,
}

/// Builds sentence units from every document. Sentences whose cleaned text
/// is shorter than `min_len` characters are dropped.
pub fn build_units(
    documents: &[Document],
    clean_options: &CleanOptions,
    min_len: usize,
) -> Result<Vec<SentenceUnit>> {
    let mut units = Vec::new();
    for doc in documents {
        for (idx, sentence) in split_sentences(&doc.raw_text).into_iter().enumerate() {
            let clean_text = normalize::clean(sentence, clean_options);
            if clean_text.chars().count() < min_len {
                continue;
            }
            units.push(SentenceUnit {
                id: format!("{}-{}", doc.id, idx),
                document_id: doc.id.clone(),
                raw_text: sentence.to_string(),
                clean_text,
                period: doc.period.clone(),
                category: doc.category.clone(),
            });
        }
    }
    if units.is_empty() {
        return Err(Error::NoSentences);
    }
    debug!("sentiment: {} sentence units (min length {min_len})", units.len());
    Ok(units)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceRow {
    pub unit_id: String,
    pub document_id: String,
    pub period: Period,
    pub category: String,
    pub text: String,
    pub score_5: i32,
    pub evidence_count: usize,
    pub profanity_count: usize,
    pub profanity_delta: i32,
    pub toxicity_score: f64,
    pub toxicity_level: Level,
    pub targeted: bool,
}

/// Scores every unit: toxicity roles from the detector, evidence from the
/// map (missing units score on profanity alone).
pub fn score_units(
    engine: &RuleEngine,
    detector: &ToxicityDetector,
    units: &[SentenceUnit],
    evidence: &HashMap<&str, &EvidenceResponse>,
) -> Vec<SentenceRow> {
    let rows: Vec<SentenceRow> = units
        .iter()
        .map(|unit| {
            let tox = detector.scan_texts(&unit.id, &unit.raw_text, &unit.clean_text);
            let evs: &[Evidence] = evidence
                .get(unit.id.as_str())
                .map(|r| r.evidences.as_slice())
                .unwrap_or_default();
            let res = engine.score(&unit.id, evs, &unit.clean_text, &unit.raw_text, &tox.roles);
            SentenceRow {
                unit_id: res.unit_id,
                document_id: unit.document_id.clone(),
                period: unit.period.clone(),
                category: unit.category.clone(),
                text: unit.clean_text.clone(),
                score_5: res.score_5,
                evidence_count: evs.len(),
                profanity_count: res.profanity_count,
                profanity_delta: res.breakdown.profanity_delta,
                toxicity_score: tox.score,
                toxicity_level: tox.level,
                targeted: tox.targeted,
            }
        })
        .collect();
    info!("sentiment: {} units scored", rows.len());
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocSentimentRow {
    pub document_id: String,
    pub period: Period,
    pub category: String,
    pub mean_score: f64,
    pub sentences: usize,
    pub toxicity_level: Level,
}

/// Most frequent level; ties go to the level seen first.
fn mode_level(levels: &[Level]) -> Level {
    let mut best = Level::Low;
    let mut best_count = 0;
    for (i, level) in levels.iter().enumerate() {
        if levels[..i].contains(level) {
            continue;
        }
        let count = levels.iter().filter(|l| *l == level).count();
        if count > best_count {
            best = *level;
            best_count = count;
        }
    }
    best
}

/// Mean sentence score and modal toxicity level per document, in order of
/// first appearance.
pub fn doc_rollup(rows: &[SentenceRow]) -> Vec<DocSentimentRow> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&SentenceRow>> = HashMap::new();
    for row in rows {
        let entry = groups.entry(row.document_id.as_str()).or_default();
        if entry.is_empty() {
            order.push(row.document_id.as_str());
        }
        entry.push(row);
    }
    order
        .into_iter()
        .filter_map(|id| {
            let group = groups.get(id)?;
            let first = group.first()?;
            let sum: i32 = group.iter().map(|r| r.score_5).sum();
            let levels: Vec<Level> = group.iter().map(|r| r.toxicity_level).collect();
            Some(DocSentimentRow {
                document_id: id.to_string(),
                period: first.period.clone(),
                category: first.category.clone(),
                mean_score: f64::from(sum) / group.len() as f64,
                sentences: group.len(),
                toxicity_level: mode_level(&levels),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSentimentRow {
    pub period: Period,
    pub mean_score: f64,
    pub high_rate: f64,
    pub documents: usize,
}

/// Mean document score and share of HIGH-toxicity documents per period.
pub fn month_rollup(docs: &[DocSentimentRow]) -> Vec<MonthSentimentRow> {
    let mut groups: BTreeMap<&Period, (f64, usize, usize)> = BTreeMap::new();
    for doc in docs {
        let g = groups.entry(&doc.period).or_insert((0.0, 0, 0));
        g.0 += doc.mean_score;
        if doc.toxicity_level == Level::High {
            g.1 += 1;
        }
        g.2 += 1;
    }
    groups
        .into_iter()
        .map(|(period, (sum, high, n))| MonthSentimentRow {
            period: period.clone(),
            mean_score: sum / n as f64,
            high_rate: high as f64 / n as f64,
            documents: n,
        })
        .collect()
}
