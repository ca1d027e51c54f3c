//! Lexicon based profanity detection with contextual roles.
//!
//! Each profanity hit is classified by looking at a ±3 token window around
//! it. The document score is the most severe role plus a small bonus per
//! hit; no state is shared between documents.

use std::collections::BTreeMap;

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::period::{Period, PeriodUnit};
use crate::tokenize::Document;

const WINDOW: usize = 3;
const HIT_BONUS: f64 = 0.05;
const MAX_BONUS_HITS: usize = 3;

/// Contextual function of one profanity hit, in ascending severity order
/// of the detector's rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    EmphasisPos,
    GeneralExpletive,
    EmphasisNeg,
    TargetedInsult,
    SlurHate,
}

impl Role {
    pub fn score(self) -> f64 {
        match self {
            Role::EmphasisPos => 0.10,
            Role::GeneralExpletive => 0.35,
            Role::EmphasisNeg => 0.45,
            Role::TargetedInsult => 0.85,
            Role::SlurHate => 0.95,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::EmphasisPos => "EMPHASIS_POS",
            Role::GeneralExpletive => "GENERAL_EXPLETIVE",
            Role::EmphasisNeg => "EMPHASIS_NEG",
            Role::TargetedInsult => "TARGETED_INSULT",
            Role::SlurHate => "SLUR_HATE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Low,
    Med,
    High,
}

impl Level {
    /// Bands are checked from high to low: `>= 0.8` HIGH, `>= 0.4` MED.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Level::High
        } else if score >= 0.4 {
            Level::Med
        } else {
            Level::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Low => "LOW",
            Level::Med => "MED",
            Level::High => "HIGH",
        }
    }
}

/// How profanity translates into a sentiment adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextMode {
    /// Per-role deltas, summed and clamped to [-2, 2].
    #[default]
    ContextAware,
    /// Fixed -2 as soon as one hit exists.
    AlwaysPenalize,
}

/// Sentiment delta per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RoleDeltas {
    pub emphasis_pos: i32,
    pub general_expletive: i32,
    pub emphasis_neg: i32,
    pub targeted_insult: i32,
    pub slur_hate: i32,
}

impl Default for RoleDeltas {
    fn default() -> Self {
        Self {
            emphasis_pos: 0,
            general_expletive: -1,
            emphasis_neg: -1,
            targeted_insult: -2,
            slur_hate: -2,
        }
    }
}

impl RoleDeltas {
    pub fn delta(&self, role: Role) -> i32 {
        match role {
            Role::EmphasisPos => self.emphasis_pos,
            Role::GeneralExpletive => self.general_expletive,
            Role::EmphasisNeg => self.emphasis_neg,
            Role::TargetedInsult => self.targeted_insult,
            Role::SlurHate => self.slur_hate,
        }
    }

    /// Sum of the role deltas, clamped to [-2, 2].
    pub fn combined<'a, I>(&self, roles: I) -> i32
    where
        I: IntoIterator<Item = &'a ProfanityRole>,
    {
        roles
            .into_iter()
            .map(|r| self.delta(r.role))
            .sum::<i32>()
            .clamp(-2, 2)
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Lexicon {
    pub profanity_tokens: Vec<String>,
    pub pos_cues: Vec<String>,
    pub neg_cues: Vec<String>,
    pub target_cues: Vec<String>,
    pub insult_suffix: Vec<String>,
    pub emo_pos: Vec<String>,
    pub slur_hate: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            profanity_tokens: words(&["씨발", "ㅅㅂ", "좆", "병신", "개새끼"]),
            pos_cues: words(&["좋", "대박", "최고", "추천", "만족", "개꿀", "사랑", "감동"]),
            neg_cues: words(&[
                "싫", "최악", "별로", "불만", "실망", "화남", "빡침", "짜증", "환불", "불매",
            ]),
            target_cues: words(&[
                "너", "니", "님", "걔", "저놈", "저년", "작성자", "판매자", "업체", "직원",
            ]),
            insult_suffix: words(&["새끼", "병신", "좆같", "꺼져", "닥쳐", "뒤져"]),
            emo_pos: words(&["ㅠㅠ", "ㅜㅜ", "😍", "❤️", "ㅋㅋ", "ㅎㅎ"]),
            slur_hate: Vec::new(),
        }
    }
}

/// Which document text the detector scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    #[default]
    Clean,
    Raw,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToxicityOptions {
    pub lexicon: Lexicon,
    /// Patterns that mark a window as harmless emphasis.
    pub whitelist: Vec<String>,
    pub context_mode: ContextMode,
    pub role_deltas: RoleDeltas,
    pub text_mode: TextMode,
}

impl Default for ToxicityOptions {
    fn default() -> Self {
        Self {
            lexicon: Lexicon::default(),
            whitelist: Vec::new(),
            context_mode: ContextMode::ContextAware,
            role_deltas: RoleDeltas::default(),
            text_mode: TextMode::Clean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfanityRole {
    pub token: String,
    pub role: Role,
    pub context_window: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleScan {
    pub matches: Vec<String>,
    pub roles: Vec<ProfanityRole>,
    pub targeted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToxicityResult {
    pub document_id: String,
    pub score: f64,
    pub level: Level,
    pub targeted: bool,
    pub matches: Vec<String>,
    pub roles: Vec<ProfanityRole>,
    pub sentiment_delta: i32,
    pub context_mode: ContextMode,
}

fn any_in(cues: &[String], window: &str) -> bool {
    cues.iter().any(|c| !c.is_empty() && window.contains(c.as_str()))
}

fn window_around(tokens: &[&str], idx: usize) -> String {
    let start = idx.saturating_sub(WINDOW);
    let end = (idx + WINDOW + 1).min(tokens.len());
    tokens[start..end].join(" ")
}

/// Most severe role score plus 0.05 per hit (up to three hits), capped at 1.0.
pub fn score_roles(roles: &[ProfanityRole]) -> f64 {
    let Some(base) = roles.iter().map(|r| r.role.score()).reduce(f64::max) else {
        return 0.0;
    };
    let bonus = HIT_BONUS * roles.len().min(MAX_BONUS_HITS) as f64;
    (base + bonus).clamp(0.0, 1.0)
}

pub struct ToxicityDetector {
    options: ToxicityOptions,
}

impl ToxicityDetector {
    pub fn new(options: ToxicityOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ToxicityOptions {
        &self.options
    }

    fn classify(&self, window: &str) -> Role {
        let lex = &self.options.lexicon;
        if any_in(&self.options.whitelist, window) {
            Role::EmphasisPos
        } else if any_in(&lex.slur_hate, window) {
            Role::SlurHate
        } else if any_in(&lex.target_cues, window) || any_in(&lex.insult_suffix, window) {
            Role::TargetedInsult
        } else if any_in(&lex.pos_cues, window) && !any_in(&lex.neg_cues, window) {
            Role::EmphasisPos
        } else if any_in(&lex.neg_cues, window) {
            Role::EmphasisNeg
        } else {
            Role::GeneralExpletive
        }
    }

    /// Finds every whitespace token that is in the profanity lexicon and
    /// assigns it exactly one role.
    pub fn detect_roles(&self, text: &str) -> RoleScan {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut scan = RoleScan::default();
        for (idx, tok) in tokens.iter().enumerate() {
            if !self.options.lexicon.profanity_tokens.iter().any(|p| p == tok) {
                continue;
            }
            let window = window_around(&tokens, idx);
            let role = self.classify(&window);
            if role == Role::TargetedInsult {
                scan.targeted = true;
            }
            scan.matches.push(tok.to_string());
            scan.roles.push(ProfanityRole {
                token: tok.to_string(),
                role,
                context_window: window,
            });
        }
        scan
    }

    pub fn sentiment_delta(&self, scan: &RoleScan) -> i32 {
        if scan.matches.is_empty() {
            return 0;
        }
        match self.options.context_mode {
            ContextMode::AlwaysPenalize => -2,
            ContextMode::ContextAware => self.options.role_deltas.combined(&scan.roles),
        }
    }

    pub fn scan(&self, id: &str, text: &str) -> ToxicityResult {
        let scan = self.detect_roles(text);
        let score = score_roles(&scan.roles);
        let sentiment_delta = self.sentiment_delta(&scan);
        ToxicityResult {
            document_id: id.to_string(),
            score,
            level: Level::from_score(score),
            targeted: scan.targeted,
            matches: scan.matches,
            roles: scan.roles,
            sentiment_delta,
            context_mode: self.options.context_mode,
        }
    }

    /// Scans the raw text, the cleaned text or both, per the configured text mode.
    pub fn scan_texts(&self, id: &str, raw: &str, clean: &str) -> ToxicityResult {
        match self.options.text_mode {
            TextMode::Clean => self.scan(id, clean),
            TextMode::Raw => self.scan(id, raw),
            TextMode::Both => self.scan(id, &format!("{raw} {clean}")),
        }
    }

    /// Scans every document. Results keep the input order.
    pub fn scan_documents(&self, documents: &[Document]) -> Vec<ToxicityResult> {
        let results: Vec<ToxicityResult> = documents
            .par_iter()
            .map(|doc| self.scan_texts(&doc.id, &doc.raw_text, &doc.clean_text))
            .collect();
        info!(
            "toxicity: {} documents scanned, {} with profanity",
            results.len(),
            results.iter().filter(|r| !r.matches.is_empty()).count()
        );
        results
    }
}

/// Flat per-document row for export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToxicityDetailRow {
    pub document_id: String,
    pub period: Period,
    pub category: String,
    pub score: f64,
    pub level: Level,
    pub targeted: bool,
    pub matches: String,
    pub profanity_count: usize,
    /// `token:ROLE` pairs separated by `; `.
    pub roles: String,
    /// Context window of each hit, in the same order as `roles`, separated by ` | `.
    pub windows: String,
    pub sentiment_delta: i32,
    pub context_mode: ContextMode,
}

pub fn detail_rows(documents: &[Document], results: &[ToxicityResult]) -> Vec<ToxicityDetailRow> {
    documents
        .iter()
        .zip(results)
        .map(|(doc, res)| ToxicityDetailRow {
            document_id: res.document_id.clone(),
            period: doc.period.clone(),
            category: doc.category.clone(),
            score: res.score,
            level: res.level,
            targeted: res.targeted,
            matches: res.matches.join(", "),
            profanity_count: res.matches.len(),
            roles: res
                .roles
                .iter()
                .map(|r| format!("{}:{}", r.token, r.role.as_str()))
                .collect::<Vec<_>>()
                .join("; "),
            windows: res
                .roles
                .iter()
                .map(|r| r.context_window.as_str())
                .collect::<Vec<_>>()
                .join(" | "),
            sentiment_delta: res.sentiment_delta,
            context_mode: res.context_mode,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToxicitySummaryRow {
    pub month: Period,
    pub category: String,
    pub avg_toxicity: f64,
    pub high_count: usize,
    pub count: usize,
}

/// Mean score, HIGH count and row count per (month, category). Always
/// monthly, whatever unit the rest of the run buckets by.
pub fn summarize(documents: &[Document], results: &[ToxicityResult]) -> Vec<ToxicitySummaryRow> {
    let mut groups: BTreeMap<(Period, String), (f64, usize, usize)> = BTreeMap::new();
    for (doc, res) in documents.iter().zip(results) {
        let month = PeriodUnit::Month.bucket(doc.date.as_ref());
        let entry = groups
            .entry((month, doc.category.clone()))
            .or_insert((0.0, 0, 0));
        entry.0 += res.score;
        if res.level == Level::High {
            entry.1 += 1;
        }
        entry.2 += 1;
    }
    groups
        .into_iter()
        .map(|((month, category), (sum, high, count))| ToxicitySummaryRow {
            month,
            category,
            avg_toxicity: sum / count as f64,
            high_count: high,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> ToxicityDetector {
        ToxicityDetector::new(ToxicityOptions::default())
    }

    fn role_of(text: &str) -> Role {
        detector().detect_roles(text).roles[0].role
    }

    #[test]
    fn roles_follow_priority() {
        assert_eq!(role_of("아 씨발 진짜"), Role::GeneralExpletive);
        assert_eq!(role_of("씨발 진짜 최고"), Role::EmphasisPos);
        assert_eq!(role_of("씨발 최악 이네"), Role::EmphasisNeg);
        assert_eq!(role_of("씨발 최고 인데 최악"), Role::EmphasisNeg);
        assert_eq!(role_of("판매자 씨발 최고"), Role::TargetedInsult);

        let opts = ToxicityOptions {
            whitelist: vec!["판매자".into()],
            ..ToxicityOptions::default()
        };
        let d = ToxicityDetector::new(opts);
        assert_eq!(d.detect_roles("판매자 씨발").roles[0].role, Role::EmphasisPos);

        let mut lex = Lexicon::default();
        lex.slur_hate = vec!["혐오".into()];
        let d = ToxicityDetector::new(ToxicityOptions {
            lexicon: lex,
            ..ToxicityOptions::default()
        });
        assert_eq!(d.detect_roles("너 씨발 혐오").roles[0].role, Role::SlurHate);
    }

    #[test]
    fn window_is_three_tokens_each_side() {
        let scan = detector().detect_roles("하나 둘 셋 넷 씨발 다섯 여섯 일곱 여덟");
        assert_eq!(scan.roles[0].context_window, "둘 셋 넷 씨발 다섯 여섯 일곱");
        // a cue four tokens away is outside the window
        let far = detector().detect_roles("최악 하나 둘 셋 씨발");
        assert_eq!(far.roles[0].role, Role::GeneralExpletive);
    }

    #[test]
    fn score_and_level() {
        let none = detector().scan("d", "배송 빨라요");
        assert_eq!(none.score, 0.0);
        assert_eq!(none.level, Level::Low);
        assert_eq!(none.sentiment_delta, 0);

        let one = detector().scan("d", "아 씨발 진짜");
        assert!((one.score - 0.40).abs() < 1e-9);
        assert_eq!(one.level, Level::Med);
        assert_eq!(one.sentiment_delta, -1);

        let targeted = detector().scan("d", "판매자 씨발 씨발 씨발 씨발");
        assert!(targeted.targeted);
        assert_eq!(targeted.score, 1.0);
        assert_eq!(targeted.level, Level::High);
        assert_eq!(targeted.sentiment_delta, -2);
    }

    #[test]
    fn score_is_monotone_in_max_severity() {
        let roles = [
            Role::EmphasisPos,
            Role::GeneralExpletive,
            Role::EmphasisNeg,
            Role::TargetedInsult,
            Role::SlurHate,
        ];
        let mut last = 0.0;
        for role in roles {
            let r = ProfanityRole {
                token: "x".into(),
                role,
                context_window: String::new(),
            };
            let s = score_roles(&[r]);
            assert!(s >= last && (0.0..=1.0).contains(&s));
            last = s;
        }
    }

    #[test]
    fn always_penalize_is_fixed() {
        let d = ToxicityDetector::new(ToxicityOptions {
            context_mode: ContextMode::AlwaysPenalize,
            ..ToxicityOptions::default()
        });
        assert_eq!(d.scan("d", "씨발 최고").sentiment_delta, -2);
        assert_eq!(d.scan("d", "최고").sentiment_delta, 0);
    }

    fn document(id: &str, text: &str, date: &str, unit: PeriodUnit) -> Document {
        let date = crate::period::parse_date(date);
        Document {
            id: id.into(),
            title: String::new(),
            raw_text: text.into(),
            clean_text: text.into(),
            tokens: text.split_whitespace().map(String::from).collect(),
            period: unit.bucket(date.as_ref()),
            date,
            category: "리뷰".into(),
        }
    }

    #[test]
    fn detail_rows_keep_each_hit_window() {
        let docs = vec![
            document("a", "판매자 씨발 진짜", "2024-02-10", PeriodUnit::Month),
            document("b", "배송 빨라요", "2024-02-11", PeriodUnit::Month),
        ];
        let results = detector().scan_documents(&docs);
        let rows = detail_rows(&docs, &results);

        assert_eq!(rows[0].profanity_count, 1);
        assert_eq!(rows[0].roles, "씨발:TARGETED_INSULT");
        assert_eq!(rows[0].windows, "판매자 씨발 진짜");
        assert_eq!(rows[1].profanity_count, 0);
        assert!(rows[1].windows.is_empty());
    }

    #[test]
    fn summary_is_monthly_under_a_coarser_unit() {
        let docs = vec![
            document("a", "아 씨발 진짜", "2024-01-05", PeriodUnit::Quarter),
            document("b", "배송 빨라요", "2024-02-20", PeriodUnit::Quarter),
            document("c", "좋아요", "not a date", PeriodUnit::Quarter),
        ];
        assert_eq!(docs[0].period, docs[1].period);
        let results = detector().scan_documents(&docs);
        let summary = summarize(&docs, &results);

        let months: Vec<String> = summary.iter().map(|r| r.month.to_string()).collect();
        assert_eq!(months, ["2024-01", "2024-02", "unknown"]);
        assert!((summary[0].avg_toxicity - 0.40).abs() < 1e-9);
        assert_eq!(summary[1].avg_toxicity, 0.0);
        assert!(summary.iter().all(|r| r.count == 1));
    }
}
