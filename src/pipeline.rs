//! End-to-end batch run.
//!
//! Stages read what earlier stages produced and return new tables; the
//! finished [`Session`] is handed back only when every stage succeeded.

use log::warn;

use crate::association::{self, RuleRow};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::evidence::{self, EvidenceBatch, EvidenceService};
use crate::frequency;
use crate::input::Record;
use crate::network;
use crate::period::{self, parse_date};
use crate::preprocess;
use crate::sentiment::{self, RuleEngine};
use crate::session::Session;
use crate::tokenize::{self, MorphAnalyzer, Tokenizer};
use crate::toxicity::{self, ToxicityDetector};

/// Runs every stage over `records`. Evidence extraction is skipped when no
/// service is given; scoring then relies on profanity rules alone.
pub fn run(
    records: Vec<Record>,
    config: &PipelineConfig,
    analyzer: &dyn MorphAnalyzer,
    evidence_service: Option<&dyn EvidenceService>,
) -> Result<Session> {
    let mut session = Session::default();
    let input_rows = records.len();

    let (records, removed) = preprocess::run(records, &config.preprocess);
    if records.is_empty() {
        return Err(Error::NoRows);
    }
    session.log(
        "preprocess",
        format!("{} of {input_rows} rows kept, {} removed", records.len(), removed.len()),
    );
    session.removed_rows = removed;

    let dates: Vec<_> = records.iter().map(|r| parse_date(&r.date)).collect();
    period::require_some_dates(dates.iter().map(Option::as_ref))?;
    let undated = dates.iter().filter(|d| d.is_none()).count();
    if undated > 0 {
        warn!("period: {undated} row(s) without a parseable date go to the unknown bucket");
    }

    let unit = config.frequency.period_unit;
    let tokenizer = Tokenizer::new(analyzer, config.tokenizer.clone());
    let corpus = tokenize::build_corpus(&records, &config.cleaning, unit, &tokenizer);
    session.log(
        "tokenize",
        format!(
            "{} documents, {} distinct tokens, {} fallback(s), {} empty",
            corpus.documents.len(),
            corpus.stats.distinct(),
            corpus.fallbacks,
            corpus.empty_docs.len()
        ),
    );
    let documents = corpus.documents;

    let freq = &config.frequency;
    session.token_freq = frequency::freq_table(&corpus.stats, freq.min_freq);
    session.top50 = frequency::top_n(&session.token_freq, freq.top_n);
    session.monthly_top = frequency::monthly_top(&documents, freq.monthly_top);
    session.leak_audit = tokenize::leak_audit(&corpus.leaked);
    session.empty_docs = corpus.empty_docs;
    session.buzz_pivot = period::buzz_pivot(
        documents.iter().map(|d| (&d.period, d.category.as_str())),
        freq.pivot_by_category,
    );
    session.log(
        "frequency",
        format!(
            "{} tokens with count >= {}, {} leaked token type(s)",
            session.token_freq.len(),
            freq.min_freq,
            session.leak_audit.len()
        ),
    );

    let detector = ToxicityDetector::new(config.toxicity.clone());
    let results = detector.scan_documents(&documents);
    session.toxicity_detail = toxicity::detail_rows(&documents, &results);
    session.toxicity_summary = toxicity::summarize(&documents, &results);
    let [(_, low), (_, med), (_, high)] = session.level_counts();
    session.log("toxicity", format!("LOW {low}, MED {med}, HIGH {high}"));

    let sent = &config.sentiment;
    let units = sentiment::build_units(&documents, &config.cleaning, sent.min_sentence_len)?;
    let batch = match evidence_service {
        Some(service) => evidence::extract_evidence(
            service,
            &sent.models,
            units.iter().map(|u| (u.id.as_str(), u.clean_text.as_str())),
        )?,
        None => EvidenceBatch::default(),
    };
    let engine = RuleEngine::new(
        config.toxicity.lexicon.profanity_tokens.clone(),
        sent.policy.clone(),
    );
    session.sentiment_sentence =
        sentiment::score_units(&engine, &detector, &units, &batch.by_unit());
    session.sentiment_doc = sentiment::doc_rollup(&session.sentiment_sentence);
    session.sentiment_month = sentiment::month_rollup(&session.sentiment_doc);
    session.evidence = batch.rows();
    session.diagnostics = batch.diagnostics;
    session.log(
        "sentiment",
        format!(
            "{} sentence units, {} evidence rows, {} degraded",
            units.len(),
            session.evidence.len(),
            session.diagnostics.len()
        ),
    );

    let token_sets: Vec<&[String]> = documents.iter().map(|d| d.tokens.as_slice()).collect();
    session.network = network::build_network(&token_sets, &config.network)?;
    session.log(
        "network",
        format!(
            "{} nodes, {} edges ({:?}, top {}%)",
            session.network.nodes.len(),
            session.network.edges.len(),
            config.network.method,
            config.network.top_edge_pct
        ),
    );

    session.rules = association::apriori_rules(&token_sets, &config.association)
        .iter()
        .map(RuleRow::from)
        .collect();
    session.log("association", format!("{} rules", session.rules.len()));

    session.documents = documents;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::StaticEvidenceService;
    use crate::tokenize::{AnalyzerKind, NoAnalyzer};

    fn record(date: &str, title: &str, text: &str) -> Record {
        Record {
            date: date.into(),
            title: title.into(),
            full_text: text.into(),
            page_type: "blog".into(),
            ..Record::default()
        }
    }

    fn config() -> PipelineConfig {
        let mut cfg = PipelineConfig::default();
        cfg.tokenizer.analyzer = AnalyzerKind::Simple;
        cfg.network.top_edge_pct = 100.0;
        cfg
    }

    fn records() -> Vec<Record> {
        vec![
            record("2024-01-03", "가격 품질", "가격 품질 모두 만족합니다. 배송도 빨라요"),
            record("2024-01-09", "가격 품질", "가격 대비 품질 최고입니다"),
            record("2024-02-11", "배송 후기", "씨발 배송 최악이네. 환불 요청"),
            record("not a date", "가격 문의", "가격 품질 궁금합니다"),
        ]
    }

    #[test]
    fn runs_every_stage() {
        let session = run(records(), &config(), &NoAnalyzer, None).unwrap();
        assert_eq!(session.documents.len(), 4);
        assert!(session.token_freq.iter().any(|r| r.token == "가격"));
        assert!(session.monthly_top.iter().any(|r| r.month.is_unknown()));
        assert_eq!(session.toxicity_detail.len(), 4);
        assert!(!session.sentiment_sentence.is_empty());
        assert!(session.sentiment_doc.iter().any(|d| d.mean_score < 0.0));
        assert!(
            session
                .network
                .edges
                .iter()
                .any(|e| e.source == "가격" && e.target == "품질")
        );
        let stages: Vec<&str> = session.logs.iter().map(|l| l.stage.as_str()).collect();
        assert_eq!(
            stages,
            vec!["preprocess", "tokenize", "frequency", "toxicity", "sentiment", "network", "association"]
        );
    }

    #[test]
    fn evidence_feeds_the_score() {
        let first_unit = {
            let plain = run(records(), &config(), &NoAnalyzer, None).unwrap();
            plain.sentiment_sentence[0].unit_id.clone()
        };
        let json = format!(
            r#"{{"{first_unit}": {{"overall_intensity": 0.9, "evidences": [{{"phrase": "만족", "type": "positive", "strength": "strong", "aspect": "품질", "target": null}}]}}}}"#
        );
        let svc = StaticEvidenceService::from_json(&json).unwrap();
        let session = run(records(), &config(), &NoAnalyzer, Some(&svc)).unwrap();
        let row = &session.sentiment_sentence[0];
        assert_eq!(row.unit_id, first_unit);
        assert_eq!(row.score_5, 2);
        assert_eq!(session.evidence.len(), 1);
    }

    #[test]
    fn fatal_conditions_stop_the_run() {
        assert!(matches!(
            run(Vec::new(), &config(), &NoAnalyzer, None),
            Err(Error::NoRows)
        ));
        let undated = vec![record("", "가격", "가격 좋아요")];
        assert!(matches!(
            run(undated, &config(), &NoAnalyzer, None),
            Err(Error::NoValidDates)
        ));
        let mut strict = config();
        strict.sentiment.min_sentence_len = 500;
        assert!(matches!(
            run(records(), &strict, &NoAnalyzer, None),
            Err(Error::NoSentences)
        ));
    }
}
