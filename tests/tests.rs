//! Integration tests for `text_mining`.
//
// This suite verifies:
// - Library behavior (cleaning, tokenization fallback, toxicity roles, sentiment bounds,
//   co-occurrence network, export naming and sanitizing)
// - CLI behavior: summary output, export formats, sheet selection, config and evidence files
//
// Notes:
// - CLI tests run the binary with a per-process working directory (no global CWD change).
// - Tests that change global CWD are marked #[serial].

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use regex::Regex;
use serde_json::Value as Json;
use serial_test::serial;
use tempfile::tempdir;

use text_mining::evidence::{Evidence, EvidenceType, Strength};
use text_mining::frequency::FreqRow;
use text_mining::network::{NetworkOptions, build_network};
use text_mining::normalize::{CleanOptions, clean};
use text_mining::period::Period;
use text_mining::sentiment::{RuleEngine, ScoringPolicy};
use text_mining::tokenize::{
    AnalyzerError, AnalyzerKind, LeakType, Morpheme, MorphAnalyzer, Tokenizer, TokenizerOptions,
};
use text_mining::toxicity::{
    ContextMode, Level, Role, ToxicityDetailRow, ToxicityDetector, ToxicityOptions,
};
use text_mining::{
    ExportFormat, NoAnalyzer, PipelineConfig, Session, Sheet, collect_files, csv_safe_cell,
    export_sheets, load_records, pipeline,
};

// --------------------- helpers ---------------------

const HEADER: &str = "Date,Title,Full Text,Page Type\n";

/// Create a file with content in a temp dir.
fn write_file(dir: &assert_fs::TempDir, name: &str, content: &str) -> PathBuf {
    let f = dir.child(name);
    f.write_str(content).unwrap();
    f.path().to_path_buf()
}

/// Read file to string.
fn read_to_string<P: AsRef<Path>>(p: P) -> String {
    fs::read_to_string(p).unwrap()
}

/// A small review corpus with one profane row and one undated row.
fn reviews_csv() -> String {
    let mut s = HEADER.to_string();
    s.push_str("2024-01-03,가격 품질,가격 품질 모두 만족합니다. 배송도 빨라요,blog\n");
    s.push_str("2024-01-09,가격 품질,가격 대비 품질 최고입니다!,cafe\n");
    s.push_str("2024-02-11,배송 후기,씨발 배송 최악이네. 환불 요청합니다,blog\n");
    s.push_str("unknown,가격 문의,가격 품질 궁금합니다 https://x.com,cafe\n");
    s
}

/// Run CLI successfully with a specific working directory.
fn run_cli_ok_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::Command::cargo_bin("text_mining").unwrap();
    cmd.current_dir(dir);
    cmd.args(args).assert().success()
}

/// Run CLI expecting failure with a specific working directory.
fn run_cli_fail_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::Command::cargo_bin("text_mining").unwrap();
    cmd.current_dir(dir);
    cmd.args(args).assert().failure()
}

/// Find an export file whose name ends with a given suffix (e.g., "_token_freq.csv").
fn find_with_suffix(dir: &Path, suffix: &str) -> PathBuf {
    for entry in fs::read_dir(dir).unwrap().filter_map(|e| e.ok()) {
        let p = entry.path();
        if let Some(name) = p.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(suffix) {
                return p;
            }
        }
    }
    panic!("No file ending with {suffix} found in {}", dir.display());
}

fn exported_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .filter(|n| !n.ends_with("reviews.csv"))
        .collect();
    names.sort();
    names
}

fn simple_config() -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.tokenizer.analyzer = AnalyzerKind::Simple;
    cfg.network.top_edge_pct = 100.0;
    cfg
}

struct BrokenAnalyzer;

impl MorphAnalyzer for BrokenAnalyzer {
    fn analyze(&self, _text: &str) -> Result<Vec<Morpheme>, AnalyzerError> {
        Err(AnalyzerError::Analyze("dictionary missing".into()))
    }
}

// --------------------- library ---------------------

#[test]
fn lib_clean_strips_noise_to_hangul() {
    let out = clean(
        "안녕하세요!! https://x.com #태그 @user 😀 ㅋㅋㅋ",
        &CleanOptions::default(),
    );
    assert_eq!(out, "안녕하세요");
    assert_eq!(clean("", &CleanOptions::default()), "");
}

#[test]
fn lib_tokenizer_falls_back_and_audits_leaks() {
    let opts = TokenizerOptions::default();
    let tok = Tokenizer::new(&BrokenAnalyzer, opts);
    let out = tok.run("배송 빨라요 가");
    assert!(out.fell_back);
    assert_eq!(out.kept, vec!["배송", "빨라요"]);

    let hangul = Regex::new(r"^[가-힣]{2,}$").unwrap();
    let strict = Tokenizer::new(
        &NoAnalyzer,
        TokenizerOptions {
            analyzer: AnalyzerKind::Simple,
            ..TokenizerOptions::default()
        },
    );
    let (kept, leaked) = strict.filter(vec!["배송".into(), "abc".into(), "1등".into()]);
    assert!(kept.iter().all(|t| hangul.is_match(t)));
    assert_eq!(leaked, vec!["abc", "1등"]);
    assert_eq!(LeakType::classify("1등"), LeakType::Digit);
    assert_eq!(LeakType::classify("abc"), LeakType::Latin);
}

#[test]
fn lib_toxicity_roles_and_levels() {
    let det = ToxicityDetector::new(ToxicityOptions::default());
    let targeted = det.scan("d1", "판매자 씨발 진짜");
    assert!(targeted.targeted);
    assert_eq!(targeted.roles[0].role, Role::TargetedInsult);
    assert_eq!(targeted.level, Level::High);

    let emphasis = det.scan("d2", "씨발 진짜 최고");
    assert_eq!(emphasis.roles[0].role, Role::EmphasisPos);
    assert_eq!(emphasis.level, Level::Low);
    assert_eq!(emphasis.sentiment_delta, 0);

    assert_eq!(det.scan("d3", "").score, 0.0);
}

#[test]
fn lib_sentiment_score_is_bounded() {
    let engine = RuleEngine::new(vec!["씨발".into()], ScoringPolicy::default());
    let strong = |kind| Evidence {
        kind,
        strength: Strength::Strong,
        ..Evidence::default()
    };
    let pos = vec![strong(EvidenceType::Positive); 5];
    let neg = vec![strong(EvidenceType::Negative); 5];
    for evs in [&pos, &neg] {
        for text in ["", "씨발", "씨발 씨발"] {
            let r = engine.score("u", evs, text, text, &[]);
            assert!((-2..=2).contains(&r.score_5));
        }
    }
    let one = engine.score("u", &[strong(EvidenceType::Positive)], "씨발", "", &[]);
    assert_eq!(one.score_5, 0);
}

#[test]
fn lib_network_example() {
    let sets: Vec<Vec<String>> = [["가격", "품질"], ["가격", "품질"], ["가격", "배송"]]
        .iter()
        .map(|d| d.iter().map(|s| s.to_string()).collect())
        .collect();
    let opts = NetworkOptions {
        top_edge_pct: 100.0,
        ..NetworkOptions::default()
    };
    let g = build_network(&sets, &opts).unwrap();
    assert_eq!(g.edges.len(), 1);
    assert_eq!(g.edges[0].weight, 2);
    assert!(g.nodes.iter().all(|n| n.community == 0));
}

#[test]
fn lib_load_records_from_directory() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "b.csv", &reviews_csv());
    write_file(&td, "a.tsv", "Date\tTitle\tFull Text\tPage Type\n2024-03-01\t제목\t본문입니다\tnews\n");
    write_file(&td, "notes.txt", "ignored");

    let files = collect_files(td.path());
    assert_eq!(files.len(), 2);
    assert!(files[0].ends_with("a.tsv"));

    let records = load_records(td.path(), &Default::default()).unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[0].page_type, "news");
}

#[test]
fn lib_missing_columns_fail_before_any_stage() {
    let td = assert_fs::TempDir::new().unwrap();
    let p = write_file(&td, "bad.csv", "Date,Body\n2024-01-01,본문\n");
    let err = load_records(&p, &Default::default()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Title"), "got: {msg}");
    assert!(msg.contains("Page Type"), "got: {msg}");
}

#[test]
#[serial]
fn lib_pipeline_and_export_in_cwd() {
    let td = assert_fs::TempDir::new().unwrap();
    let p = write_file(&td, "reviews.csv", &reviews_csv());
    let records = load_records(&p, &Default::default()).unwrap();
    let mut session = pipeline::run(records, &simple_config(), &NoAnalyzer, None).unwrap();
    session.name = "reviews".into();

    let old = std::env::current_dir().unwrap();
    std::env::set_current_dir(td.path()).unwrap();
    let written = export_sheets(
        &session,
        &[Sheet::TokenFreq, Sheet::NetworkEdges],
        ExportFormat::Csv,
        Path::new("."),
        false,
    );
    std::env::set_current_dir(old).unwrap();

    let written = written.unwrap();
    assert_eq!(written.len(), 2);
    let re = Regex::new(r"^reviews_\d{8}_\d{6}_token_freq\.csv$").unwrap();
    let name = written[0].file_name().unwrap().to_str().unwrap();
    assert!(re.is_match(name), "unexpected file name {name}");

    let freq = read_to_string(td.path().join(name));
    let mut lines = freq.lines();
    assert_eq!(lines.next(), Some("token,count,doc_freq"));
    assert!(lines.next().unwrap().starts_with("가격,"));
}

// --------------------- CLI ---------------------

#[test]
fn cli_nonexistent_path_fails() {
    let td = tempdir().unwrap();
    run_cli_fail_in(td.path(), &["does_not_exist.csv"])
        .stderr(predicate::str::contains("input:"));
}

#[test]
fn cli_basic_run_csv() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "reviews.csv", &reviews_csv());

    run_cli_ok_in(td.path(), &["reviews.csv", "--top-edge-pct", "100"])
        .stdout(predicate::str::contains("=== Top 20 tokens ==="))
        .stdout(predicate::str::contains("=== Toxicity ==="))
        .stdout(predicate::str::contains("=== Network ==="))
        .stdout(predicate::str::contains("가격\t6\t3"));

    let freq = read_to_string(find_with_suffix(td.path(), "_token_freq.csv"));
    assert!(freq.starts_with("token,count,doc_freq"));
    let edges = read_to_string(find_with_suffix(td.path(), "_network_edges.csv"));
    assert!(edges.contains("가격,품질,3,"));

    let detail = read_to_string(find_with_suffix(td.path(), "_toxicity_detail.csv"));
    assert!(detail.contains("EMPHASIS_NEG") || detail.contains("GENERAL_EXPLETIVE"));
    let logs = read_to_string(find_with_suffix(td.path(), "_logs.csv"));
    assert!(logs.contains("preprocess"));
}

#[test]
fn cli_export_json_selected_sheets() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "reviews.csv", &reviews_csv());
    let out = td.child("out");

    run_cli_ok_in(
        td.path(),
        &[
            "reviews.csv",
            "--export-format",
            "json",
            "--sheets",
            "token_freq,sentiment_doc,buzz_pivot",
            "--out-dir",
            "out",
        ],
    );

    let names = exported_names(out.path());
    assert_eq!(names.len(), 3, "got {names:?}");
    let pivot: Json =
        serde_json::from_str(&read_to_string(find_with_suffix(out.path(), "_buzz_pivot.json")))
            .unwrap();
    let periods: Vec<&str> = pivot
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["period"].as_str().unwrap())
        .collect();
    assert_eq!(periods, vec!["2024-01", "2024-02", "unknown"]);

    let docs: Json =
        serde_json::from_str(&read_to_string(find_with_suffix(out.path(), "_sentiment_doc.json")))
            .unwrap();
    for d in docs.as_array().unwrap() {
        let score = d["mean_score"].as_f64().unwrap();
        assert!((-2.0..=2.0).contains(&score));
    }
}

#[test]
fn cli_export_tsv_and_include_empty() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "reviews.csv", &reviews_csv());

    run_cli_ok_in(
        td.path(),
        &[
            "reviews.csv",
            "--export-format",
            "tsv",
            "--sheets",
            "evidence,top50_preview",
            "--include-empty",
        ],
    );
    let evidence = find_with_suffix(td.path(), "_evidence.tsv");
    assert_eq!(read_to_string(evidence), "");
    let top = read_to_string(find_with_suffix(td.path(), "_top50_preview.tsv"));
    assert!(top.starts_with("token\tcount\tdoc_freq"));
}

#[test]
fn cli_unknown_sheet_fails() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "reviews.csv", &reviews_csv());
    run_cli_fail_in(td.path(), &["reviews.csv", "--sheets", "wordcloud"])
        .stderr(predicate::str::contains("unknown table name"));
    run_cli_fail_in(td.path(), &["reviews.csv", "--sheets", " , "])
        .stderr(predicate::str::contains("no tables selected"));
}

#[test]
fn cli_no_valid_dates_fails() {
    let td = assert_fs::TempDir::new().unwrap();
    let mut csv = HEADER.to_string();
    csv.push_str("yesterday,제목,배송 빨라요,blog\n");
    write_file(&td, "reviews.csv", &csv);
    run_cli_fail_in(td.path(), &["reviews.csv"])
        .stderr(predicate::str::contains("period: no row has a parseable date"));
}

#[test]
fn cli_config_and_evidence_files() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "reviews.csv", &reviews_csv());
    write_file(
        &td,
        "config.json",
        r#"{"frequency": {"period_unit": "quarter", "min_freq": 1},
            "network": {"method": "jaccard", "top_edge_pct": 100}}"#,
    );

    // find the id of the first sentence unit from a plain run
    run_cli_ok_in(
        td.path(),
        &["reviews.csv", "--config", "config.json", "--export-format", "json", "--sheets", "sentiment_sentence"],
    );
    let sentences: Json = serde_json::from_str(&read_to_string(find_with_suffix(
        td.path(),
        "_sentiment_sentence.json",
    )))
    .unwrap();
    let first = sentences[0]["unit_id"].as_str().unwrap().to_string();

    let evidence = format!(
        r#"{{"{first}": {{"overall_polarity": "positive", "overall_intensity": 0.8, "summary_ko": "만족",
            "evidences": [{{"phrase": "만족", "type": "positive", "strength": "strong", "aspect": null, "target": null}}]}}}}"#
    );
    write_file(&td, "evidence.json", &evidence);
    let out = td.child("with_evidence");
    run_cli_ok_in(
        td.path(),
        &[
            "reviews.csv",
            "--config",
            "config.json",
            "--evidence",
            "evidence.json",
            "--export-format",
            "json",
            "--sheets",
            "sentiment_sentence,evidence,buzz_pivot",
            "--out-dir",
            "with_evidence",
        ],
    );
    let scored: Json = serde_json::from_str(&read_to_string(find_with_suffix(
        out.path(),
        "_sentiment_sentence.json",
    )))
    .unwrap();
    assert_eq!(scored[0]["unit_id"], Json::from(first));
    assert_eq!(scored[0]["score_5"], Json::from(2));

    let evidence: Json =
        serde_json::from_str(&read_to_string(find_with_suffix(out.path(), "_evidence.json")))
            .unwrap();
    assert_eq!(evidence[0]["overall_intensity"], Json::from(0.8));
    assert_eq!(evidence[0]["phrase"], Json::from("만족"));
    assert!(evidence[0]["aspect"].is_null());

    let pivot = read_to_string(find_with_suffix(out.path(), "_buzz_pivot.json"));
    assert!(pivot.contains("2024-Q1"));
}

#[test]
fn cli_bad_config_fails() {
    let td = assert_fs::TempDir::new().unwrap();
    write_file(&td, "reviews.csv", &reviews_csv());
    write_file(&td, "config.json", r#"{"network": {"top_edge_pct": 250}}"#);
    run_cli_fail_in(td.path(), &["reviews.csv", "--config", "config.json"])
        .stderr(predicate::str::contains("config:"));
}

// --- Tests to verify sanitizing works ---

#[test]
fn cli_removed_rows_neutralize_formula_titles() {
    let td = assert_fs::TempDir::new().unwrap();
    let mut csv = HEADER.to_string();
    let row = "2024-01-03,\"=HYPERLINK(\"\"http://x\"\")\",가격 품질 모두 만족합니다,blog\n";
    csv.push_str(row);
    csv.push_str(row);
    csv.push_str("2024-01-05,배송,배송 빨라요,cafe\n");
    write_file(&td, "reviews.csv", &csv);

    run_cli_ok_in(td.path(), &["reviews.csv", "--sheets", "removed_rows"]);

    let removed = read_to_string(find_with_suffix(td.path(), "_removed_rows.csv"));
    let mut lines = removed.lines();
    assert_eq!(lines.next(), Some("reason,key,date,title,full_text,page_type,url"));
    let dup = lines.next().unwrap();
    assert!(dup.starts_with("exact_duplicate,"), "got {dup}");
    assert!(
        dup.contains(r#""'=HYPERLINK(""http://x"")""#),
        "prefix added and inner quotes doubled: {dup}"
    );
    assert_eq!(lines.next(), None);
}

#[test]
fn tsv_toxicity_detail_keeps_negative_deltas_numeric() {
    let mut session = Session::new("tox");
    session.toxicity_detail = vec![ToxicityDetailRow {
        document_id: "=X".into(),
        period: Period::Known("2024-02".into()),
        category: "@mention".into(),
        score: 0.55,
        level: Level::High,
        targeted: true,
        matches: "씨발".into(),
        profanity_count: 1,
        roles: "씨발:TARGETED_INSULT".into(),
        windows: "판매자 씨발 진짜".into(),
        sentiment_delta: -2,
        context_mode: ContextMode::ContextAware,
    }];
    let dir = tempdir().unwrap();
    let paths = export_sheets(
        &session,
        &[Sheet::ToxicityDetail],
        ExportFormat::Tsv,
        dir.path(),
        false,
    )
    .unwrap();

    let text = read_to_string(&paths[0]);
    let mut lines = text.lines();
    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let row: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let cell = |name: &str| row[header.iter().position(|h| *h == name).unwrap()];

    assert_eq!(cell("document_id"), "'=X");
    assert_eq!(cell("category"), "'@mention");
    assert_eq!(cell("sentiment_delta"), "-2");
    assert_eq!(cell("profanity_count"), "1");
    assert_eq!(cell("windows"), "판매자 씨발 진짜");
}

#[test]
fn exported_tokens_already_quoted_are_left_alone() {
    let mut session = Session::new("freq");
    session.token_freq = ["'@SAFE", "@user", "-0.5", "배송"]
        .into_iter()
        .map(|token| FreqRow {
            token: token.into(),
            count: 1,
            doc_freq: 1,
        })
        .collect();
    let dir = tempdir().unwrap();
    let paths = export_sheets(
        &session,
        &[Sheet::TokenFreq],
        ExportFormat::Csv,
        dir.path(),
        false,
    )
    .unwrap();

    let tokens: Vec<String> = read_to_string(&paths[0])
        .lines()
        .skip(1)
        .map(|l| l.split(',').next().unwrap().to_string())
        .collect();
    assert_eq!(tokens, ["'@SAFE", "'@user", "-0.5", "배송"]);
    assert_eq!(csv_safe_cell(tokens[0].clone()), tokens[0]);
}
