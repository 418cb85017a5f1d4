//! Integration tests for the complete ChemSafe pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - SMILES decoding → hazard scan → summary
//! - Corpus import → JSONL → index rebuild → retrieval
//! - Retrieval + structural scan → review prompt → graded report
//!
//! Run with: cargo test --test integration_tests

use std::sync::Arc;
use tempfile::tempdir;

use chemsafe_agent::{Config, MockBackend, ReviewAgent, ReviewError};
use chemsafe_index::{RuleIndex, TokenHashEmbedder};
use chemsafe_mol::DetailValue;

const TNT: &str = "Cc1c(cc(cc1[N+](=O)[O-])[N+](=O)[O-])[N+](=O)[O-]";
const DADP: &str = "CC1(OOC(C)(OO1)C)C";

// ============================================================================
// Structural scan (analyzer end-to-end)
// ============================================================================

#[test]
fn test_tnt_scan_end_to_end() {
    let result = chemsafe_mol::analyze(TNT);
    assert!(result.valid);
    assert_eq!(result.formula.as_deref(), Some("C7H5N3O6"));
    let weight = result.weight.expect("weight present");
    assert!((weight - 227.13).abs() < 0.05, "weight {weight}");

    assert_eq!(result.count("nitro (-NO2)"), 3);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.starts_with("high-energy material")));

    match result.detail("oxygen balance (OB%)") {
        Some(DetailValue::Metric(ob)) => assert!((ob + 74.0).abs() < 0.5, "OB {ob}"),
        other => panic!("missing oxygen balance: {other:?}"),
    }
    assert!(result.summary.contains("C7H5N3O6"));
}

#[test]
fn test_peroxide_scan_has_no_nitro_warning() {
    let result = chemsafe_mol::analyze(DADP);
    assert!(result.valid);
    assert!(result.count("peroxide (-O-O-)") >= 1);
    assert_eq!(result.count("nitro (-NO2)"), 0);
    assert!(!result
        .warnings
        .iter()
        .any(|w| w.starts_with("high-energy material")));
}

#[test]
fn test_invalid_smiles_scan_is_a_value_not_a_panic() {
    let result = chemsafe_mol::analyze("C1CC");
    assert!(!result.valid);
    assert!(result.formula.is_none());
    assert!(result.weight.is_none());
    assert!(result.error.is_some());
    assert!(!chemsafe_mol::validate("C1CC"));
}

// ============================================================================
// Corpus import → rebuild → retrieval
// ============================================================================

fn import_and_rebuild(dir: &std::path::Path) -> RuleIndex {
    let source = r#"
        数据文件开头说明。
        [{"tag": "硝化反应", "content": "硝化反应必须逐滴加料，全程控温在15摄氏度以下"},
         {"tag": "过氧化物", "content": "过氧化物严禁受热、撞击和摩擦"},
         {"tag": "叠氮化合物", "content": "叠氮化合物严禁与重金属及其盐类接触"},
         {"tag": "硝化反应", "content": "硝化反应必须逐滴加料，全程控温在15摄氏度以下"}]
        结尾说明。
    "#;
    let records = chemsafe_index::import_raw(source);
    assert_eq!(records.len(), 3, "duplicate record must be dropped");

    let corpus_path = dir.join("rules.jsonl");
    chemsafe_index::write_jsonl(&records, &corpus_path).expect("write corpus");
    let units = chemsafe_index::load_jsonl(&corpus_path).expect("load corpus");
    assert_eq!(units.len(), 3);

    let index = RuleIndex::open(dir, "safety_rules", Arc::new(TokenHashEmbedder)).expect("open");
    assert_eq!(index.rebuild(units).expect("rebuild"), 3);
    index
}

#[test]
fn test_import_rebuild_search_pipeline() {
    let dir = tempdir().unwrap();
    let index = import_and_rebuild(dir.path());
    assert_eq!(index.count(), 3);

    let hits = index.search("硝化反应的温度控制要求", 2).expect("search");
    assert!(!hits.is_empty() && hits.len() <= 2);
    assert_eq!(hits[0].rule.tag, "硝化反应");

    // Persisted: a fresh handle sees the same collection.
    let reopened =
        RuleIndex::open(dir.path(), "safety_rules", Arc::new(TokenHashEmbedder)).expect("reopen");
    assert_eq!(reopened.count(), 3);
    let again = reopened.search("硝化反应的温度控制要求", 2).expect("search");
    assert_eq!(again[0].rule.content, hits[0].rule.content);
}

// ============================================================================
// Full review pipeline (mock backend)
// ============================================================================

#[test]
fn test_review_pipeline_grounds_prompt_in_retrieval_and_structure() {
    let dir = tempdir().unwrap();
    let index = Arc::new(import_and_rebuild(dir.path()));
    let mock = Arc::new(MockBackend::new(vec!["🔴 红牌拦截：依据规则1，必须停止"]));

    let agent = ReviewAgent::new(index, mock.clone(), Config::default());
    let report = agent
        .review("在敞口烧杯中对甲苯进行混酸硝化", Some(TNT))
        .expect("review");
    assert!(report.contains("🔴"));

    assert_eq!(mock.calls(), 1);
    let (system, user) = mock.requests().pop().unwrap();
    assert!(system.contains("🔴 红牌拦截"));
    assert!(user.contains("在敞口烧杯中对甲苯进行混酸硝化"));
    assert!(user.contains("【分子结构分析结果】"));
    assert!(user.contains("C7H5N3O6"));
    assert!(user.contains("规则1: "));
}

#[test]
fn test_review_refuses_on_empty_index_without_backend_call() {
    let dir = tempdir().unwrap();
    let index =
        Arc::new(RuleIndex::open(dir.path(), "safety_rules", Arc::new(TokenHashEmbedder)).unwrap());
    let mock = Arc::new(MockBackend::new(vec!["unused"]));

    let agent = ReviewAgent::new(index, mock.clone(), Config::default());
    let err = agent.review("任意合成方案", None).unwrap_err();
    assert!(matches!(err, ReviewError::IndexUnavailable));
    assert_eq!(mock.calls(), 0);
}
