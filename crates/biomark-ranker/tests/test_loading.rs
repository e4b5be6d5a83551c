//! End-to-end: upstream analysis files in, consensus CSV out.
//!
//! Run with: cargo test --package biomark-ranker --test test_loading

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use biomark_common::{AggregationConfig, AnalysisKind, StrategyKind};
use biomark_ranker::api::{run_request, AggregationRequestBody, Outcome};
use biomark_ranker::loader::{
    consensus_csv_path, read_feature_importances, read_rank_table, write_consensus_csv,
    IMPORTANCES_FILE,
};
use biomark_ranker::{aggregate, AggregationRequest, MethodWeights};
use biomark_test_utils::{assert_features, importances_json, pair};

#[test]
fn ranked_files_feed_aggregation() {
    let dir = TempDir::new().unwrap();
    let t_test = dir.path().join("t_test.csv");
    let shap = dir.path().join("shap.csv");
    fs::write(&t_test, "feature,rank,score\ngeneA,1,0.001\ngeneB,2,0.01\ngeneC,3,0.2\n").unwrap();
    fs::write(&shap, "\u{feff}feature;rank\ngeneB;1\ngeneA;2\ngeneC;3\n").unwrap();

    let tables = vec![
        read_rank_table(&t_test, "t_test", pair("ClassA_ClassB")).unwrap(),
        read_rank_table(&shap, "shap", pair("ClassB_ClassA")).unwrap(),
    ];

    let request = AggregationRequest::new(pair("ClassA_ClassB"), StrategyKind::Rrf).with_top_n(3);
    let consensus = aggregate(&request, &tables).unwrap();
    assert_features(&consensus, &["geneA", "geneB", "geneC"]);
}

#[test]
fn importances_json_to_consensus_csv() {
    let dir = TempDir::new().unwrap();
    let dataset_dir = dir.path().join("cohort.csv");
    fs::create_dir_all(&dataset_dir).unwrap();
    fs::write(dataset_dir.join(IMPORTANCES_FILE), importances_json()).unwrap();

    let store = read_feature_importances(&dataset_dir.join(IMPORTANCES_FILE)).unwrap();
    let history = store.history();
    assert!(history.iter().any(|r| r.kind == AnalysisKind::DimensionalityReduction));

    // umap is recorded but never ranked
    let tables = store.rank_tables(&pair("ClassA_ClassB"), &MethodWeights::default()).unwrap();
    let methods: Vec<&str> = tables.iter().map(|t| t.method()).collect();
    assert_eq!(methods, vec!["random_forest", "t_test"]);

    let body = AggregationRequestBody {
        aggregation_method: Some("sum".into()),
        feature_count: Some(2),
        ..Default::default()
    };
    let Outcome::Ranked(consensus) = run_request(&body, &store, &AggregationConfig::default()).unwrap() else {
        panic!("single class pair should be selected automatically");
    };
    // random_forest blend: geneB 0.7, geneD 0.35, geneA 0.4 -> B, A, D
    // t_test: A, B, C
    // sums: A 2+1, B 1+2, D 3+4, C 4+3 -> A and B tie at 3, both best rank 1
    assert_features(&consensus, &["geneA", "geneB"]);

    let path = consensus_csv_path(dir.path(), "cohort.csv", &consensus.class_pair, &consensus.strategy_label);
    write_consensus_csv(&path, &consensus, &tables).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = written.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(
        lines,
        vec!["feature;score;rank;random_forest;t_test", "geneA;3;1;2;1", "geneB;3;2;1;2"]
    );
    assert!(path.ends_with("feature_ranking/ClassA_ClassB/method=sum/ranked_features_df.csv"));
}
