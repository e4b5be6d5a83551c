//! Behavioural properties of consensus aggregation, checked over fixed and
//! seeded random inputs.
//!
//! Run with: cargo test --package biomark-ranker --test test_aggregation_properties

use std::collections::HashSet;

use pretty_assertions::assert_eq;

use biomark_common::{AnalysisKind, AnalysisRecord, BiomarkError, StrategyKind};
use biomark_ranker::strategy::{ReciprocalRankFusion, SimpleSum, WeightedBorda};
use biomark_ranker::{
    aggregate, resolve_class_pair, resolve_eligible_class_pairs, AggregationRequest,
    AggregationStrategy, MethodWeights,
};
use biomark_test_utils::{assert_features, example_tables, pair, random_tables, table};

const METHODS: [&str; 4] = ["t_test", "anova", "shap", "lime"];

#[test]
fn worked_example_orders_a_b_c() {
    let request = AggregationRequest::new(pair("ClassA_ClassB"), StrategyKind::Rrf).with_top_n(3);
    let consensus = aggregate(&request, &example_tables()).unwrap();

    assert_features(&consensus, &["geneA", "geneB", "geneC"]);
    assert!((consensus.entries[0].score - 0.03252).abs() < 1e-5);
    assert!((consensus.entries[2].score - 0.03175).abs() < 1e-5);
}

#[test]
fn repeated_calls_are_identical() {
    for seed in 0..20 {
        let tables = random_tables(seed, "A_B", &METHODS, 40);
        for strategy in StrategyKind::ALL {
            let request = AggregationRequest::new(pair("A_B"), strategy)
                .with_top_n(25)
                .with_weights(MethodWeights::parse(Some(r#"{"shap": 2.5}"#)).unwrap());
            let first = aggregate(&request, &tables).unwrap();
            let second = aggregate(&request, &tables).unwrap();
            assert_eq!(first, second);
        }
    }
}

#[test]
fn ranks_are_contiguous() {
    for seed in 0..20 {
        let tables = random_tables(seed, "A_B", &METHODS, 30);
        let universe: HashSet<&str> = tables.iter().flat_map(|t| t.features()).collect();

        for top_n in [1, 5, 30, 100] {
            for strategy in StrategyKind::ALL {
                let request = AggregationRequest::new(pair("A_B"), strategy).with_top_n(top_n);
                let consensus = aggregate(&request, &tables).unwrap();
                let ranks: Vec<u32> = consensus.entries.iter().map(|e| e.rank).collect();
                let expected: Vec<u32> = (1..=top_n.min(universe.len()) as u32).collect();
                assert_eq!(ranks, expected);
            }
        }
    }
}

#[test]
fn single_table_is_reproduced() {
    for seed in 0..10 {
        let tables = random_tables(seed, "A_B", &["t_test"], 25);
        let only = &tables[0];
        let expected: Vec<&str> = only.features().collect();

        for strategy in StrategyKind::ALL {
            let request = AggregationRequest::new(pair("A_B"), strategy).with_top_n(only.len());
            let consensus = aggregate(&request, &tables).unwrap();
            assert_eq!(consensus.features(), expected, "strategy {strategy}");
        }
    }
}

#[test]
fn missing_feature_scores_worse() {
    let others: Vec<String> = (2..=10).map(|i| format!("f{i}")).collect();
    let mut ranked_a = vec!["x".to_string()];
    ranked_a.extend(others.iter().cloned());
    let mut without_x = others.clone();
    without_x.push("f11".to_string());

    let a = biomark_common::RankTable::from_ordered("t_test", pair("A_B"), &ranked_a).unwrap();
    let b_absent = biomark_common::RankTable::from_ordered("shap", pair("A_B"), &without_x).unwrap();
    let b_present = biomark_common::RankTable::from_ordered("shap", pair("A_B"), &ranked_a).unwrap();

    let absent = [a.clone(), b_absent];
    let present = [a, b_present];

    let rrf = ReciprocalRankFusion::default();
    assert!(rrf.score_feature("x", &absent) < rrf.score_feature("x", &present));
    assert!(SimpleSum.score_feature("x", &absent) > SimpleSum.score_feature("x", &present));
}

#[test]
fn raising_a_weight_never_lowers_a_score() {
    for seed in 0..20 {
        let tables = random_tables(seed, "A_B", &METHODS, 20);
        let light = WeightedBorda { weights: MethodWeights::parse(Some(r#"{"shap": 1.0, "lime": 0.5}"#)).unwrap() };
        let heavy = WeightedBorda { weights: MethodWeights::parse(Some(r#"{"shap": 4.0, "lime": 0.5}"#)).unwrap() };

        let before = light.score(&tables).unwrap();
        let after = heavy.score(&tables).unwrap();
        for (feature, score) in &before {
            assert!(after[feature] >= *score, "seed {seed}, feature {feature}");
        }
    }
}

#[test]
fn equal_scores_break_on_best_rank_then_name() {
    // every feature sums to 4
    let tables = vec![
        table("t_test", "A_B", &["a", "b", "c"]),
        table("shap", "A_B", &["c", "b", "a"]),
    ];
    let request = AggregationRequest::new(pair("A_B"), StrategyKind::Sum);
    let consensus = aggregate(&request, &tables).unwrap();

    assert!(consensus.entries.iter().all(|e| e.score == 4.0));
    assert_features(&consensus, &["a", "c", "b"]);
}

#[test]
fn two_eligible_pairs_need_selection() {
    let history = vec![
        AnalysisRecord::new(pair("A_B"), "t_test", AnalysisKind::StatisticalTest),
        AnalysisRecord::new(pair("A_C"), "t_test", AnalysisKind::StatisticalTest),
    ];
    assert_eq!(resolve_eligible_class_pairs(&history).len(), 2);

    match resolve_class_pair(&history, None) {
        Err(BiomarkError::AmbiguousSelection { candidates }) => {
            assert_eq!(candidates, vec![pair("A_B"), pair("A_C")]);
        }
        other => panic!("expected selection prompt, got {other:?}"),
    }

    let single = &history[..1];
    assert_eq!(resolve_class_pair(single, None).unwrap(), pair("A_B"));
}

#[test]
fn malformed_weights_fail_before_scoring() {
    let base = AggregationRequest::new(pair("ClassA_ClassB"), StrategyKind::Rrf);
    let err = AggregationRequest::parse(base, Some("weighted_borda"), Some("{shap:1.5}"), None, Some(10)).unwrap_err();
    assert!(matches!(err, BiomarkError::InvalidParameter { ref parameter, .. } if parameter == "aggregationWeights"));
}

#[test]
fn rrf_k_changes_label_not_validity() {
    let request = AggregationRequest::new(pair("ClassA_ClassB"), StrategyKind::Rrf).with_k(10);
    let consensus = aggregate(&request, &example_tables()).unwrap();
    assert_eq!(consensus.strategy_label, "method=rrf,k=10");

    let sum = AggregationRequest::new(pair("ClassA_ClassB"), StrategyKind::Sum).with_k(10);
    assert_eq!(aggregate(&sum, &example_tables()).unwrap().strategy_label, "method=sum");
}
