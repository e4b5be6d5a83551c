//! Shared fixtures for BioMark tests.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use biomark_common::{ClassPair, ConsensusRankTable, RankTable};

pub fn pair(key: &str) -> ClassPair {
    ClassPair::parse(key).expect("fixture class pair")
}

/// Table with `features` ranked 1..=N in the given order.
pub fn table(method: &str, class_pair: &str, features: &[&str]) -> RankTable {
    RankTable::from_ordered(method, pair(class_pair), features).expect("fixture rank table")
}

/// The two-method worked example: t_test ranks A, B, C and shap ranks B, A, C.
pub fn example_tables() -> Vec<RankTable> {
    vec![
        table("t_test", "ClassA_ClassB", &["geneA", "geneB", "geneC"]),
        table("shap", "ClassA_ClassB", &["geneB", "geneA", "geneC"]),
    ]
}

/// `feature_importances.json` with one flat test, one nested explanation
/// group and a dimensionality reduction run for a single class pair.
pub fn importances_json() -> String {
    serde_json::json!({
        "ClassA_ClassB": {
            "t_test": {"geneA": 9.1, "geneB": 4.2, "geneC": 0.3},
            "random_forest": {
                "shap": {"geneB": 0.8, "geneA": 0.4, "geneD": 0.2},
                "lime": {"geneB": 0.6, "geneD": 0.5}
            },
            "umap": {"geneA": 1.0}
        }
    })
    .to_string()
}

/// Deterministic pseudo-random tables for `class_pair`, one per method.
///
/// Each table ranks a random non-empty subset of `g0..g{universe}` in random
/// order, so features missing from some tables are common.
pub fn random_tables(seed: u64, class_pair: &str, methods: &[&str], universe: usize) -> Vec<RankTable> {
    let mut rng = StdRng::seed_from_u64(seed);
    let all: Vec<String> = (0..universe.max(1)).map(|i| format!("g{i}")).collect();

    methods
        .iter()
        .map(|method| {
            let mut features = all.clone();
            features.shuffle(&mut rng);
            let keep = rng.gen_range(1..=features.len());
            features.truncate(keep);
            RankTable::from_ordered(method, pair(class_pair), &features).expect("random rank table")
        })
        .collect()
}

/// Assert the consensus order, with a readable diff on mismatch.
pub fn assert_features(table: &ConsensusRankTable, expected: &[&str]) {
    pretty_assertions::assert_eq!(table.features(), expected.to_vec());
}
