//! Rank preprocessing.
//!
//! Effective ranks shared by every aggregation strategy, and the conversion
//! of raw importance scores into 1-based ranks.

use std::collections::{BTreeMap, HashMap, HashSet};

use biomark_common::{RankEntry, RankTable};

use crate::weights::MethodWeights;

/// Worst observed rank in a table: its entry count.
pub fn max_rank(table: &RankTable) -> u32 {
    table.len() as u32
}

/// Rank of `feature` in `table`, or one past the last rank when the table
/// did not rank it.
pub fn effective_rank(table: &RankTable, feature: &str) -> u32 {
    table.rank_of(feature).unwrap_or_else(|| max_rank(table) + 1)
}

/// Union of feature names across `tables`, in first-seen order
/// (table order, then rank order within a table).
pub fn feature_universe(tables: &[RankTable]) -> Vec<&str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut universe = Vec::new();
    for table in tables {
        for feature in table.features() {
            if seen.insert(feature) {
                universe.push(feature);
            }
        }
    }
    universe
}

/// Lowest rank each feature actually received; omissions do not count.
pub fn best_observed_ranks(tables: &[RankTable]) -> HashMap<&str, u32> {
    let mut best: HashMap<&str, u32> = HashMap::new();
    for table in tables {
        for entry in table.entries() {
            best.entry(entry.feature.as_str())
                .and_modify(|r| *r = (*r).min(entry.rank))
                .or_insert(entry.rank);
        }
    }
    best
}

/// Rank features by importance score, highest score first.
///
/// Non-finite scores are dropped. Equal scores are ordered by feature name
/// so the result never depends on map iteration order.
pub fn rank_from_scores(scores: &BTreeMap<String, f64>) -> Vec<RankEntry> {
    let mut scored: Vec<(&str, f64)> = scores
        .iter()
        .filter(|(_, s)| s.is_finite())
        .map(|(f, s)| (f.as_str(), *s))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (feature, score))| RankEntry::new(feature, (i + 1) as u32).with_score(score))
        .collect()
}

/// Collapse a model-explanation group (`sub-method → feature → score`) into
/// one score per feature: the weighted mean over the sub-methods that
/// scored it.
///
/// Weights come from `weights` (case-insensitive); a sub-method without a
/// usable weight counts with weight 1.0.
pub fn blend_sub_methods(
    group: &BTreeMap<String, BTreeMap<String, f64>>,
    weights: &MethodWeights,
) -> BTreeMap<String, f64> {
    let mut weighted_sum: BTreeMap<String, f64> = BTreeMap::new();
    let mut weight_total: BTreeMap<String, f64> = BTreeMap::new();

    for (sub_method, feature_scores) in group {
        let w = weights.weight_for(sub_method);
        for (feature, score) in feature_scores {
            if !score.is_finite() {
                continue;
            }
            *weighted_sum.entry(feature.clone()).or_insert(0.0) += w * score;
            *weight_total.entry(feature.clone()).or_insert(0.0) += w;
        }
    }

    weighted_sum
        .into_iter()
        .filter_map(|(feature, sum)| {
            let total = weight_total.get(&feature).copied().unwrap_or(0.0);
            (total > 0.0).then(|| (feature, sum / total))
        })
        .collect()
}
