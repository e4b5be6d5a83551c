//! Rank aggregation strategies.
//!
//! Every strategy scores each feature of the feature universe from its
//! effective rank in every table (see [`crate::normalise::effective_rank`]).
//! Per-feature contributions are accumulated in the order the tables are
//! supplied, so the same input always produces bit-identical scores.

use std::collections::BTreeMap;

use biomark_common::{BiomarkError, RankTable, Result, StrategyKind};

use crate::normalise::{effective_rank, feature_universe, max_rank};
use crate::weights::MethodWeights;

pub const DEFAULT_RRF_K: u32 = 60;

/// Which direction of the aggregate score is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Lower score ranks first
    Ascending,
    /// Higher score ranks first
    Descending,
}

pub trait AggregationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn order(&self) -> SortOrder;

    /// Aggregate score of a single feature over `tables`.
    fn score_feature(&self, feature: &str, tables: &[RankTable]) -> f64;

    /// Aggregate score for every feature in the universe of `tables`.
    fn score(&self, tables: &[RankTable]) -> Result<BTreeMap<String, f64>> {
        if tables.is_empty() {
            return Err(BiomarkError::NoData { class_pair: None });
        }
        Ok(feature_universe(tables)
            .into_iter()
            .map(|feature| (feature.to_string(), self.score_feature(feature, tables)))
            .collect())
    }
}

// ── Reciprocal Rank Fusion ───────────────────────────────────────────────────

/// score = Σ 1 / (k + rank). Higher is better.
#[derive(Debug, Clone)]
pub struct ReciprocalRankFusion {
    pub k: u32,
}

impl Default for ReciprocalRankFusion {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K }
    }
}

impl AggregationStrategy for ReciprocalRankFusion {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Rrf
    }

    fn order(&self) -> SortOrder {
        SortOrder::Descending
    }

    fn score_feature(&self, feature: &str, tables: &[RankTable]) -> f64 {
        let k = f64::from(self.k);
        tables
            .iter()
            .map(|t| 1.0 / (k + f64::from(effective_rank(t, feature))))
            .sum()
    }
}

// ── Rank Product ─────────────────────────────────────────────────────────────

/// score = (Π rank)^(1/n), the geometric mean of ranks. Lower is better.
///
/// Computed as exp(mean(ln rank)) so deep tables from many methods cannot
/// overflow the product.
#[derive(Debug, Clone, Default)]
pub struct RankProduct;

impl AggregationStrategy for RankProduct {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RankProduct
    }

    fn order(&self) -> SortOrder {
        SortOrder::Ascending
    }

    fn score_feature(&self, feature: &str, tables: &[RankTable]) -> f64 {
        let n = tables.len() as f64;
        let log_sum: f64 = tables
            .iter()
            .map(|t| f64::from(effective_rank(t, feature)).ln())
            .sum();
        (log_sum / n).exp()
    }
}

// ── Weighted Borda Count ─────────────────────────────────────────────────────

/// score = Σ w(method) × (maxRank + 1 − rank). Higher is better.
///
/// A table that omits the feature contributes nothing.
#[derive(Debug, Clone, Default)]
pub struct WeightedBorda {
    pub weights: MethodWeights,
}

impl AggregationStrategy for WeightedBorda {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WeightedBorda
    }

    fn order(&self) -> SortOrder {
        SortOrder::Descending
    }

    fn score_feature(&self, feature: &str, tables: &[RankTable]) -> f64 {
        tables
            .iter()
            .map(|t| {
                let points = max_rank(t) + 1 - effective_rank(t, feature);
                self.weights.weight_for(t.method()) * f64::from(points)
            })
            .sum()
    }
}

// ── Simple Sum ───────────────────────────────────────────────────────────────

/// score = Σ rank. Lower is better.
#[derive(Debug, Clone, Default)]
pub struct SimpleSum;

impl AggregationStrategy for SimpleSum {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Sum
    }

    fn order(&self) -> SortOrder {
        SortOrder::Ascending
    }

    fn score_feature(&self, feature: &str, tables: &[RankTable]) -> f64 {
        tables
            .iter()
            .map(|t| f64::from(effective_rank(t, feature)))
            .sum()
    }
}

/// Build the strategy for `kind`. `k` only matters for RRF, `weights` only
/// for weighted Borda.
pub fn strategy_for(kind: StrategyKind, k: u32, weights: &MethodWeights) -> Box<dyn AggregationStrategy> {
    match kind {
        StrategyKind::Rrf           => Box::new(ReciprocalRankFusion { k }),
        StrategyKind::RankProduct   => Box::new(RankProduct),
        StrategyKind::WeightedBorda => Box::new(WeightedBorda { weights: weights.clone() }),
        StrategyKind::Sum           => Box::new(SimpleSum),
    }
}
