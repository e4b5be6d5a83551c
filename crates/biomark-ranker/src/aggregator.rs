//! Consensus ranking: validate a request, merge the matching rank tables
//! with the chosen strategy, order, truncate, and label the result.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use biomark_common::{
    AggregationConfig, BiomarkError, ClassPair, ConsensusEntry, ConsensusRankTable, RankTable,
    Result, StrategyKind,
};

use crate::label::strategy_label;
use crate::normalise::best_observed_ranks;
use crate::strategy::{strategy_for, SortOrder, DEFAULT_RRF_K};
use crate::weights::MethodWeights;

pub const DEFAULT_TOP_N: usize = 10;

/// Scores closer than this count as tied.
const TIE_DECIMALS: f64 = 1e10;

/// A validated aggregation request.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRequest {
    pub class_pair: ClassPair,
    pub strategy: StrategyKind,
    pub top_n: usize,
    /// RRF only
    pub k: u32,
    /// Weighted Borda only
    pub weights: MethodWeights,
}

impl AggregationRequest {
    pub fn new(class_pair: ClassPair, strategy: StrategyKind) -> Self {
        Self {
            class_pair,
            strategy,
            top_n: DEFAULT_TOP_N,
            k: DEFAULT_RRF_K,
            weights: MethodWeights::default(),
        }
    }

    /// Request carrying the configured defaults for everything but the pair.
    pub fn from_config(class_pair: ClassPair, config: &AggregationConfig) -> Result<Self> {
        Ok(Self {
            class_pair,
            strategy: config.strategy,
            top_n: config.top_n,
            k: config.rrf_k,
            weights: MethodWeights::from_map(config.weights.clone())?,
        })
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_k(mut self, k: u32) -> Self {
        self.k = k;
        self
    }

    pub fn with_weights(mut self, weights: MethodWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Build a request from loosely typed caller input, rejecting anything
    /// malformed. Omitted values keep the defaults already in `base`.
    pub fn parse(
        base: AggregationRequest,
        strategy: Option<&str>,
        weights_json: Option<&str>,
        k: Option<i64>,
        top_n: Option<i64>,
    ) -> Result<Self> {
        let mut request = base;
        if let Some(name) = strategy {
            request.strategy = name.parse()?;
        }
        if weights_json.is_some_and(|w| !w.trim().is_empty()) {
            request.weights = MethodWeights::parse(weights_json)?;
        }
        if let Some(k) = k {
            request.k = u32::try_from(k)
                .ok()
                .filter(|k| *k > 0)
                .ok_or_else(|| BiomarkError::invalid_parameter("rrfK", format!("must be a positive integer (got {k})")))?;
        }
        if let Some(n) = top_n {
            request.top_n = usize::try_from(n)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| BiomarkError::invalid_parameter("featureCount", format!("must be a positive integer (got {n})")))?;
        }
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(BiomarkError::invalid_parameter("featureCount", "must be a positive integer (got 0)"));
        }
        if self.k == 0 {
            return Err(BiomarkError::invalid_parameter("rrfK", "must be a positive integer (got 0)"));
        }
        Ok(())
    }

    pub fn label(&self) -> String {
        strategy_label(self.strategy, self.k, &self.weights)
    }

    /// [`label`](Self::label) plus any weights it leaves out. Weights also
    /// blend model-explanation sub-methods under every strategy, so two
    /// requests share a cached ranking or CSV directory only when this matches.
    pub fn storage_label(&self) -> String {
        let label = self.label();
        if self.weights.is_empty() || self.strategy == StrategyKind::WeightedBorda {
            label
        } else {
            format!("{label},weights={}", self.weights.to_json())
        }
    }
}

/// Merge `tables` into a consensus ranking for `request.class_pair`.
///
/// Tables for other class pairs are ignored. When several tables share a
/// method, the one supplied last wins. Features with equal scores are
/// ordered by their best observed rank, then by name.
pub fn aggregate(request: &AggregationRequest, tables: &[RankTable]) -> Result<ConsensusRankTable> {
    request.validate()?;

    let selected = select_tables(&request.class_pair, tables);
    if selected.is_empty() {
        return Err(BiomarkError::NoData { class_pair: Some(request.class_pair.clone()) });
    }

    let methods_used: Vec<String> = selected.iter().map(|t| t.method().to_string()).collect();
    if request.strategy == StrategyKind::WeightedBorda {
        let unmatched = request.weights.unmatched(methods_used.iter().map(String::as_str));
        if !unmatched.is_empty() {
            warn!(class_pair = %request.class_pair, ?unmatched, "Ignoring weights for methods with no rank table");
        }
    }

    let strategy = strategy_for(request.strategy, request.k, &request.weights);
    let scores = strategy.score(&selected)?;
    let best = best_observed_ranks(&selected);

    let mut ordered: Vec<(String, f64, u32)> = scores
        .into_iter()
        .map(|(feature, score)| {
            let best_rank = best.get(feature.as_str()).copied().unwrap_or(u32::MAX);
            (feature, score, best_rank)
        })
        .collect();
    ordered.sort_by(|a, b| consensus_order(strategy.order(), a, b));

    let universe = ordered.len();
    ordered.truncate(request.top_n);

    let entries: Vec<ConsensusEntry> = ordered
        .into_iter()
        .enumerate()
        .map(|(i, (feature, score, _))| ConsensusEntry { feature, score, rank: (i + 1) as u32 })
        .collect();

    info!(
        class_pair = %request.class_pair,
        strategy = request.strategy.as_str(),
        methods = methods_used.len(),
        features = universe,
        returned = entries.len(),
        "Aggregated rank tables"
    );

    Ok(ConsensusRankTable {
        class_pair: request.class_pair.clone(),
        strategy: request.strategy,
        strategy_label: request.label(),
        methods_used,
        entries,
    })
}

/// Tables for `pair`, one per method, the last supplied table taking the
/// slot of any earlier one with the same method.
fn select_tables(pair: &ClassPair, tables: &[RankTable]) -> Vec<RankTable> {
    let mut latest: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, table) in tables.iter().enumerate() {
        if table.class_pair() != pair {
            continue;
        }
        if latest.insert(table.method(), i).is_some() {
            warn!(class_pair = %pair, method = table.method(), "Superseding earlier rank table for method");
        }
    }

    let mut positions: Vec<usize> = latest.into_values().collect();
    positions.sort_unstable();
    debug!(class_pair = %pair, tables = positions.len(), "Selected rank tables");
    positions.into_iter().map(|i| tables[i].clone()).collect()
}

fn tie_key(score: f64) -> f64 {
    (score * TIE_DECIMALS).round()
}

fn consensus_order(order: SortOrder, a: &(String, f64, u32), b: &(String, f64, u32)) -> Ordering {
    let by_score = match order {
        SortOrder::Ascending => tie_key(a.1).total_cmp(&tie_key(b.1)),
        SortOrder::Descending => tie_key(b.1).total_cmp(&tie_key(a.1)),
    };
    by_score
        .then_with(|| a.2.cmp(&b.2))
        .then_with(|| a.0.cmp(&b.0))
}
