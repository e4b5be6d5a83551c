/// Core entity types for rank aggregation.
/// Rank tables arrive from upstream analysis runs; the consensus table is what the ranker hands back.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{BiomarkError, Result};

// ---------------------------------------------------------------------------
// Class pair
// ---------------------------------------------------------------------------

/// Unordered pair of sample-class labels. The labels are held in byte
/// order; the `"A_B"` key leads with a label free of `_` whenever there is
/// one, so that [`ClassPair::parse`] recovers the pair from its own key.
///
/// Parsing splits a key at its first `_`. A key whose labels may contain
/// `_` is ambiguous on its own; resolve it against the pairs you know of
/// with [`ClassPair::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassPair {
    first: String,
    second: String,
}

impl ClassPair {
    pub fn new(a: &str, b: &str) -> Result<Self> {
        let (a, b) = (a.trim(), b.trim());
        if a.is_empty() || b.is_empty() {
            return Err(BiomarkError::InvalidClassPair(format!(
                "class labels must be non-empty (got '{a}' and '{b}')"
            )));
        }
        if a == b {
            return Err(BiomarkError::InvalidClassPair(format!(
                "a class cannot be compared with itself ('{a}')"
            )));
        }
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Ok(Self {
            first: first.to_string(),
            second: second.to_string(),
        })
    }

    /// Parse a `"ClassA_ClassB"` key. `"B_A"` and `"A_B"` yield the same pair.
    pub fn parse(key: &str) -> Result<Self> {
        let (a, b) = key.trim().split_once('_').ok_or_else(|| {
            BiomarkError::InvalidClassPair(format!("'{key}' is not of the form ClassA_ClassB"))
        })?;
        Self::new(a, b)
    }

    /// Every pair `key` could denote, one per `_` it contains, leftmost
    /// split first.
    pub fn candidates(key: &str) -> Vec<ClassPair> {
        let key = key.trim();
        key.match_indices('_')
            .filter_map(|(i, _)| Self::new(&key[..i], &key[i + 1..]).ok())
            .collect()
    }

    /// The pair among `known` that `key` names, in either label order.
    /// Falls back to [`ClassPair::parse`] when none matches.
    pub fn resolve<'a>(key: &str, known: impl IntoIterator<Item = &'a ClassPair>) -> Result<Self> {
        let candidates = Self::candidates(key);
        known
            .into_iter()
            .find(|pair| candidates.contains(pair))
            .cloned()
            .map_or_else(|| Self::parse(key), Ok)
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ClassPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first.contains('_') && !self.second.contains('_') {
            write!(f, "{}_{}", self.second, self.first)
        } else {
            write!(f, "{}_{}", self.first, self.second)
        }
    }
}

impl FromStr for ClassPair {
    type Err = BiomarkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClassPair {
    type Error = BiomarkError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ClassPair> for String {
    fn from(pair: ClassPair) -> Self {
        pair.to_string()
    }
}

// ---------------------------------------------------------------------------
// Rank table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    pub feature: String,
    /// 1-based, lower is more important.
    pub rank: u32,
    pub score: Option<f64>,
}

impl RankEntry {
    pub fn new(feature: impl Into<String>, rank: u32) -> Self {
        Self { feature: feature.into(), rank, score: None }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

#[derive(Debug, Deserialize)]
struct RawRankTable {
    method: String,
    class_pair: ClassPair,
    entries: Vec<RankEntry>,
}

/// One method's ranked output for one class-pair comparison.
///
/// Invariants, enforced by [`RankTable::new`]: entries sorted by ascending
/// rank, ranks exactly `1..=N`, no duplicate or empty feature names, N ≥ 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawRankTable")]
pub struct RankTable {
    method: String,
    class_pair: ClassPair,
    entries: Vec<RankEntry>,
    #[serde(skip)]
    index: HashMap<String, u32>,
}

impl RankTable {
    pub fn new(method: &str, class_pair: ClassPair, mut entries: Vec<RankEntry>) -> Result<Self> {
        let method = method.trim();
        if method.is_empty() {
            return Err(BiomarkError::invalid_table(method, "method name is empty"));
        }
        if entries.is_empty() {
            return Err(BiomarkError::invalid_table(method, "table has no entries"));
        }

        entries.sort_by_key(|e| e.rank);

        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let expected = (i + 1) as u32;
            if entry.rank != expected {
                return Err(BiomarkError::invalid_table(
                    method,
                    format!(
                        "ranks must be exactly 1..={} without gaps or repeats (found {} at position {})",
                        entries.len(),
                        entry.rank,
                        expected
                    ),
                ));
            }
            if entry.feature.trim().is_empty() {
                return Err(BiomarkError::invalid_table(
                    method,
                    format!("empty feature name at rank {}", entry.rank),
                ));
            }
            if index.insert(entry.feature.clone(), entry.rank).is_some() {
                return Err(BiomarkError::invalid_table(
                    method,
                    format!("feature '{}' is ranked more than once", entry.feature),
                ));
            }
        }

        Ok(Self {
            method: method.to_string(),
            class_pair,
            entries,
            index,
        })
    }

    /// Build a table from features already in best-first order.
    pub fn from_ordered<S: AsRef<str>>(method: &str, class_pair: ClassPair, features: &[S]) -> Result<Self> {
        let entries = features
            .iter()
            .enumerate()
            .map(|(i, f)| RankEntry::new(f.as_ref(), (i + 1) as u32))
            .collect();
        Self::new(method, class_pair, entries)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn class_pair(&self) -> &ClassPair {
        &self.class_pair
    }

    pub fn entries(&self) -> &[RankEntry] {
        &self.entries
    }

    /// Number of ranked features; also the worst observed rank.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rank_of(&self, feature: &str) -> Option<u32> {
        self.index.get(feature).copied()
    }

    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.feature.as_str())
    }
}

impl TryFrom<RawRankTable> for RankTable {
    type Error = BiomarkError;

    fn try_from(raw: RawRankTable) -> Result<Self> {
        Self::new(&raw.method, raw.class_pair, raw.entries)
    }
}

impl PartialEq for RankTable {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.class_pair == other.class_pair
            && self.entries == other.entries
    }
}

// ---------------------------------------------------------------------------
// Aggregation strategy names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Rrf,
    RankProduct,
    WeightedBorda,
    Sum,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Rrf,
        StrategyKind::RankProduct,
        StrategyKind::WeightedBorda,
        StrategyKind::Sum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Rrf           => "rrf",
            StrategyKind::RankProduct   => "rank_product",
            StrategyKind::WeightedBorda => "weighted_borda",
            StrategyKind::Sum           => "sum",
        }
    }

    pub fn human_name(&self) -> &'static str {
        match self {
            StrategyKind::Rrf           => "Reciprocal Rank Fusion",
            StrategyKind::RankProduct   => "Rank Product",
            StrategyKind::WeightedBorda => "Weighted Borda Count",
            StrategyKind::Sum           => "Simple Sum",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = BiomarkError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| BiomarkError::InvalidStrategy { name: s.to_string() })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Consensus output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusEntry {
    pub feature: String,
    pub score: f64,
    pub rank: u32,
}

/// Merged top-N ranking plus the provenance needed to label it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusRankTable {
    pub class_pair: ClassPair,
    pub strategy: StrategyKind,
    pub strategy_label: String,
    /// In the order their tables contributed.
    pub methods_used: Vec<String>,
    pub entries: Vec<ConsensusEntry>,
}

impl ConsensusRankTable {
    pub fn features(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.feature.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy holding only the first `n` entries.
    pub fn top(&self, n: usize) -> ConsensusRankTable {
        ConsensusRankTable {
            entries: self.entries.iter().take(n).cloned().collect(),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    StatisticalTest,
    ModelExplanation,
    Classification,
    DimensionalityReduction,
}

impl AnalysisKind {
    /// Classify a method identifier as the upstream scripts name them.
    pub fn from_method_name(method: &str) -> Option<Self> {
        match method.trim().to_ascii_lowercase().as_str() {
            "t_test" | "ttest" | "anova" | "mann_whitney" | "wilcoxon" => Some(AnalysisKind::StatisticalTest),
            "shap" | "lime" | "permutation_feature_importance" | "feature_importance" => Some(AnalysisKind::ModelExplanation),
            "pca" | "tsne" | "t_sne" | "umap" => Some(AnalysisKind::DimensionalityReduction),
            "classification" | "model_training" => Some(AnalysisKind::Classification),
            _ => None,
        }
    }

    /// Only tests and explanations emit a per-feature ranking.
    pub fn yields_ranking(&self) -> bool {
        matches!(self, AnalysisKind::StatisticalTest | AnalysisKind::ModelExplanation)
    }
}

/// One analysis run, tagged with the comparison it was run for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub class_pair: ClassPair,
    pub method: String,
    pub kind: AnalysisKind,
}

impl AnalysisRecord {
    pub fn new(class_pair: ClassPair, method: &str, kind: AnalysisKind) -> Self {
        Self { class_pair, method: method.to_string(), kind }
    }
}
