//! Cache of computed consensus rankings.
//!
//! Entries are immutable snapshots behind `Arc`; replacing any contributing
//! rank table changes the fingerprint, so a stale entry is never served.
//! The cache does no locking of its own, owners wrap it as they need.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use biomark_common::{ClassPair, ConsensusRankTable, RankTable};

/// One consensus per dataset, class pair and storage label (see
/// [`crate::AggregationRequest::storage_label`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub dataset: String,
    pub class_pair: ClassPair,
    pub strategy_label: String,
}

impl CacheKey {
    pub fn new(dataset: impl Into<String>, class_pair: ClassPair, strategy_label: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            class_pair,
            strategy_label: strategy_label.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedConsensus {
    pub table: ConsensusRankTable,
    /// Number of rows requested when this was computed.
    pub depth: usize,
    pub fingerprint: String,
    pub computed_at: DateTime<Utc>,
    pub csv_path: Option<PathBuf>,
}

impl CachedConsensus {
    pub fn new(table: ConsensusRankTable, depth: usize, fingerprint: String) -> Self {
        Self {
            table,
            depth,
            fingerprint,
            computed_at: Utc::now(),
            csv_path: None,
        }
    }

    pub fn with_csv_path(mut self, path: PathBuf) -> Self {
        self.csv_path = Some(path);
        self
    }

    /// Whether the first `top_n` rows of this entry are the full answer for
    /// a request of that size.
    pub fn covers(&self, top_n: usize) -> bool {
        top_n <= self.depth || self.table.len() < self.depth
    }
}

/// Hex SHA-256 over the identity and contents of `tables`, in order.
pub fn fingerprint(tables: &[RankTable]) -> String {
    let mut hasher = Sha256::new();
    for table in tables {
        hasher.update(table.method().as_bytes());
        hasher.update(b"\0");
        hasher.update(table.class_pair().key().as_bytes());
        hasher.update(b"\0");
        for entry in table.entries() {
            hasher.update(entry.feature.as_bytes());
            hasher.update(b"\0");
            hasher.update(entry.rank.to_le_bytes());
        }
        hasher.update([0xffu8]);
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
pub struct ConsensusCache {
    entries: HashMap<CacheKey, Arc<CachedConsensus>>,
}

impl ConsensusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `key`, only if it was computed from tables with the
    /// same `fingerprint`.
    pub fn get(&self, key: &CacheKey, fingerprint: &str) -> Option<Arc<CachedConsensus>> {
        let hit = self
            .entries
            .get(key)
            .filter(|cached| cached.fingerprint == fingerprint)
            .cloned();
        debug!(dataset = %key.dataset, class_pair = %key.class_pair, label = %key.strategy_label, hit = hit.is_some(), "Consensus cache lookup");
        hit
    }

    /// Store `value` under `key`. When the previous entry for `key` was
    /// computed from different tables, every entry for that class pair of
    /// the same dataset is dropped first.
    pub fn insert(&mut self, key: CacheKey, value: CachedConsensus) -> Arc<CachedConsensus> {
        let replaced = self
            .entries
            .get(&key)
            .is_some_and(|old| old.fingerprint != value.fingerprint);
        if replaced {
            let dropped = self.invalidate_class_pair(&key.dataset, &key.class_pair);
            info!(dataset = %key.dataset, class_pair = %key.class_pair, dropped, "Rank tables changed, dropped cached consensus");
        }

        let value = Arc::new(value);
        self.entries.insert(key, Arc::clone(&value));
        value
    }

    /// Drop every entry for `pair` in `dataset`. Returns how many were removed.
    pub fn invalidate_class_pair(&mut self, dataset: &str, pair: &ClassPair) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.dataset != dataset || &key.class_pair != pair);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biomark_common::StrategyKind;

    fn pair(key: &str) -> ClassPair {
        ClassPair::parse(key).unwrap()
    }

    fn consensus(p: &ClassPair) -> ConsensusRankTable {
        ConsensusRankTable {
            class_pair: p.clone(),
            strategy: StrategyKind::Sum,
            strategy_label: "method=sum".to_string(),
            methods_used: vec!["t_test".to_string()],
            entries: vec![],
        }
    }

    #[test]
    fn test_fingerprint_tracks_contents() {
        let a = RankTable::from_ordered("t_test", pair("A_B"), &["x", "y"]).unwrap();
        let b = RankTable::from_ordered("t_test", pair("A_B"), &["y", "x"]).unwrap();
        let renamed = RankTable::from_ordered("anova", pair("A_B"), &["x", "y"]).unwrap();

        assert_eq!(fingerprint(&[a.clone()]), fingerprint(&[a.clone()]));
        assert_ne!(fingerprint(&[a.clone()]), fingerprint(&[b]));
        assert_ne!(fingerprint(&[a]), fingerprint(&[renamed]));
    }

    #[test]
    fn test_stale_fingerprint_misses() {
        let p = pair("A_B");
        let key = CacheKey::new("cohort", p.clone(), "method=sum");
        let mut cache = ConsensusCache::new();
        cache.insert(key.clone(), CachedConsensus::new(consensus(&p), 10, "abc".into()));

        assert!(cache.get(&key, "abc").is_some());
        assert!(cache.get(&key, "def").is_none());
        assert!(cache.get(&CacheKey::new("cohort", p, "method=rrf,k=60"), "abc").is_none());
    }

    #[test]
    fn test_invalidate_whole_pair() {
        let mut cache = ConsensusCache::new();
        for label in ["method=sum", "method=rank_product"] {
            cache.insert(CacheKey::new("cohort", pair("A_B"), label), CachedConsensus::new(consensus(&pair("A_B")), 10, "f".into()));
        }
        cache.insert(CacheKey::new("cohort", pair("A_C"), "method=sum"), CachedConsensus::new(consensus(&pair("A_C")), 10, "f".into()));

        assert_eq!(cache.invalidate_class_pair("cohort", &pair("B_A")), 2);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_changed_tables_drop_pair_entries() {
        let p = pair("A_B");
        let mut cache = ConsensusCache::new();
        cache.insert(CacheKey::new("cohort", p.clone(), "method=sum"), CachedConsensus::new(consensus(&p), 10, "old".into()));
        cache.insert(CacheKey::new("cohort", p.clone(), "method=rank_product"), CachedConsensus::new(consensus(&p), 10, "old".into()));

        cache.insert(CacheKey::new("cohort", p.clone(), "method=sum"), CachedConsensus::new(consensus(&p), 10, "new".into()));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CacheKey::new("cohort", p, "method=sum"), "new").is_some());
    }

    #[test]
    fn test_datasets_do_not_share_entries() {
        let p = pair("A_B");
        let mut cache = ConsensusCache::new();
        cache.insert(
            CacheKey::new("cohort1", p.clone(), "method=sum"),
            CachedConsensus::new(consensus(&p), 10, "same".into()).with_csv_path(PathBuf::from("cohort1.csv")),
        );

        assert!(cache.get(&CacheKey::new("cohort2", p.clone(), "method=sum"), "same").is_none());

        // different tables in another dataset leave the first one alone
        cache.insert(CacheKey::new("cohort2", p.clone(), "method=sum"), CachedConsensus::new(consensus(&p), 10, "other".into()));
        cache.insert(CacheKey::new("cohort2", p.clone(), "method=sum"), CachedConsensus::new(consensus(&p), 10, "newer".into()));
        let first = cache.get(&CacheKey::new("cohort1", p, "method=sum"), "same").unwrap();
        assert_eq!(first.csv_path, Some(PathBuf::from("cohort1.csv")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_covers() {
        let p = pair("A_B");
        let cached = CachedConsensus::new(consensus(&p), 100, "f".into());
        // fewer rows than requested depth means the whole universe is present
        assert!(cached.covers(500));

        let mut full = consensus(&p);
        full.entries = (1..=3)
            .map(|r| biomark_common::ConsensusEntry { feature: format!("g{r}"), score: 0.0, rank: r })
            .collect();
        let cached = CachedConsensus::new(full, 3, "f".into());
        assert!(cached.covers(3));
        assert!(!cached.covers(4));
    }
}
