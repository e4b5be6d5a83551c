//! Reading upstream analysis outputs and persisting consensus rankings.
//!
//! Two input shapes are understood:
//! - a per-method ranked-feature file (`feature`, `rank`, optional `score`),
//!   `;`- or `,`-delimited, possibly starting with a UTF-8 BOM;
//! - the per-dataset `feature_importances.json`, which maps each class pair
//!   to per-method importance scores, model-explanation runs nested one
//!   level deeper by sub-method.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use biomark_common::{
    AnalysisKind, AnalysisRecord, BiomarkError, ClassPair, ConsensusRankTable, RankEntry,
    RankTable, Result,
};

use crate::label::safe_label;
use crate::normalise::{blend_sub_methods, effective_rank, rank_from_scores};
use crate::weights::MethodWeights;

const BOM: char = '\u{feff}';

pub const IMPORTANCES_FILE: &str = "feature_importances.json";
pub const CONSENSUS_FILE: &str = "ranked_features_df.csv";

// ── Ranked-feature files ─────────────────────────────────────────────────────

/// Read one method's ranked-feature file for `class_pair`.
///
/// The identity of the table comes from the caller; nothing is inferred
/// from the path.
pub fn read_rank_table(path: &Path, method: &str, class_pair: ClassPair) -> Result<RankTable> {
    let content = fs::read_to_string(path)?;
    let table = parse_rank_table(&content, method, class_pair)?;
    debug!(path = %path.display(), method, features = table.len(), "Loaded rank table");
    Ok(table)
}

pub fn parse_rank_table(content: &str, method: &str, class_pair: ClassPair) -> Result<RankTable> {
    let content = content.trim_start_matches(BOM);
    let header = content.lines().next().unwrap_or_default();
    let delimiter = if header.split(';').count() >= 2 { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_ascii_lowercase()).collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let feature_idx = column("feature")
        .ok_or_else(|| BiomarkError::invalid_table(method, "missing 'feature' column"))?;
    let rank_idx = column("rank")
        .ok_or_else(|| BiomarkError::invalid_table(method, "missing 'rank' column"))?;
    let score_idx = column("score");

    let mut entries = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let feature = record.get(feature_idx).unwrap_or_default();
        if feature.is_empty() {
            warn!(method, row = line + 2, "Skipping row without a feature name");
            continue;
        }
        let raw_rank = record.get(rank_idx).unwrap_or_default();
        let rank = parse_rank(raw_rank).ok_or_else(|| {
            BiomarkError::invalid_table(method, format!("rank '{raw_rank}' of '{feature}' is not a positive integer"))
        })?;

        let mut entry = RankEntry::new(feature, rank);
        if let Some(score) = score_idx
            .and_then(|i| record.get(i))
            .and_then(|s| s.parse::<f64>().ok())
        {
            entry = entry.with_score(score);
        }
        entries.push(entry);
    }

    RankTable::new(method, class_pair, entries)
}

/// Accepts `3` and the float rendering `3.0` some writers produce.
fn parse_rank(raw: &str) -> Option<u32> {
    if let Ok(rank) = raw.parse::<u32>() {
        return (rank > 0).then_some(rank);
    }
    let value = raw.parse::<f64>().ok()?;
    (value >= 1.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX)).then(|| value as u32)
}

// ── feature_importances.json ─────────────────────────────────────────────────

/// Scores recorded for one method: flat for statistical tests, grouped by
/// sub-method (shap, lime, ...) for model explanations. A score the writer
/// could not compute (`NaN`, `null`) is kept as NaN and never ranked.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodScores {
    Flat(BTreeMap<String, f64>),
    Nested(BTreeMap<String, BTreeMap<String, f64>>),
}

fn score_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Null => Some(f64::NAN),
        _ => None,
    }
}

fn score_map(values: &Map<String, Value>) -> Option<BTreeMap<String, f64>> {
    values
        .iter()
        .map(|(feature, v)| score_of(v).map(|s| (feature.clone(), s)))
        .collect()
}

impl TryFrom<&Value> for MethodScores {
    type Error = String;

    fn try_from(value: &Value) -> std::result::Result<Self, String> {
        let Value::Object(map) = value else {
            return Err(format!("expected an object of scores, found {value}"));
        };
        if let Some(flat) = score_map(map) {
            return Ok(MethodScores::Flat(flat));
        }
        map.iter()
            .map(|(sub_method, scores)| match scores {
                Value::Object(inner) => score_map(inner)
                    .map(|s| (sub_method.clone(), s))
                    .ok_or_else(|| format!("'{sub_method}' holds a non-numeric score")),
                _ => Err(format!("'{sub_method}' is neither a score nor a group of scores")),
            })
            .collect::<std::result::Result<_, _>>()
            .map(MethodScores::Nested)
    }
}

impl MethodScores {
    fn kind(&self, method: &str) -> AnalysisKind {
        match self {
            MethodScores::Flat(_) => {
                AnalysisKind::from_method_name(method).unwrap_or(AnalysisKind::StatisticalTest)
            }
            MethodScores::Nested(_) => AnalysisKind::ModelExplanation,
        }
    }

    fn has_scores(&self) -> bool {
        match self {
            MethodScores::Flat(scores) => scores.values().any(|s| s.is_finite()),
            MethodScores::Nested(group) => group
                .values()
                .any(|scores| scores.values().any(|s| s.is_finite())),
        }
    }

    fn ranked(&self, weights: &MethodWeights) -> Vec<RankEntry> {
        match self {
            MethodScores::Flat(scores) => rank_from_scores(scores),
            MethodScores::Nested(group) => rank_from_scores(&blend_sub_methods(group, weights)),
        }
    }
}

/// Importance scores of every analysis run for one dataset, keyed by
/// canonical class pair then method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportanceStore {
    pairs: BTreeMap<ClassPair, BTreeMap<String, MethodScores>>,
}

pub fn read_feature_importances(path: &Path) -> Result<ImportanceStore> {
    let content = fs::read_to_string(path)?;
    let store = ImportanceStore::from_json_str(&content)?;
    info!(path = %path.display(), class_pairs = store.pairs.len(), "Loaded feature importances");
    Ok(store)
}

impl ImportanceStore {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let json = json.trim_start_matches(BOM);
        // Python's json.dump writes bare NaN/Infinity, which only json5 accepts
        let raw: Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(strict) => json5::from_str(json).map_err(|e| {
                debug!(error = %e, "Lenient JSON parse failed too");
                BiomarkError::from(strict)
            })?,
        };
        let Value::Object(pairs) = raw else {
            return Err(BiomarkError::invalid_table(IMPORTANCES_FILE, "top level is not an object"));
        };

        let mut store = Self::default();
        for (key, methods) in &pairs {
            let pair = match ClassPair::parse(key) {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(key, error = %e, "Skipping unrecognised class pair key");
                    continue;
                }
            };
            let Value::Object(methods) = methods else {
                warn!(key, "Skipping class pair without a method map");
                continue;
            };
            for (method, value) in methods {
                match MethodScores::try_from(value) {
                    Ok(scores) => store.insert(pair.clone(), method, scores),
                    Err(reason) => warn!(class_pair = %pair, method, reason, "Skipping malformed analysis"),
                }
            }
        }
        Ok(store)
    }

    /// Record `scores` for `method`. `A_B` and `B_A` keys land on the same
    /// pair; a repeated method replaces the earlier scores.
    pub fn insert(&mut self, pair: ClassPair, method: &str, scores: MethodScores) {
        let methods = self.pairs.entry(pair).or_default();
        if methods.insert(method.to_string(), scores).is_some() {
            warn!(method, "Replacing earlier scores for method");
        }
    }

    pub fn class_pairs(&self) -> impl Iterator<Item = &ClassPair> {
        self.pairs.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Every recorded run, for class-pair resolution.
    pub fn history(&self) -> Vec<AnalysisRecord> {
        self.pairs
            .iter()
            .flat_map(|(pair, methods)| {
                methods
                    .iter()
                    .filter(|(_, scores)| scores.has_scores())
                    .map(move |(method, scores)| AnalysisRecord::new(pair.clone(), method, scores.kind(method)))
            })
            .collect()
    }

    /// One rank table per ranking-producing method recorded for `pair`, in
    /// method name order. Sub-method groups are blended with `weights`
    /// before ranking.
    pub fn rank_tables(&self, pair: &ClassPair, weights: &MethodWeights) -> Result<Vec<RankTable>> {
        let methods = self
            .pairs
            .get(pair)
            .ok_or_else(|| BiomarkError::NoData { class_pair: Some(pair.clone()) })?;

        let mut tables = Vec::with_capacity(methods.len());
        for (method, scores) in methods {
            if !scores.kind(method).yields_ranking() {
                debug!(class_pair = %pair, method, "Skipping method without a feature ranking");
                continue;
            }
            let entries = scores.ranked(weights);
            if entries.is_empty() {
                warn!(class_pair = %pair, method, "Skipping method with no finite scores");
                continue;
            }
            tables.push(RankTable::new(method, pair.clone(), entries)?);
        }
        Ok(tables)
    }
}

// ── Consensus output ─────────────────────────────────────────────────────────

/// `<results>/<dataset>/feature_ranking/<pair>/<safe label>/ranked_features_df.csv`
pub fn consensus_csv_path(results_dir: &Path, dataset: &str, pair: &ClassPair, label: &str) -> PathBuf {
    results_dir
        .join(dataset)
        .join("feature_ranking")
        .join(pair.key())
        .join(safe_label(label))
        .join(CONSENSUS_FILE)
}

/// Write `table` as `feature;score;rank` with a BOM-prefixed header, the
/// layout downstream spreadsheet tooling expects, followed by one column per
/// contributing method holding the feature's effective rank in it.
///
/// `tables` are the rank tables `table` was aggregated from.
pub fn write_consensus_csv(path: &Path, table: &ConsensusRankTable, tables: &[RankTable]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // the last table per method is the one that was aggregated
    let columns: Vec<&RankTable> = table
        .methods_used
        .iter()
        .filter_map(|method| {
            tables
                .iter()
                .rev()
                .find(|t| t.method() == method && t.class_pair() == &table.class_pair)
        })
        .collect();

    let mut buf = Vec::new();
    buf.extend_from_slice(BOM.to_string().as_bytes());
    {
        let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(&mut buf);
        let mut header = vec!["feature".to_string(), "score".to_string(), "rank".to_string()];
        header.extend(columns.iter().map(|t| t.method().to_string()));
        writer.write_record(&header)?;
        for entry in &table.entries {
            let mut record = vec![entry.feature.clone(), entry.score.to_string(), entry.rank.to_string()];
            record.extend(columns.iter().map(|t| effective_rank(t, &entry.feature).to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
    }
    fs::write(path, buf)?;

    info!(
        path = %path.display(),
        class_pair = %table.class_pair,
        rows = table.entries.len(),
        "Wrote consensus ranking"
    );
    Ok(())
}
