//! JSON request/response contract for callers of the aggregator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use biomark_common::{
    AggregationConfig, BiomarkError, ClassPair, ConsensusEntry, ConsensusRankTable, RankTable,
    Result,
};

use crate::aggregator::{aggregate, AggregationRequest};
use crate::label::humanize_label;
use crate::loader::ImportanceStore;
use crate::resolver::resolve_class_pair;

/// Request body as sent by the UI. Every field is optional; omitted values
/// fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRequestBody {
    #[serde(default)]
    pub class_pair: Option<String>,
    #[serde(default)]
    pub aggregation_method: Option<String>,
    /// A JSON object encoded as a string; a bare object is accepted too.
    #[serde(default)]
    pub aggregation_weights: Option<Value>,
    #[serde(default)]
    pub rrf_k: Option<i64>,
    #[serde(default)]
    pub feature_count: Option<i64>,
}

impl AggregationRequestBody {
    /// The explicitly chosen class pair, if any. Blank counts as none.
    /// The key is matched against `known` in either label order, so a key
    /// whose labels contain `_` still finds its pair.
    pub fn requested_pair<'a>(&self, known: impl IntoIterator<Item = &'a ClassPair>) -> Result<Option<ClassPair>> {
        match self.class_pair.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(key) => ClassPair::resolve(key, known).map(Some),
        }
    }

    fn weights_json(&self) -> Option<String> {
        match &self.aggregation_weights {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    pub fn into_request(&self, class_pair: ClassPair, defaults: &AggregationConfig) -> Result<AggregationRequest> {
        let base = AggregationRequest::from_config(class_pair, defaults)?;
        AggregationRequest::parse(
            base,
            self.aggregation_method.as_deref(),
            self.weights_json().as_deref(),
            self.rrf_k,
            self.feature_count,
        )
    }
}

/// Resolved pair, validated parameters and the tables to merge, or the
/// candidates the user has to choose between.
#[derive(Debug, Clone)]
pub enum Prepared {
    Ready {
        request: AggregationRequest,
        tables: Vec<RankTable>,
    },
    NeedsSelection(Vec<ClassPair>),
}

pub fn prepare(body: &AggregationRequestBody, store: &ImportanceStore, defaults: &AggregationConfig) -> Result<Prepared> {
    let requested = body.requested_pair(store.class_pairs())?;
    let pair = match resolve_class_pair(&store.history(), requested.as_ref()) {
        Ok(pair) => pair,
        Err(BiomarkError::AmbiguousSelection { candidates }) => {
            info!(candidates = candidates.len(), "Class pair selection required");
            return Ok(Prepared::NeedsSelection(candidates));
        }
        Err(e) => return Err(e),
    };

    let request = body.into_request(pair, defaults)?;
    let tables = store.rank_tables(&request.class_pair, &request.weights)?;
    Ok(Prepared::Ready { request, tables })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ranked(ConsensusRankTable),
    NeedsSelection(Vec<ClassPair>),
}

/// Resolve, validate and aggregate in one go.
pub fn run_request(body: &AggregationRequestBody, store: &ImportanceStore, defaults: &AggregationConfig) -> Result<Outcome> {
    match prepare(body, store, defaults)? {
        Prepared::Ready { request, tables } => aggregate(&request, &tables).map(Outcome::Ranked),
        Prepared::NeedsSelection(candidates) => Ok(Outcome::NeedsSelection(candidates)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResponse {
    pub success: bool,
    pub class_pair: ClassPair,
    pub aggregation_label: String,
    #[serde(default)]
    pub aggregation_title: String,
    pub ranked_features: Vec<ConsensusEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub success: bool,
    pub needs_selection: bool,
    pub class_pairs: Vec<ClassPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregationResponse {
    Ranked(RankedResponse),
    NeedsSelection(SelectionResponse),
}

impl AggregationResponse {
    pub fn ranked(table: ConsensusRankTable, csv_path: Option<String>) -> Self {
        AggregationResponse::Ranked(RankedResponse {
            success: true,
            class_pair: table.class_pair,
            aggregation_title: humanize_label(&table.strategy_label),
            aggregation_label: table.strategy_label,
            ranked_features: table.entries,
            csv_path,
        })
    }

    pub fn needs_selection(class_pairs: Vec<ClassPair>) -> Self {
        AggregationResponse::NeedsSelection(SelectionResponse {
            success: true,
            needs_selection: true,
            class_pairs,
        })
    }
}

impl From<Outcome> for AggregationResponse {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Ranked(table) => Self::ranked(table, None),
            Outcome::NeedsSelection(candidates) => Self::needs_selection(candidates),
        }
    }
}
