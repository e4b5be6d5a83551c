//! Consensus ranking API — merges a dataset's per-method rankings.

use std::io::ErrorKind;
use std::path::Path;

use axum::{
    extract::{Path as UrlPath, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use biomark_common::{BiomarkError, ClassPair};
use biomark_ranker::aggregate;
use biomark_ranker::api::{prepare, AggregationRequestBody, AggregationResponse, Prepared};
use biomark_ranker::cache::{fingerprint, CacheKey, CachedConsensus};
use biomark_ranker::label::class_pair_display;
use biomark_ranker::loader::{consensus_csv_path, write_consensus_csv, ImportanceStore, IMPORTANCES_FILE};
use biomark_ranker::resolve_eligible_class_pairs;

use crate::error::ApiError;
use crate::state::SharedState;

async fn load_store(dataset_dir: &Path, dataset: &str) -> Result<ImportanceStore, ApiError> {
    let path = dataset_dir.join(IMPORTANCES_FILE);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("No analysis results for dataset '{dataset}'")));
        }
        Err(e) => return Err(BiomarkError::Io(e).into()),
    };
    Ok(ImportanceStore::from_json_str(&content)?)
}

/// POST /api/datasets/{dataset}/aggregate — consensus ranking for one class pair
pub async fn api_aggregate(
    State(state): State<SharedState>,
    UrlPath(dataset): UrlPath<String>,
    Json(body): Json<AggregationRequestBody>,
) -> Result<Json<AggregationResponse>, ApiError> {
    let dataset_dir = state.dataset_dir(&dataset)?;
    let store = load_store(&dataset_dir, &dataset).await?;
    let defaults = &state.config.aggregation;

    let (request, tables) = match prepare(&body, &store, defaults)? {
        Prepared::Ready { request, tables } => (request, tables),
        Prepared::NeedsSelection(candidates) => {
            return Ok(Json(AggregationResponse::needs_selection(candidates)));
        }
    };

    let storage_label = request.storage_label();
    let key = CacheKey::new(&dataset, request.class_pair.clone(), &storage_label);
    let fp = fingerprint(&tables);
    let cached = state
        .cache
        .read()
        .await
        .get(&key, &fp)
        .filter(|hit| hit.covers(request.top_n));

    let entry = match cached {
        Some(hit) => hit,
        None => {
            // persist a deeper ranking than requested so later requests can reuse it
            let depth = request.top_n.max(defaults.ranking_depth);
            let deep = request.clone().with_top_n(depth);
            let csv_root = state.config.storage.results_dir.clone();
            let dataset_name = dataset.clone();

            let (table, path) = tokio::task::spawn_blocking(move || -> Result<_, BiomarkError> {
                let table = aggregate(&deep, &tables)?;
                let path = consensus_csv_path(&csv_root, &dataset_name, &table.class_pair, &storage_label);
                write_consensus_csv(&path, &table, &tables)?;
                Ok((table, path))
            })
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??;

            state
                .cache
                .write()
                .await
                .insert(key, CachedConsensus::new(table, depth, fp).with_csv_path(path))
        }
    };

    let table = entry.table.top(request.top_n);
    info!(
        dataset = %dataset,
        class_pair = %table.class_pair,
        label = %table.strategy_label,
        returned = table.len(),
        "Served consensus ranking"
    );
    let csv_path = entry.csv_path.as_ref().map(|p| p.display().to_string());
    Ok(Json(AggregationResponse::ranked(table, csv_path)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPairsResponse {
    pub class_pairs: Vec<ClassPair>,
    pub display_names: Vec<String>,
}

/// GET /api/datasets/{dataset}/class-pairs — pairs with a feature ranking
pub async fn api_class_pairs(
    State(state): State<SharedState>,
    UrlPath(dataset): UrlPath<String>,
) -> Result<Json<ClassPairsResponse>, ApiError> {
    let dataset_dir = state.dataset_dir(&dataset)?;
    let store = load_store(&dataset_dir, &dataset).await?;

    let class_pairs = resolve_eligible_class_pairs(&store.history());
    let display_names = class_pairs.iter().map(class_pair_display).collect();
    Ok(Json(ClassPairsResponse { class_pairs, display_names }))
}
