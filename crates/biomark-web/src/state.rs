//! Shared application state for the web server.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use biomark_ranker::cache::ConsensusCache;
use biomark_ranker::label::safe_label;

use crate::config::Config;
use crate::error::ApiError;

/// Shared state injected into every Axum handler.
///
/// Handlers load their own copy of the rank tables per request; the only
/// shared mutable piece is the consensus cache.
pub struct AppState {
    pub config: Config,
    pub cache: RwLock<ConsensusCache>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: RwLock::new(ConsensusCache::new()),
        }
    }

    /// Directory of `dataset` under the results root. Names that would
    /// escape the root are rejected.
    pub fn dataset_dir(&self, dataset: &str) -> Result<PathBuf, ApiError> {
        let name = dataset.trim();
        if name.is_empty() || name == "." || name == ".." || safe_label(name) != name {
            return Err(ApiError::BadRequest(format!("Invalid dataset name '{dataset}'")));
        }
        Ok(self.config.storage.results_dir.join(name))
    }
}

pub type SharedState = Arc<AppState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_dir_rejects_traversal() {
        let state = AppState::new(Config::default());
        assert!(state.dataset_dir("cohort_1.csv").is_ok());
        assert!(state.dataset_dir("..").is_err());
        assert!(state.dataset_dir("a/../b").is_err());
        assert!(state.dataset_dir("").is_err());
    }
}
