//! Default aggregation settings.
//!
//! Loaded from YAML/JSON/TOML; request fields a caller leaves out fall back
//! to these values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::StrategyKind;
use crate::error::{BiomarkError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Strategy used when a request names none
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,

    /// Consensus rows returned per request
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// RRF dampening constant
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// Per-method trust weights for weighted Borda (method name → weight)
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,

    /// Consensus rows persisted alongside a response, independent of top_n
    #[serde(default = "default_ranking_depth")]
    pub ranking_depth: usize,
}

fn default_strategy() -> StrategyKind { StrategyKind::Rrf }
fn default_top_n() -> usize { 10 }
fn default_rrf_k() -> u32 { 60 }
fn default_ranking_depth() -> usize { 100 }

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            top_n: default_top_n(),
            rrf_k: default_rrf_k(),
            weights: BTreeMap::new(),
            ranking_depth: default_ranking_depth(),
        }
    }
}

impl AggregationConfig {
    /// Load from YAML file
    pub fn from_yaml(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_json(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file
    pub fn from_toml(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to YAML file
    pub fn to_yaml(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(BiomarkError::invalid_parameter("top_n", "must be a positive integer"));
        }
        if self.rrf_k == 0 {
            return Err(BiomarkError::invalid_parameter("rrf_k", "must be a positive integer"));
        }
        if self.ranking_depth == 0 {
            return Err(BiomarkError::invalid_parameter("ranking_depth", "must be a positive integer"));
        }
        for (method, weight) in &self.weights {
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(BiomarkError::invalid_parameter(
                    "weights",
                    format!("weight for '{method}' must be a positive number (got {weight})"),
                ));
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
