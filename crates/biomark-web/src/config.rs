//! Configuration loading for the BioMark service.
//! Reads biomark.toml from the current directory or the path in BIOMARK_CONFIG.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::warn;

use biomark_common::AggregationConfig;

pub const CONFIG_ENV: &str = "BIOMARK_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "biomark.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3001 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root holding one directory per dataset
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

fn default_results_dir() -> PathBuf { PathBuf::from("results") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { results_dir: default_results_dir() }
    }
}

impl Config {
    /// Load configuration from biomark.toml.
    /// Checks BIOMARK_CONFIG first, then the current directory; a missing
    /// file means defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.aggregation.validate()?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().with_context(|| format!("Invalid listen address '{addr}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biomark_common::StrategyKind;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.storage.results_dir, PathBuf::from("results"));
        assert_eq!(config.aggregation, AggregationConfig::default());
    }

    #[test]
    fn test_sections_override() {
        let config = Config::from_toml_str(
            r#"
            [server]
            port = 8080

            [storage]
            results_dir = "/data/results"

            [aggregation]
            strategy = "weighted_borda"
            top_n = 25

            [aggregation.weights]
            shap = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert_eq!(config.aggregation.strategy, StrategyKind::WeightedBorda);
        assert_eq!(config.aggregation.top_n, 25);
        assert_eq!(config.aggregation.rrf_k, 60);
        assert_eq!(config.aggregation.weights["shap"], 1.5);
    }

    #[test]
    fn test_invalid_aggregation_rejected() {
        assert!(Config::from_toml_str("[aggregation]\ntop_n = 0\n").is_err());
        assert!(Config::from_toml_str("[aggregation]\nstrategy = \"borda\"\n").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/biomark.toml")).unwrap();
        assert_eq!(config.server.port, 3001);
    }
}
