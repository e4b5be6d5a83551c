//! biomark-common — Shared data model, errors, and configuration used across all BioMark crates.

pub mod error;
pub mod entities;
pub mod aggregation_config;

// Re-export commonly used types
pub use aggregation_config::AggregationConfig;
pub use entities::{
    AnalysisKind, AnalysisRecord, ClassPair, ConsensusEntry, ConsensusRankTable, RankEntry,
    RankTable, StrategyKind,
};
pub use error::{BiomarkError, Result};
