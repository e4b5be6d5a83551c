//! biomark-ranker — consensus ranking of biomarker candidates.
//! Merges per-method feature rankings for one class pair into a single
//! top-N list.

pub mod normalise;
pub mod weights;
pub mod strategy;
pub mod aggregator;
pub mod resolver;
pub mod label;
pub mod loader;
pub mod cache;
pub mod api;

pub use aggregator::{aggregate, AggregationRequest};
pub use resolver::{resolve_class_pair, resolve_eligible_class_pairs};
pub use strategy::{strategy_for, AggregationStrategy, SortOrder};
pub use weights::MethodWeights;
