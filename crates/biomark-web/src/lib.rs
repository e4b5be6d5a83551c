//! biomark-web — HTTP front end for consensus biomarker ranking.
//! Serves:
//!   - class pairs eligible for aggregation per dataset
//!   - consensus rankings, persisted as CSV beside the analysis results

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
