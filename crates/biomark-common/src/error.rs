use thiserror::Error;

use crate::entities::ClassPair;

#[derive(Debug, Error)]
pub enum BiomarkError {
    #[error("Unknown aggregation strategy '{name}' (expected one of: rrf, rank_product, weighted_borda, sum)")]
    InvalidStrategy { name: String },

    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("No rank tables available{}", for_pair(class_pair.as_ref()))]
    NoData { class_pair: Option<ClassPair> },

    #[error("No class pair has a feature-ranking analysis (run a statistical test or a model explanation first)")]
    NoEligibleData,

    #[error("Several class pairs are eligible, select one of: {}", join_pairs(candidates))]
    AmbiguousSelection { candidates: Vec<ClassPair> },

    #[error("Invalid rank table for method '{method}': {reason}")]
    InvalidRankTable { method: String, reason: String },

    #[error("Invalid class pair: {0}")]
    InvalidClassPair(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BiomarkError>;

impl BiomarkError {
    pub fn invalid_parameter(parameter: &str, reason: impl Into<String>) -> Self {
        BiomarkError::InvalidParameter {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_table(method: &str, reason: impl Into<String>) -> Self {
        BiomarkError::InvalidRankTable {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// Ambiguity is a prompt for the user, not a failed request.
    pub fn is_selection_prompt(&self) -> bool {
        matches!(self, BiomarkError::AmbiguousSelection { .. })
    }

    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            BiomarkError::InvalidStrategy { .. }   => "invalid_strategy",
            BiomarkError::InvalidParameter { .. }  => "invalid_parameter",
            BiomarkError::NoData { .. }            => "no_data",
            BiomarkError::NoEligibleData           => "no_eligible_data",
            BiomarkError::AmbiguousSelection { .. } => "ambiguous_selection",
            BiomarkError::InvalidRankTable { .. }  => "invalid_rank_table",
            BiomarkError::InvalidClassPair(_)      => "invalid_class_pair",
            BiomarkError::Io(_)                    => "io",
            BiomarkError::Csv(_)                   => "csv",
            BiomarkError::Serialization(_)         => "serialization",
        }
    }
}

fn for_pair(pair: Option<&ClassPair>) -> String {
    match pair {
        Some(p) => format!(" for class pair '{p}'"),
        None => String::new(),
    }
}

fn join_pairs(pairs: &[ClassPair]) -> String {
    pairs.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_message_names_pair() {
        let pair = ClassPair::new("Control", "AD").unwrap();
        let err = BiomarkError::NoData { class_pair: Some(pair) };
        assert_eq!(err.to_string(), "No rank tables available for class pair 'AD_Control'");
        assert_eq!(BiomarkError::NoData { class_pair: None }.to_string(), "No rank tables available");
    }

    #[test]
    fn test_ambiguous_lists_candidates() {
        let err = BiomarkError::AmbiguousSelection {
            candidates: vec![
                ClassPair::parse("A_B").unwrap(),
                ClassPair::parse("A_C").unwrap(),
            ],
        };
        assert!(err.is_selection_prompt());
        assert!(err.to_string().ends_with("A_B, A_C"));
        assert_eq!(err.kind(), "ambiguous_selection");
    }
}
