//! Class-pair resolution from analysis history.
//!
//! Stateless: every answer is derived from the history passed in.

use std::collections::BTreeSet;

use tracing::debug;

use biomark_common::{AnalysisRecord, BiomarkError, ClassPair, Result};

/// Class pairs with at least one analysis that emits a feature ranking,
/// sorted.
pub fn resolve_eligible_class_pairs(history: &[AnalysisRecord]) -> Vec<ClassPair> {
    let eligible: BTreeSet<&ClassPair> = history
        .iter()
        .filter(|r| r.kind.yields_ranking())
        .map(|r| &r.class_pair)
        .collect();
    eligible.into_iter().cloned().collect()
}

/// Pick the class pair to aggregate.
///
/// An explicit `requested` pair must be eligible. Without one, a single
/// eligible pair is selected silently; several produce
/// [`BiomarkError::AmbiguousSelection`] listing them all.
pub fn resolve_class_pair(history: &[AnalysisRecord], requested: Option<&ClassPair>) -> Result<ClassPair> {
    let eligible = resolve_eligible_class_pairs(history);

    if let Some(pair) = requested {
        if eligible.contains(pair) {
            return Ok(pair.clone());
        }
        if eligible.is_empty() {
            return Err(BiomarkError::NoEligibleData);
        }
        return Err(BiomarkError::NoData { class_pair: Some(pair.clone()) });
    }

    match eligible.len() {
        0 => Err(BiomarkError::NoEligibleData),
        1 => {
            let pair = eligible.into_iter().next().ok_or(BiomarkError::NoEligibleData)?;
            debug!(class_pair = %pair, "Auto-selected the only eligible class pair");
            Ok(pair)
        }
        _ => Err(BiomarkError::AmbiguousSelection { candidates: eligible }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biomark_common::AnalysisKind;

    fn record(pair: &str, method: &str, kind: AnalysisKind) -> AnalysisRecord {
        AnalysisRecord::new(ClassPair::parse(pair).unwrap(), method, kind)
    }

    #[test]
    fn test_only_ranking_methods_are_eligible() {
        let history = vec![
            record("A_B", "t_test", AnalysisKind::StatisticalTest),
            record("A_C", "pca", AnalysisKind::DimensionalityReduction),
            record("B_C", "model_training", AnalysisKind::Classification),
            record("C_D", "shap", AnalysisKind::ModelExplanation),
        ];
        let pairs: Vec<String> = resolve_eligible_class_pairs(&history).iter().map(|p| p.key()).collect();
        assert_eq!(pairs, vec!["A_B", "C_D"]);
    }

    #[test]
    fn test_single_pair_auto_selected() {
        let history = vec![
            record("B_A", "t_test", AnalysisKind::StatisticalTest),
            record("A_B", "lime", AnalysisKind::ModelExplanation),
            record("A_C", "umap", AnalysisKind::DimensionalityReduction),
        ];
        assert_eq!(resolve_class_pair(&history, None).unwrap().key(), "A_B");
    }

    #[test]
    fn test_two_pairs_ambiguous() {
        let history = vec![
            record("A_B", "t_test", AnalysisKind::StatisticalTest),
            record("A_C", "anova", AnalysisKind::StatisticalTest),
        ];
        match resolve_class_pair(&history, None) {
            Err(BiomarkError::AmbiguousSelection { candidates }) => {
                assert_eq!(candidates.len(), 2);
                assert_eq!(candidates[1].key(), "A_C");
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }

        let chosen = ClassPair::parse("C_A").unwrap();
        assert_eq!(resolve_class_pair(&history, Some(&chosen)).unwrap().key(), "A_C");
    }

    #[test]
    fn test_nothing_eligible() {
        let history = vec![record("A_B", "pca", AnalysisKind::DimensionalityReduction)];
        assert!(matches!(resolve_class_pair(&history, None), Err(BiomarkError::NoEligibleData)));
        assert!(matches!(resolve_class_pair(&[], None), Err(BiomarkError::NoEligibleData)));
    }

    #[test]
    fn test_requested_pair_without_rankings() {
        let history = vec![
            record("A_B", "t_test", AnalysisKind::StatisticalTest),
            record("A_C", "pca", AnalysisKind::DimensionalityReduction),
        ];
        let requested = ClassPair::parse("A_C").unwrap();
        let err = resolve_class_pair(&history, Some(&requested)).unwrap_err();
        assert!(matches!(err, BiomarkError::NoData { class_pair: Some(ref p) } if *p == requested));
    }
}
