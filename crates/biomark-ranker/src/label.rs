//! Human- and path-facing labels for a consensus ranking.

use regex::Regex;
use std::sync::OnceLock;

use biomark_common::{ClassPair, StrategyKind};

use crate::weights::MethodWeights;

/// Provenance label, e.g. `method=rrf,k=60` or
/// `method=weighted_borda,weights={"shap":1.5}`.
pub fn strategy_label(kind: StrategyKind, k: u32, weights: &MethodWeights) -> String {
    match kind {
        StrategyKind::Rrf => format!("method=rrf,k={k}"),
        StrategyKind::WeightedBorda if !weights.is_empty() => {
            format!("method=weighted_borda,weights={}", weights.to_json())
        }
        other => format!("method={}", other.as_str()),
    }
}

/// Readable form of a strategy label for plot titles and reports.
///
/// `method=rrf,k=60` → `Reciprocal Rank Fusion, k=60`; a bare strategy
/// token expands to its full name; unknown parts pass through unchanged.
pub fn humanize_label(label: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        return String::new();
    }
    if let Ok(kind) = label.parse::<StrategyKind>() {
        return kind.human_name().to_string();
    }

    static METHOD_PART: OnceLock<Regex> = OnceLock::new();
    let method_part = METHOD_PART.get_or_init(|| Regex::new(r"(?i)^method\s*=\s*(.+)$").unwrap());

    // weights JSON contains commas; only split before the first `weights=`
    let (head, weights) = match label.find("weights=") {
        Some(i) => (&label[..i], Some(&label[i..])),
        None => (label, None),
    };

    let mut parts: Vec<String> = head
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|part| match method_part.captures(part) {
            Some(caps) => {
                let value = caps[1].trim();
                value
                    .parse::<StrategyKind>()
                    .map(|k| k.human_name().to_string())
                    .unwrap_or_else(|_| value.to_string())
            }
            None => part.to_string(),
        })
        .collect();

    if let Some(w) = weights {
        parts.push(w.to_string());
    }
    parts.join(", ")
}

/// Replace every run of characters outside `[A-Za-z0-9._=+-]` with `_`, so
/// a label can name a directory.
pub fn safe_label(label: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_run = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._=+\-]+").unwrap());
    unsafe_run.replace_all(label, "_").into_owned()
}

/// `A_B` → `A vs B`
pub fn class_pair_display(pair: &ClassPair) -> String {
    format!("{} vs {}", pair.first(), pair.second())
}
