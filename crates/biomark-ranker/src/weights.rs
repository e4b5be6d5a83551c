//! Per-method trust weights for weighted Borda aggregation.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use biomark_common::{BiomarkError, Result};

const PARAMETER: &str = "aggregationWeights";

/// Method name → positive weight. Keys are stored lowercased and looked up
/// case-insensitively; a method without an entry weighs 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MethodWeights {
    weights: BTreeMap<String, f64>,
}

impl MethodWeights {
    /// Parse the JSON object a caller sends, e.g. `{"shap":1.5,"t_test":1.0}`.
    /// `None` or a blank string means "no weights".
    pub fn parse(json: Option<&str>) -> Result<Self> {
        let Some(raw) = json.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Self::default());
        };

        let value: Value = serde_json::from_str(raw).map_err(|e| {
            BiomarkError::invalid_parameter(PARAMETER, format!("not valid JSON ({e})"))
        })?;
        let Value::Object(map) = value else {
            return Err(BiomarkError::invalid_parameter(
                PARAMETER,
                "expected a JSON object mapping method names to numbers",
            ));
        };

        let mut weights = BTreeMap::new();
        for (method, v) in map {
            let weight = v.as_f64().ok_or_else(|| {
                BiomarkError::invalid_parameter(
                    PARAMETER,
                    format!("weight for '{method}' is not a number ({v})"),
                )
            })?;
            weights.insert(method, weight);
        }
        Self::from_map(weights)
    }

    pub fn from_map(map: BTreeMap<String, f64>) -> Result<Self> {
        let mut weights = BTreeMap::new();
        for (method, weight) in map {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(BiomarkError::invalid_parameter(
                    PARAMETER,
                    format!("weight for '{method}' must be a positive number (got {weight})"),
                ));
            }
            weights.insert(method.trim().to_lowercase(), weight);
        }
        Ok(Self { weights })
    }

    pub fn weight_for(&self, method: &str) -> f64 {
        self.weights
            .get(&method.trim().to_lowercase())
            .copied()
            .unwrap_or(1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Weighted methods that match none of `methods`.
    pub fn unmatched<'a>(&self, methods: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let present: Vec<String> = methods.into_iter().map(|m| m.trim().to_lowercase()).collect();
        self.weights
            .keys()
            .filter(|k| !present.contains(k))
            .cloned()
            .collect()
    }

    /// Compact JSON with sorted keys, as used in strategy labels.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.weights).unwrap_or_default()
    }
}
