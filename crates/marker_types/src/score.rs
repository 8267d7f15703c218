use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Score name used when an adapter fails to produce an output for an item.
pub const GENERATION_ERROR: &str = "generation_error";

/// A score value is either a boolean verdict or a real number. Booleans
/// coerce to 0/1 for aggregation but keep their boolean shape on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    Bool(bool),
    Float(f64),
}

impl ScoreValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            ScoreValue::Bool(true) => 1.0,
            ScoreValue::Bool(false) => 0.0,
            ScoreValue::Float(v) => *v,
        }
    }

    /// Finite values are usable in aggregates; NaN and infinities are
    /// reported as failed instead.
    pub fn is_finite(&self) -> bool {
        match self {
            ScoreValue::Bool(_) => true,
            ScoreValue::Float(v) => v.is_finite(),
        }
    }

    pub fn is_pass(&self) -> bool {
        match self {
            ScoreValue::Bool(b) => *b,
            ScoreValue::Float(v) => v.is_finite() && *v > 0.0,
        }
    }
}

impl From<bool> for ScoreValue {
    fn from(value: bool) -> Self {
        ScoreValue::Bool(value)
    }
}

impl From<f64> for ScoreValue {
    fn from(value: f64) -> Self {
        ScoreValue::Float(value)
    }
}

/// A single graded observation produced by a scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    /// Stable identifier used for aggregation across items.
    pub name: String,

    pub value: ScoreValue,

    /// Versioned identifier of the producing scorer, e.g. `exact_match.v1`.
    pub eval_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Carries `dataset_item_id`, `test_id`, adapter metrics and similar.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_id: Option<String>,
}

impl Score {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<ScoreValue>,
        eval_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            eval_id: eval_id.into(),
            comment: None,
            metadata: Map::new(),
            trace_id: None,
            observation_id: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn dataset_item_id(&self) -> &str {
        self.metadata
            .get("dataset_item_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }
}

/// Immutable record of one eval execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub eval_id: String,

    /// Unique per execution; distinct from `eval_id`, which identifies the
    /// configuration.
    pub run_id: String,

    pub dataset_id: String,

    pub scores: Vec<Score>,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    pub created_at: DateTime<Utc>,
}

impl EvalResult {
    /// Group finite score values by score name. The second map counts
    /// non-finite values per name, reported separately as failed.
    pub fn score_groups(&self) -> (BTreeMap<String, Vec<f64>>, BTreeMap<String, usize>) {
        let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut failed: BTreeMap<String, usize> = BTreeMap::new();

        for score in &self.scores {
            if score.value.is_finite() {
                groups
                    .entry(score.name.clone())
                    .or_default()
                    .push(score.value.as_f64());
            } else {
                *failed.entry(score.name.clone()).or_default() += 1;
            }
        }

        (groups, failed)
    }

    pub fn aggregate_metrics(&self) -> Option<&Value> {
        self.metadata.get("aggregate_metrics")
    }
}
