use async_trait::async_trait;
use marker_types::Score;
use serde_json::{Map, Value};

use crate::error::ScorerError;

/// A scorer grades one generated output against an optional expectation.
///
/// Scorers must not mutate their inputs and, apart from model-judge style
/// scorers, do no I/O. A scorer that errors never aborts a run: the engine
/// records the failure as a zero-valued score with a diagnostic comment.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Stable name used for aggregation across items.
    fn name(&self) -> &str;

    /// Versioned scorer identifier, e.g. `exact_match.v1`.
    fn eval_id(&self) -> &str;

    async fn score(
        &self,
        generated: &Value,
        expected: Option<&Value>,
        metadata: &Map<String, Value>,
    ) -> Result<Score, ScorerError>;
}

/// Render a value the way text-oriented scorers see it: strings verbatim,
/// everything else as compact JSON.
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
