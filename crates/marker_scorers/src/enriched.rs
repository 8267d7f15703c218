use async_trait::async_trait;
use marker_adapters::EnrichedOutput;
use marker_types::Score;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::ScorerError;
use crate::traits::Scorer;

/// Wrapper that lets any scorer grade the enriched envelope produced by
/// streaming adapters.
///
/// When the generated value is an enriched envelope, only the underlying
/// final output is forwarded to the wrapped scorer and the adapter-captured
/// latency/token/tool telemetry is promoted into the returned score's
/// metadata. Non-enriched values are delegated unchanged.
pub struct EnrichedOutputScorer {
    inner: Box<dyn Scorer>,
}

impl EnrichedOutputScorer {
    pub fn new(inner: impl Scorer + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

#[async_trait]
impl Scorer for EnrichedOutputScorer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn eval_id(&self) -> &str {
        self.inner.eval_id()
    }

    async fn score(
        &self,
        generated: &Value,
        expected: Option<&Value>,
        metadata: &Map<String, Value>,
    ) -> Result<Score, ScorerError> {
        let Some(envelope) = detect_envelope(generated) else {
            return self.inner.score(generated, expected, metadata).await;
        };

        debug!("Unwrapping enriched output envelope");
        let mut score = self
            .inner
            .score(&envelope.final_output, expected, metadata)
            .await?;

        score.metadata.insert(
            "adapter_metrics".to_string(),
            serde_json::to_value(&envelope.metrics)?,
        );
        score.metadata.insert(
            "tools_called".to_string(),
            serde_json::to_value(&envelope.tools_called)?,
        );
        score
            .metadata
            .insert("event_count".to_string(), json!(envelope.events.len()));
        if let Some(latency_ms) = envelope.metrics.latency_ms {
            score
                .metadata
                .insert("latency_ms".to_string(), json!(latency_ms));
        }
        if let Some(total_tokens) = envelope.metrics.total_tokens {
            score
                .metadata
                .insert("total_tokens".to_string(), json!(total_tokens));
        }

        Ok(score)
    }
}

fn detect_envelope(generated: &Value) -> Option<EnrichedOutput> {
    if !generated
        .as_object()
        .is_some_and(|object| object.contains_key("final_output"))
    {
        return None;
    }
    serde_json::from_value(generated.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::ExactMatchScorer;

    fn envelope() -> Value {
        json!({
            "final_output": "x",
            "metrics": {
                "latency_ms": 42.0,
                "input_tokens": 12,
                "output_tokens": 3,
                "total_tokens": 15
            },
            "tools_called": [{"name": "search", "arguments": {}}],
            "events": [{"type": "delta"}, {"type": "final"}]
        })
    }

    #[tokio::test]
    async fn test_unwraps_envelope_and_promotes_telemetry() {
        let scorer = EnrichedOutputScorer::new(ExactMatchScorer::default());
        let score = scorer
            .score(&envelope(), Some(&json!("x")), &Map::new())
            .await
            .unwrap();

        assert!(score.value.is_pass());
        assert_eq!(score.metadata.get("latency_ms"), Some(&json!(42.0)));
        assert_eq!(score.metadata.get("total_tokens"), Some(&json!(15)));
        assert_eq!(score.metadata.get("event_count"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_plain_output_is_delegated() {
        let scorer = EnrichedOutputScorer::new(ExactMatchScorer::default());
        let score = scorer
            .score(&json!("x"), Some(&json!("x")), &Map::new())
            .await
            .unwrap();

        assert!(score.value.is_pass());
        assert!(score.metadata.get("adapter_metrics").is_none());
    }
}
