use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AdapterError;

/// Per-invocation telemetry captured by streaming adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// A tool invocation observed while streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,

    #[serde(default)]
    pub arguments: Value,
}

/// Envelope produced by streaming adapters: the final output plus the
/// telemetry collected while producing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedOutput {
    pub final_output: Value,

    #[serde(default)]
    pub metrics: GenerationMetrics,

    #[serde(default)]
    pub tools_called: Vec<ToolCall>,

    #[serde(default)]
    pub events: Vec<Value>,
}

/// Adapter output. Scorers that understand the enriched envelope unwrap it;
/// everything else scores the raw value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratedOutput {
    Enriched(EnrichedOutput),
    Raw(Value),
}

impl GeneratedOutput {
    /// The value scorers should grade: the final output for enriched
    /// envelopes, the value itself otherwise.
    pub fn final_value(&self) -> &Value {
        match self {
            GeneratedOutput::Enriched(enriched) => &enriched.final_output,
            GeneratedOutput::Raw(value) => value,
        }
    }

    pub fn as_enriched(&self) -> Option<&EnrichedOutput> {
        match self {
            GeneratedOutput::Enriched(enriched) => Some(enriched),
            GeneratedOutput::Raw(_) => None,
        }
    }
}

/// Result of one adapter invocation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub output: GeneratedOutput,

    /// Link to the trace recorded by the upstream system, for score
    /// attribution and cost lookup.
    pub trace_id: Option<String>,

    pub observation_id: Option<String>,

    pub metadata: Map<String, Value>,
}

impl Generation {
    pub fn raw(value: Value) -> Self {
        Self {
            output: GeneratedOutput::Raw(value),
            trace_id: None,
            observation_id: None,
            metadata: Map::new(),
        }
    }
}

/// An adapter invokes an external AI system to produce an output for a
/// dataset item. Failures are retriable per item; the engine records them as
/// `generation_error` scores rather than aborting the run.
#[async_trait]
pub trait Adapter: Send + Sync + std::fmt::Debug {
    async fn generate(
        &self,
        input: &Map<String, Value>,
        model: Option<&str>,
    ) -> Result<Generation, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enriched_envelope_roundtrip() {
        let enriched = EnrichedOutput {
            final_output: json!("answer"),
            metrics: GenerationMetrics {
                latency_ms: Some(12.5),
                input_tokens: Some(100),
                output_tokens: Some(50),
                total_tokens: Some(150),
            },
            tools_called: vec![ToolCall {
                name: "search".to_string(),
                arguments: json!({"q": "rust"}),
            }],
            events: vec![json!({"type": "delta"})],
        };

        let value = serde_json::to_value(GeneratedOutput::Enriched(enriched)).unwrap();
        let parsed: GeneratedOutput = serde_json::from_value(value).unwrap();
        let enriched = parsed.as_enriched().unwrap();
        assert_eq!(enriched.final_output, json!("answer"));
        assert_eq!(enriched.metrics.total_tokens, Some(150));
    }

    #[test]
    fn test_raw_output_final_value() {
        let output = GeneratedOutput::Raw(json!({"a": 1}));
        assert_eq!(output.final_value(), &json!({"a": 1}));
        assert!(output.as_enriched().is_none());
    }
}
