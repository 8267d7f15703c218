use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AdapterError;

/// A single span within a recorded trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    pub span_id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// A completed trace read from the user's tracing backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub trace_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Recorded final output of the traced request, when the backend
    /// captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default)]
    pub spans: Vec<TraceSpan>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Cost and token data extracted from a trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostData {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub cost: Option<f64>,
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Read-only interface over the user's tracing system. Used by the
/// trace-reading adapter and by the engine's aggregate-metric pass.
#[async_trait]
pub trait TracingBackend: Send + Sync + std::fmt::Debug {
    async fn get_trace(&self, trace_id: &str) -> Result<Option<TraceRecord>, AdapterError>;

    async fn get_cost_data(&self, trace_id: &str) -> Result<Option<CostData>, AdapterError>;

    async fn list_traces(
        &self,
        filters: &Map<String, Value>,
        limit: usize,
    ) -> Result<Vec<TraceRecord>, AdapterError>;
}

pub mod conventions {
    //! Span attribute names recognised when extracting cost data. Both the
    //! LLM semantic-convention keys and the shorthand names emitted by
    //! hosted tracing products are accepted.

    use serde_json::{Map, Value};

    use super::CostData;

    pub const ATTR_LLM_TOKEN_COUNT_INPUT: &str = "llm.token_count.input";
    pub const ATTR_LLM_TOKEN_COUNT_OUTPUT: &str = "llm.token_count.output";
    pub const ATTR_LLM_COST: &str = "llm.cost";
    pub const ATTR_LLM_PROVIDER: &str = "llm.provider";
    pub const ATTR_LLM_MODEL: &str = "llm.model";

    pub const ATTR_INPUT_TOKENS: &str = "input_tokens";
    pub const ATTR_OUTPUT_TOKENS: &str = "output_tokens";
    pub const ATTR_TOTAL_COST: &str = "total_cost";

    /// Build [`CostData`] from span attributes. Returns `None` when neither
    /// token counts nor cost are present.
    pub fn extract_cost_from_attributes(attrs: &Map<String, Value>) -> Option<CostData> {
        let int = |key: &str| attrs.get(key).and_then(Value::as_u64);
        let float = |key: &str| attrs.get(key).and_then(Value::as_f64);
        let string = |key: &str| {
            attrs
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let input_tokens = int(ATTR_LLM_TOKEN_COUNT_INPUT).or_else(|| int(ATTR_INPUT_TOKENS));
        let output_tokens =
            int(ATTR_LLM_TOKEN_COUNT_OUTPUT).or_else(|| int(ATTR_OUTPUT_TOKENS));
        let cost = float(ATTR_LLM_COST).or_else(|| float(ATTR_TOTAL_COST));

        if input_tokens.is_none() && output_tokens.is_none() && cost.is_none() {
            return None;
        }

        let total_tokens = match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            (tokens, None) | (None, tokens) => tokens,
        };

        Some(CostData {
            input_tokens,
            output_tokens,
            total_tokens,
            cost,
            provider: string(ATTR_LLM_PROVIDER),
            model: string(ATTR_LLM_MODEL),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::conventions::*;
    use serde_json::{json, Map, Value};

    fn attrs(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_extract_semantic_convention_keys() {
        let cost = extract_cost_from_attributes(&attrs(&[
            (ATTR_LLM_TOKEN_COUNT_INPUT, json!(120)),
            (ATTR_LLM_TOKEN_COUNT_OUTPUT, json!(30)),
            (ATTR_LLM_COST, json!(0.0021)),
            (ATTR_LLM_PROVIDER, json!("openai")),
            (ATTR_LLM_MODEL, json!("gpt-4o")),
        ]))
        .unwrap();

        assert_eq!(cost.input_tokens, Some(120));
        assert_eq!(cost.total_tokens, Some(150));
        assert_eq!(cost.cost, Some(0.0021));
        assert_eq!(cost.provider.as_deref(), Some("openai"));
    }

    #[test]
    fn test_extract_shorthand_keys() {
        let cost = extract_cost_from_attributes(&attrs(&[
            (ATTR_INPUT_TOKENS, json!(10)),
            (ATTR_OUTPUT_TOKENS, json!(5)),
            (ATTR_TOTAL_COST, json!(0.1)),
        ]))
        .unwrap();

        assert_eq!(cost.total_tokens, Some(15));
        assert_eq!(cost.cost, Some(0.1));
    }

    #[test]
    fn test_extract_none_without_data() {
        assert!(extract_cost_from_attributes(&attrs(&[("other", json!(1))])).is_none());
    }
}
