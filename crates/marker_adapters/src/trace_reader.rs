use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::instrument;

use crate::backend::TracingBackend;
use crate::error::AdapterError;
use crate::traits::{Adapter, GeneratedOutput, Generation};

/// Adapter that reads the recorded output of a completed trace instead of
/// generating anything new. The trace id comes from the item input.
#[derive(Debug)]
pub struct TraceReadAdapter {
    backend: Arc<dyn TracingBackend>,
}

impl TraceReadAdapter {
    pub fn new(backend: Arc<dyn TracingBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Adapter for TraceReadAdapter {
    #[instrument(skip_all)]
    async fn generate(
        &self,
        input: &Map<String, Value>,
        _model: Option<&str>,
    ) -> Result<Generation, AdapterError> {
        let trace_id = input
            .get("trace_id")
            .and_then(Value::as_str)
            .ok_or(AdapterError::MissingTraceId)?;

        let trace = self
            .backend
            .get_trace(trace_id)
            .await?
            .ok_or_else(|| AdapterError::TraceNotFound(trace_id.to_string()))?;

        let mut metadata = Map::new();
        metadata.insert("trace_source".to_string(), json!("backend"));

        Ok(Generation {
            output: GeneratedOutput::Raw(trace.output.unwrap_or(Value::Null)),
            trace_id: Some(trace.trace_id),
            observation_id: None,
            metadata,
        })
    }
}
