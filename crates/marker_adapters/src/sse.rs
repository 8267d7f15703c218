use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use crate::error::AdapterError;
use crate::traits::{
    Adapter, EnrichedOutput, GeneratedOutput, Generation, GenerationMetrics, ToolCall,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Adapter that consumes a server-sent-events stream and emits an enriched
/// output envelope carrying the final output plus collected telemetry
/// (events, tool calls, token counters, latency).
#[derive(Debug, Clone)]
pub struct SseAdapter {
    client: reqwest::Client,
    endpoint: String,
}

impl SseAdapter {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Adapter for SseAdapter {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn generate(
        &self,
        input: &Map<String, Value>,
        model: Option<&str>,
    ) -> Result<Generation, AdapterError> {
        let started = Instant::now();
        let body = json!({
            "input": input,
            "model": model,
            "stream": true,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("accept", "text/event-stream")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::StatusError {
                status: status.as_u16(),
                body,
            });
        }

        let mut accumulator = StreamAccumulator::default();
        let mut buffer = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // SSE frames are separated by a blank line.
            while let Some(frame_end) = buffer.find("\n\n") {
                let frame: String = buffer.drain(..frame_end + 2).collect();
                for data in parse_sse_frame(&frame) {
                    accumulator.consume(&data);
                }
            }
        }

        let mut generation = accumulator.finish(started.elapsed())?;
        debug!(
            event_count = generation
                .output
                .as_enriched()
                .map(|e| e.events.len())
                .unwrap_or(0),
            "SSE stream complete"
        );
        generation
            .metadata
            .insert("adapter".to_string(), json!("sse"));
        Ok(generation)
    }
}

/// Extract the payloads of `data:` lines from one SSE frame, skipping
/// comments and the `[DONE]` sentinel.
fn parse_sse_frame(frame: &str) -> Vec<Value> {
    let mut payloads = Vec::new();

    for line in frame.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            continue;
        }
        match serde_json::from_str::<Value>(data) {
            Ok(value) => payloads.push(value),
            Err(e) => warn!("Skipping unparseable SSE event: {e}"),
        }
    }

    payloads
}

#[derive(Default)]
struct StreamAccumulator {
    events: Vec<Value>,
    tools_called: Vec<ToolCall>,
    content: String,
    final_output: Option<Value>,
    trace_id: Option<String>,
    observation_id: Option<String>,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl StreamAccumulator {
    fn consume(&mut self, event: &Value) {
        self.events.push(event.clone());

        let event_type = event.get("type").and_then(Value::as_str).unwrap_or("");
        match event_type {
            "tool_call" => {
                if let Some(name) = event.get("name").and_then(Value::as_str) {
                    self.tools_called.push(ToolCall {
                        name: name.to_string(),
                        arguments: event.get("arguments").cloned().unwrap_or(Value::Null),
                    });
                }
            }
            "delta" => {
                if let Some(text) = event.get("content").and_then(Value::as_str) {
                    self.content.push_str(text);
                }
            }
            "final" => {
                self.final_output = event.get("output").cloned();
            }
            _ => {}
        }

        if let Some(usage) = event.get("usage").and_then(Value::as_object) {
            self.input_tokens = usage
                .get("input_tokens")
                .and_then(Value::as_u64)
                .or(self.input_tokens);
            self.output_tokens = usage
                .get("output_tokens")
                .and_then(Value::as_u64)
                .or(self.output_tokens);
        }
        if let Some(trace_id) = event.get("trace_id").and_then(Value::as_str) {
            self.trace_id = Some(trace_id.to_string());
        }
        if let Some(observation_id) = event.get("observation_id").and_then(Value::as_str) {
            self.observation_id = Some(observation_id.to_string());
        }
    }

    fn finish(self, elapsed: Duration) -> Result<Generation, AdapterError> {
        let final_output = match self.final_output {
            Some(output) => output,
            None if !self.content.is_empty() => Value::String(self.content.clone()),
            None => return Err(AdapterError::IncompleteStream),
        };

        let total_tokens = match (self.input_tokens, self.output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            (Some(tokens), None) | (None, Some(tokens)) => Some(tokens),
            (None, None) => None,
        };

        Ok(Generation {
            output: GeneratedOutput::Enriched(EnrichedOutput {
                final_output,
                metrics: GenerationMetrics {
                    latency_ms: Some(elapsed.as_secs_f64() * 1000.0),
                    input_tokens: self.input_tokens,
                    output_tokens: self.output_tokens,
                    total_tokens,
                },
                tools_called: self.tools_called,
                events: self.events,
            }),
            trace_id: self.trace_id,
            observation_id: self.observation_id,
            metadata: Map::new(),
        })
    }
}
