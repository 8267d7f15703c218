use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::error::AdapterError;
use crate::traits::{Adapter, GeneratedOutput, Generation};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter that POSTs a JSON envelope to an HTTP endpoint and treats the
/// response body as the generated output.
#[derive(Debug, Clone)]
pub struct HttpAdapter {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpAdapter {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, AdapterError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            bearer_token: None,
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl Adapter for HttpAdapter {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn generate(
        &self,
        input: &Map<String, Value>,
        model: Option<&str>,
    ) -> Result<Generation, AdapterError> {
        let body = json!({
            "input": input,
            "model": model,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::StatusError {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;

        debug!("Received generation response");
        Ok(unpack_response(payload))
    }
}

/// Responses are either a bare output value or an object envelope with
/// `output` plus optional `trace_id`/`observation_id`/`metadata`.
fn unpack_response(payload: Value) -> Generation {
    let Some(object) = payload.as_object() else {
        return Generation::raw(payload);
    };

    let Some(output) = object.get("output") else {
        return Generation::raw(payload);
    };

    let string_field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Generation {
        output: GeneratedOutput::Raw(output.clone()),
        trace_id: string_field("trace_id"),
        observation_id: string_field("observation_id"),
        metadata: object
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("prompt".to_string(), json!("hello"));
        map
    }

    #[tokio::test]
    async fn test_generate_bare_output() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .match_body(mockito::Matcher::PartialJson(json!({
                "input": {"prompt": "hello"},
                "model": "gpt-4o",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#""world""#)
            .create_async()
            .await;

        let adapter = HttpAdapter::new(format!("{}/generate", server.url())).unwrap();
        let generation = adapter.generate(&input(), Some("gpt-4o")).await.unwrap();

        assert_eq!(generation.output.final_value(), &json!("world"));
        assert!(generation.trace_id.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_envelope_with_trace_link() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"output": {"answer": 42}, "trace_id": "tr-1", "observation_id": "obs-1"}"#)
            .create_async()
            .await;

        let adapter = HttpAdapter::new(format!("{}/generate", server.url())).unwrap();
        let generation = adapter.generate(&input(), None).await.unwrap();

        assert_eq!(generation.output.final_value(), &json!({"answer": 42}));
        assert_eq!(generation.trace_id.as_deref(), Some("tr-1"));
        assert_eq!(generation.observation_id.as_deref(), Some("obs-1"));
    }

    #[tokio::test]
    async fn test_generate_non_2xx_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let adapter = HttpAdapter::new(format!("{}/generate", server.url())).unwrap();
        let err = adapter.generate(&input(), None).await.unwrap_err();

        assert!(matches!(
            err,
            AdapterError::StatusError { status: 503, .. }
        ));
    }
}
