use async_trait::async_trait;
use marker_types::{EvalResult, Score};
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::SinkError;
use crate::traits::Sink;

/// Forwards scores to an observability backend over HTTP, linking each by
/// its `trace_id`/`observation_id`. Scores without a trace link are
/// skipped. Delivery failures are logged per score and do not fail the
/// flush.
#[derive(Debug)]
pub struct ObservabilitySink {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    buffer: Vec<Score>,
}

impl ObservabilitySink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            buffer: Vec::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn post_score(&self, score: &Score) -> Result<(), SinkError> {
        let trace_id = match &score.trace_id {
            Some(trace_id) => trace_id,
            None => {
                debug!("Skipping score '{}' without trace id", score.name);
                return Ok(());
            }
        };

        let body = json!({
            "trace_id": trace_id,
            "observation_id": score.observation_id,
            "name": score.name,
            "value": score.value,
            "comment": score.comment,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            error!(
                "Failed to forward score '{}': upstream returned {}",
                score.name,
                response.status()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for ObservabilitySink {
    async fn emit(&mut self, score: &Score) -> Result<(), SinkError> {
        self.buffer.push(score.clone());
        Ok(())
    }

    async fn emit_run(&mut self, run: &EvalResult) -> Result<(), SinkError> {
        for score in &run.scores {
            self.buffer.push(score.clone());
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        let scores = std::mem::take(&mut self.buffer);
        let mut forwarded = 0;
        for score in &scores {
            match self.post_score(score).await {
                Ok(()) => forwarded += 1,
                Err(e) => error!("Failed to forward score '{}': {e}", score.name),
            }
        }
        info!("Forwarded {forwarded}/{} scores", scores.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked_score(trace_id: &str) -> Score {
        let mut score = Score::new("exact", true, "exact_match.v1");
        score.trace_id = Some(trace_id.to_string());
        score
    }

    #[tokio::test]
    async fn test_forwards_linked_scores() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/scores")
            .match_body(mockito::Matcher::PartialJson(json!({
                "trace_id": "tr-1",
                "name": "exact",
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let mut sink = ObservabilitySink::new(format!("{}/scores", server.url()));
        sink.emit(&linked_score("tr-1")).await.unwrap();
        sink.emit(&Score::new("unlinked", true, "x.v1")).await.unwrap();
        sink.flush().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_fail_flush() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/scores")
            .with_status(500)
            .create_async()
            .await;

        let mut sink = ObservabilitySink::new(format!("{}/scores", server.url()));
        sink.emit(&linked_score("tr-1")).await.unwrap();
        assert!(sink.flush().await.is_ok());
    }
}
