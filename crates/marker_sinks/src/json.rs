use std::path::PathBuf;

use async_trait::async_trait;
use marker_types::{EvalResult, Score};
use serde_json::Value;
use tracing::info;

use crate::error::SinkError;
use crate::traits::Sink;

/// Buffers serialised runs and writes them as one JSON array on flush.
#[derive(Debug)]
pub struct JsonSink {
    path: PathBuf,
    runs: Vec<Value>,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            runs: Vec::new(),
        }
    }
}

#[async_trait]
impl Sink for JsonSink {
    async fn emit(&mut self, _score: &Score) -> Result<(), SinkError> {
        // Individual scores are covered by emit_run.
        Ok(())
    }

    async fn emit_run(&mut self, run: &EvalResult) -> Result<(), SinkError> {
        self.runs.push(serde_json::to_value(run)?);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&self.runs)?;
        std::fs::write(&self.path, body)?;
        info!("Wrote {} runs to {}", self.runs.len(), self.path.display());
        self.runs.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Map;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_json_sink_writes_array_of_runs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs.json");
        let mut sink = JsonSink::new(&path);

        let run = EvalResult {
            eval_id: "my_eval-abc".to_string(),
            run_id: "r1".to_string(),
            dataset_id: "ds".to_string(),
            scores: vec![Score::new("exact", true, "exact_match.v1")],
            metadata: Map::new(),
            created_at: Utc::now(),
        };

        sink.emit_run(&run).await.unwrap();
        sink.flush().await.unwrap();

        let parsed: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let runs = parsed.as_array().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["run_id"], "r1");
        assert_eq!(runs[0]["scores"][0]["value"], true);
    }
}
