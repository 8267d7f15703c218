use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use marker_types::Score;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::SinkError;
use crate::traits::Sink;

/// Metadata keys promoted to the front of the column order.
const CORE_FIELDS: [&str; 6] = [
    "name",
    "value",
    "eval_id",
    "test_id",
    "entity_type",
    "operation_type",
];

/// Buffers flattened scores and writes one CSV file on flush.
///
/// `Score.metadata` is flattened into columns: core fields first, then the
/// remaining keys sorted.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    rows: Vec<Map<String, Value>>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Vec::new(),
        }
    }

    fn flatten(score: &Score) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("name".to_string(), Value::String(score.name.clone()));
        row.insert(
            "value".to_string(),
            serde_json::to_value(score.value).unwrap_or(Value::Null),
        );
        row.insert("eval_id".to_string(), Value::String(score.eval_id.clone()));
        if let Some(comment) = &score.comment {
            row.insert("comment".to_string(), Value::String(comment.clone()));
        }
        if let Some(trace_id) = &score.trace_id {
            row.insert("trace_id".to_string(), Value::String(trace_id.clone()));
        }
        if let Some(observation_id) = &score.observation_id {
            row.insert(
                "observation_id".to_string(),
                Value::String(observation_id.clone()),
            );
        }

        for (key, value) in &score.metadata {
            row.entry(key.clone()).or_insert_with(|| value.clone());
        }

        row
    }

    fn cell(value: &Value) -> String {
        match value {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
impl Sink for CsvSink {
    async fn emit(&mut self, score: &Score) -> Result<(), SinkError> {
        self.rows.push(Self::flatten(score));
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.rows.is_empty() {
            warn!("No scores to write to {}", self.path.display());
            return Ok(());
        }

        let mut remainder: BTreeSet<String> = BTreeSet::new();
        for row in &self.rows {
            for key in row.keys() {
                if !CORE_FIELDS.contains(&key.as_str()) {
                    remainder.insert(key.clone());
                }
            }
        }

        let mut columns: Vec<String> = CORE_FIELDS
            .iter()
            .filter(|field| self.rows.iter().any(|row| row.contains_key(**field)))
            .map(|field| field.to_string())
            .collect();
        columns.extend(remainder);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(&columns)?;
        for row in &self.rows {
            let record: Vec<String> = columns
                .iter()
                .map(|column| row.get(column).map(Self::cell).unwrap_or_default())
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;

        info!("Wrote {} scores to {}", self.rows.len(), self.path.display());
        self.rows.clear();
        Ok(())
    }
}
