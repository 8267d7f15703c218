use std::str::FromStr;

use chrono::{DateTime, Utc};
use marker_types::{Score, ScoreValue, Task, TaskStatus};
use serde_json::{Map, Value};
use sqlx::FromRow;

use crate::sql::error::SqlError;

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: String,
    pub eval_name: String,
    pub config: Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result_run_id: Option<String>,
    pub meta: Value,
}

impl TaskRow {
    pub fn into_task(self) -> Result<Task, SqlError> {
        let status = TaskStatus::from_str(&self.status)
            .map_err(|_| SqlError::UnknownStatus(self.status.clone()))?;

        Ok(Task {
            id: self.id,
            eval_name: self.eval_name,
            config: self.config,
            status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error,
            result_run_id: self.result_run_id,
            metadata: object(self.meta),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TaskResultRow {
    pub task_id: String,
    pub run_id: Option<String>,
    pub execution_time_seconds: f64,
    pub meta: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ScoreRow {
    pub run_id: String,
    pub name: String,
    pub value: f64,
    pub eval_id: String,
    pub comment: Option<String>,
    pub meta: Value,
    pub trace_id: Option<String>,
    pub observation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScoreRow {
    /// Booleans are stored numerically (0/1); the stored shape is a double
    /// either way.
    pub fn into_score(self) -> Score {
        Score {
            name: self.name,
            value: ScoreValue::Float(self.value),
            eval_id: self.eval_id,
            comment: self.comment,
            metadata: object(self.meta),
            trace_id: self.trace_id,
            observation_id: self.observation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_row_conversion() {
        let row = TaskRow {
            id: "task-1".to_string(),
            eval_name: "my_eval".to_string(),
            config: json!({"concurrency_limit": 5}),
            status: "running".to_string(),
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
            error: None,
            result_run_id: None,
            meta: json!({"source": "api"}),
        };

        let task = row.into_task().unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.metadata.get("source"), Some(&json!("api")));
    }

    #[test]
    fn test_unknown_status_is_error() {
        let row = TaskRow {
            id: "task-1".to_string(),
            eval_name: "my_eval".to_string(),
            config: json!({}),
            status: "exploded".to_string(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            result_run_id: None,
            meta: json!({}),
        };

        assert!(matches!(
            row.into_task(),
            Err(SqlError::UnknownStatus(status)) if status == "exploded"
        ));
    }

    #[test]
    fn test_score_row_conversion() {
        let row = ScoreRow {
            run_id: "r1".to_string(),
            name: "exact".to_string(),
            value: 1.0,
            eval_id: "exact_match.v1".to_string(),
            comment: None,
            meta: json!({"dataset_item_id": "t1"}),
            trace_id: Some("tr-1".to_string()),
            observation_id: None,
            created_at: Utc::now(),
        };

        let score = row.into_score();
        assert_eq!(score.value.as_f64(), 1.0);
        assert_eq!(score.dataset_item_id(), "t1");
    }
}
