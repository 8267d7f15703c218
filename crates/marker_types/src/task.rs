use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};

use crate::error::TypeError;
use crate::score::EvalResult;
use crate::util::create_uuid7;

/// Lifecycle state of a persisted eval task.
///
/// Valid transitions are `Pending -> Running -> {Completed | Failed}` and
/// `{Pending | Running} -> Cancelled`. History is retained; tasks are never
/// deleted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn can_transition(&self, to: TaskStatus) -> bool {
        matches!(
            (self, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Pending, TaskStatus::Cancelled)
                | (TaskStatus::Running, TaskStatus::Cancelled)
        )
    }

    pub fn validate_transition(&self, to: TaskStatus) -> Result<(), TypeError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(TypeError::InvalidTransition { from: *self, to })
        }
    }
}

/// A persisted request to execute an eval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,

    pub eval_name: String,

    /// Serialised eval configuration (dataset, scorers, adapter, sinks).
    pub config: Value,

    pub status: TaskStatus,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Run id of the produced result, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_run_id: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Task {
    pub fn new(eval_name: impl Into<String>, config: Value) -> Self {
        Self {
            id: create_uuid7(),
            eval_name: eval_name.into(),
            config,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            result_run_id: None,
            metadata: Map::new(),
        }
    }
}

/// Result of a completed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,

    pub result: EvalResult,

    pub execution_time_seconds: f64,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_status_transitions() {
        assert!(TaskStatus::Pending.can_transition(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition(TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition(TaskStatus::Failed));
        assert!(TaskStatus::Pending.can_transition(TaskStatus::Cancelled));
        assert!(TaskStatus::Running.can_transition(TaskStatus::Cancelled));

        assert!(!TaskStatus::Pending.can_transition(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition(TaskStatus::Running));
        assert!(!TaskStatus::Cancelled.can_transition(TaskStatus::Running));
        assert!(!TaskStatus::Failed.can_transition(TaskStatus::Cancelled));
    }

    #[test]
    fn test_status_validate_transition_error() {
        let err = TaskStatus::Cancelled
            .validate_transition(TaskStatus::Running)
            .unwrap_err();
        assert!(err.to_string().contains("cancelled -> running"));
    }

    #[test]
    fn test_status_string_roundtrip() {
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
        assert_eq!(
            TaskStatus::from_str("cancelled").unwrap(),
            TaskStatus::Cancelled
        );
        assert!(TaskStatus::from_str("nope").is_err());
    }

    #[test]
    fn test_new_task_defaults() {
        let task = Task::new("my_eval", json!({"concurrency_limit": 5}));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.started_at.is_none());
        assert!(task.error.is_none());
        assert!(!task.id.is_empty());
    }
}
