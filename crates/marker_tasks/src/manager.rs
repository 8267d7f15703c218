use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use marker_engine::{EngineError, Evaluation};
use marker_sql::{EvalSqlLogic, PostgresClient, TaskSqlLogic, TransitionUpdate};
use marker_types::{Task, TaskResult, TaskStatus};
use serde_json::{json, Map, Value};
use sqlx::{Pool, Postgres};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::TaskConfig;
use crate::error::TaskError;

/// Creates, executes and cancels persisted eval tasks. The manager is the
/// only writer of task status; transitions go through compare-and-swap
/// updates so concurrent cancellation is race-free.
pub struct TaskManager {
    pool: Pool<Postgres>,
    running: Mutex<HashMap<String, CancellationToken>>,
}

impl TaskManager {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Persist a new pending task.
    pub async fn create_task(
        &self,
        eval_name: impl Into<String>,
        config: Value,
    ) -> Result<Task, TaskError> {
        // Fail fast on configs the worker could never execute.
        TaskConfig::from_value(&config)?;

        let task = Task::new(eval_name, config);
        PostgresClient::insert_task(&self.pool, &task).await?;
        info!("Created task {} for eval '{}'", task.id, task.eval_name);
        Ok(task)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task, TaskError> {
        PostgresClient::get_task(&self.pool, task_id)
            .await?
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    pub async fn list_tasks(
        &self,
        status: TaskStatus,
        limit: i64,
    ) -> Result<Vec<Task>, TaskError> {
        Ok(PostgresClient::list_tasks(&self.pool, status, limit).await?)
    }

    /// Claim a pending task and execute it in the foreground.
    #[instrument(skip_all, fields(task_id = %task_id))]
    pub async fn execute_task(&self, task_id: &str) -> Result<TaskResult, TaskError> {
        let task = PostgresClient::transition_task(
            &self.pool,
            task_id,
            &[TaskStatus::Pending],
            TaskStatus::Running,
            TransitionUpdate {
                started_at: Some(Utc::now()),
                ..TransitionUpdate::default()
            },
        )
        .await?;

        self.execute_claimed(task).await
    }

    /// Execute a task already transitioned to running (by `execute_task` or
    /// by a worker's atomic claim).
    pub async fn execute_claimed(&self, task: Task) -> Result<TaskResult, TaskError> {
        let cancel = CancellationToken::new();
        self.running
            .lock()
            .unwrap()
            .insert(task.id.clone(), cancel.clone());

        let outcome = self.run_eval(&task, cancel).await;
        self.running.lock().unwrap().remove(&task.id);

        match outcome {
            Ok(result) => {
                PostgresClient::transition_task(
                    &self.pool,
                    &task.id,
                    &[TaskStatus::Running],
                    TaskStatus::Completed,
                    TransitionUpdate {
                        completed_at: Some(Utc::now()),
                        result_run_id: Some(result.result.run_id.clone()),
                        ..TransitionUpdate::default()
                    },
                )
                .await?;
                PostgresClient::insert_task_result(&self.pool, &result).await?;
                info!("Task {} completed", task.id);
                Ok(result)
            }
            Err(TaskError::EngineError(EngineError::Cancelled)) => {
                // Status already moved to cancelled by the cancel request.
                warn!("Task {} cancelled mid-run", task.id);
                Err(TaskError::Cancelled)
            }
            Err(e) => {
                error!("Task {} failed: {e}", task.id);
                if let Err(transition_err) = PostgresClient::transition_task(
                    &self.pool,
                    &task.id,
                    &[TaskStatus::Running],
                    TaskStatus::Failed,
                    TransitionUpdate {
                        completed_at: Some(Utc::now()),
                        error: Some(e.to_string()),
                        ..TransitionUpdate::default()
                    },
                )
                .await
                {
                    error!("Could not mark task {} failed: {transition_err}", task.id);
                }
                Err(e)
            }
        }
    }

    async fn run_eval(
        &self,
        task: &Task,
        cancel: CancellationToken,
    ) -> Result<TaskResult, TaskError> {
        let started = std::time::Instant::now();
        let config = TaskConfig::from_value(&task.config)?;

        let dataset = config.build_dataset()?;
        let dataset_config = serde_json::to_value(&config.dataset)?;
        let scorers_config = serde_json::to_value(&config.scorers)?;

        // Tasks must not expose partial results on cancellation.
        let mut evaluation =
            Evaluation::new(task.eval_name.clone(), dataset).with_partial_sink_suppression();
        for scorer in config.build_scorers()? {
            evaluation = evaluation.with_scorer(scorer);
        }
        if let Some(adapter) = config.build_adapter()? {
            evaluation = evaluation.with_adapter(adapter);
        }
        if let Some(model) = &config.model {
            evaluation = evaluation.with_model(model.clone());
        }
        if let Some(limit) = config.concurrency_limit {
            evaluation = evaluation.with_concurrency_limit(limit);
        }

        let mut sinks = config.build_sinks()?;
        let run = evaluation.run(&mut sinks, cancel).await?;

        let eval_row_id = PostgresClient::upsert_eval(
            &self.pool,
            &task.eval_name,
            None,
            &dataset_config,
            &scorers_config,
            &json!({}),
        )
        .await?;
        PostgresClient::insert_run(&self.pool, eval_row_id, &run, config.model.as_deref())
            .await?;

        let mut metadata = Map::new();
        metadata.insert("eval_name".to_string(), json!(task.eval_name));

        Ok(TaskResult {
            task_id: task.id.clone(),
            result: run,
            execution_time_seconds: started.elapsed().as_secs_f64(),
            metadata,
        })
    }

    /// Cancel a pending or running task. A running eval observes the signal
    /// at the next item boundary and suppresses its sinks.
    #[instrument(skip_all, fields(task_id = %task_id))]
    pub async fn cancel_task(&self, task_id: &str) -> Result<Task, TaskError> {
        let task = PostgresClient::transition_task(
            &self.pool,
            task_id,
            &[TaskStatus::Pending, TaskStatus::Running],
            TaskStatus::Cancelled,
            TransitionUpdate {
                completed_at: Some(Utc::now()),
                ..TransitionUpdate::default()
            },
        )
        .await?;

        if let Some(cancel) = self.running.lock().unwrap().get(task_id) {
            cancel.cancel();
        }

        info!("Task {task_id} cancelled");
        Ok(task)
    }

    /// Atomically claim the oldest pending task, if any.
    pub async fn claim_pending(&self) -> Result<Option<Task>, TaskError> {
        Ok(PostgresClient::claim_pending_task(&self.pool).await?)
    }
}
