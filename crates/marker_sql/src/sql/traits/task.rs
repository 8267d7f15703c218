use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marker_types::{Task, TaskResult, TaskStatus};
use serde_json::Value;
use sqlx::{Pool, Postgres};
use tracing::{debug, instrument};

use crate::sql::error::SqlError;
use crate::sql::query::Queries;
use crate::sql::schema::{TaskResultRow, TaskRow};

/// Fields settable alongside a status transition.
#[derive(Debug, Default)]
pub struct TransitionUpdate {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result_run_id: Option<String>,
}

#[async_trait]
pub trait TaskSqlLogic {
    async fn insert_task(pool: &Pool<Postgres>, task: &Task) -> Result<(), SqlError> {
        let query = Queries::InsertTask.get_query();

        sqlx::query(query.sql)
            .bind(&task.id)
            .bind(&task.eval_name)
            .bind(&task.config)
            .bind(task.status.to_string())
            .bind(task.created_at)
            .bind(Value::Object(task.metadata.clone()))
            .execute(pool)
            .await?;

        Ok(())
    }

    async fn get_task(pool: &Pool<Postgres>, task_id: &str) -> Result<Option<Task>, SqlError> {
        let query = Queries::GetTask.get_query();

        let row = sqlx::query_as::<_, TaskRow>(query.sql)
            .bind(task_id)
            .fetch_optional(pool)
            .await?;

        row.map(TaskRow::into_task).transpose()
    }

    async fn list_tasks(
        pool: &Pool<Postgres>,
        status: TaskStatus,
        limit: i64,
    ) -> Result<Vec<Task>, SqlError> {
        let query = Queries::ListTasks.get_query();

        let rows = sqlx::query_as::<_, TaskRow>(query.sql)
            .bind(status.to_string())
            .bind(limit)
            .fetch_all(pool)
            .await?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Atomically move a task from any of `from` to `to`. Zero updated rows
    /// means the stored status changed concurrently (or the transition is
    /// not valid for the stored state) and surfaces as a conflict; the task
    /// is left untouched.
    #[instrument(skip_all, fields(task_id = %task_id, to = %to))]
    async fn transition_task(
        pool: &Pool<Postgres>,
        task_id: &str,
        from: &[TaskStatus],
        to: TaskStatus,
        update: TransitionUpdate,
    ) -> Result<Task, SqlError> {
        let query = Queries::TransitionTask.get_query();
        let from: Vec<String> = from.iter().map(TaskStatus::to_string).collect();

        let row = sqlx::query_as::<_, TaskRow>(query.sql)
            .bind(task_id)
            .bind(to.to_string())
            .bind(update.started_at)
            .bind(update.completed_at)
            .bind(update.error)
            .bind(update.result_run_id)
            .bind(from)
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => {
                debug!("Task transitioned");
                row.into_task()
            }
            None => Err(SqlError::TransitionConflict {
                task_id: task_id.to_string(),
                to,
            }),
        }
    }

    /// Claim the oldest pending task, atomically marking it running. Uses
    /// `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the same
    /// row.
    async fn claim_pending_task(pool: &Pool<Postgres>) -> Result<Option<Task>, SqlError> {
        let query = Queries::ClaimPendingTask.get_query();

        let row = sqlx::query_as::<_, TaskRow>(query.sql)
            .fetch_optional(pool)
            .await?;

        row.map(TaskRow::into_task).transpose()
    }

    async fn insert_task_result(
        pool: &Pool<Postgres>,
        result: &TaskResult,
    ) -> Result<(), SqlError> {
        let query = Queries::InsertTaskResult.get_query();

        sqlx::query(query.sql)
            .bind(&result.task_id)
            .bind(&result.result.run_id)
            .bind(result.execution_time_seconds)
            .bind(Value::Object(result.metadata.clone()))
            .execute(pool)
            .await?;

        Ok(())
    }

    async fn get_task_result(
        pool: &Pool<Postgres>,
        task_id: &str,
    ) -> Result<Option<TaskResultRow>, SqlError> {
        let query = Queries::GetTaskResult.get_query();

        let row = sqlx::query_as::<_, TaskResultRow>(query.sql)
            .bind(task_id)
            .fetch_optional(pool)
            .await?;

        Ok(row)
    }
}
