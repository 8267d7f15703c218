use marker_types::TaskStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlError {
    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Unknown task status in store: {0}")]
    UnknownStatus(String),

    #[error("Task {task_id} could not transition to {to}: status changed concurrently")]
    TransitionConflict { task_id: String, to: TaskStatus },

    #[error("Empty batch")]
    EmptyBatchError,
}
