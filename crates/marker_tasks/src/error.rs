use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    SqlError(#[from] marker_sql::SqlError),

    #[error(transparent)]
    DatasetError(#[from] marker_datasets::DatasetError),

    #[error(transparent)]
    RegistryError(#[from] marker_registry::RegistryError),

    #[error(transparent)]
    EngineError(#[from] marker_engine::EngineError),

    #[error("Invalid task config: {0}")]
    InvalidConfig(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task was cancelled")]
    Cancelled,

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}
