use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    DatasetError(#[from] marker_datasets::DatasetError),

    #[error("Evaluation was cancelled")]
    Cancelled,

    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}
