use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScorerError {
    #[error(transparent)]
    RegexError(#[from] regex::Error),

    #[error("Invalid scorer config: {0}")]
    InvalidConfig(String),

    #[error("Scorer failed: {0}")]
    ScoreFailed(String),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}
