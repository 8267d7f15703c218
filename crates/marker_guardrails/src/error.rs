use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Policy validation failed: {}", diagnostics.join("; "))]
    ValidationFailed { diagnostics: Vec<String> },

    #[error("Policy already registered: {0}")]
    DuplicatePolicy(String),

    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    #[error(transparent)]
    YamlError(#[from] serde_yaml::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}
