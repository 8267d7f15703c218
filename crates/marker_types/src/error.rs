use thiserror::Error;

use crate::task::TaskStatus;

#[derive(Error, Debug)]
pub enum TypeError {
    #[error("Score value must be a number or a boolean")]
    InvalidScoreValue,

    #[error("Invalid task status: {0}")]
    InvalidTaskStatus(String),

    #[error("Invalid task transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Invalid rule type: {0}")]
    InvalidRuleType(String),

    #[error("Invalid rule action: {0}")]
    InvalidRuleAction(String),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}
