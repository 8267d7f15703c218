use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Activity '{activity}' failed after {attempts} attempt(s): {cause}")]
    ActivityFailed {
        activity: String,
        attempts: u32,
        cause: String,
    },

    #[error("Activity '{activity}' exceeded its overall timeout")]
    TimedOut { activity: String },

    #[error("Workflow was cancelled")]
    Cancelled,
}
