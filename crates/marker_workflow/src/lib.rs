pub mod environment;
pub mod error;
pub mod retry;
pub mod workflow;

pub use environment::{RuntimeEnvironment, WorkflowEnvironment};
pub use error::WorkflowError;
pub use retry::{run_activity, ActivityOutcome, RetryPolicy};
pub use workflow::{
    ChildOutcome, EvalActivities, EvalWorkflow, MultiModelWorkflow, WorkflowConfig,
    WorkflowOutcome,
};
