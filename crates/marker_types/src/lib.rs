pub mod dataset;
pub mod error;
pub mod policy;
pub mod score;
pub mod task;
pub mod util;

pub use dataset::DatasetItem;
pub use error::TypeError;
pub use policy::{Policy, RuleAction, RuleConfig, RuleType};
pub use score::{EvalResult, Score, ScoreValue, GENERATION_ERROR};
pub use task::{Task, TaskResult, TaskStatus};
pub use util::{create_uuid7, derive_eval_id};
