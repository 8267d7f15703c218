pub mod compare;
pub mod engine;
pub mod error;
pub mod single;

pub use compare::{
    compare_multiple_runs, compare_runs, get_regressions, ChangeClass, ItemChange, RunComparison,
};
pub use engine::{emit_to_sinks, Evaluation};
pub use error::EngineError;
pub use single::{run_single_item, score_single_output};
