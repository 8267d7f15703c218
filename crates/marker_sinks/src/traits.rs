use async_trait::async_trait;
use marker_types::{EvalResult, Score};

use crate::error::SinkError;

/// A sink consumes scores and whole runs and persists them on `flush`.
///
/// Sinks own private buffers; the engine calls `emit_run` exactly once per
/// run followed by exactly one `flush`. A failing sink is logged and must
/// not prevent other sinks from flushing.
#[async_trait]
pub trait Sink: Send + std::fmt::Debug {
    async fn emit(&mut self, score: &Score) -> Result<(), SinkError>;

    /// Default: emit every score of the run individually.
    async fn emit_run(&mut self, run: &EvalResult) -> Result<(), SinkError> {
        for score in &run.scores {
            self.emit(score).await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError>;
}
