use async_trait::async_trait;
use marker_types::{EvalResult, Score};

use crate::error::SinkError;
use crate::traits::Sink;

/// Prints scores and a per-name run summary to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    verbose: bool,
}

impl ConsoleSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn emit(&mut self, score: &Score) -> Result<(), SinkError> {
        if self.verbose {
            println!(
                "Score: {}={} (eval_id={})",
                score.name,
                serde_json::to_string(&score.value)?,
                score.eval_id
            );
            if let Some(comment) = &score.comment {
                println!("  Comment: {comment}");
            }
        }
        Ok(())
    }

    async fn emit_run(&mut self, run: &EvalResult) -> Result<(), SinkError> {
        println!("\nEval Run: {}", run.run_id);
        println!("  Eval: {}", run.eval_id);
        println!("  Scores: {}", run.scores.len());

        let (groups, failed) = run.score_groups();
        for (name, values) in &groups {
            let avg = if values.is_empty() {
                f64::NAN
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            };
            match failed.get(name) {
                Some(failures) => println!(
                    "  {name}: avg={avg:.3} (n={}, failed={failures})",
                    values.len()
                ),
                None => println!("  {name}: avg={avg:.3} (n={})", values.len()),
            }
        }
        for (name, failures) in &failed {
            if !groups.contains_key(name) {
                println!("  {name}: avg=NaN (n=0, failed={failures})");
            }
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
