use std::sync::Arc;

use async_trait::async_trait;
use marker_datasets::Dataset;
use marker_types::EvalResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::environment::WorkflowEnvironment;
use crate::error::WorkflowError;
use crate::retry::{run_activity, RetryPolicy};

/// The three activities a workflow composes. Implementations do the actual
/// I/O (loading files, running the engine, flushing sinks); the workflow
/// owns ordering, retries and determinism.
#[async_trait]
pub trait EvalActivities: Send + Sync {
    async fn load_dataset(&self, dataset_config: &Value) -> Result<Dataset, String>;

    async fn run_eval(
        &self,
        dataset: Dataset,
        eval_config: &Value,
        model: Option<&str>,
    ) -> Result<EvalResult, String>;

    async fn emit_results(&self, run: &EvalResult, sinks_config: &Value) -> Result<(), String>;
}

/// Configuration of one eval workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub dataset: Value,

    #[serde(default)]
    pub eval: Value,

    #[serde(default)]
    pub sinks: Value,

    /// Models to evaluate; empty means one run with the default model.
    #[serde(default)]
    pub models: Vec<String>,
}

/// Result of one (single-model) workflow execution.
#[derive(Debug)]
pub struct WorkflowOutcome {
    pub workflow_id: String,
    pub model: Option<String>,
    pub run: EvalResult,
    pub load_attempts: u32,
    pub run_attempts: u32,
    /// Emission is advisory; a failed emit never fails the workflow.
    pub emit_succeeded: bool,
}

/// Orchestrates load -> run -> emit with per-activity retry policies.
pub struct EvalWorkflow {
    env: Arc<dyn WorkflowEnvironment>,
    activities: Arc<dyn EvalActivities>,
}

impl EvalWorkflow {
    pub fn new(env: Arc<dyn WorkflowEnvironment>, activities: Arc<dyn EvalActivities>) -> Self {
        Self { env, activities }
    }

    /// Run the workflow. `workflow_id` is caller-chosen; pass `None` to get
    /// `<eval_name>-<generated>` from the environment's id source.
    #[instrument(skip_all, fields(eval = %eval_name))]
    pub async fn run(
        &self,
        eval_name: &str,
        workflow_id: Option<String>,
        model: Option<&str>,
        config: &WorkflowConfig,
        cancel: CancellationToken,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let workflow_id =
            workflow_id.unwrap_or_else(|| format!("{eval_name}-{}", self.env.new_id()));
        info!("Starting workflow {workflow_id}");

        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        let loaded = run_activity(
            &self.env,
            "load_dataset",
            &RetryPolicy::load_dataset(),
            || self.activities.load_dataset(&config.dataset),
        )
        .await?;
        info!("Loaded {} dataset items", loaded.value.len());

        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        let dataset = loaded.value;
        let executed = run_activity(&self.env, "run_eval", &RetryPolicy::run_eval(), || {
            self.activities
                .run_eval(dataset.clone(), &config.eval, model)
        })
        .await?;
        let run = executed.value;
        info!("Eval completed: {}", run.run_id);

        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        let emit_succeeded = match run_activity(
            &self.env,
            "emit_results",
            &RetryPolicy::emit_results(),
            || self.activities.emit_results(&run, &config.sinks),
        )
        .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("Emitting results failed (non-fatal): {e}");
                false
            }
        };

        Ok(WorkflowOutcome {
            workflow_id,
            model: model.map(str::to_string),
            run,
            load_attempts: loaded.attempts,
            run_attempts: executed.attempts,
            emit_succeeded,
        })
    }
}

/// Per-child outcome of a multi-model workflow. Child failures are
/// collected, never propagated to siblings.
#[derive(Debug)]
pub enum ChildOutcome {
    Completed(WorkflowOutcome),
    Failed {
        workflow_id: String,
        error: WorkflowError,
    },
}

/// Fans one eval out across models as child workflows with deterministic
/// ids `<eval_name>-<model_or_"default">`.
pub struct MultiModelWorkflow {
    inner: EvalWorkflow,
}

impl MultiModelWorkflow {
    pub fn new(env: Arc<dyn WorkflowEnvironment>, activities: Arc<dyn EvalActivities>) -> Self {
        Self {
            inner: EvalWorkflow::new(env, activities),
        }
    }

    #[instrument(skip_all, fields(eval = %eval_name))]
    pub async fn run(
        &self,
        eval_name: &str,
        config: &WorkflowConfig,
        cancel: CancellationToken,
    ) -> Result<Vec<ChildOutcome>, WorkflowError> {
        let models: Vec<Option<String>> = if config.models.is_empty() {
            vec![None]
        } else {
            config.models.iter().cloned().map(Some).collect()
        };

        let mut outcomes = Vec::with_capacity(models.len());
        for model in models {
            if cancel.is_cancelled() {
                return Err(WorkflowError::Cancelled);
            }

            let label = model.as_deref().unwrap_or("default");
            let child_id = format!("{eval_name}-{label}");
            info!("Running child workflow {child_id}");

            let outcome = self
                .inner
                .run(
                    eval_name,
                    Some(child_id.clone()),
                    model.as_deref(),
                    config,
                    cancel.child_token(),
                )
                .await;

            outcomes.push(match outcome {
                Ok(outcome) => ChildOutcome::Completed(outcome),
                Err(error) => {
                    warn!("Child workflow {child_id} failed: {error}");
                    ChildOutcome::Failed {
                        workflow_id: child_id,
                        error,
                    }
                }
            });
        }

        Ok(outcomes)
    }
}
