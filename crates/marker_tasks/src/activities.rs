use std::sync::Arc;

use async_trait::async_trait;
use marker_datasets::Dataset;
use marker_engine::{emit_to_sinks, Evaluation};
use marker_types::EvalResult;
use marker_workflow::EvalActivities;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::{build_adapter, build_scorers, build_sinks, ComponentConfig, DatasetConfig};
use crate::error::TaskError;

/// Eval-step configuration consumed by the `run_eval` activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalStepConfig {
    pub eval_name: String,

    pub scorers: Vec<ComponentConfig>,

    #[serde(default)]
    pub adapter: Option<ComponentConfig>,

    #[serde(default)]
    pub concurrency_limit: Option<usize>,
}

/// Registry-backed activities wiring the workflow layer to the engine:
/// datasets load through the loader configs, scorers/adapters/sinks come
/// from the process-wide registries.
#[derive(Debug, Default)]
pub struct EngineActivities;

impl EngineActivities {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EvalActivities for EngineActivities {
    #[instrument(skip_all)]
    async fn load_dataset(&self, dataset_config: &Value) -> Result<Dataset, String> {
        let config: DatasetConfig =
            serde_json::from_value(dataset_config.clone()).map_err(|e| e.to_string())?;
        config.load().map_err(stringify)
    }

    #[instrument(skip_all, fields(items = dataset.len()))]
    async fn run_eval(
        &self,
        dataset: Dataset,
        eval_config: &Value,
        model: Option<&str>,
    ) -> Result<EvalResult, String> {
        let config: EvalStepConfig =
            serde_json::from_value(eval_config.clone()).map_err(|e| e.to_string())?;

        let mut evaluation = Evaluation::new(config.eval_name, dataset);
        for scorer in build_scorers(&config.scorers).map_err(stringify)? {
            evaluation = evaluation.with_scorer(scorer);
        }
        if let Some(component) = &config.adapter {
            evaluation = evaluation.with_adapter(build_adapter(component).map_err(stringify)?);
        }
        if let Some(model) = model {
            evaluation = evaluation.with_model(model);
        }
        if let Some(limit) = config.concurrency_limit {
            evaluation = evaluation.with_concurrency_limit(limit);
        }

        // Sinks are the emit step's concern; the run step only produces the
        // result.
        evaluation
            .run(&mut [], CancellationToken::new())
            .await
            .map_err(|e| e.to_string())
    }

    #[instrument(skip_all, fields(run_id = %run.run_id))]
    async fn emit_results(&self, run: &EvalResult, sinks_config: &Value) -> Result<(), String> {
        let components: Vec<ComponentConfig> = if sinks_config.is_null() {
            Vec::new()
        } else {
            serde_json::from_value(sinks_config.clone()).map_err(|e| e.to_string())?
        };

        if components.is_empty() {
            debug!("No sinks configured; skipping emission");
            return Ok(());
        }

        let mut sinks = build_sinks(&components).map_err(stringify)?;
        emit_to_sinks(run, &mut sinks).await;
        Ok(())
    }
}

fn stringify(error: TaskError) -> String {
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use marker_workflow::{EvalWorkflow, RuntimeEnvironment, WorkflowConfig};
    use serde_json::json;

    #[tokio::test]
    async fn test_workflow_end_to_end_offline() {
        let workflow = EvalWorkflow::new(
            Arc::new(RuntimeEnvironment),
            Arc::new(EngineActivities::new()),
        );

        let config = WorkflowConfig {
            dataset: json!({
                "type": "inline",
                "id": "smoke",
                "items": [
                    {"id": "t1", "input": {"prompt": "p"}, "output": "x", "expected": "x"}
                ]
            }),
            eval: json!({
                "eval_name": "smoke_eval",
                "scorers": [{"type": "exact_match"}]
            }),
            sinks: json!([]),
            models: Vec::new(),
        };

        let outcome = workflow
            .run("smoke_eval", None, None, &config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.run.scores.len(), 1);
        assert!(outcome.run.scores[0].value.is_pass());
        assert!(outcome.emit_succeeded);
        assert_eq!(outcome.load_attempts, 1);
        assert_eq!(outcome.run_attempts, 1);
    }

    #[tokio::test]
    async fn test_load_dataset_activity_rejects_bad_config() {
        let activities = EngineActivities::new();
        let err = activities
            .load_dataset(&json!({"type": "telepathy"}))
            .await
            .unwrap_err();
        assert!(err.contains("telepathy") || err.contains("unknown variant"));
    }
}
