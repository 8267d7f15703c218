use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use marker_adapters::{Adapter, TracingBackend};
use marker_datasets::Dataset;
use marker_scorers::Scorer;
use marker_sinks::Sink;
use marker_types::{
    create_uuid7, derive_eval_id, DatasetItem, EvalResult, Score, GENERATION_ERROR,
};
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::EngineError;

const DEFAULT_CONCURRENCY: usize = 5;

/// One evaluation: a dataset fanned across an adapter and a set of scorers
/// under bounded concurrency.
pub struct Evaluation {
    name: String,
    dataset: Dataset,
    scorers: Vec<Arc<dyn Scorer>>,
    adapter: Option<Arc<dyn Adapter>>,
    model: Option<String>,
    concurrency_limit: usize,
    tracing_backend: Option<Arc<dyn TracingBackend>>,
    suppress_sinks_on_cancel: bool,
}

impl Evaluation {
    pub fn new(name: impl Into<String>, dataset: Dataset) -> Self {
        Self {
            name: name.into(),
            dataset,
            scorers: Vec::new(),
            adapter: None,
            model: None,
            concurrency_limit: DEFAULT_CONCURRENCY,
            tracing_backend: None,
            suppress_sinks_on_cancel: false,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorers.push(scorer);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    pub fn with_tracing_backend(mut self, backend: Arc<dyn TracingBackend>) -> Self {
        self.tracing_backend = Some(backend);
        self
    }

    /// On cancellation the engine normally still fans the partial result out
    /// to the sinks. Orchestration layers that must not expose partial
    /// results (the task manager) enable suppression instead.
    pub fn with_partial_sink_suppression(mut self) -> Self {
        self.suppress_sinks_on_cancel = true;
        self
    }

    pub fn eval_id(&self) -> String {
        let scorer_ids: Vec<String> = self
            .scorers
            .iter()
            .map(|scorer| scorer.eval_id().to_string())
            .collect();
        derive_eval_id(&self.name, &scorer_ids, &self.dataset.id)
    }

    /// Execute the evaluation and fan the result out to the sinks.
    ///
    /// Per-item adapter and scorer failures are recorded as scores and never
    /// abort the run. Cancellation stops scheduling new items and lets
    /// in-flight items finish; the partial result is still fanned out to the
    /// sinks unless suppression is enabled.
    #[instrument(skip_all, fields(eval = %self.name, items = self.dataset.len()))]
    pub async fn run(
        &self,
        sinks: &mut [Box<dyn Sink>],
        cancel: CancellationToken,
    ) -> Result<EvalResult, EngineError> {
        let eval_id = self.eval_id();
        let run_id = create_uuid7();
        info!("Starting run {run_id} with {} items", self.dataset.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let scores: Arc<Mutex<Vec<Score>>> = Arc::new(Mutex::new(Vec::new()));
        let mut join_set = JoinSet::new();

        for item in &self.dataset.items {
            if cancel.is_cancelled() {
                debug!("Cancellation requested; not scheduling further items");
                break;
            }

            let unit = UnitOfWork {
                item: item.clone(),
                scorers: self.scorers.clone(),
                adapter: self.adapter.clone(),
                model: self.model.clone(),
            };
            let semaphore = semaphore.clone();
            let scores = scores.clone();

            join_set.spawn(async move {
                // Semaphore closed only on runtime shutdown.
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                let produced = unit.execute().await;
                scores.lock().await.extend(produced);
            });
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                error!("Evaluation unit panicked: {e}");
            }
        }

        let scores = Arc::try_unwrap(scores)
            .map(Mutex::into_inner)
            .unwrap_or_default();

        let mut run = EvalResult {
            eval_id,
            run_id,
            dataset_id: self.dataset.id.clone(),
            scores,
            metadata: Map::new(),
            created_at: Utc::now(),
        };
        self.attach_aggregate_metrics(&mut run).await;

        if cancel.is_cancelled() {
            if self.suppress_sinks_on_cancel {
                warn!("Run {} cancelled; suppressing sink emission", run.run_id);
            } else {
                warn!("Run {} cancelled; flushing partial result", run.run_id);
                emit_to_sinks(&run, sinks).await;
            }
            return Err(EngineError::Cancelled);
        }

        emit_to_sinks(&run, sinks).await;

        info!("Run {} complete with {} scores", run.run_id, run.scores.len());
        Ok(run)
    }

    /// Run-level aggregates: mean accuracy from finite score values, plus
    /// cost/token sums resolved per trace id when a tracing backend is
    /// configured. Inserted only when something was computable.
    async fn attach_aggregate_metrics(&self, run: &mut EvalResult) {
        let mut aggregates = Map::new();

        let finite: Vec<f64> = run
            .scores
            .iter()
            .filter(|score| score.value.is_finite())
            .map(|score| score.value.as_f64())
            .collect();
        if !finite.is_empty() {
            let accuracy = finite.iter().sum::<f64>() / finite.len() as f64;
            aggregates.insert("accuracy".to_string(), json!(accuracy));
        }

        if let Some(backend) = &self.tracing_backend {
            let trace_ids: HashSet<&str> = run
                .scores
                .iter()
                .filter_map(|score| score.trace_id.as_deref())
                .collect();

            let mut cost = 0.0;
            let mut has_cost = false;
            let mut input_tokens = 0_u64;
            let mut output_tokens = 0_u64;
            let mut has_tokens = false;

            for trace_id in trace_ids {
                match backend.get_cost_data(trace_id).await {
                    Ok(Some(data)) => {
                        if let Some(trace_cost) = data.cost {
                            cost += trace_cost;
                            has_cost = true;
                        }
                        if let Some(tokens) = data.input_tokens {
                            input_tokens += tokens;
                            has_tokens = true;
                        }
                        if let Some(tokens) = data.output_tokens {
                            output_tokens += tokens;
                            has_tokens = true;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Cost lookup failed for trace {trace_id}: {e}"),
                }
            }

            if has_cost {
                aggregates.insert("cost".to_string(), json!(cost));
            }
            if has_tokens {
                aggregates.insert("input_tokens".to_string(), json!(input_tokens));
                aggregates.insert("output_tokens".to_string(), json!(output_tokens));
            }
        }

        if !aggregates.is_empty() {
            run.metadata
                .insert("aggregate_metrics".to_string(), Value::Object(aggregates));
        }
    }
}

/// Fan a finished run out to every sink. One `emit_run` and one `flush` per
/// sink; a failing sink is logged and never affects its siblings.
pub async fn emit_to_sinks(run: &EvalResult, sinks: &mut [Box<dyn Sink>]) {
    for (idx, sink) in sinks.iter_mut().enumerate() {
        match sink.emit_run(run).await {
            Ok(()) => {
                if let Err(e) = sink.flush().await {
                    error!("Sink {idx} failed to flush: {e}");
                }
            }
            Err(e) => error!("Sink {idx} failed to receive run: {e}"),
        }
    }
}

struct UnitOfWork {
    item: DatasetItem,
    scorers: Vec<Arc<dyn Scorer>>,
    adapter: Option<Arc<dyn Adapter>>,
    model: Option<String>,
}

impl UnitOfWork {
    async fn execute(&self) -> Vec<Score> {
        let mut metadata = self.item.metadata.clone();
        metadata.insert("dataset_item_id".to_string(), json!(self.item.id));
        metadata.insert("test_id".to_string(), json!(self.item.id));
        if let Some(model) = &self.model {
            metadata.insert("model".to_string(), json!(model));
        }

        let (generated, trace_id, observation_id) = match self.generate().await {
            Ok(output) => output,
            Err(cause) => {
                debug!("Item {} failed to generate: {cause}", self.item.id);
                let mut score =
                    Score::new(GENERATION_ERROR, false, "adapter.generation").with_comment(cause);
                score.metadata = metadata;
                return vec![score];
            }
        };

        let mut produced = Vec::with_capacity(self.scorers.len());
        for scorer in &self.scorers {
            let mut score = match scorer
                .score(&generated, self.item.expected.as_ref(), &metadata)
                .await
            {
                Ok(score) => score,
                Err(e) => {
                    warn!(
                        "Scorer '{}' failed on item {}: {e}",
                        scorer.name(),
                        self.item.id
                    );
                    let mut score = Score::new(scorer.name(), 0.0, scorer.eval_id())
                        .with_comment(format!("Scorer failed: {e}"));
                    score.metadata = metadata.clone();
                    score
                }
            };
            score.trace_id = score.trace_id.take().or_else(|| trace_id.clone());
            score.observation_id = score
                .observation_id
                .take()
                .or_else(|| observation_id.clone());
            produced.push(score);
        }

        produced
    }

    /// Pre-populated outputs skip the adapter entirely (offline scoring).
    async fn generate(&self) -> Result<(Value, Option<String>, Option<String>), String> {
        if let Some(output) = &self.item.output {
            return Ok((output.clone(), None, None));
        }

        let Some(adapter) = &self.adapter else {
            return Err("no adapter configured and item has no pre-computed output".to_string());
        };

        let generation = adapter
            .generate(&self.item.input, self.model.as_deref())
            .await
            .map_err(|e| e.to_string())?;

        let value = serde_json::to_value(&generation.output)
            .map_err(|e| format!("unserialisable adapter output: {e}"))?;

        Ok((value, generation.trace_id, generation.observation_id))
    }
}
