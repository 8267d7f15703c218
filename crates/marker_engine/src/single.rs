use std::sync::Arc;

use marker_adapters::Adapter;
use marker_scorers::Scorer;
use marker_types::{DatasetItem, Score, GENERATION_ERROR};
use serde_json::{json, Map, Value};
use tracing::warn;

/// Score one pre-computed output without an adapter. Useful in unit tests
/// and for scoring recorded production outputs.
pub async fn score_single_output(
    output: &Value,
    expected: Option<&Value>,
    scorers: &[Arc<dyn Scorer>],
    metadata: &Map<String, Value>,
) -> Vec<Score> {
    let mut produced = Vec::with_capacity(scorers.len());
    for scorer in scorers {
        let score = match scorer.score(output, expected, metadata).await {
            Ok(score) => score,
            Err(e) => {
                warn!("Scorer '{}' failed: {e}", scorer.name());
                let mut score = Score::new(scorer.name(), 0.0, scorer.eval_id())
                    .with_comment(format!("Scorer failed: {e}"));
                score.metadata = metadata.clone();
                score
            }
        };
        produced.push(score);
    }
    produced
}

/// Run adapter plus scorers for a single dataset item. Pre-populated
/// outputs skip the adapter, mirroring the engine's offline path.
pub async fn run_single_item(
    item: &DatasetItem,
    adapter: &dyn Adapter,
    scorers: &[Arc<dyn Scorer>],
    model: Option<&str>,
) -> Vec<Score> {
    let mut metadata = item.metadata.clone();
    metadata.insert("dataset_item_id".to_string(), json!(item.id));
    metadata.insert("test_id".to_string(), json!(item.id));
    if let Some(model) = model {
        metadata.insert("model".to_string(), json!(model));
    }

    let output = match &item.output {
        Some(output) => output.clone(),
        None => match adapter.generate(&item.input, model).await {
            Ok(generation) => match serde_json::to_value(&generation.output) {
                Ok(value) => value,
                Err(e) => {
                    let mut score = Score::new(GENERATION_ERROR, false, "adapter.generation")
                        .with_comment(format!("unserialisable adapter output: {e}"));
                    score.metadata = metadata;
                    return vec![score];
                }
            },
            Err(e) => {
                let mut score = Score::new(GENERATION_ERROR, false, "adapter.generation")
                    .with_comment(e.to_string());
                score.metadata = metadata;
                return vec![score];
            }
        },
    };

    score_single_output(&output, item.expected.as_ref(), scorers, &metadata).await
}
