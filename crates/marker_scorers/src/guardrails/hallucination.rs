use async_trait::async_trait;
use marker_types::Score;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::error::ScorerError;
use crate::traits::{value_as_text, Scorer};

const STOPWORDS: [&str; 24] = [
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "of", "in", "on", "to", "for",
    "and", "or", "it", "its", "this", "that", "with", "as", "at", "by",
];

/// Context-grounding heuristic: the fraction of response sentences that
/// share no content token with the supplied context
/// (`metadata["context"]`). Without context the check cannot run and
/// reports risk 0 with a comment.
pub struct HallucinationScorer;

impl HallucinationScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HallucinationScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn content_tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() > 2)
        .map(str::to_lowercase)
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .collect()
}

#[async_trait]
impl Scorer for HallucinationScorer {
    fn name(&self) -> &str {
        "hallucination"
    }

    fn eval_id(&self) -> &str {
        "guardrail.hallucination.v1"
    }

    async fn score(
        &self,
        generated: &Value,
        _expected: Option<&Value>,
        metadata: &Map<String, Value>,
    ) -> Result<Score, ScorerError> {
        let Some(context) = metadata.get("context").and_then(Value::as_str) else {
            let mut score = Score::new(self.name(), 0.0, self.eval_id())
                .with_comment("No context provided; grounding check skipped");
            score.metadata = metadata.clone();
            return Ok(score);
        };

        let context_tokens = content_tokens(context);
        let text = value_as_text(generated);

        let sentences: Vec<&str> = text
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty())
            .collect();

        if sentences.is_empty() {
            let mut score = Score::new(self.name(), 0.0, self.eval_id());
            score.metadata = metadata.clone();
            return Ok(score);
        }

        let unsupported = sentences
            .iter()
            .filter(|sentence| {
                content_tokens(sentence)
                    .intersection(&context_tokens)
                    .next()
                    .is_none()
            })
            .count();

        let value = unsupported as f64 / sentences.len() as f64;
        let mut score = Score::new(self.name(), value, self.eval_id());
        score.metadata = metadata.clone();
        score
            .metadata
            .insert("unsupported_sentences".to_string(), json!(unsupported));
        score
            .metadata
            .insert("total_sentences".to_string(), json!(sentences.len()));
        if unsupported > 0 {
            score.comment = Some(format!(
                "{unsupported} of {} sentence(s) not grounded in context",
                sentences.len()
            ));
        }
        Ok(score)
    }
}
