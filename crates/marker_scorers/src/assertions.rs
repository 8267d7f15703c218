use async_trait::async_trait;
use marker_types::Score;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ScorerError;
use crate::traits::{value_as_text, Scorer};

/// Boolean scorer that passes when the generated value equals the expected
/// value. Strings compare verbatim; structured values compare as JSON.
pub struct ExactMatchScorer {
    name: String,
}

impl ExactMatchScorer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ExactMatchScorer {
    fn default() -> Self {
        Self::new("exact")
    }
}

#[async_trait]
impl Scorer for ExactMatchScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn eval_id(&self) -> &str {
        "exact_match.v1"
    }

    async fn score(
        &self,
        generated: &Value,
        expected: Option<&Value>,
        metadata: &Map<String, Value>,
    ) -> Result<Score, ScorerError> {
        let matched = match expected {
            Some(expected) => generated == expected,
            None => false,
        };

        let mut score = Score::new(self.name.clone(), matched, self.eval_id());
        score.metadata = metadata.clone();
        if expected.is_none() {
            score.comment = Some("No expected value to compare against".to_string());
        }
        Ok(score)
    }
}

/// Boolean scorer that passes when the generated text contains the expected
/// text.
pub struct ContainsScorer {
    name: String,
    case_sensitive: bool,
}

impl ContainsScorer {
    pub fn new(name: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            name: name.into(),
            case_sensitive,
        }
    }
}

#[async_trait]
impl Scorer for ContainsScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn eval_id(&self) -> &str {
        "contains.v1"
    }

    async fn score(
        &self,
        generated: &Value,
        expected: Option<&Value>,
        metadata: &Map<String, Value>,
    ) -> Result<Score, ScorerError> {
        let haystack = value_as_text(generated);
        let needle = expected.map(value_as_text).unwrap_or_default();

        let matched = if needle.is_empty() {
            false
        } else if self.case_sensitive {
            haystack.contains(&needle)
        } else {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        };

        let mut score = Score::new(self.name.clone(), matched, self.eval_id());
        score.metadata = metadata.clone();
        Ok(score)
    }
}

/// Boolean scorer that passes when the generated text matches a pattern.
/// The pattern comes from the scorer configuration, not from the item.
pub struct RegexMatchScorer {
    name: String,
    pattern: Regex,
}

impl RegexMatchScorer {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, ScorerError> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
        })
    }
}

#[async_trait]
impl Scorer for RegexMatchScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn eval_id(&self) -> &str {
        "regex_match.v1"
    }

    async fn score(
        &self,
        generated: &Value,
        _expected: Option<&Value>,
        metadata: &Map<String, Value>,
    ) -> Result<Score, ScorerError> {
        let text = value_as_text(generated);
        let matched = self.pattern.is_match(&text);

        let mut score = Score::new(self.name.clone(), matched, self.eval_id());
        score.metadata = metadata.clone();
        Ok(score)
    }
}
