use async_trait::async_trait;
use marker_types::Score;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::error::ScorerError;
use crate::traits::{value_as_text, Scorer};

/// Flags text matching any of a configured set of regex patterns.
pub struct RegexRuleScorer {
    patterns: Vec<Regex>,
}

impl RegexRuleScorer {
    pub fn new(patterns: &[String]) -> Result<Self, ScorerError> {
        let patterns = patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ScorerError> {
        let patterns: Vec<String> = config
            .get("patterns")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ScorerError::InvalidConfig("regex rule requires 'patterns'".to_string())
            })?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        Self::new(&patterns)
    }
}

#[async_trait]
impl Scorer for RegexRuleScorer {
    fn name(&self) -> &str {
        "regex"
    }

    fn eval_id(&self) -> &str {
        "guardrail.regex.v1"
    }

    async fn score(
        &self,
        generated: &Value,
        _expected: Option<&Value>,
        metadata: &Map<String, Value>,
    ) -> Result<Score, ScorerError> {
        let text = value_as_text(generated);
        let matched: Vec<String> = self
            .patterns
            .iter()
            .filter(|pattern| pattern.is_match(&text))
            .map(|pattern| pattern.as_str().to_string())
            .collect();

        let value = if matched.is_empty() { 0.0 } else { 1.0 };
        let mut score = Score::new(self.name(), value, self.eval_id());
        score.metadata = metadata.clone();
        score
            .metadata
            .insert("matched_patterns".to_string(), json!(matched));
        if !matched.is_empty() {
            score.comment = Some(format!("{} pattern(s) matched", matched.len()));
        }
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_regex_rule_match() {
        let scorer =
            RegexRuleScorer::new(&[r"(?i)project\s+nimbus".to_string()]).unwrap();
        let score = scorer
            .score(&json!("Status of Project Nimbus?"), None, &Map::new())
            .await
            .unwrap();
        assert_eq!(score.value.as_f64(), 1.0);
    }

    #[tokio::test]
    async fn test_regex_rule_no_match() {
        let scorer = RegexRuleScorer::new(&[r"\bfoo\b".to_string()]).unwrap();
        let score = scorer
            .score(&json!("food bar"), None, &Map::new())
            .await
            .unwrap();
        assert_eq!(score.value.as_f64(), 0.0);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        assert!(RegexRuleScorer::new(&["(".to_string()]).is_err());
    }
}
