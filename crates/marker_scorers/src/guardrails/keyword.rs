use async_trait::async_trait;
use marker_types::Score;
use serde_json::{json, Map, Value};

use crate::error::ScorerError;
use crate::traits::{value_as_text, Scorer};

/// Flags text containing any of a configured set of keywords or phrases.
/// Risk is binary: 1.0 on any match, 0.0 otherwise.
pub struct KeywordScorer {
    keywords: Vec<String>,
    case_sensitive: bool,
}

impl KeywordScorer {
    pub fn new(keywords: Vec<String>, case_sensitive: bool) -> Self {
        Self {
            keywords,
            case_sensitive,
        }
    }

    pub fn from_config(config: &Map<String, Value>) -> Result<Self, ScorerError> {
        let keywords = config
            .get("keywords")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ScorerError::InvalidConfig("keyword rule requires 'keywords'".to_string())
            })?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        let case_sensitive = config
            .get("case_sensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self::new(keywords, case_sensitive))
    }
}

#[async_trait]
impl Scorer for KeywordScorer {
    fn name(&self) -> &str {
        "keyword"
    }

    fn eval_id(&self) -> &str {
        "guardrail.keyword.v1"
    }

    async fn score(
        &self,
        generated: &Value,
        _expected: Option<&Value>,
        metadata: &Map<String, Value>,
    ) -> Result<Score, ScorerError> {
        let text = value_as_text(generated);
        let haystack = if self.case_sensitive {
            text
        } else {
            text.to_lowercase()
        };

        let matched: Vec<&str> = self
            .keywords
            .iter()
            .filter(|keyword| {
                if self.case_sensitive {
                    haystack.contains(keyword.as_str())
                } else {
                    haystack.contains(&keyword.to_lowercase())
                }
            })
            .map(String::as_str)
            .collect();

        let value = if matched.is_empty() { 0.0 } else { 1.0 };
        let comment = if matched.is_empty() {
            "No keywords found".to_string()
        } else {
            format!("Keywords found: {}", matched.join(", "))
        };

        let mut score = Score::new(self.name(), value, self.eval_id()).with_comment(comment);
        score.metadata = metadata.clone();
        score
            .metadata
            .insert("matched_keywords".to_string(), json!(matched));
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyword_match() {
        let scorer = KeywordScorer::new(vec!["secret".to_string()], false);
        let score = scorer
            .score(&json!("This is SECRET stuff"), None, &Map::new())
            .await
            .unwrap();

        assert_eq!(score.value.as_f64(), 1.0);
        assert_eq!(
            score.metadata.get("matched_keywords"),
            Some(&json!(["secret"]))
        );
    }

    #[tokio::test]
    async fn test_keyword_clean_text() {
        let scorer = KeywordScorer::new(vec!["secret".to_string()], false);
        let score = scorer
            .score(&json!("nothing to see"), None, &Map::new())
            .await
            .unwrap();
        assert_eq!(score.value.as_f64(), 0.0);
    }

    #[tokio::test]
    async fn test_keyword_case_sensitive() {
        let scorer = KeywordScorer::new(vec!["Secret".to_string()], true);
        let score = scorer
            .score(&json!("secret plans"), None, &Map::new())
            .await
            .unwrap();
        assert_eq!(score.value.as_f64(), 0.0);
    }

    #[test]
    fn test_from_config_requires_keywords() {
        assert!(KeywordScorer::from_config(&Map::new()).is_err());
    }
}
