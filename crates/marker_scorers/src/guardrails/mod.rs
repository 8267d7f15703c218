//! Guardrail scorers: safety checks producing a risk value in [0, 1].
//!
//! Higher is riskier; 0.0 means no finding. The policy engine pairs these
//! with a per-rule threshold and action. They are also usable as regular
//! scorers in offline runs.

pub mod hallucination;
pub mod injection;
pub mod keyword;
pub mod pii;
pub mod regex_rule;
pub mod sensitive;
pub mod toxicity;

pub use hallucination::HallucinationScorer;
pub use injection::PromptInjectionScorer;
pub use keyword::KeywordScorer;
pub use pii::PiiScorer;
pub use regex_rule::RegexRuleScorer;
pub use sensitive::SensitiveDataScorer;
pub use toxicity::ToxicityScorer;

use marker_types::{RuleConfig, RuleType};

use crate::error::ScorerError;
use crate::traits::Scorer;

/// Instantiate the guardrail scorer for a policy rule. The rule's `type`
/// selects the scorer; its `config` carries scorer-specific settings.
pub fn scorer_for_rule(rule: &RuleConfig) -> Result<Box<dyn Scorer>, ScorerError> {
    Ok(match rule.rule_type {
        RuleType::Keyword => Box::new(KeywordScorer::from_config(&rule.config)?),
        RuleType::Regex => Box::new(RegexRuleScorer::from_config(&rule.config)?),
        RuleType::Toxicity => Box::new(ToxicityScorer::new()),
        RuleType::Pii => Box::new(PiiScorer::new()),
        RuleType::SensitiveData => Box::new(SensitiveDataScorer::new()),
        RuleType::PromptInjection => Box::new(PromptInjectionScorer::new()),
        RuleType::Hallucination => Box::new(HallucinationScorer::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scorer_for_rule_selects_by_type() {
        let rule: RuleConfig = serde_json::from_value(json!({
            "id": "kw",
            "type": "keyword",
            "config": {"keywords": ["secret"]}
        }))
        .unwrap();

        let scorer = scorer_for_rule(&rule).unwrap();
        assert_eq!(scorer.name(), "keyword");
    }

    #[test]
    fn test_scorer_for_rule_rejects_bad_config() {
        let rule: RuleConfig = serde_json::from_value(json!({
            "id": "rx",
            "type": "regex",
            "config": {}
        }))
        .unwrap();

        assert!(scorer_for_rule(&rule).is_err());
    }
}
