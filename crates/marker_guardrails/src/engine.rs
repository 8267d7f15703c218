use std::collections::BTreeMap;

use marker_scorers::scorer_for_rule;
use marker_types::{Policy, RuleAction, RuleConfig, RuleType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::PolicyError;
use crate::validator::validate_policy;

/// Outcome of one guardrail evaluation, strongest action first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Block,
    Warn,
    Log,
    Allow,
}

/// One rule that fired (or errored) during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule_id: String,
    pub rule_type: RuleType,
    pub action: RuleAction,
    pub value: f64,
    pub threshold: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Log-action findings are recorded but never affect `passed`.
    pub informational: bool,
}

/// Result of evaluating text against a rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailDecision {
    pub action: DecisionAction,

    /// True when no rule with a block or warn action was violated.
    pub passed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_rule: Option<String>,

    pub violations: Vec<RuleViolation>,

    /// Rule id -> scorer value for every rule that was evaluated. Rules
    /// skipped by a block short-circuit do not appear.
    pub score_summary: BTreeMap<String, f64>,
}

/// Rule selection for one evaluation.
#[derive(Debug, Clone, Default)]
pub struct RuleSelector {
    pub policy_name: Option<String>,
    pub rule_ids: Option<Vec<String>>,
}

impl RuleSelector {
    pub fn policy(name: impl Into<String>) -> Self {
        Self {
            policy_name: Some(name.into()),
            rule_ids: None,
        }
    }

    fn keeps(&self, rule: &RuleConfig) -> bool {
        match &self.rule_ids {
            Some(ids) => ids.iter().any(|id| *id == rule.id),
            None => true,
        }
    }
}

/// Holds registered policies and evaluates text against their rules in
/// declaration order, short-circuiting on the first violated block rule.
/// Policies are immutable once registered.
#[derive(Default)]
pub struct PolicyEngine {
    policies: Vec<Policy>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a policy. A failed validation returns the full
    /// diagnostics list and registers nothing; re-registering a name is
    /// rejected.
    pub fn register(&mut self, policy: Policy) -> Result<(), PolicyError> {
        let diagnostics = validate_policy(&policy);
        if !diagnostics.is_empty() {
            return Err(PolicyError::ValidationFailed { diagnostics });
        }
        if self.policies.iter().any(|existing| existing.name == policy.name) {
            return Err(PolicyError::DuplicatePolicy(policy.name));
        }

        info!("Registered policy '{}' ({} rules)", policy.name, policy.rules.len());
        self.policies.push(policy);
        Ok(())
    }

    pub fn policy(&self, name: &str) -> Option<&Policy> {
        self.policies.iter().find(|policy| policy.name == name)
    }

    fn selected_rules<'a>(
        &'a self,
        selector: &RuleSelector,
    ) -> Result<Vec<&'a RuleConfig>, PolicyError> {
        let policies: Vec<&Policy> = match &selector.policy_name {
            Some(name) => vec![self
                .policy(name)
                .ok_or_else(|| PolicyError::UnknownPolicy(name.clone()))?],
            None => self.policies.iter().collect(),
        };

        Ok(policies
            .into_iter()
            .flat_map(|policy| policy.enabled_rules())
            .filter(|rule| selector.keeps(rule))
            .collect())
    }

    /// Evaluate text against the selected rules.
    ///
    /// Rules run strictly in declaration order. A violated block rule
    /// short-circuits: later rules are not evaluated and produce no score
    /// records. A scorer failure is a safe default: the rule is recorded as
    /// violated with a synthetic max score and its action is honoured.
    #[instrument(skip_all, fields(policy = selector.policy_name.as_deref().unwrap_or("*")))]
    pub async fn evaluate(
        &self,
        text: &str,
        metadata: &Map<String, Value>,
        selector: &RuleSelector,
    ) -> Result<GuardrailDecision, PolicyError> {
        let rules = self.selected_rules(selector)?;
        debug!("Evaluating {} rule(s)", rules.len());

        let generated = Value::String(text.to_string());
        let mut violations = Vec::new();
        let mut score_summary = BTreeMap::new();
        let mut triggered_rule = None;

        for rule in rules {
            let (value, comment) = match self.run_rule(rule, &generated, metadata).await {
                Ok(outcome) => outcome,
                Err(cause) => {
                    warn!("Rule '{}' failed to evaluate: {cause}", rule.id);
                    (1.0, Some(format!("Rule evaluation failed: {cause}")))
                }
            };

            score_summary.insert(rule.id.clone(), value);
            let violated = value >= rule.threshold;
            if !violated {
                continue;
            }

            violations.push(RuleViolation {
                rule_id: rule.id.clone(),
                rule_type: rule.rule_type,
                action: rule.action,
                value,
                threshold: rule.threshold,
                comment,
                informational: rule.action == RuleAction::Log,
            });

            if rule.action == RuleAction::Block {
                triggered_rule = Some(rule.id.clone());
                break;
            }
        }

        let action = decision_action(&violations, triggered_rule.is_some());
        let passed = !violations
            .iter()
            .any(|violation| !violation.informational);

        Ok(GuardrailDecision {
            action,
            passed,
            triggered_rule,
            violations,
            score_summary,
        })
    }

    async fn run_rule(
        &self,
        rule: &RuleConfig,
        generated: &Value,
        metadata: &Map<String, Value>,
    ) -> Result<(f64, Option<String>), String> {
        let scorer = scorer_for_rule(rule).map_err(|e| e.to_string())?;
        let score = scorer
            .score(generated, None, metadata)
            .await
            .map_err(|e| e.to_string())?;
        Ok((score.value.as_f64(), score.comment))
    }
}

fn decision_action(violations: &[RuleViolation], blocked: bool) -> DecisionAction {
    if blocked {
        DecisionAction::Block
    } else if violations
        .iter()
        .any(|violation| violation.action == RuleAction::Warn)
    {
        DecisionAction::Warn
    } else if !violations.is_empty() {
        DecisionAction::Log
    } else {
        DecisionAction::Allow
    }
}

/// Validate a prompt before it is sent to a model.
pub async fn validate_prompt(
    engine: &PolicyEngine,
    prompt: &str,
    selector: &RuleSelector,
) -> Result<GuardrailDecision, PolicyError> {
    engine.evaluate(prompt, &Map::new(), selector).await
}

/// Validate a model response; the prompt and retrieval context are passed to
/// context-aware rules through metadata.
pub async fn validate_response(
    engine: &PolicyEngine,
    prompt: &str,
    response: &str,
    context: Option<&str>,
    selector: &RuleSelector,
) -> Result<GuardrailDecision, PolicyError> {
    let mut metadata = Map::new();
    metadata.insert("prompt".to_string(), Value::String(prompt.to_string()));
    if let Some(context) = context {
        metadata.insert("context".to_string(), Value::String(context.to_string()));
    }
    engine.evaluate(response, &metadata, selector).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_policy_str;
    use serde_json::json;

    fn engine_with(policy_json: serde_json::Value) -> PolicyEngine {
        let mut engine = PolicyEngine::new();
        engine
            .register(serde_json::from_value(policy_json).unwrap())
            .unwrap();
        engine
    }

    fn blocking_keyword_policy() -> serde_json::Value {
        json!({
            "name": "safety",
            "rules": [
                {
                    "id": "no-secrets",
                    "type": "keyword",
                    "threshold": 0.5,
                    "action": "block",
                    "config": {"keywords": ["secret"]}
                },
                {
                    "id": "stay-civil",
                    "type": "toxicity",
                    "threshold": 0.7,
                    "action": "warn"
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_block_short_circuits() {
        let engine = engine_with(blocking_keyword_policy());
        let decision = engine
            .evaluate("this is secret", &Map::new(), &RuleSelector::default())
            .await
            .unwrap();

        assert_eq!(decision.action, DecisionAction::Block);
        assert_eq!(decision.triggered_rule.as_deref(), Some("no-secrets"));
        assert!(!decision.passed);
        assert_eq!(decision.violations.len(), 1);
        // The toxicity rule must not have been evaluated.
        assert!(!decision.score_summary.contains_key("stay-civil"));
    }

    #[tokio::test]
    async fn test_clean_text_passes() {
        let engine = engine_with(blocking_keyword_policy());
        let decision = engine
            .evaluate("a perfectly fine sentence", &Map::new(), &RuleSelector::default())
            .await
            .unwrap();

        assert_eq!(decision.action, DecisionAction::Allow);
        assert!(decision.passed);
        assert!(decision.violations.is_empty());
        assert_eq!(decision.score_summary.len(), 2);
    }

    #[tokio::test]
    async fn test_warn_continues_and_fails_passed() {
        let engine = engine_with(json!({
            "name": "warn-only",
            "rules": [
                {
                    "id": "kw",
                    "type": "keyword",
                    "threshold": 0.5,
                    "action": "warn",
                    "config": {"keywords": ["secret"]}
                },
                {"id": "pii", "type": "pii", "action": "warn"}
            ]
        }));

        let decision = engine
            .evaluate(
                "the secret email is bob@example.com",
                &Map::new(),
                &RuleSelector::default(),
            )
            .await
            .unwrap();

        assert_eq!(decision.action, DecisionAction::Warn);
        assert!(!decision.passed);
        assert_eq!(decision.violations.len(), 2);
        assert_eq!(decision.score_summary.len(), 2);
    }

    #[tokio::test]
    async fn test_log_action_is_informational() {
        let engine = engine_with(json!({
            "name": "log-only",
            "rules": [
                {
                    "id": "kw",
                    "type": "keyword",
                    "threshold": 0.5,
                    "action": "log",
                    "config": {"keywords": ["secret"]}
                }
            ]
        }));

        let decision = engine
            .evaluate("a secret thing", &Map::new(), &RuleSelector::default())
            .await
            .unwrap();

        assert_eq!(decision.action, DecisionAction::Log);
        assert!(decision.passed);
        assert!(decision.violations[0].informational);
    }

    #[tokio::test]
    async fn test_scorer_failure_safe_default_blocks() {
        // Invalid regex pattern passes document validation but fails at
        // scorer construction, which must fall back to a violation.
        let engine = engine_with(json!({
            "name": "broken",
            "rules": [
                {
                    "id": "bad-regex",
                    "type": "regex",
                    "threshold": 0.5,
                    "action": "block",
                    "config": {"patterns": ["("]}
                }
            ]
        }));

        let decision = engine
            .evaluate("anything", &Map::new(), &RuleSelector::default())
            .await
            .unwrap();

        assert_eq!(decision.action, DecisionAction::Block);
        assert_eq!(decision.violations[0].value, 1.0);
        assert!(decision.violations[0]
            .comment
            .as_ref()
            .unwrap()
            .contains("failed"));
    }

    #[tokio::test]
    async fn test_rule_id_filter() {
        let engine = engine_with(blocking_keyword_policy());
        let selector = RuleSelector {
            policy_name: None,
            rule_ids: Some(vec!["stay-civil".to_string()]),
        };

        let decision = engine
            .evaluate("this is secret", &Map::new(), &selector)
            .await
            .unwrap();

        assert_eq!(decision.action, DecisionAction::Allow);
        assert!(!decision.score_summary.contains_key("no-secrets"));
    }

    #[tokio::test]
    async fn test_unknown_policy_selector() {
        let engine = engine_with(blocking_keyword_policy());
        let err = engine
            .evaluate("text", &Map::new(), &RuleSelector::policy("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, PolicyError::UnknownPolicy(_)));
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let mut engine = PolicyEngine::new();
        let policy = load_policy_str(
            r#"{"name": "p", "rules": [{"id": "a", "type": "pii"}]}"#,
        )
        .unwrap();
        engine.register(policy.clone()).unwrap();
        let err = engine.register(policy).unwrap_err();
        assert!(matches!(err, PolicyError::DuplicatePolicy(_)));
    }

    #[tokio::test]
    async fn test_invalid_policy_not_registered() {
        let mut engine = PolicyEngine::new();
        let policy = load_policy_str(r#"{"name": "p", "rules": []}"#).unwrap();
        let err = engine.register(policy).unwrap_err();
        assert!(matches!(err, PolicyError::ValidationFailed { .. }));
        assert!(engine.policy("p").is_none());
    }

    #[tokio::test]
    async fn test_validate_response_passes_context() {
        let engine = engine_with(json!({
            "name": "grounding",
            "rules": [
                {"id": "hallucination", "type": "hallucination", "threshold": 0.5, "action": "warn"}
            ]
        }));

        let decision = validate_response(
            &engine,
            "what fuel does the reactor use?",
            "Giraffes are the tallest land animals.",
            Some("The experimental reactor runs on thorium fuel rods."),
            &RuleSelector::default(),
        )
        .await
        .unwrap();

        assert_eq!(decision.action, DecisionAction::Warn);
        assert!(!decision.passed);
    }
}
