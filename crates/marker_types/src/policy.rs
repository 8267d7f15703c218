use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};

/// Closed set of guardrail rule types. Each maps to a guardrail scorer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RuleType {
    Hallucination,
    PromptInjection,
    Toxicity,
    Pii,
    SensitiveData,
    Regex,
    Keyword,
}

/// What the policy engine does when a rule is violated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RuleAction {
    Block,
    Warn,
    Log,
}

fn default_enabled() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.5
}

fn default_action() -> RuleAction {
    RuleAction::Warn
}

fn default_version() -> String {
    "v1".to_string()
}

/// One rule in a policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Unique within the owning policy.
    pub id: String,

    #[serde(rename = "type")]
    pub rule_type: RuleType,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Violation threshold in [0, 1]; a rule fires when its scorer value
    /// meets or exceeds it.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_action")]
    pub action: RuleAction,

    /// Rule-specific configuration, e.g. `patterns` for regex rules or
    /// `keywords` for keyword rules.
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// Declarative guardrail policy. Rules are evaluated in declaration order
/// and are immutable once the policy is registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Policy {
    pub fn enabled_rules(&self) -> impl Iterator<Item = &RuleConfig> {
        self.rules.iter().filter(|rule| rule.enabled)
    }

    pub fn rule_by_id(&self, rule_id: &str) -> Option<&RuleConfig> {
        self.rules.iter().find(|rule| rule.id == rule_id)
    }
}
