use std::collections::HashSet;

use marker_types::{Policy, RuleConfig, RuleType};

/// Validate a policy document. Returns the full list of diagnostics; an
/// empty list means the policy is acceptable.
pub fn validate_policy(policy: &Policy) -> Vec<String> {
    let mut diagnostics = Vec::new();

    if policy.name.trim().is_empty() {
        diagnostics.push("Policy name is required".to_string());
    }
    if policy.rules.is_empty() {
        diagnostics.push("Policy must have at least one rule".to_string());
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for (index, rule) in policy.rules.iter().enumerate() {
        validate_rule(rule, index, &mut diagnostics);
        if !seen_ids.insert(rule.id.as_str()) {
            diagnostics.push(format!("Duplicate rule id: {}", rule.id));
        }
    }

    diagnostics
}

fn validate_rule(rule: &RuleConfig, index: usize, diagnostics: &mut Vec<String>) {
    let prefix = format!("Rule[{index}] (id={})", rule.id);

    if rule.id.trim().is_empty() {
        diagnostics.push(format!("{prefix}: rule id is required"));
    }
    if !(0.0..=1.0).contains(&rule.threshold) {
        diagnostics.push(format!(
            "{prefix}: threshold must be between 0.0 and 1.0"
        ));
    }

    match rule.rule_type {
        RuleType::Regex => {
            if !rule.config.contains_key("patterns") {
                diagnostics.push(format!("{prefix}: regex rule requires 'patterns' in config"));
            }
        }
        RuleType::Keyword => {
            if !rule.config.contains_key("keywords") {
                diagnostics.push(format!(
                    "{prefix}: keyword rule requires 'keywords' in config"
                ));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy(value: serde_json::Value) -> Policy {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_policy_has_no_diagnostics() {
        let policy = policy(json!({
            "name": "default",
            "rules": [
                {"id": "kw", "type": "keyword", "config": {"keywords": ["x"]}},
                {"id": "tox", "type": "toxicity", "threshold": 0.7}
            ]
        }));
        assert!(validate_policy(&policy).is_empty());
    }

    #[test]
    fn test_empty_name_and_rules() {
        let policy = policy(json!({"name": "  ", "rules": []}));
        let diagnostics = validate_policy(&policy);
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_duplicate_rule_ids_detected() {
        let policy = policy(json!({
            "name": "p",
            "rules": [
                {"id": "a", "type": "pii"},
                {"id": "a", "type": "toxicity"}
            ]
        }));
        let diagnostics = validate_policy(&policy);
        assert!(diagnostics.iter().any(|d| d.contains("Duplicate rule id")));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let policy = policy(json!({
            "name": "p",
            "rules": [{"id": "a", "type": "pii", "threshold": 1.5}]
        }));
        let diagnostics = validate_policy(&policy);
        assert!(diagnostics.iter().any(|d| d.contains("threshold")));
    }

    #[test]
    fn test_missing_type_specific_config() {
        let policy = policy(json!({
            "name": "p",
            "rules": [
                {"id": "rx", "type": "regex"},
                {"id": "kw", "type": "keyword"}
            ]
        }));
        let diagnostics = validate_policy(&policy);
        assert!(diagnostics.iter().any(|d| d.contains("'patterns'")));
        assert!(diagnostics.iter().any(|d| d.contains("'keywords'")));
    }
}
