use std::path::Path;

use marker_types::Policy;
use tracing::debug;

use crate::error::PolicyError;

/// Parse a policy document from YAML (JSON is a YAML subset, so both work).
pub fn load_policy_str(document: &str) -> Result<Policy, PolicyError> {
    let policy: Policy = serde_yaml::from_str(document)?;
    debug!("Parsed policy '{}' with {} rules", policy.name, policy.rules.len());
    Ok(policy)
}

pub fn load_policy_file(path: impl AsRef<Path>) -> Result<Policy, PolicyError> {
    let document = std::fs::read_to_string(path)?;
    load_policy_str(&document)
}
