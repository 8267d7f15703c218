pub mod engine;
pub mod error;
pub mod loader;
pub mod validator;

pub use engine::{
    validate_prompt, validate_response, DecisionAction, GuardrailDecision, PolicyEngine,
    RuleSelector, RuleViolation,
};
pub use error::PolicyError;
pub use loader::{load_policy_file, load_policy_str};
pub use validator::validate_policy;
