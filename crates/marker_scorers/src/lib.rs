pub mod assertions;
pub mod enriched;
pub mod error;
pub mod guardrails;
pub mod traits;

pub use assertions::{ContainsScorer, ExactMatchScorer, RegexMatchScorer};
pub use enriched::EnrichedOutputScorer;
pub use error::ScorerError;
pub use guardrails::{
    scorer_for_rule, HallucinationScorer, KeywordScorer, PiiScorer, PromptInjectionScorer,
    RegexRuleScorer, SensitiveDataScorer, ToxicityScorer,
};
pub use traits::{value_as_text, Scorer};
