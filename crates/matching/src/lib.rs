pub mod confidence;
pub mod engine;
pub mod llm;
pub mod matcher;
pub mod rules;

pub use confidence::rule_match_confidence;
pub use engine::{EngineError, MatchingEngine, DEFAULT_SECONDARY_THRESHOLD};
pub use llm::{CompletionClient, LlmConfig, LlmError, LlmMatcher, OpenAiClient};
pub use matcher::{MatchError, Matcher};
pub use rules::{ConditionType, Rule, RuleMatcher, DEFAULT_MAPPING_CONFIDENCE};
