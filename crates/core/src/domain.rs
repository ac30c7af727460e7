use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One persisted conversation turn. Immutable once appended to the store;
/// queries hand out clones, never references into the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub user_text: String,
    pub agent_text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl InteractionRecord {
    pub fn new(
        user_text: impl Into<String>,
        agent_text: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_text: user_text.into(),
            agent_text: agent_text.into(),
            metadata,
        }
    }

    /// Case-insensitive substring match against either side of the exchange.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.user_text.to_lowercase().contains(needle_lower)
            || self.agent_text.to_lowercase().contains(needle_lower)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(label)
    }
}

/// Structured classification of a query, produced once per turn by the
/// analyzer and read-only for the rest of the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentDescriptor {
    pub intent_label: String,
    pub needs_code_exec: bool,
    pub needs_memory: bool,
    /// Insertion-ordered, duplicate-free tool names.
    pub required_tools: Vec<String>,
    pub complexity: Complexity,
}

/// Outcome of one sandboxed run. Timeouts and spawn failures are encoded
/// here rather than surfaced as errors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecutionResult {
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self { succeeded: false, stdout: String::new(), stderr: stderr.into(), exit_code: -1 }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::{Complexity, ExecutionResult, InteractionRecord};

    #[test]
    fn record_matches_either_side_case_insensitively() {
        let record = InteractionRecord::new("Tell me about Rust", "Rust is a language", Map::new());
        assert!(record.matches("rust"));
        assert!(record.matches("language"));
        assert!(!record.matches("python"));
    }

    #[test]
    fn complexity_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Complexity::High).unwrap(), "\"high\"");
        assert_eq!(Complexity::Medium.to_string(), "medium");
    }

    #[test]
    fn failure_result_uses_sentinel_exit_code() {
        let result = ExecutionResult::failure("spawn failed");
        assert!(!result.succeeded);
        assert_eq!(result.exit_code, -1);
        assert!(result.stdout.is_empty());
    }
}
