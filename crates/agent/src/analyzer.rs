//! Deterministic query analysis.
//!
//! Classification is a fixed-table keyword lookup with exact thresholds.
//! Tests depend on these being reproducible; do not make this adaptive.

use sage_core::{Complexity, IntentDescriptor};

use crate::tools::{EXECUTE_CODE_TOOL, SEARCH_MEMORY_TOOL};

const CODE_KEYWORDS: [&str; 6] = ["code", "program", "script", "function", "implement", "write"];
const MEMORY_KEYWORDS: [&str; 5] = ["remember", "previous", "earlier", "before", "history"];

/// Maps raw query text to an intent descriptor. Pure and stateless; the
/// descriptor is immutable for the remainder of the turn.
pub fn analyze(query: &str) -> IntentDescriptor {
    let lowered = query.to_lowercase();
    let token_count = query.split_whitespace().count();

    let needs_code_exec = CODE_KEYWORDS.iter().any(|keyword| lowered.contains(keyword));
    let needs_memory = MEMORY_KEYWORDS.iter().any(|keyword| lowered.contains(keyword));

    let mut required_tools = Vec::new();
    if needs_code_exec {
        required_tools.push(EXECUTE_CODE_TOOL.to_string());
    }
    if needs_memory {
        required_tools.push(SEARCH_MEMORY_TOOL.to_string());
    }

    // High wins over Low: a short query mentioning "complex" is High.
    let complexity = if token_count > 50 || lowered.contains("complex") {
        Complexity::High
    } else if token_count < 10 {
        Complexity::Low
    } else {
        Complexity::Medium
    };

    IntentDescriptor {
        intent_label: "general".to_string(),
        needs_code_exec,
        needs_memory,
        required_tools,
        complexity,
    }
}

/// Renders the fixed-order reasoning trace surfaced to the caller. This is a
/// literal rendering of the descriptor, not a generative explanation.
pub fn explain(descriptor: &IntentDescriptor) -> String {
    let mut steps = vec![
        format!("Query Analysis: {}", descriptor.intent_label),
        format!("Complexity: {}", descriptor.complexity),
    ];
    if !descriptor.required_tools.is_empty() {
        steps.push(format!("Required Tools: {}", descriptor.required_tools.join(", ")));
    }
    steps.join("\n")
}

#[cfg(test)]
mod tests {
    use sage_core::Complexity;

    use super::{analyze, explain};
    use crate::tools::{EXECUTE_CODE_TOOL, SEARCH_MEMORY_TOOL};

    #[test]
    fn code_keywords_require_the_execution_tool() {
        for query in [
            "write me a sorting routine",
            "can you implement quicksort",
            "show me a SCRIPT for backups",
            "I need a program",
            "refactor this function",
            "generate code please",
        ] {
            let descriptor = analyze(query);
            assert!(descriptor.needs_code_exec, "query should need code exec: {query}");
            assert!(
                descriptor.required_tools.contains(&EXECUTE_CODE_TOOL.to_string()),
                "execute_code missing for: {query}"
            );
        }
    }

    #[test]
    fn memory_keywords_require_the_search_tool() {
        for query in [
            "do you remember my name",
            "what did we discuss earlier",
            "as I said before",
            "show my history",
            "from a previous chat",
        ] {
            let descriptor = analyze(query);
            assert!(descriptor.needs_memory, "query should need memory: {query}");
            assert!(descriptor.required_tools.contains(&SEARCH_MEMORY_TOOL.to_string()));
        }
    }

    #[test]
    fn plain_queries_need_neither_tool() {
        let descriptor = analyze("what is the capital of France");
        assert!(!descriptor.needs_code_exec);
        assert!(!descriptor.needs_memory);
        assert!(descriptor.required_tools.is_empty());
        assert_eq!(descriptor.intent_label, "general");
    }

    #[test]
    fn complexity_thresholds_are_exact() {
        let nine = "w ".repeat(9);
        assert_eq!(analyze(nine.trim()).complexity, Complexity::Low);

        let ten = "w ".repeat(10);
        assert_eq!(analyze(ten.trim()).complexity, Complexity::Medium);

        let fifty = "w ".repeat(50);
        assert_eq!(analyze(fifty.trim()).complexity, Complexity::Medium);

        let fifty_one = "w ".repeat(51);
        assert_eq!(analyze(fifty_one.trim()).complexity, Complexity::High);
    }

    #[test]
    fn complex_substring_forces_high_even_when_short() {
        assert_eq!(analyze("this is complex").complexity, Complexity::High);
        assert_eq!(analyze("explain COMPLEXITY theory").complexity, Complexity::High);
    }

    #[test]
    fn trace_lists_fields_in_fixed_order() {
        let descriptor = analyze("write code to remember things");
        let trace = explain(&descriptor);
        let lines: Vec<&str> = trace.lines().collect();

        assert_eq!(lines[0], "Query Analysis: general");
        assert_eq!(lines[1], "Complexity: low");
        assert_eq!(lines[2], "Required Tools: execute_code, search_memory");
    }

    #[test]
    fn trace_omits_tools_line_when_none_required() {
        let descriptor = analyze("hello there friend");
        let trace = explain(&descriptor);
        assert_eq!(trace.lines().count(), 2);
    }
}
