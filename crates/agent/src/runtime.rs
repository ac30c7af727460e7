//! Pipeline Orchestrator.
//!
//! One turn walks a linear state machine: analyze, retrieve context (only if
//! the descriptor asks for memory), generate, execute embedded code (only if
//! the descriptor asks for it and the response carries a fenced block),
//! persist, done. There is no branching back; skipped stages are skipped, not
//! retried.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::task::JoinSet;
use tracing::{info, warn};

use sage_core::{ExecutionResult, IntentDescriptor};
use sage_memory::MemoryStore;
use sage_sandbox::SandboxExecutor;

use crate::analyzer::{analyze, explain};
use crate::document::DocumentSource;
use crate::llm::{GenerationParams, LlmClient};
use crate::tools::{
    ExecuteCodeTool, FileOperationsTool, SearchMemoryTool, ToolRegistry, WebSearchTool,
    EXECUTE_CODE_TOOL, FILE_OPERATIONS_TOOL, SEARCH_MEMORY_TOOL, WEB_SEARCH_TOOL,
};

const PROMPT_HEADER: &str = "You are Sage, a tool-augmented assistant. Answer the query directly \
and precisely. When code is requested, provide it in a fenced ```python block.";

const EMPTY_RESPONSE_APOLOGY: &str = "I apologize, but I could not produce a response for this \
request. Please try again or rephrase your question.";

/// First 100 characters of each matched utterance go into the context block.
const CONTEXT_SNIPPET_CHARS: usize = 100;

#[derive(Clone, Debug, Serialize)]
pub struct TurnResult {
    pub response: String,
    pub reasoning: String,
    pub descriptor: IntentDescriptor,
    pub tool_results: BTreeMap<String, ExecutionResult>,
    pub used_memory: bool,
    /// True when the deterministic fallback produced the text instead of a
    /// live generator.
    pub used_fallback: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct AgentStats {
    pub total_interactions: usize,
    pub tools_available: usize,
    pub memory_enabled: bool,
    pub code_execution_enabled: bool,
    pub status: &'static str,
}

/// Per-unit outcome of a fan-out batch. A failed unit never aborts the rest.
#[derive(Debug)]
pub struct BatchOutcome {
    pub input: String,
    pub result: Result<TurnResult, String>,
}

pub struct AgentRuntime {
    memory: Arc<MemoryStore>,
    registry: ToolRegistry,
    sandbox: SandboxExecutor,
    llm: Option<Arc<dyn LlmClient>>,
    params: GenerationParams,
    sandbox_timeout: Duration,
    lookup_limit: usize,
}

impl AgentRuntime {
    /// Wires the tool catalogue. `search_memory` is registered before the
    /// store-backed implementation exists in the catalogue's eyes, then bound
    /// immediately after: two-phase registration keeps the registry free of
    /// construction-order knowledge.
    pub fn new(
        memory: Arc<MemoryStore>,
        sandbox: SandboxExecutor,
        llm: Option<Arc<dyn LlmClient>>,
        params: GenerationParams,
        sandbox_timeout: Duration,
        lookup_limit: usize,
    ) -> Self {
        let mut registry = ToolRegistry::default();
        registry.register(
            EXECUTE_CODE_TOOL,
            "Execute Python code and return results",
            &["code"],
            Arc::new(ExecuteCodeTool::new(sandbox.clone(), sandbox_timeout)),
        );
        registry.register_unbound(
            SEARCH_MEMORY_TOOL,
            "Search conversation history",
            &["query", "limit"],
        );
        registry.register(
            WEB_SEARCH_TOOL,
            "Search the web for information",
            &["query"],
            Arc::new(WebSearchTool),
        );
        registry.register(
            FILE_OPERATIONS_TOOL,
            "Read/write files safely",
            &["operation", "path", "content"],
            Arc::new(FileOperationsTool),
        );

        let search = SearchMemoryTool::new(Arc::clone(&memory), lookup_limit);
        registry
            .bind(SEARCH_MEMORY_TOOL, Arc::new(search))
            .expect("search_memory was registered above");

        Self { memory, registry, sandbox, llm, params, sandbox_timeout, lookup_limit }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn stats(&self) -> AgentStats {
        AgentStats {
            total_interactions: self.memory.len().await,
            tools_available: self.registry.len(),
            memory_enabled: true,
            code_execution_enabled: true,
            status: "operational",
        }
    }

    /// Processes one turn end to end. Never returns an error and never
    /// returns a blank response: generation failures degrade to the
    /// deterministic fallback, persistence failures are logged and the turn
    /// still completes.
    pub async fn process_query(&self, query: &str) -> TurnResult {
        // Analyzing: the descriptor is immutable for the rest of the turn.
        let descriptor = analyze(query);
        let mut reasoning = explain(&descriptor);

        // ContextRetrieval, only when the descriptor asks for memory.
        let context_block = if descriptor.needs_memory {
            self.retrieve_context(query).await
        } else {
            String::new()
        };
        let used_memory = !context_block.is_empty();

        // Generating.
        let prompt = self.build_prompt(query, &reasoning, &context_block);
        let (mut response, used_fallback) = self.generate(&prompt, &descriptor).await;

        if response.trim().is_empty() {
            response = EMPTY_RESPONSE_APOLOGY.to_string();
            reasoning.push_str("\nGenerated response was empty; substituted fixed fallback text");
        }

        // ToolExecution, only for code intents with an embedded fenced block.
        let mut tool_results = BTreeMap::new();
        if descriptor.needs_code_exec {
            if let Some(code) = extract_code_block(&response) {
                let execution = self.sandbox.run(&code, self.sandbox_timeout).await;
                tool_results.insert("code_execution".to_string(), execution);
            }
        }

        // Persisting: failure is reported but never fails the turn.
        let metadata = turn_metadata(&descriptor, &tool_results);
        if let Err(error) = self.memory.record(query, &response, metadata).await {
            warn!(
                event_name = "agent.turn.persist_failed",
                error = %error,
                "interaction could not be persisted, turn continues"
            );
        }

        info!(
            event_name = "agent.turn.completed",
            complexity = %descriptor.complexity,
            used_memory,
            used_fallback,
            tools_invoked = tool_results.len(),
            "turn completed"
        );

        TurnResult { response, reasoning, descriptor, tool_results, used_memory, used_fallback }
    }

    /// Unordered fan-out over independent queries; all results are gathered
    /// before returning, in input order, and one unit's failure is captured
    /// in its own slot.
    pub async fn process_batch(self: Arc<Self>, queries: Vec<String>) -> Vec<BatchOutcome> {
        let mut join_set = JoinSet::new();
        for (index, query) in queries.iter().cloned().enumerate() {
            let runtime = Arc::clone(&self);
            join_set.spawn(async move { (index, runtime.process_query(&query).await) });
        }

        let mut slots: Vec<Option<Result<TurnResult, String>>> =
            queries.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(Ok(result)),
                Err(join_error) => {
                    warn!(
                        event_name = "agent.batch.unit_failed",
                        error = %join_error,
                        "one batch unit failed, remaining units unaffected"
                    );
                }
            }
        }

        queries
            .into_iter()
            .zip(slots)
            .map(|(input, slot)| BatchOutcome {
                input,
                result: slot.unwrap_or_else(|| Err("unit of work did not complete".to_string())),
            })
            .collect()
    }

    /// Extracts text from each document through the external collaborator and
    /// runs one turn per document, with the extracted text as the query
    /// context. Extraction failures are captured per-document.
    pub async fn process_documents(
        self: Arc<Self>,
        source: Arc<dyn DocumentSource>,
        paths: Vec<String>,
    ) -> Vec<BatchOutcome> {
        let mut join_set = JoinSet::new();
        for (index, path) in paths.iter().cloned().enumerate() {
            let runtime = Arc::clone(&self);
            let source = Arc::clone(&source);
            join_set.spawn(async move {
                let outcome = match source.extract(&path, None).await {
                    Ok(document) if document.succeeded => {
                        let digest = document
                            .summary
                            .unwrap_or_else(|| snippet(&document.extracted_text, 500));
                        Ok(runtime
                            .process_query(&format!("Summarize this document: {digest}"))
                            .await)
                    }
                    Ok(_) => Err(format!("extraction reported failure for `{path}`")),
                    Err(error) => Err(format!("extraction failed for `{path}`: {error}")),
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<Result<TurnResult, String>>> =
            paths.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            if let Ok((index, outcome)) = joined {
                slots[index] = Some(outcome);
            }
        }

        paths
            .into_iter()
            .zip(slots)
            .map(|(input, slot)| BatchOutcome {
                input,
                result: slot.unwrap_or_else(|| Err("unit of work did not complete".to_string())),
            })
            .collect()
    }

    async fn retrieve_context(&self, query: &str) -> String {
        let matches = self.memory.lookup(query, self.lookup_limit).await;
        if matches.is_empty() {
            return String::new();
        }

        let mut block = String::from("Relevant past conversations:\n");
        for record in &matches {
            block.push_str(&format!("- User: {}...\n", snippet(&record.user_text, CONTEXT_SNIPPET_CHARS)));
        }
        block
    }

    fn build_prompt(&self, query: &str, reasoning: &str, context_block: &str) -> String {
        let mut prompt = format!(
            "{PROMPT_HEADER}\n\nAvailable Tools:\n{}\n\nReasoning Chain:\n{reasoning}\n",
            self.registry.describe_all()
        );
        if !context_block.is_empty() {
            prompt.push('\n');
            prompt.push_str(context_block);
        }
        prompt.push_str(&format!("\nUser Query: {query}\n"));
        prompt
    }

    async fn generate(&self, prompt: &str, descriptor: &IntentDescriptor) -> (String, bool) {
        let Some(llm) = &self.llm else {
            return (fallback_response(descriptor), true);
        };

        match llm.generate(prompt, &self.params).await {
            Ok(text) => (text, false),
            Err(error) => {
                warn!(
                    event_name = "agent.generate.failed",
                    error = %error,
                    "generator unavailable, using deterministic fallback"
                );
                (fallback_response(descriptor), true)
            }
        }
    }
}

/// Deterministic templated response used when no generator is configured or
/// the configured one fails. Always non-empty and always reflects the
/// descriptor, so the pipeline never stalls on a missing dependency.
fn fallback_response(descriptor: &IntentDescriptor) -> String {
    let tools = if descriptor.required_tools.is_empty() {
        "none".to_string()
    } else {
        descriptor.required_tools.join(", ")
    };

    format!(
        "No live generator is available, so this is a deterministic response.\n\n\
         Intent: {}\nComplexity: {}\nRequired tools: {tools}\n\n\
         The analysis above was produced without model inference. Configure an \
         LLM provider to receive a generated answer to your query.",
        descriptor.intent_label, descriptor.complexity
    )
}

/// First fenced ```python block, if any. Returns the substring between the
/// opening fence and the next closing fence, trimmed.
fn extract_code_block(response: &str) -> Option<String> {
    let opening = "```python";
    let start = response.find(opening)? + opening.len();
    let rest = &response[start..];
    let end = rest.find("```")?;
    let code = rest[..end].trim();
    (!code.is_empty()).then(|| code.to_string())
}

fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn turn_metadata(
    descriptor: &IntentDescriptor,
    tool_results: &BTreeMap<String, ExecutionResult>,
) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(
        "analysis".to_string(),
        serde_json::to_value(descriptor).unwrap_or(Value::Null),
    );
    metadata.insert(
        "tools_used".to_string(),
        json!(tool_results.keys().collect::<Vec<_>>()),
    );
    metadata
}
