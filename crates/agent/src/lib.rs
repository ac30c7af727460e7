//! Agent runtime: query analysis, tool dispatch, and the per-turn pipeline.
//!
//! The pipeline is a linear walk per turn: analyze the query, optionally pull
//! context from the interaction store, build an augmented prompt, obtain a
//! response from a pluggable generator (or a deterministic fallback), run any
//! embedded code in the sandbox, and persist the turn.
//!
//! The generator is strictly a text producer. Tool availability, memory
//! retrieval, and code execution are decided by the deterministic analyzer,
//! never by generated text.

pub mod analyzer;
pub mod document;
pub mod llm;
pub mod runtime;
pub mod tools;

pub use analyzer::{analyze, explain};
pub use document::{DocumentSource, DocumentText};
pub use llm::{GenerationParams, HttpLlmClient, LlmClient};
pub use runtime::{AgentRuntime, AgentStats, BatchOutcome, TurnResult};
pub use tools::{Tool, ToolRegistry, EXECUTE_CODE_TOOL, SEARCH_MEMORY_TOOL};
