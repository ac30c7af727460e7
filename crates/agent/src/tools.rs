//! Tool Registry: named, invocable capabilities exposed to the generation
//! step.
//!
//! Registration is two-phase: a tool may be registered with its parameter
//! list but no implementation, then bound once its backing object exists
//! (the memory-search tool depends on a store constructed after the
//! registry). Invoking before binding fails loudly with [`ToolError::Unbound`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use sage_core::ToolError;
use sage_memory::MemoryStore;
use sage_sandbox::SandboxExecutor;

pub const EXECUTE_CODE_TOOL: &str = "execute_code";
pub const SEARCH_MEMORY_TOOL: &str = "search_memory";
pub const WEB_SEARCH_TOOL: &str = "web_search";
pub const FILE_OPERATIONS_TOOL: &str = "file_operations";

#[async_trait]
pub trait Tool: Send + Sync {
    async fn execute(&self, input: Value) -> Result<Value>;
}

struct ToolEntry {
    name: String,
    description: String,
    parameter_names: Vec<String>,
    implementation: Option<Arc<dyn Tool>>,
}

/// Registration-ordered registry. `describe_all` iterates in registration
/// order so the prompt catalogue is stable across calls.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
}

impl ToolRegistry {
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameter_names: &[&str],
        implementation: Arc<dyn Tool>,
    ) {
        self.push_entry(name, description, parameter_names, Some(implementation));
    }

    /// Registers a tool whose implementation will be bound later.
    pub fn register_unbound(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameter_names: &[&str],
    ) {
        self.push_entry(name, description, parameter_names, None);
    }

    fn push_entry(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameter_names: &[&str],
        implementation: Option<Arc<dyn Tool>>,
    ) {
        self.entries.push(ToolEntry {
            name: name.into(),
            description: description.into(),
            parameter_names: parameter_names.iter().map(|p| p.to_string()).collect(),
            implementation,
        });
    }

    /// Binds the implementation of a previously registered tool. Fails with
    /// `NotFound` if the name was never registered.
    pub fn bind(&mut self, name: &str, implementation: Arc<dyn Tool>) -> Result<(), ToolError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.name == name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        entry.implementation = Some(implementation);
        Ok(())
    }

    /// Deterministic registration-order catalogue used in prompts.
    pub fn describe_all(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                format!(
                    "- {}({}): {}",
                    entry.name,
                    entry.parameter_names.join(", "),
                    entry.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn invoke(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let implementation =
            entry.implementation.as_ref().ok_or_else(|| ToolError::Unbound(name.to_string()))?;
        implementation
            .execute(input)
            .await
            .map_err(|source| ToolError::failed(name, source))
    }
}

/// Runs a snippet through the sandbox. Input: `{"code": "...", "timeout_secs"?}`.
pub struct ExecuteCodeTool {
    executor: SandboxExecutor,
    default_timeout: Duration,
}

impl ExecuteCodeTool {
    pub fn new(executor: SandboxExecutor, default_timeout: Duration) -> Self {
        Self { executor, default_timeout }
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    async fn execute(&self, input: Value) -> Result<Value> {
        let code = input
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("execute_code requires a string `code` field"))?;
        let timeout = input
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let result = self.executor.run(code, timeout).await;
        serde_json::to_value(result).context("could not encode execution result")
    }
}

/// Searches the interaction store. Input: `{"query": "...", "limit"?}`.
pub struct SearchMemoryTool {
    store: Arc<MemoryStore>,
    default_limit: usize,
}

impl SearchMemoryTool {
    pub fn new(store: Arc<MemoryStore>, default_limit: usize) -> Self {
        Self { store, default_limit }
    }
}

#[async_trait]
impl Tool for SearchMemoryTool {
    async fn execute(&self, input: Value) -> Result<Value> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("search_memory requires a string `query` field"))?;
        let limit = input
            .get("limit")
            .and_then(Value::as_u64)
            .map(|limit| limit as usize)
            .unwrap_or(self.default_limit);

        let matches = self.store.lookup(query, limit).await;
        serde_json::to_value(matches).context("could not encode memory matches")
    }
}

/// Placeholder search backend; swap in a real provider behind the same shape.
pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    async fn execute(&self, input: Value) -> Result<Value> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("web_search requires a string `query` field"))?;
        Ok(json!({ "results": format!("[Simulated search results for: {query}]") }))
    }
}

/// Reads or writes files. Input: `{"operation": "read"|"write", "path", "content"?}`.
/// Unknown operations are reported as a failed payload, not an error.
pub struct FileOperationsTool;

#[async_trait]
impl Tool for FileOperationsTool {
    async fn execute(&self, input: Value) -> Result<Value> {
        let operation = input
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("file_operations requires a string `operation` field"))?;
        let path = input
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("file_operations requires a string `path` field"))?;

        match operation {
            "read" => match tokio::fs::read_to_string(path).await {
                Ok(content) => Ok(json!({ "success": true, "content": content })),
                Err(error) => Ok(json!({ "success": false, "error": error.to_string() })),
            },
            "write" => {
                let content = input.get("content").and_then(Value::as_str).unwrap_or_default();
                match tokio::fs::write(path, content).await {
                    Ok(()) => Ok(json!({ "success": true, "message": "file written" })),
                    Err(error) => Ok(json!({ "success": false, "error": error.to_string() })),
                }
            }
            other => Ok(json!({ "success": false, "error": format!("unknown operation `{other}`") })),
        }
    }
}
