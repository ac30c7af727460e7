pub mod ask;
pub mod config;
pub mod doctor;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use sage_agent::{AgentRuntime, GenerationParams, HttpLlmClient, LlmClient};
use sage_core::config::{AppConfig, LoadOptions};
use sage_memory::MemoryStore;
use sage_sandbox::SandboxExecutor;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn raw(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Composes a runtime from config the same way the server bootstrap does;
/// the CLI owns its own instance per invocation, no process-wide singleton.
pub fn compose_runtime(config: &AppConfig) -> Arc<AgentRuntime> {
    let memory = Arc::new(MemoryStore::load(config.memory.path.clone(), config.memory.retention));
    let sandbox = SandboxExecutor::new(config.sandbox.interpreter.clone());
    let llm: Option<Arc<dyn LlmClient>> = HttpLlmClient::new(config.llm.clone())
        .ok()
        .map(|client| Arc::new(client) as Arc<dyn LlmClient>);
    let params = GenerationParams {
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
        ..GenerationParams::default()
    };

    Arc::new(AgentRuntime::new(
        memory,
        sandbox,
        llm,
        params,
        Duration::from_secs(config.sandbox.timeout_secs),
        config.memory.lookup_limit,
    ))
}

pub fn load_config() -> Result<AppConfig, sage_core::ConfigError> {
    AppConfig::load(LoadOptions::default())
}
