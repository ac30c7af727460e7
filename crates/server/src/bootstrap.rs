use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use sage_agent::{AgentRuntime, GenerationParams, HttpLlmClient, LlmClient};
use sage_core::config::{AppConfig, ConfigError, LoadOptions};
use sage_memory::MemoryStore;
use sage_sandbox::SandboxExecutor;

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Composes the pipeline explicitly: store, sandbox, optional generator,
/// runtime. There is no hidden global agent; whoever composes the pipeline
/// owns it.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        memory_path = %config.memory.path.display(),
        "starting application bootstrap"
    );

    let memory = Arc::new(MemoryStore::load(config.memory.path.clone(), config.memory.retention));
    info!(
        event_name = "system.bootstrap.memory_loaded",
        records = memory.len().await,
        "interaction store loaded"
    );

    let sandbox = SandboxExecutor::new(config.sandbox.interpreter.clone());

    let llm: Option<Arc<dyn LlmClient>> = match HttpLlmClient::new(config.llm.clone()) {
        Ok(client) => Some(Arc::new(client)),
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.llm_unavailable",
                error = %error,
                "generator client could not be built, falling back to deterministic responses"
            );
            None
        }
    };

    let params = GenerationParams {
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
        ..GenerationParams::default()
    };

    let runtime = Arc::new(AgentRuntime::new(
        memory,
        sandbox,
        llm,
        params,
        Duration::from_secs(config.sandbox.timeout_secs),
        config.memory.lookup_limit,
    ));

    Ok(Application { config, runtime })
}

#[cfg(test)]
mod tests {
    use sage_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    #[tokio::test]
    async fn bootstrap_builds_a_working_runtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                memory_path: Some(dir.path().join("memory.json")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap succeeds with defaults");

        let stats = app.runtime.stats().await;
        assert_eq!(stats.total_interactions, 0);
        assert_eq!(stats.tools_available, 4);

        // The turn degrades to the deterministic fallback when the local
        // generator endpoint is unreachable; it never errors.
        let result = app.runtime.process_query("hello there").await;
        assert!(!result.response.trim().is_empty());
    }
}
