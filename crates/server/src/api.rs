//! HTTP chat boundary.
//!
//! The contract mirrors the pipeline's degradation policy: a turn-level
//! failure becomes an explanatory body, never a 5xx, and the `response`
//! field is never empty.

use std::sync::Arc;

use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use sage_agent::{AgentRuntime, AgentStats};

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
    pub model_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_use_reasoning")]
    pub use_reasoning: bool,
    #[serde(default)]
    pub context: Option<String>,
}

fn default_use_reasoning() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub reasoning: Vec<String>,
    pub model_used: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub stats: AgentStats,
    pub tools: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/status", get(status))
        .with_state(state)
}

pub async fn chat(State(state): State<ApiState>, Json(request): Json<ChatRequest>) -> Json<ChatResponse> {
    let query = match &request.context {
        Some(context) if !context.trim().is_empty() => {
            format!("{}\n\nContext:\n{context}", request.message)
        }
        _ => request.message.clone(),
    };

    let result = state.runtime.process_query(&query).await;

    let reasoning = if request.use_reasoning {
        result.reasoning.lines().map(str::to_string).collect()
    } else {
        Vec::new()
    };
    let (model_used, confidence) = if result.used_fallback {
        ("deterministic-fallback".to_string(), 0.5)
    } else {
        (state.model_name.clone(), 0.95)
    };

    Json(ChatResponse { response: result.response, reasoning, model_used, confidence })
}

pub async fn status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let stats = state.runtime.stats().await;
    Json(StatusResponse {
        status: "operational",
        stats,
        tools: state.runtime.registry().describe_all(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::State;
    use axum::Json;

    use sage_agent::{AgentRuntime, GenerationParams};
    use sage_memory::MemoryStore;
    use sage_sandbox::SandboxExecutor;

    use super::{chat, status, ApiState, ChatRequest};

    fn state_without_generator(dir: &tempfile::TempDir) -> ApiState {
        let memory = Arc::new(MemoryStore::load(dir.path().join("memory.json"), 100));
        let runtime = Arc::new(AgentRuntime::new(
            memory,
            SandboxExecutor::new("python3"),
            None,
            GenerationParams::default(),
            Duration::from_secs(10),
            3,
        ));
        ApiState { runtime, model_name: "llama3.1".to_string() }
    }

    #[tokio::test]
    async fn chat_never_returns_an_empty_response_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state_without_generator(&dir);

        let Json(payload) = chat(
            State(state),
            Json(ChatRequest {
                message: "hello".to_string(),
                use_reasoning: true,
                context: None,
            }),
        )
        .await;

        assert!(!payload.response.trim().is_empty());
        assert_eq!(payload.model_used, "deterministic-fallback");
        assert!((payload.confidence - 0.5).abs() < f32::EPSILON);
        assert!(!payload.reasoning.is_empty());
    }

    #[tokio::test]
    async fn reasoning_is_suppressed_on_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state_without_generator(&dir);

        let Json(payload) = chat(
            State(state),
            Json(ChatRequest {
                message: "hello".to_string(),
                use_reasoning: false,
                context: None,
            }),
        )
        .await;

        assert!(payload.reasoning.is_empty());
    }

    #[tokio::test]
    async fn status_reports_stats_and_catalogue() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state_without_generator(&dir);

        let Json(payload) = status(State(state)).await;

        assert_eq!(payload.status, "operational");
        assert_eq!(payload.stats.tools_available, 4);
        assert!(payload.tools.contains("execute_code(code)"));
    }
}
