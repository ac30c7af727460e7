use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use sage_agent::AgentRuntime;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub memory: HealthCheck,
    pub checked_at: String,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { runtime })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let stats = state.runtime.stats().await;
    let memory = HealthCheck {
        status: "ready",
        detail: format!("interaction store holds {} records", stats.total_interactions),
    };

    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "sage-server runtime initialized".to_string(),
        },
        memory,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{extract::State, http::StatusCode, Json};

    use sage_agent::{AgentRuntime, GenerationParams};
    use sage_memory::MemoryStore;
    use sage_sandbox::SandboxExecutor;

    use super::{health, HealthState};

    #[tokio::test]
    async fn health_reports_ready_with_record_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let memory = Arc::new(MemoryStore::load(dir.path().join("memory.json"), 100));
        let runtime = Arc::new(AgentRuntime::new(
            memory,
            SandboxExecutor::new("python3"),
            None,
            GenerationParams::default(),
            Duration::from_secs(10),
            3,
        ));

        let (status, Json(payload)) = health(State(HealthState { runtime })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert!(payload.memory.detail.contains("0 records"));
    }
}
