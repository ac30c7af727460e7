//! Pluggable generator boundary.
//!
//! The orchestrator never depends on a concrete provider: anything that can
//! turn a prompt into text implements [`LlmClient`]. A raised error is
//! absorbed upstream by the deterministic fallback policy, so clients are
//! free to fail fast.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use sage_core::config::{LlmConfig, LlmProvider};

#[derive(Clone, Debug)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.8,
            stop_sequences: vec!["</s>".to_string(), "User:".to_string(), "Query:".to_string()],
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// HTTP client for the configured provider. Ollama uses `/api/generate`;
/// OpenAI-compatible providers use the chat completions endpoint.
pub struct HttpLlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("could not build llm http client")?;
        Ok(Self { http, config })
    }

    fn base_url(&self) -> Result<&str> {
        self.config
            .base_url
            .as_deref()
            .ok_or_else(|| anyhow!("llm.base_url is required for provider {:?}", self.config.provider))
    }

    async fn generate_ollama(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        #[derive(Deserialize)]
        struct OllamaResponse {
            response: String,
        }

        let url = format!("{}/api/generate", self.base_url()?.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "num_predict": params.max_tokens,
                "temperature": params.temperature,
                "stop": params.stop_sequences,
            },
        });

        let response = self.http.post(url).json(&body).send().await?.error_for_status()?;
        let payload: OllamaResponse = response.json().await?;
        Ok(payload.response)
    }

    async fn generate_chat_completions(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }
        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        let url = format!("{}/v1/chat/completions", self.base_url()?.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "stop": params.stop_sequences,
        });

        let mut request = self.http.post(url).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await?.error_for_status()?;
        let payload: ChatResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("llm response contained no choices"))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        match self.config.provider {
            LlmProvider::Ollama => self.generate_ollama(prompt, params).await,
            LlmProvider::OpenAi | LlmProvider::Anthropic => {
                self.generate_chat_completions(prompt, params).await
            }
        }
    }
}
