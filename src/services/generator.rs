use crate::config::Config;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shown to the user when the backend answers but produces no usable text.
/// Ordinary backend hiccups must surface as prose, not as errors.
pub const EMPTY_RESPONSE_FALLBACK: &str =
    "I couldn't generate a response just now. Please try rephrasing your request or try again.";

/// Turns a structured prompt into free text.
///
/// Implementations return `GenerationTimeout` when the backend is genuinely
/// unreachable within the configured budget, and `GenerationFormat` when it
/// answers with something undecodable. Everything milder comes back as a
/// user-facing string.
#[async_trait]
pub trait GenerationPort: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_backoff: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            timeout: Duration::from_secs(60),
            retries: 1,
            retry_backoff: Duration::from_millis(700),
        }
    }
}

/// Chat-completion client for a local Ollama server.
#[derive(Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    config: GeneratorConfig,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OllamaGenerator {
    pub fn new(app_config: &Config) -> Result<Self> {
        let config = GeneratorConfig {
            timeout: Duration::from_secs(app_config.generation_timeout_secs),
            retries: app_config.generation_retries,
            ..GeneratorConfig::default()
        };

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::InternalError(format!("failed to create HTTP client: {}", e)))?;

        info!(
            "Ollama generator ready: model={}, timeout={}s, retries={}",
            app_config.ollama_model,
            config.timeout.as_secs(),
            config.retries
        );

        Ok(Self {
            client,
            base_url: app_config.ollama_base_url.clone(),
            model: app_config.ollama_model.clone(),
            config,
        })
    }

    async fn chat_once(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature,
                num_predict: max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::GenerationTimeout
                } else {
                    ApiError::GenerationFormat(format!("request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::GenerationFormat(format!(
                "backend returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::GenerationFormat(format!("undecodable response: {}", e)))?;

        let content = parsed
            .message
            .and_then(|m| m.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        if content.is_empty() {
            debug!("Generation backend returned empty content");
            return Ok(EMPTY_RESPONSE_FALLBACK.to_string());
        }

        Ok(content)
    }
}

#[async_trait]
impl GenerationPort for OllamaGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let mut last_err = None;

        for attempt in 0..=self.config.retries {
            match self
                .chat_once(system_prompt, user_prompt, temperature, max_tokens)
                .await
            {
                Ok(text) => return Ok(text),
                Err(e) => {
                    if attempt < self.config.retries {
                        warn!(
                            "Generation attempt {}/{} failed: {}. Retrying...",
                            attempt + 1,
                            self.config.retries + 1,
                            e
                        );
                        // Linear backoff between attempts.
                        tokio::time::sleep(self.config.retry_backoff * (attempt + 1)).await;
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(ApiError::GenerationTimeout))
    }
}
