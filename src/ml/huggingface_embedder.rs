use crate::config::Config;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 500;
const MAX_TEXT_PREVIEW_LENGTH: usize = 80;

/// Turns text into fixed-dimension, L2-normalized dense vectors.
///
/// Encoding an empty batch returns an empty list, never an error.
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.encode(text).await?);
        }
        Ok(out)
    }

    fn dim(&self) -> usize;
}

/// Sentence embedder backed by the HuggingFace Inference API.
#[derive(Clone)]
pub struct HuggingFaceEmbedder {
    client: Client,
    api_key: String,
    model_url: String,
    model_name: String,
    dim: usize,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &Config) -> Result<Self> {
        if config.huggingface_api_key.trim().is_empty() {
            return Err(ApiError::EmbeddingUnavailable(
                "APP_HUGGINGFACE_API_KEY is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
            .map_err(|e| ApiError::InternalError(format!("failed to create HTTP client: {}", e)))?;

        let model_url = format!(
            "{}/models/{}",
            config.huggingface_base_url, config.huggingface_model
        );

        info!(
            "HuggingFace embedder ready: model={}, dim={}",
            config.huggingface_model, config.embedding_dim
        );

        Ok(Self {
            client,
            api_key: config.huggingface_api_key.clone(),
            model_url,
            model_name: config.huggingface_model.clone(),
            dim: config.embedding_dim,
        })
    }

    /// Run one throwaway embedding to pay the model's cold-start cost before
    /// the first user request hits it.
    pub async fn prewarm(&self) -> Result<()> {
        info!("Prewarming embedder ({})...", self.model_name);
        self.encode("warm up the embedding model").await?;
        info!("Embedder prewarmed");
        Ok(())
    }

    async fn request_embedding(&self, input: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct Request<'a> {
            inputs: &'a str,
            options: Options,
        }

        #[derive(Serialize)]
        struct Options {
            wait_for_model: bool,
            use_cache: bool,
        }

        let request = Request {
            inputs: input,
            options: Options {
                wait_for_model: true,
                use_cache: true,
            },
        };

        let response = self
            .client
            .post(&self.model_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::EmbeddingUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::EmbeddingUnavailable(format!(
                "API returned {}: {}",
                status, text
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ApiError::EmbeddingUnavailable(format!("non-JSON response: {}", e)))?;

        extract_embedding(&body).ok_or_else(|| {
            ApiError::EmbeddingUnavailable("no embedding found in API response".to_string())
        })
    }
}

#[async_trait]
impl EmbeddingPort for HuggingFaceEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Encoding text: {}{}",
            trimmed
                .chars()
                .take(MAX_TEXT_PREVIEW_LENGTH)
                .collect::<String>(),
            if trimmed.chars().count() > MAX_TEXT_PREVIEW_LENGTH {
                "..."
            } else {
                ""
            }
        );

        let mut last_err = None;
        for attempt in 1..=RETRY_ATTEMPTS {
            match self.request_embedding(trimmed).await {
                Ok(embedding) => return Ok(l2_normalize(embedding)),
                Err(e) => {
                    if attempt < RETRY_ATTEMPTS {
                        warn!(
                            "Embedding attempt {}/{} failed: {}. Retrying...",
                            attempt, RETRY_ATTEMPTS, e
                        );
                        tokio::time::sleep(Duration::from_millis(
                            RETRY_DELAY_MS * 2u64.pow(attempt - 1),
                        ))
                        .await;
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ApiError::EmbeddingUnavailable("all embedding attempts failed".to_string())
        }))
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// The inference API answers in several shapes depending on model and
/// pipeline: `[f32...]`, `[[f32...]]`, or `{"embedding"/"embeddings": ...}`.
fn extract_embedding(body: &serde_json::Value) -> Option<Vec<f32>> {
    fn floats(value: &serde_json::Value) -> Option<Vec<f32>> {
        let array = value.as_array()?;
        let parsed: Vec<f32> = array
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();
        (parsed.len() == array.len() && !parsed.is_empty()).then_some(parsed)
    }

    if let Some(array) = body.as_array() {
        if let Some(first) = array.first() {
            if first.is_array() {
                return floats(first);
            }
        }
        return floats(body);
    }

    if let Some(obj) = body.as_object() {
        if let Some(e) = obj.get("embedding") {
            return floats(e);
        }
        if let Some(es) = obj.get("embeddings").and_then(|v| v.as_array()) {
            return es.first().and_then(floats);
        }
    }

    None
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_embedding_flat_array() {
        let body = serde_json::json!([0.1, 0.2, 0.3]);
        assert_eq!(extract_embedding(&body), Some(vec![0.1, 0.2, 0.3]));
    }

    #[test]
    fn test_extract_embedding_nested_array() {
        let body = serde_json::json!([[0.5, 0.5]]);
        assert_eq!(extract_embedding(&body), Some(vec![0.5, 0.5]));
    }

    #[test]
    fn test_extract_embedding_object_forms() {
        let body = serde_json::json!({"embedding": [1.0, 0.0]});
        assert_eq!(extract_embedding(&body), Some(vec![1.0, 0.0]));

        let body = serde_json::json!({"embeddings": [[0.0, 1.0]]});
        assert_eq!(extract_embedding(&body), Some(vec![0.0, 1.0]));
    }

    #[test]
    fn test_extract_embedding_rejects_non_numeric() {
        let body = serde_json::json!(["a", "b"]);
        assert_eq!(extract_embedding(&body), None);
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}
