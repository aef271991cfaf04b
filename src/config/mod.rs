use anyhow::Result;
use dotenv::dotenv;
use std::env;

/// Runtime configuration, loaded from the environment with sensible defaults.
///
/// Only the HuggingFace API key is strictly required; everything else falls
/// back to the values the index-build and serving defaults assume.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub index_path: String,
    pub metadata_path: String,
    pub keyword_tables_path: Option<String>,
    pub interaction_log_dir: String,
    pub huggingface_api_key: String,
    pub huggingface_model: String,
    pub huggingface_base_url: String,
    pub embedding_dim: usize,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub generation_timeout_secs: u64,
    pub generation_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let huggingface_api_key = env::var("APP_HUGGINGFACE_API_KEY")
            .map_err(|_| anyhow::anyhow!("APP_HUGGINGFACE_API_KEY must be set"))?;

        Ok(Config {
            port: env_or("PORT", 3000),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            index_path: env::var("APP_INDEX_PATH")
                .unwrap_or_else(|_| "models/vector_index.bin".to_string()),
            metadata_path: env::var("APP_METADATA_PATH")
                .unwrap_or_else(|_| "models/metadata.json".to_string()),
            keyword_tables_path: env::var("APP_KEYWORD_TABLES_PATH").ok(),
            interaction_log_dir: env::var("APP_INTERACTION_LOG_DIR")
                .unwrap_or_else(|_| "data/logs".to_string()),
            huggingface_api_key,
            huggingface_model: env::var("APP_HUGGINGFACE_MODEL_NAME")
                .unwrap_or_else(|_| "sentence-transformers/all-MiniLM-L6-v2".to_string()),
            huggingface_base_url: env::var("APP_HUGGINGFACE_BASE_URL")
                .unwrap_or_else(|_| "https://api-inference.huggingface.co".to_string()),
            embedding_dim: env_or("APP_EMBEDDING_DIM", 384),
            ollama_base_url: env::var("APP_OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("APP_OLLAMA_MODEL").unwrap_or_else(|_| "llama3".to_string()),
            generation_timeout_secs: env_or("APP_GENERATION_TIMEOUT_SECS", 60),
            generation_retries: env_or("APP_GENERATION_RETRIES", 1),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
