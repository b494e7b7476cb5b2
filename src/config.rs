//! Configuration module for the model server.

use std::path::Path;

use crate::clients::LocalModelConfig;

/// Identifier of the pretrained model served by this process.
pub const MODEL_ID: &str = "BAAI/bge-m3";
/// Dense embedding dimension of BGE-M3.
pub const EMBEDDING_DIM: usize = 1024;
/// Hard cap on texts per request and on the effective batch size.
pub const MAX_BATCH_SIZE: usize = 64;
/// Informational request timeout. Not enforced by the request path.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Service configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub model_name: String,
    pub model_path: String,
    pub fp16_model_path: String,
    pub tokenizer_path: String,
    pub model_dimension: usize,
    pub max_length: usize,
    pub max_batch_size: usize,
    pub timeout_seconds: u64,
    pub intra_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7860,
            model_name: MODEL_ID.to_string(),
            model_path: "./models/bge-m3/model.onnx".to_string(),
            fp16_model_path: "./models/bge-m3/model_fp16.onnx".to_string(),
            tokenizer_path: "./models/bge-m3/tokenizer.json".to_string(),
            model_dimension: EMBEDDING_DIM,
            max_length: 8192,
            max_batch_size: MAX_BATCH_SIZE,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            intra_threads: 4,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parse_env("PORT").unwrap_or(defaults.port),
            model_name: std::env::var("MODEL_NAME").unwrap_or(defaults.model_name),
            model_path: std::env::var("MODEL_PATH").unwrap_or(defaults.model_path),
            fp16_model_path: std::env::var("MODEL_FP16_PATH").unwrap_or(defaults.fp16_model_path),
            tokenizer_path: std::env::var("TOKENIZER_PATH").unwrap_or(defaults.tokenizer_path),
            model_dimension: defaults.model_dimension,
            max_length: parse_env("MAX_SEQUENCE_LENGTH").unwrap_or(defaults.max_length),
            max_batch_size: parse_env("MAX_BATCH_SIZE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_batch_size),
            timeout_seconds: parse_env("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.timeout_seconds),
            intra_threads: parse_env("ONNX_INTRA_THREADS").unwrap_or(defaults.intra_threads),
        }
    }

    /// Address the HTTP listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check that the full-precision model and the tokenizer are on disk.
    pub fn validate_model_files(&self) -> Result<(), String> {
        if !Path::new(&self.model_path).exists() {
            return Err(format!("Model file not found: {}", self.model_path));
        }
        if !Path::new(&self.tokenizer_path).exists() {
            return Err(format!("Tokenizer file not found: {}", self.tokenizer_path));
        }
        Ok(())
    }

    /// Build the local model configuration from this config.
    pub fn to_local_model_config(&self) -> LocalModelConfig {
        LocalModelConfig {
            model_path: self.model_path.clone(),
            fp16_model_path: Some(self.fp16_model_path.clone()),
            tokenizer_path: self.tokenizer_path.clone(),
            dimension: self.model_dimension,
            max_length: self.max_length,
            model_name: self.model_name.clone(),
            intra_threads: self.intra_threads,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
