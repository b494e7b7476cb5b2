//! API models for request/response types.
//!
//! Defines the JSON request/response structures for the embedding API.

use serde::{Deserialize, Serialize};

/// Request body for `POST /embed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// The texts to embed, in order.
    pub texts: Vec<String>,
    /// Requested chunk size. Absent or zero means the default.
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Accepted for compatibility. Output is always unit-normalized.
    #[serde(default = "default_normalize")]
    pub normalize: bool,
}

fn default_normalize() -> bool {
    true
}

/// Response body for `POST /embed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    /// One vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    pub model_info: ModelInfo,
}

/// Metadata describing a completed embed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub device: String,
    pub embedding_dim: usize,
    /// Wall-clock seconds spent on the whole call.
    pub processing_time: f64,
    pub text_count: usize,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` with a loaded model, `healthy_mock` otherwise.
    pub status: String,
    pub device: String,
    pub model_loaded: bool,
    pub model_info: HealthModelInfo,
}

/// Load-independent model metadata reported by `/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthModelInfo {
    pub model_name: String,
    pub embedding_dim: usize,
    pub device: String,
    pub model_type: String,
}

/// Static descriptor served at `/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
    pub docs: String,
}

/// Error body for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
