//! Error types.
//!
//! `ModelError` covers everything that can go wrong inside the encoder. It never
//! reaches a client: the embedding service answers it with mock vectors.
//! `EmbedError` is what the HTTP surface turns into a status code.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ErrorResponse;

/// Failure of the underlying embedding model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),

    #[error("inference session lock poisoned")]
    Poisoned,
}

/// Request-level failure returned to callers.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    MalformedBody(#[from] JsonRejection),

    #[error("Embedding generation failed: {0}")]
    Internal(String),
}

impl EmbedError {
    pub fn status(&self) -> StatusCode {
        match self {
            EmbedError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EmbedError::MalformedBody(rejection) => rejection.status(),
            EmbedError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EmbedError {
    fn into_response(self) -> Response {
        let detail = match &self {
            EmbedError::MalformedBody(rejection) => rejection.body_text(),
            other => other.to_string(),
        };
        (self.status(), Json(ErrorResponse { detail })).into_response()
    }
}
