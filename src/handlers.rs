//! HTTP handlers module.
//!
//! Provides the `/`, `/health` and `/embed` endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::EmbedError;
use crate::models::{EmbedRequest, EmbedResponse, HealthResponse, ServiceDescriptor};
use crate::services::EmbeddingService;

/// Application state shared across handlers.
pub struct AppState {
    pub service: EmbeddingService,
}

/// Build the router with all routes and middleware.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/embed", post(embed_texts))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(state.service.health())
}

/// Embed a batch of texts.
pub async fn embed_texts(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Json<EmbedResponse>, EmbedError> {
    let Json(request) = payload?;
    info!(
        "Embedding {} texts, batch_size: {:?}",
        request.texts.len(),
        request.batch_size
    );

    let response = state
        .service
        .embed(&request.texts, request.batch_size, request.normalize)
        .await?;

    Ok(Json(response))
}

/// Static service descriptor.
pub async fn root() -> Json<ServiceDescriptor> {
    Json(ServiceDescriptor {
        service: "BGE-M3 Embedding Server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec!["/health".to_string(), "/embed".to_string()],
        docs: "/docs".to_string(),
    })
}
