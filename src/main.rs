//! BGE-M3 Model Server - Main Entry Point
//!
//! Loads the model once at startup and serves embeddings over HTTP. A missing
//! or broken model does not stop the server; it answers in mock mode.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use model_server::config::Config;
use model_server::handlers::{create_app, AppState};
use model_server::services::{load_model, EmbeddingService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "model_server=info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    info!("🚀 Starting BGE-M3 embedding server v{}", env!("CARGO_PKG_VERSION"));
    info!("📦 Model: {} ({}D)", config.model_name, config.model_dimension);
    info!(
        "🔧 Max batch size: {}, timeout: {}s",
        config.max_batch_size, config.timeout_seconds
    );

    if let Err(e) = config.validate_model_files() {
        warn!("{}", e);
        warn!("Expected model files:");
        warn!("  - Model: {}", config.model_path);
        warn!("  - Tokenizer: {}", config.tokenizer_path);
    }

    let server_state = load_model(&config);
    if !server_state.model_loaded() {
        error!("Failed to load model. Server will start and serve mock embeddings.");
    }

    let state = Arc::new(AppState {
        service: EmbeddingService::new(&config, server_state),
    });
    let app = create_app(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("✅ Embedding server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down BGE-M3 embedding server...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
