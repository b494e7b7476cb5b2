//! BGE-M3 Model Server - Library Entry Point
//!
//! Serves dense BGE-M3 embeddings over HTTP from a local ONNX model, answering
//! with random unit vectors when the model is unavailable.

pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use clients::{Device, LocalEmbeddingClient, LocalModelConfig, MockEmbeddingClient};
pub use config::Config;
pub use error::{EmbedError, ModelError};
pub use handlers::{create_app, AppState};
pub use services::{load_model, EmbeddingService, ServerState};
pub use traits::EmbeddingModel;
