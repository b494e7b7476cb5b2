//! Services module.

pub mod embedding;
pub mod loader;
pub mod vector_ops;

pub use embedding::EmbeddingService;
pub use loader::{load_model, ServerState};
pub use vector_ops::VectorOps;
