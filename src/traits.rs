//! Core trait for embedding models.

use async_trait::async_trait;

use crate::error::ModelError;

/// A model that turns texts into dense vectors.
///
/// Implementations return one vector per input text, in input order. The
/// embedding service checks that contract and normalizes whatever comes back,
/// so implementations need not normalize themselves.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Encode `texts`, processing at most `batch_size` of them per forward pass.
    async fn encode(&self, texts: &[String], batch_size: usize)
        -> Result<Vec<Vec<f32>>, ModelError>;

    /// Model identifier.
    fn model_name(&self) -> &str;

    /// Length of every vector this model produces.
    fn dimension(&self) -> usize;
}
