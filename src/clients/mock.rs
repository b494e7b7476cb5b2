//! Random stand-in embeddings for when the real model is unavailable.

use async_trait::async_trait;
use rand::thread_rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::ModelError;
use crate::services::VectorOps;
use crate::traits::EmbeddingModel;

/// Produces unit-norm vectors sampled from a standard normal distribution.
///
/// The vectors carry no information about the input text.
#[derive(Debug, Clone)]
pub struct MockEmbeddingClient {
    model_name: String,
    dimension: usize,
}

impl MockEmbeddingClient {
    pub fn new(model_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimension,
        }
    }

    /// One fresh vector per text. `_batch_size` mirrors the model interface.
    pub fn generate(&self, texts: &[String], _batch_size: usize) -> Vec<Vec<f32>> {
        let mut rng = thread_rng();
        texts
            .iter()
            .map(|_| {
                let mut embedding: Vec<f32> = (0..self.dimension)
                    .map(|_| StandardNormal.sample(&mut rng))
                    .collect();
                VectorOps::normalize_inplace(&mut embedding);
                embedding
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddingClient {
    async fn encode(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, ModelError> {
        Ok(self.generate(texts, batch_size))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
