//! Embedding service.
//!
//! Validates requests, splits them into chunks, runs each chunk through the
//! loaded model and normalizes the result. A chunk the model cannot handle is
//! answered with mock vectors instead, so a request only fails on bad input.

use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::clients::MockEmbeddingClient;
use crate::config::Config;
use crate::error::{EmbedError, ModelError};
use crate::models::{EmbedResponse, HealthModelInfo, HealthResponse, ModelInfo};
use crate::services::{ServerState, VectorOps};

const MODEL_TYPE: &str = "BGE-M3";

/// The request-handling core shared by every handler.
pub struct EmbeddingService {
    state: ServerState,
    mock: MockEmbeddingClient,
    model_name: String,
    dimension: usize,
    max_batch_size: usize,
}

impl EmbeddingService {
    pub fn new(config: &Config, state: ServerState) -> Self {
        Self {
            state,
            mock: MockEmbeddingClient::new(config.model_name.clone(), config.model_dimension),
            model_name: config.model_name.clone(),
            dimension: config.model_dimension,
            max_batch_size: config.max_batch_size,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.state.model_loaded()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Chunk size actually used: the request's value, defaulted and capped.
    pub fn effective_batch_size(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(n) if n > 0 => n.min(self.max_batch_size),
            _ => self.max_batch_size,
        }
    }

    /// Embed `texts`, returning one unit vector per text in input order.
    pub async fn embed(
        &self,
        texts: &[String],
        batch_size: Option<usize>,
        normalize: bool,
    ) -> Result<EmbedResponse, EmbedError> {
        let start_time = Instant::now();

        if texts.is_empty() {
            return Err(EmbedError::InvalidInput("No texts provided".to_string()));
        }
        if texts.len() > self.max_batch_size {
            return Err(EmbedError::InvalidInput(format!(
                "Too many texts. Maximum allowed: {}",
                self.max_batch_size
            )));
        }
        if !normalize {
            debug!("normalize=false requested; embeddings are always normalized");
        }

        let batch_size = self.effective_batch_size(batch_size);
        let mut embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size) {
            let mut vectors = self.embed_chunk(chunk, batch_size).await;
            VectorOps::batch_normalize(&mut vectors);
            embeddings.extend(vectors);
        }

        if embeddings.len() != texts.len() {
            error!(
                "Produced {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            );
            return Err(EmbedError::Internal(format!(
                "{} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        let processing_time = start_time.elapsed().as_secs_f64();
        info!("Processed {} texts in {:.2}s", texts.len(), processing_time);

        Ok(EmbedResponse {
            embeddings,
            model_info: ModelInfo {
                model_name: self.model_name.clone(),
                device: self.state.device_tag().to_string(),
                embedding_dim: self.dimension,
                processing_time,
                text_count: texts.len(),
            },
        })
    }

    /// Vectors for one chunk, from the model when possible and mock otherwise.
    async fn embed_chunk(&self, chunk: &[String], batch_size: usize) -> Vec<Vec<f32>> {
        let Some(model) = &self.state.model else {
            warn!("Model not loaded, using mock embeddings");
            return self.mock.generate(chunk, batch_size);
        };

        let result = model
            .encode(chunk, batch_size)
            .await
            .and_then(|vectors| self.check_shape(vectors, chunk.len()));

        match result {
            Ok(vectors) => vectors,
            Err(e) => {
                error!("Error in {} embedding: {}", self.model_name, e);
                warn!("Falling back to mock embeddings due to error");
                self.mock.generate(chunk, batch_size)
            }
        }
    }

    fn check_shape(
        &self,
        vectors: Vec<Vec<f32>>,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, ModelError> {
        if vectors.len() != expected {
            return Err(ModelError::UnexpectedOutput(format!(
                "{} vectors for {} texts",
                vectors.len(),
                expected
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(ModelError::UnexpectedOutput(format!(
                "vector of length {}, expected {}",
                bad.len(),
                self.dimension
            )));
        }
        Ok(vectors)
    }

    /// Liveness report. Always succeeds; mock mode is still healthy.
    pub fn health(&self) -> HealthResponse {
        let device = self.state.device_tag().to_string();
        let model_loaded = self.state.model_loaded();

        let status = if model_loaded {
            "healthy"
        } else {
            warn!("Model not loaded, but server is functional with mock embeddings");
            "healthy_mock"
        };

        HealthResponse {
            status: status.to_string(),
            device: device.clone(),
            model_loaded,
            model_info: HealthModelInfo {
                model_name: self.model_name.clone(),
                embedding_dim: self.dimension,
                device,
                model_type: MODEL_TYPE.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::Device;
    use crate::traits::EmbeddingModel;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    const DIM: usize = 1024;

    /// Deterministic model: text "tN" maps to the basis vector e_N scaled by 2.
    /// Texts containing "bad" make the whole call fail.
    #[derive(Default)]
    struct StubModel {
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl EmbeddingModel for StubModel {
        async fn encode(
            &self,
            texts: &[String],
            _batch_size: usize,
        ) -> Result<Vec<Vec<f32>>, ModelError> {
            self.calls.lock().unwrap().push(texts.len());
            if texts.iter().any(|t| t.contains("bad")) {
                return Err(ModelError::UnexpectedOutput("stub failure".into()));
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0; DIM];
                    if let Some(i) = t.strip_prefix('t').and_then(|n| n.parse::<usize>().ok()) {
                        v[i] = 2.0;
                    }
                    v
                })
                .collect())
        }

        fn model_name(&self) -> &str {
            "stub"
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    /// Model that returns vectors of the wrong length.
    struct ShortModel;

    #[async_trait]
    impl EmbeddingModel for ShortModel {
        async fn encode(
            &self,
            texts: &[String],
            _batch_size: usize,
        ) -> Result<Vec<Vec<f32>>, ModelError> {
            Ok(texts.iter().map(|_| vec![1.0; 3]).collect())
        }

        fn model_name(&self) -> &str {
            "short"
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    fn mock_service() -> EmbeddingService {
        EmbeddingService::new(&Config::default(), ServerState::default())
    }

    fn stub_service(stub: Arc<StubModel>) -> EmbeddingService {
        EmbeddingService::new(
            &Config::default(),
            ServerState::with_model(stub, Device::Cpu),
        )
    }

    fn assert_unit(v: &[f32]) {
        let norm = VectorOps::l2_norm(v);
        assert!((norm - 1.0).abs() < 1e-5, "norm was {}", norm);
    }

    #[tokio::test]
    async fn test_mock_embeddings_shape() {
        let service = mock_service();
        let response = service.embed(&texts(5), None, true).await.unwrap();

        assert_eq!(response.embeddings.len(), 5);
        for embedding in &response.embeddings {
            assert_eq!(embedding.len(), DIM);
            assert_unit(embedding);
        }
        assert_eq!(response.model_info.text_count, 5);
        assert_eq!(response.model_info.device, "unknown");
        assert_eq!(response.model_info.embedding_dim, DIM);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let err = mock_service().embed(&[], None, true).await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_batch_limit() {
        let service = mock_service();
        let err = service.embed(&texts(65), None, true).await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidInput(ref msg) if msg.contains("64")));

        let response = service.embed(&texts(64), None, true).await.unwrap();
        assert_eq!(response.embeddings.len(), 64);
    }

    #[test]
    fn test_effective_batch_size() {
        let service = mock_service();
        assert_eq!(service.effective_batch_size(None), 64);
        assert_eq!(service.effective_batch_size(Some(0)), 64);
        assert_eq!(service.effective_batch_size(Some(8)), 8);
        assert_eq!(service.effective_batch_size(Some(500)), 64);
    }

    #[tokio::test]
    async fn test_order_preserved_across_chunks() {
        let stub = Arc::new(StubModel::default());
        let service = stub_service(stub.clone());

        let response = service.embed(&texts(5), Some(2), true).await.unwrap();

        assert_eq!(*stub.calls.lock().unwrap(), vec![2, 2, 1]);
        for (i, embedding) in response.embeddings.iter().enumerate() {
            assert!((embedding[i] - 1.0).abs() < 1e-6, "index {} out of order", i);
            assert_unit(embedding);
        }
        assert_eq!(response.model_info.device, "cpu");
    }

    #[tokio::test]
    async fn test_failed_chunk_falls_back_alone() {
        let stub = Arc::new(StubModel::default());
        let service = stub_service(stub);
        let input = vec![
            "t0".to_string(),
            "t1".to_string(),
            "bad".to_string(),
            "t3".to_string(),
            "t4".to_string(),
        ];

        let response = service.embed(&input, Some(2), true).await.unwrap();

        assert_eq!(response.embeddings.len(), 5);
        assert!((response.embeddings[0][0] - 1.0).abs() < 1e-6);
        assert!((response.embeddings[1][1] - 1.0).abs() < 1e-6);
        assert!((response.embeddings[4][4] - 1.0).abs() < 1e-6);
        // Chunk ["bad", "t3"] came from the mock: not the stub's basis vector.
        assert!((response.embeddings[3][3] - 1.0).abs() > 1e-3);
        for embedding in &response.embeddings {
            assert_unit(embedding);
        }
    }

    #[tokio::test]
    async fn test_zero_vector_left_unchanged() {
        let stub = Arc::new(StubModel::default());
        let service = stub_service(stub);

        // "zero" has no basis index, so the stub returns all zeros.
        let response = service
            .embed(&["zero".to_string()], None, true)
            .await
            .unwrap();
        assert!(response.embeddings[0].iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_wrong_dimension_falls_back_to_mock() {
        let service = EmbeddingService::new(
            &Config::default(),
            ServerState::with_model(Arc::new(ShortModel), Device::Cpu),
        );
        let response = service.embed(&texts(3), None, true).await.unwrap();
        for embedding in &response.embeddings {
            assert_eq!(embedding.len(), DIM);
        }
    }

    #[test]
    fn test_health_states() {
        let health = mock_service().health();
        assert_eq!(health.status, "healthy_mock");
        assert!(!health.model_loaded);
        assert_eq!(health.device, "unknown");
        assert_eq!(health.model_info.model_type, "BGE-M3");

        let health = stub_service(Arc::new(StubModel::default())).health();
        assert_eq!(health.status, "healthy");
        assert!(health.model_loaded);
        assert_eq!(health.device, "cpu");
    }
}
