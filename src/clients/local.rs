//! Local BGE-M3 client using ONNX Runtime.
//!
//! Runs the dense head of BGE-M3 on-device. The model is exported to ONNX and
//! takes `input_ids` and `attention_mask`; the dense embedding is the hidden
//! state of the first (CLS) token.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::clients::Device;
use crate::error::ModelError;
use crate::traits::EmbeddingModel;

/// XLM-RoBERTa `<pad>` id, used when the tokenizer does not declare one.
const DEFAULT_PAD_ID: i64 = 1;

/// Configuration for the local embedding model.
#[derive(Debug, Clone)]
pub struct LocalModelConfig {
    /// Path to the full-precision ONNX model file.
    pub model_path: String,
    /// Path to a half-precision export, used on accelerators when present.
    pub fp16_model_path: Option<String>,
    /// Path to the tokenizer.json file.
    pub tokenizer_path: String,
    /// Output embedding dimension.
    pub dimension: usize,
    /// Maximum sequence length in tokens.
    pub max_length: usize,
    /// Model name for identification.
    pub model_name: String,
    /// Intra-op threads for the ONNX session.
    pub intra_threads: usize,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            model_path: "./models/bge-m3/model.onnx".to_string(),
            fp16_model_path: Some("./models/bge-m3/model_fp16.onnx".to_string()),
            tokenizer_path: "./models/bge-m3/tokenizer.json".to_string(),
            dimension: 1024,
            max_length: 8192,
            model_name: "BAAI/bge-m3".to_string(),
            intra_threads: 4,
        }
    }
}

/// BGE-M3 bound to one execution device.
pub struct LocalEmbeddingClient {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    config: LocalModelConfig,
    device: Device,
    pad_id: i64,
}

impl LocalEmbeddingClient {
    /// Load the model onto `device`.
    ///
    /// Accelerators load the half-precision export when it exists and fall
    /// back to full precision otherwise.
    pub fn new(config: LocalModelConfig, device: Device) -> Result<Self> {
        info!(
            "Initializing local embedding model: {} on {}",
            config.model_name, device
        );

        if !Path::new(&config.model_path).exists() {
            return Err(anyhow!(
                "Model file not found: {}. Please download the model first.",
                config.model_path
            ));
        }

        if !Path::new(&config.tokenizer_path).exists() {
            return Err(anyhow!(
                "Tokenizer file not found: {}. Please download the tokenizer first.",
                config.tokenizer_path
            ));
        }

        let model_path = Self::select_model_path(&config, device);
        info!("Loading {} with FP16={}", config.model_name, model_path != config.model_path);

        let session = Session::builder()?
            .with_execution_providers(Self::execution_providers(device))?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&model_path)?;

        info!("✓ ONNX session created for {}", config.model_name);

        let tokenizer = Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        let pad_id = tokenizer
            .token_to_id("<pad>")
            .map(i64::from)
            .unwrap_or(DEFAULT_PAD_ID);

        info!("✓ Tokenizer loaded");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            config,
            device,
            pad_id,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    fn select_model_path(config: &LocalModelConfig, device: Device) -> String {
        if !device.prefers_fp16() {
            return config.model_path.clone();
        }
        match &config.fp16_model_path {
            Some(path) if Path::new(path).exists() => path.clone(),
            Some(path) => {
                warn!(
                    "FP16 model not found at {}, using full precision on {}",
                    path, device
                );
                config.model_path.clone()
            }
            None => config.model_path.clone(),
        }
    }

    /// Accelerator providers must register, so a missing GPU fails the load
    /// instead of quietly running on the CPU under an accelerator tag.
    fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
        match device {
            Device::Cuda => vec![CUDAExecutionProvider::default().build().error_on_failure()],
            Device::Mps => vec![CoreMLExecutionProvider::default().build().error_on_failure()],
            Device::Cpu => vec![CPUExecutionProvider::default().build()],
        }
    }

    /// Tokenize one text, truncated to the configured maximum length.
    fn encode_text(&self, text: &str) -> Result<(Vec<i64>, Vec<i64>), ModelError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ModelError::Tokenization(e.to_string()))?;

        let max_len = self.config.max_length;
        let input_ids: Vec<i64> = encoding
            .get_ids()
            .iter()
            .take(max_len)
            .map(|&id| id as i64)
            .collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .take(max_len)
            .map(|&m| m as i64)
            .collect();

        Ok((input_ids, attention_mask))
    }

    /// Run one forward pass over a padded micro-batch.
    fn run_batch_inference(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let encoded = texts
            .iter()
            .map(|text| self.encode_text(text))
            .collect::<Result<Vec<_>, _>>()?;

        let batch = encoded.len();
        let seq_len = encoded.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0);
        if seq_len == 0 {
            return Err(ModelError::Tokenization("empty token sequence".to_string()));
        }

        let mut input_ids = Vec::with_capacity(batch * seq_len);
        let mut attention_mask = Vec::with_capacity(batch * seq_len);
        for (ids, mask) in encoded {
            let padding = seq_len - ids.len();
            input_ids.extend(ids);
            input_ids.extend(std::iter::repeat(self.pad_id).take(padding));
            attention_mask.extend(mask);
            attention_mask.extend(std::iter::repeat(0i64).take(padding));
        }

        let input_ids_tensor =
            Tensor::from_array(([batch, seq_len], input_ids.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array(([batch, seq_len], attention_mask.into_boxed_slice()))?;

        let mut session = self.session.lock().map_err(|_| ModelError::Poisoned)?;
        let outputs = session.run(ort::inputs![
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor
        ])?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| ModelError::UnexpectedOutput("no output tensor".to_string()))?
            .1;

        let (shape, data) = output.try_extract_tensor::<f32>()?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        dense_vectors(&dims, data)
    }
}

/// Convert the model's first output into one dense vector per batch item.
///
/// `[batch, seq_len, hidden]` yields the CLS row of each item;
/// `[batch, hidden]` is already pooled.
pub fn dense_vectors(shape: &[i64], data: &[f32]) -> Result<Vec<Vec<f32>>, ModelError> {
    let dims: Vec<usize> = shape
        .iter()
        .map(|&d| usize::try_from(d))
        .collect::<Result<_, _>>()
        .map_err(|_| ModelError::UnexpectedOutput(format!("dynamic shape {:?}", shape)))?;

    let expected: usize = dims.iter().product();
    if data.len() != expected {
        return Err(ModelError::UnexpectedOutput(format!(
            "shape {:?} needs {} values, got {}",
            shape,
            expected,
            data.len()
        )));
    }

    match dims.as_slice() {
        [batch, seq_len, hidden] => {
            if *seq_len == 0 {
                return Err(ModelError::UnexpectedOutput("zero-length sequence".to_string()));
            }
            let stride = seq_len * hidden;
            Ok((0..*batch)
                .map(|b| data[b * stride..b * stride + hidden].to_vec())
                .collect())
        }
        [_, hidden] => {
            if *hidden == 0 {
                return Err(ModelError::UnexpectedOutput("zero hidden size".to_string()));
            }
            Ok(data.chunks(*hidden).map(<[f32]>::to_vec).collect())
        }
        _ => Err(ModelError::UnexpectedOutput(format!(
            "unexpected output tensor shape: {:?}",
            shape
        ))),
    }
}

#[async_trait]
impl EmbeddingModel for LocalEmbeddingClient {
    async fn encode(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for micro_batch in texts.chunks(batch_size.max(1)) {
            debug!("Running inference on {} texts", micro_batch.len());
            embeddings.extend(self.run_batch_inference(micro_batch)?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}
