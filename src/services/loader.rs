//! Startup model loading.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::{Device, LocalEmbeddingClient};
use crate::config::Config;
use crate::traits::EmbeddingModel;

/// Process-wide model state, built once at startup and read by every request.
#[derive(Clone, Default)]
pub struct ServerState {
    pub model: Option<Arc<dyn EmbeddingModel>>,
    pub device: Option<Device>,
}

impl ServerState {
    /// State with a model already constructed, e.g. a test stub.
    pub fn with_model(model: Arc<dyn EmbeddingModel>, device: Device) -> Self {
        Self {
            model: Some(model),
            device: Some(device),
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Device tag, or `unknown` before detection ran.
    pub fn device_tag(&self) -> &'static str {
        self.device.map(|d| d.as_str()).unwrap_or("unknown")
    }
}

/// Detect the device and try to load the model onto it.
///
/// If the session cannot be built on the detected device, lower-priority
/// devices are tried in turn and the one that worked is recorded. Never fails:
/// a load error is logged and leaves `model` empty, so the server still starts
/// and answers with mock embeddings.
pub fn load_model(config: &Config) -> ServerState {
    let detected = Device::detect();
    info!("Loading {} on {}...", config.model_name, detected);

    if let Err(e) = config.validate_model_files() {
        error!("Failed to load model: {}", e);
        return ServerState {
            model: None,
            device: Some(detected),
        };
    }

    let loaded = load_on_first_device(detected, |device| {
        LocalEmbeddingClient::new(config.to_local_model_config(), device)
    });

    match loaded {
        Ok((client, device)) => {
            info!("Model loaded successfully on {}", client.device());
            ServerState::with_model(Arc::new(client), device)
        }
        Err(e) => {
            error!("Failed to load model: {:#}", e);
            ServerState {
                model: None,
                device: Some(detected),
            }
        }
    }
}

/// Run `load` on `preferred` and then on each fallback device until one succeeds.
pub fn load_on_first_device<T, F>(preferred: Device, mut load: F) -> Result<(T, Device)>
where
    F: FnMut(Device) -> Result<T>,
{
    let mut last_error = None;
    for device in preferred.fallback_chain() {
        match load(device) {
            Ok(value) => return Ok((value, device)),
            Err(e) => {
                warn!("Could not load model on {}: {:#}", device, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("no device left to try")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_failure_degrades_to_mock() {
        let config = Config {
            model_path: "/nonexistent/model.onnx".to_string(),
            tokenizer_path: "/nonexistent/tokenizer.json".to_string(),
            ..Config::default()
        };
        let state = load_model(&config);
        assert!(!state.model_loaded());
        assert!(state.device.is_some());
    }

    #[test]
    fn test_failed_accelerator_falls_back_to_cpu() {
        let mut attempts = Vec::new();
        let (value, device) = load_on_first_device(Device::Cuda, |device| {
            attempts.push(device);
            if device == Device::Cpu {
                Ok("session")
            } else {
                Err(anyhow!("{} provider failed to register", device))
            }
        })
        .unwrap();

        assert_eq!(value, "session");
        assert_eq!(device, Device::Cpu);
        assert_eq!(attempts.first(), Some(&Device::Cuda));
        assert_eq!(attempts.last(), Some(&Device::Cpu));
    }

    #[test]
    fn test_working_accelerator_is_kept() {
        let (_, device) = load_on_first_device(Device::Cuda, |_| Ok(())).unwrap();
        assert_eq!(device, Device::Cuda);
    }

    #[test]
    fn test_every_device_failing_reports_last_error() {
        let err = load_on_first_device::<(), _>(Device::Mps, |device| {
            Err(anyhow!("no session on {}", device))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "no session on cpu");
    }

    #[test]
    fn test_empty_state_reports_unknown_device() {
        let state = ServerState::default();
        assert!(!state.model_loaded());
        assert_eq!(state.device_tag(), "unknown");
    }
}
