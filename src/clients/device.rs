//! Execution device selection.

use std::fmt;

use ort::execution_providers::{CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider};
use ort::session::Session;
use tracing::info;

/// Compute target the model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// NVIDIA GPU through the CUDA execution provider.
    Cuda,
    /// Apple Silicon through the CoreML execution provider.
    Mps,
    Cpu,
}

/// Highest priority first.
const PRIORITY: [Device; 3] = [Device::Cuda, Device::Mps, Device::Cpu];

impl Device {
    /// Probe the host and pick the best available device.
    ///
    /// An accelerator counts as present only if its execution provider
    /// registers on a session builder. Never fails: the CPU is always available.
    pub fn detect() -> Self {
        let device = Self::detect_with(|device| match device {
            Device::Cuda => registers(&CUDAExecutionProvider::default()),
            Device::Mps => {
                cfg!(target_os = "macos") && registers(&CoreMLExecutionProvider::default())
            }
            Device::Cpu => true,
        });
        match device {
            Device::Cuda => info!("CUDA available"),
            Device::Mps => info!("Apple Silicon MPS available"),
            Device::Cpu => info!("Using CPU fallback"),
        }
        device
    }

    /// Pick a device from an availability check for each accelerator.
    pub fn detect_with(mut present: impl FnMut(Device) -> bool) -> Self {
        let cuda = present(Device::Cuda);
        let mps = !cuda && present(Device::Mps);
        Self::select(cuda, mps)
    }

    /// Fixed priority: CUDA, then MPS, then CPU.
    pub fn select(cuda_available: bool, mps_available: bool) -> Self {
        if cuda_available {
            Device::Cuda
        } else if mps_available {
            Device::Mps
        } else {
            Device::Cpu
        }
    }

    /// This device followed by every lower-priority device worth trying here.
    pub fn fallback_chain(self) -> Vec<Device> {
        PRIORITY
            .iter()
            .copied()
            .skip_while(|d| *d != self)
            .filter(|d| *d == self || *d != Device::Mps || cfg!(target_os = "macos"))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Mps => "mps",
            Device::Cpu => "cpu",
        }
    }

    /// Accelerators run the half-precision export.
    pub fn prefers_fp16(&self) -> bool {
        !matches!(self, Device::Cpu)
    }
}

/// Whether the provider attaches to a throwaway session builder.
fn registers(provider: &impl ExecutionProvider) -> bool {
    Session::builder()
        .map(|mut builder| provider.register(&mut builder).is_ok())
        .unwrap_or(false)
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
