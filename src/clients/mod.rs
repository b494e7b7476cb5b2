//! Embedding clients module.

pub mod device;
pub mod local;
pub mod mock;

pub use device::Device;
pub use local::{LocalEmbeddingClient, LocalModelConfig};
pub use mock::MockEmbeddingClient;
