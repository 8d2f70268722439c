//! Model loading and the chroma network seam.

mod device;
mod loader;
mod network;

pub use device::Device;
pub use loader::{load_session, ModelCache, ModelKind};
pub use network::{ChromaNetwork, OnnxNetwork};
