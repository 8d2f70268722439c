//! The chroma-predicting network and its ONNX runtime implementation.

use std::path::Path;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::image::{ChromaTensor, LightnessTensor};

use super::{load_session, Device};

/// A network that predicts a*/b* from L*.
///
/// Implementations must be deterministic: the same lightness tensor always
/// yields the same chroma.
pub trait ChromaNetwork: Send + Sync {
    /// Predict chroma `(1, 2, h, w)` for lightness `(1, 1, H, W)` in [0, 100].
    ///
    /// # Errors
    ///
    /// Returns an error if the input layout is rejected or the forward pass fails.
    fn predict(&self, lightness: &LightnessTensor) -> Result<ChromaTensor>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// A colorization network exported to ONNX.
///
/// The exported graph takes raw L* and returns unnormalized a*/b*; the
/// `(L - 50) / 100` input scaling and `* 110` output scaling are part of the graph.
pub struct OnnxNetwork {
    session: Mutex<Session>,
    name: String,
    device: Device,
}

impl OnnxNetwork {
    /// Load the network from an ONNX file on the given device.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or the runtime cannot load it.
    pub fn load(path: &Path, device: Device) -> Result<Self> {
        let device = device.resolve();
        let session = load_session(path, device)?;

        let name = path
            .file_stem()
            .map_or_else(|| "colorizer".to_string(), |s| s.to_string_lossy().into_owned());

        tracing::info!("Loaded {name} on {device}");

        Ok(Self {
            session: Mutex::new(session),
            name,
            device,
        })
    }

    /// The device the session was configured for.
    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }
}

impl ChromaNetwork for OnnxNetwork {
    fn predict(&self, lightness: &LightnessTensor) -> Result<ChromaTensor> {
        let input_value =
            Tensor::from_array(lightness.clone()).map_err(|source| Error::Inference { source })?;

        // One forward pass at a time per session
        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "ab prediction output".to_string(),
                actual: "no output".to_string(),
            })?;

        extract_chroma(&output)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Copy the ab prediction back into host memory.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn extract_chroma(value: &ort::value::ValueRef<'_>) -> Result<ChromaTensor> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    // Safe: tensor dimensions are always non-negative and within bounds
    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

    chroma_from_raw(&dims, data)
}

/// Shape a flat output buffer into `(1, 2, h, w)` chroma.
fn chroma_from_raw(dims: &[usize], data: &[f32]) -> Result<ChromaTensor> {
    let &[n, c, h, w] = dims else {
        return Err(Error::ShapeMismatch {
            expected: "4D tensor".to_string(),
            actual: format!("{}D tensor", dims.len()),
        });
    };

    if n != 1 || c != 2 {
        return Err(Error::ShapeMismatch {
            expected: "(1, 2, h, w)".to_string(),
            actual: format!("{dims:?}"),
        });
    }

    Array4::from_shape_vec((n, c, h, w), data.to_vec()).map_err(|_| Error::ShapeMismatch {
        expected: format!("{dims:?}"),
        actual: format!("{} values", data.len()),
    })
}
