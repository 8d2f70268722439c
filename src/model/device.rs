//! Execution device selection for the ONNX runtime.

use std::fmt;
use std::str::FromStr;

use ort::session::builder::SessionBuilder;

/// Where the network runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// Use CUDA when it is compiled in and present, otherwise the CPU.
    #[default]
    Auto,
    /// Always run on the CPU.
    Cpu,
    /// Run on the given CUDA device. Fails at load time if CUDA is unusable.
    Cuda {
        /// CUDA device ordinal.
        device_id: i32,
    },
}

impl Device {
    /// Resolve [`Device::Auto`] to the device that will actually be used.
    #[must_use]
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto if cuda_available() => Self::Cuda { device_id: 0 },
            Self::Auto => Self::Cpu,
            other => other,
        }
    }

    /// Whether this device is an accelerator rather than the host CPU.
    #[must_use]
    pub const fn is_accelerated(self) -> bool {
        matches!(self, Self::Cuda { .. })
    }

    /// Register the execution providers for this device on a session builder.
    pub(crate) fn configure(self, builder: SessionBuilder) -> ort::Result<SessionBuilder> {
        match self.resolve() {
            Self::Cuda { device_id } => configure_cuda(builder, device_id),
            Self::Auto | Self::Cpu => Ok(builder),
        }
    }
}

#[cfg(feature = "cuda")]
fn cuda_available() -> bool {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

    CUDAExecutionProvider::default().is_available().unwrap_or(false)
}

#[cfg(not(feature = "cuda"))]
const fn cuda_available() -> bool {
    false
}

#[cfg(feature = "cuda")]
fn configure_cuda(builder: SessionBuilder, device_id: i32) -> ort::Result<SessionBuilder> {
    use ort::execution_providers::CUDAExecutionProvider;

    builder.with_execution_providers([CUDAExecutionProvider::default()
        .with_device_id(device_id)
        .build()
        .error_on_failure()])
}

#[cfg(not(feature = "cuda"))]
fn configure_cuda(_builder: SessionBuilder, _device_id: i32) -> ort::Result<SessionBuilder> {
    Err(ort::Error::new(
        "CUDA execution provider requested but the cuda feature is not enabled",
    ))
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda { device_id } => write!(f, "cuda:{device_id}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    /// Parses `auto`, `cpu`, `cuda` or `cuda:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda { device_id: 0 }),
            other => other
                .strip_prefix("cuda:")
                .and_then(|id| id.parse().ok())
                .map(|device_id| Self::Cuda { device_id })
                .ok_or_else(|| format!("unknown device `{s}`, expected auto, cpu, cuda or cuda:N")),
        }
    }
}
