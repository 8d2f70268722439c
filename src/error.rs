//! Custom error types for colorizer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the colorizer library.
#[derive(Error, Debug)]
pub enum Error {
    /// Uploaded or in-memory bytes are not a decodable image.
    #[error("failed to decode image: {source}")]
    ImageDecode {
        #[source]
        source: image::ImageError,
    },

    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to encode an image to PNG.
    #[error("failed to encode image: {source}")]
    ImageEncode {
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The pixel array has a channel count the pipeline cannot handle.
    #[error("unsupported channel count {channels}: expected {expected}")]
    UnsupportedChannels { channels: usize, expected: &'static str },

    /// Image dimensions are not supported.
    #[error("unsupported image dimensions {width}x{height}: {reason}")]
    UnsupportedDimensions {
        width: usize,
        height: usize,
        reason: String,
    },

    /// No model file on disk and nowhere to download it from.
    #[error("model {name} not found at {path} and no download URL configured")]
    ModelNotFound { name: String, path: PathBuf },

    /// Failed to download a model.
    #[error("failed to download model {name}: {source}")]
    ModelDownload {
        name: String,
        #[source]
        source: reqwest::Error,
    },

    /// Failed to write a downloaded model to disk.
    #[error("failed to write model to {path}: {source}")]
    ModelWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// Failed to create cache directory.
    #[error("failed to create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

/// Coarse classification of an [`Error`], used to decide how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input bytes are not an image. The user has to upload something else.
    Decode,
    /// The image could not be turned into the network's tensor layout, or the runtime failed.
    Inference,
    /// The model or configuration could not be brought up. Fatal at startup.
    Startup,
    /// Encoding, saving, or other IO on the way out.
    Output,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ImageDecode { .. } | Self::ImageLoad { .. } => ErrorKind::Decode,
            Self::UnsupportedChannels { .. }
            | Self::UnsupportedDimensions { .. }
            | Self::Inference { .. }
            | Self::ShapeMismatch { .. } => ErrorKind::Inference,
            Self::ModelNotFound { .. }
            | Self::ModelDownload { .. }
            | Self::ModelWrite { .. }
            | Self::ModelLoad { .. }
            | Self::CacheDir { .. }
            | Self::InvalidParameter { .. } => ErrorKind::Startup,
            Self::ImageEncode { .. } | Self::ImageSave { .. } | Self::Io(_) => ErrorKind::Output,
        }
    }
}

/// Result type alias for colorizer operations.
pub type Result<T> = std::result::Result<T, Error>;
