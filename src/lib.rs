//! # colorizer
//!
//! Colorize grayscale images with a pretrained colorization network exported to ONNX.
//!
//! An image is converted to CIE Lab, its lightness is resized to the network's
//! 256x256 working resolution, and the predicted a*/b* channels are upsampled and
//! recombined with the full-resolution lightness. Results are memoized by a
//! fingerprint of the input pixels.
//!
//! ## Example
//!
//! ```no_run
//! use colorizer::{Config, Pipeline};
//!
//! # fn main() -> colorizer::Result<()> {
//! let config = Config::default();
//! let pipeline = Pipeline::new(config)?;
//!
//! pipeline.process("grayscale.png", "colorized.png")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;
pub mod server;

pub use error::{Error, ErrorKind, Result};
pub use pipeline::{Config, Pipeline};
