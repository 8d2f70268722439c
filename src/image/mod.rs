//! Image decoding, Lab conversion, and encoding utilities.

mod lab;
mod load;
mod save;

pub use lab::{from_lightness_and_chroma, grayscale_rendition, to_lightness, zero_chroma};
pub use load::{decode_image, fix_channels, load_image};
pub use save::{encode_png, save_png, to_rgb_image};

use ndarray::{Array3, Array4};

/// 8-bit pixels in HWC layout (height, width, channels).
/// Channels is 1 for grayscale and 3 for RGB.
pub type PixelArray = Array3<u8>;

/// CIE L* channel in NCHW layout (1, 1, height, width), values in [0, 100].
pub type LightnessTensor = Array4<f32>;

/// CIE a*/b* channels in NCHW layout (1, 2, height, width).
pub type ChromaTensor = Array4<f32>;

/// Side length of the square resolution the network works at.
pub const WORKING_SIZE: u32 = 256;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;
