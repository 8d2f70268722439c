//! Image loading utilities.

use std::path::Path;

use image::DynamicImage;
use ndarray::{Array3, Axis};

use crate::error::{Error, Result};

use super::{PixelArray, RGB_CHANNELS};

/// Decode an encoded image (PNG, JPEG, ...) into a pixel array.
///
/// Grayscale images keep a single channel so that [`fix_channels`] decides how they
/// become RGB. Alpha is dropped and deeper bit depths are reduced to 8 bits.
///
/// # Errors
///
/// Returns [`Error::ImageDecode`] if the bytes are not a supported image.
pub fn decode_image(bytes: &[u8]) -> Result<PixelArray> {
    let img = image::load_from_memory(bytes).map_err(|source| Error::ImageDecode { source })?;
    image_to_array(img)
}

/// Load an image from disk into a pixel array.
///
/// # Errors
///
/// Returns [`Error::ImageLoad`] if the file cannot be read or decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<PixelArray> {
    let path = path.as_ref();

    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    image_to_array(img)
}

/// Normalize a pixel array to three channels.
///
/// A single-channel image is replicated across R, G and B. A three-channel image is
/// returned unchanged.
///
/// # Errors
///
/// Returns [`Error::UnsupportedChannels`] for any other channel count.
pub fn fix_channels(pixels: PixelArray) -> Result<PixelArray> {
    match pixels.dim().2 {
        1 => {
            let plane = pixels.view();
            ndarray::concatenate(Axis(2), &[plane, plane, plane]).map_err(|_| {
                Error::ShapeMismatch {
                    expected: "three stackable planes".to_string(),
                    actual: format!("{:?}", pixels.dim()),
                }
            })
        }
        RGB_CHANNELS => Ok(pixels),
        channels => Err(Error::UnsupportedChannels {
            channels,
            expected: "1 or 3",
        }),
    }
}

/// Convert a decoded image into HWC layout, keeping grayscale as one channel.
fn image_to_array(img: DynamicImage) -> Result<PixelArray> {
    let is_gray = matches!(
        img,
        DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
    );

    let (width, height, channels, raw) = if is_gray {
        let gray = img.into_luma8();
        let (width, height) = gray.dimensions();
        (width, height, 1, gray.into_raw())
    } else {
        let rgb = img.into_rgb8();
        let (width, height) = rgb.dimensions();
        (width, height, RGB_CHANNELS, rgb.into_raw())
    };

    Array3::from_shape_vec((height as usize, width as usize, channels), raw).map_err(|_| {
        Error::ShapeMismatch {
            expected: format!("{height}x{width}x{channels} pixel buffer"),
            actual: "buffer of a different length".to_string(),
        }
    })
}
