//! Image encoding and saving utilities.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbImage};

use crate::error::{Error, Result};

use super::{PixelArray, RGB_CHANNELS};

/// Encode a three-channel pixel array as PNG bytes.
///
/// # Errors
///
/// Returns an error if the array is not three-channel or the encoder fails.
pub fn encode_png(pixels: &PixelArray) -> Result<Vec<u8>> {
    let img = to_rgb_image(pixels)?;

    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|source| Error::ImageEncode { source })?;

    Ok(buffer.into_inner())
}

/// Save a three-channel pixel array as a PNG file, whatever the extension says.
///
/// # Errors
///
/// Returns an error if the array is not three-channel or the file cannot be written.
pub fn save_png<P: AsRef<Path>>(pixels: &PixelArray, path: P) -> Result<()> {
    let path = path.as_ref();

    to_rgb_image(pixels)?
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| Error::ImageSave {
            path: path.to_path_buf(),
            source,
        })
}

/// Copy a three-channel pixel array into an `image` RGB buffer.
///
/// # Errors
///
/// Returns [`Error::UnsupportedChannels`] unless the array has three channels.
#[allow(clippy::cast_possible_truncation)]
pub fn to_rgb_image(pixels: &PixelArray) -> Result<RgbImage> {
    let (height, width, channels) = pixels.dim();
    if channels != RGB_CHANNELS {
        return Err(Error::UnsupportedChannels {
            channels,
            expected: "3",
        });
    }

    // Safe: dimensions came from a u32-sized image or a tensor built from one
    RgbImage::from_raw(width as u32, height as u32, pixels.iter().copied().collect()).ok_or_else(
        || Error::ShapeMismatch {
            expected: format!("{width}x{height} RGB buffer"),
            actual: format!("{} bytes", pixels.len()),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::Array3;

    use crate::image::decode_image;

    #[test]
    fn test_png_keeps_dimensions_and_pixels() {
        let pixels = Array3::from_shape_fn((7, 11, 3), |(y, x, c)| (y * 11 + x + c) as u8);
        let png = encode_png(&pixels).unwrap();

        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
        assert_eq!(decode_image(&png).unwrap(), pixels);
    }

    #[test]
    fn test_encode_rejects_grayscale_array() {
        let gray = Array3::<u8>::zeros((4, 4, 1));
        assert!(matches!(
            encode_png(&gray).unwrap_err(),
            Error::UnsupportedChannels { channels: 1, .. }
        ));
    }

    #[test]
    fn test_save_png_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jpg");
        let pixels = Array3::<u8>::from_elem((3, 5, 3), 77);

        save_png(&pixels, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    }
}
