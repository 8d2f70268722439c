//! Conversions between RGB pixels and the CIE Lab tensors the network works with.
//!
//! The network only ever sees the L* channel. Its a*/b* prediction is recombined
//! with the full-resolution L* through [`from_lightness_and_chroma`], which is also
//! how the plain grayscale rendition is produced (with zeroed chroma).

use image::{
    imageops::{self, FilterType},
    ImageBuffer, Luma, RgbImage,
};
use ndarray::{s, Array2, Array3, Array4, ArrayView2};
use palette::{FromColor, IntoColor, Lab, LinSrgb, Srgb};

use crate::error::{Error, Result};

use super::{save::to_rgb_image, ChromaTensor, LightnessTensor, PixelArray, RGB_CHANNELS};

/// Chroma values are shifted into [0, 1] by this half-range before resampling.
/// The pretrained networks predict within +/-110.
const CHROMA_HALF_RANGE: f32 = 128.0;

/// Compute the L* channel at native resolution and at `target_size` (width, height).
///
/// The working-resolution channel is taken from the RGB image resized with a bicubic
/// filter, so both tensors describe the same picture.
///
/// # Errors
///
/// Returns [`Error::UnsupportedChannels`] if `pixels` is not three-channel and
/// [`Error::UnsupportedDimensions`] if the image or the target size is empty.
pub fn to_lightness(
    pixels: &PixelArray,
    target_size: (u32, u32),
) -> Result<(LightnessTensor, LightnessTensor)> {
    let rgb = checked_rgb(pixels)?;

    let (target_width, target_height) = target_size;
    if target_width == 0 || target_height == 0 {
        return Err(Error::UnsupportedDimensions {
            width: target_width as usize,
            height: target_height as usize,
            reason: "working size must be non-zero".to_string(),
        });
    }

    let native = rgb_to_lightness(&rgb);
    let resized = imageops::resize(&rgb, target_width, target_height, FilterType::CatmullRom);
    let working = rgb_to_lightness(&resized);

    Ok((native, working))
}

/// Rebuild an 8-bit RGB image from native L* and a chroma prediction.
///
/// The chroma may be at any resolution; each plane is resampled bilinearly to the
/// lightness resolution. Lab values that fall outside the sRGB gamut are clipped.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the tensors are not `(1, 1, H, W)` and
/// `(1, 2, h, w)`, and [`Error::UnsupportedDimensions`] if either is empty.
pub fn from_lightness_and_chroma(
    lightness: &LightnessTensor,
    chroma: &ChromaTensor,
) -> Result<PixelArray> {
    let (batch, channels, height, width) = lightness.dim();
    if batch != 1 || channels != 1 {
        return Err(Error::ShapeMismatch {
            expected: "lightness (1, 1, H, W)".to_string(),
            actual: format!("{:?}", lightness.shape()),
        });
    }

    let (chroma_batch, chroma_channels, chroma_height, chroma_width) = chroma.dim();
    if chroma_batch != 1 || chroma_channels != 2 {
        return Err(Error::ShapeMismatch {
            expected: "chroma (1, 2, h, w)".to_string(),
            actual: format!("{:?}", chroma.shape()),
        });
    }

    if height == 0 || width == 0 || chroma_height == 0 || chroma_width == 0 {
        return Err(Error::UnsupportedDimensions {
            width,
            height,
            reason: format!("cannot combine with {chroma_width}x{chroma_height} chroma"),
        });
    }

    let a = resize_plane(chroma.slice(s![0, 0, .., ..]), width, height)?;
    let b = resize_plane(chroma.slice(s![0, 1, .., ..]), width, height)?;

    let mut out = Array3::<u8>::zeros((height, width, RGB_CHANNELS));
    for ((y, x), &l) in lightness.slice(s![0, 0, .., ..]).indexed_iter() {
        let [r, g, bl] = lab_to_srgb8(l, a[[y, x]], b[[y, x]]);
        out[[y, x, 0]] = r;
        out[[y, x, 1]] = g;
        out[[y, x, 2]] = bl;
    }

    Ok(out)
}

/// All-zero chroma matching the resolution of `lightness`.
#[must_use]
pub fn zero_chroma(lightness: &LightnessTensor) -> ChromaTensor {
    let (_, _, height, width) = lightness.dim();
    Array4::zeros((1, 2, height, width))
}

/// Render an image as pure lightness, through the same path as a colorized result.
///
/// # Errors
///
/// Returns an error if `pixels` is not a non-empty three-channel image.
pub fn grayscale_rendition(pixels: &PixelArray) -> Result<PixelArray> {
    let lightness = rgb_to_lightness(&checked_rgb(pixels)?);
    from_lightness_and_chroma(&lightness, &zero_chroma(&lightness))
}

fn checked_rgb(pixels: &PixelArray) -> Result<RgbImage> {
    let (height, width, channels) = pixels.dim();
    if channels != RGB_CHANNELS {
        return Err(Error::UnsupportedChannels {
            channels,
            expected: "3",
        });
    }
    if height == 0 || width == 0 {
        return Err(Error::UnsupportedDimensions {
            width,
            height,
            reason: "image is empty".to_string(),
        });
    }
    to_rgb_image(pixels)
}

fn rgb_to_lightness(rgb: &RgbImage) -> LightnessTensor {
    let (width, height) = rgb.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 1, height as usize, width as usize));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        tensor[[0, 0, y as usize, x as usize]] = srgb8_to_lab(pixel.0).l;
    }

    tensor
}

fn srgb8_to_lab([r, g, b]: [u8; 3]) -> Lab {
    let linear: LinSrgb<f32> = Srgb::new(r, g, b).into_format::<f32>().into_linear();
    Lab::from_color(linear)
}

fn lab_to_srgb8(l: f32, a: f32, b: f32) -> [u8; 3] {
    let linear: LinSrgb<f32> = Lab::new(l, a, b).into_color();
    let srgb: Srgb<f32> = Srgb::from_linear(linear);
    [
        unit_to_u8(srgb.red),
        unit_to_u8(srgb.green),
        unit_to_u8(srgb.blue),
    ]
}

#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unit_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Bilinearly resample one chroma plane to `width` x `height`.
#[allow(clippy::cast_possible_truncation)]
fn resize_plane(plane: ArrayView2<'_, f32>, width: usize, height: usize) -> Result<Array2<f32>> {
    let (plane_height, plane_width) = plane.dim();
    if (plane_height, plane_width) == (height, width) {
        return Ok(plane.to_owned());
    }

    let shifted: Vec<f32> = plane
        .iter()
        .map(|&v| (v + CHROMA_HALF_RANGE) / (2.0 * CHROMA_HALF_RANGE))
        .collect();
    let buffer = ImageBuffer::<Luma<f32>, Vec<f32>>::from_raw(
        plane_width as u32,
        plane_height as u32,
        shifted,
    )
    .ok_or_else(|| Error::ShapeMismatch {
        expected: format!("{plane_width}x{plane_height} chroma plane"),
        actual: "buffer of a different length".to_string(),
    })?;

    let resized = imageops::resize(&buffer, width as u32, height as u32, FilterType::Triangle);
    let restored: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| v.mul_add(2.0 * CHROMA_HALF_RANGE, -CHROMA_HALF_RANGE))
        .collect();

    Array2::from_shape_vec((height, width), restored).map_err(|_| Error::ShapeMismatch {
        expected: format!("{width}x{height} resized plane"),
        actual: "reshape failed".to_string(),
    })
}
