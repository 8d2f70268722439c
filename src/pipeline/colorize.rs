//! Main colorization pipeline.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::image::{self, PixelArray, WORKING_SIZE};
use crate::model::{ChromaNetwork, Device, ModelCache, ModelKind, OnnxNetwork};

use super::cache::{CacheStats, Fingerprint, ResultCache};

/// Configuration for the colorization pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Which pretrained network to load from the model cache.
    pub model_kind: ModelKind,

    /// Explicit ONNX file to load instead of the cached one.
    pub model_path: Option<PathBuf>,

    /// Where to download the model from when it is not cached yet.
    pub model_url: Option<String>,

    /// Execution device for inference.
    pub device: Device,

    /// Maximum number of colorized results kept in memory.
    pub cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_kind: ModelKind::default(),
            model_path: None,
            model_url: None,
            device: Device::Auto,
            cache_capacity: 32,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(Error::InvalidParameter {
                name: "cache_capacity".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if let Some(url) = &self.model_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::InvalidParameter {
                    name: "model_url".to_string(),
                    reason: "must be an http or https URL".to_string(),
                });
            }
        }

        Ok(())
    }

    fn cache_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.cache_capacity).ok_or_else(|| Error::InvalidParameter {
            name: "cache_capacity".to_string(),
            reason: "must be greater than 0".to_string(),
        })
    }
}

/// A decoded upload together with its colorized result.
#[derive(Debug, Clone)]
pub struct Colorized {
    /// Cache key of the normalized input.
    pub fingerprint: Fingerprint,
    /// The input after channel normalization.
    pub input: PixelArray,
    /// The colorized image, same height and width as `input`.
    pub output: Arc<PixelArray>,
}

/// Loaded network plus result cache.
///
/// A `Pipeline` only exists once its network is loaded, so every value is ready
/// to serve. It is `Send + Sync` and meant to be shared behind an `Arc`.
pub struct Pipeline<N = OnnxNetwork> {
    config: Config,
    network: N,
    cache: ResultCache,
}

impl Pipeline<OnnxNetwork> {
    /// Create a new pipeline with the given configuration.
    ///
    /// This will download the model if a URL is configured and it is not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the model cannot be loaded.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tracing::info!("Initializing pipeline with config: {config:?}");

        let path = match &config.model_path {
            Some(path) => path.clone(),
            None => ModelCache::new()?
                .get_model_path(config.model_kind, config.model_url.as_deref())?,
        };

        tracing::info!("Loading {} from {}...", config.model_kind, path.display());
        let network = OnnxNetwork::load(&path, config.device)?;
        if network.device().is_accelerated() {
            tracing::info!("Inference runs on {}", network.device());
        }

        Self::with_network(config, network)
    }
}

impl<N: ChromaNetwork> Pipeline<N> {
    /// Create a pipeline around an already loaded network.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_network(config: Config, network: N) -> Result<Self> {
        config.validate()?;
        let cache = ResultCache::new(config.cache_capacity()?);

        tracing::info!("Pipeline initialized successfully with {}", network.name());

        Ok(Self {
            config,
            network,
            cache,
        })
    }

    /// The configuration this pipeline was built with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying network.
    #[must_use]
    pub const fn network(&self) -> &N {
        &self.network
    }

    /// Colorize a three-channel image, bypassing the cache.
    ///
    /// The result has the same height and width as the input, whatever its size
    /// relative to the working resolution.
    ///
    /// # Errors
    ///
    /// Returns an inference-kind error if the image is not three-channel or empty,
    /// or if the network fails.
    pub fn colorize(&self, pixels: &PixelArray) -> Result<PixelArray> {
        let started = Instant::now();

        let (native, working) = image::to_lightness(pixels, (WORKING_SIZE, WORKING_SIZE))?;
        tracing::debug!(
            "lightness native {:?}, working {:?}",
            native.shape(),
            working.shape()
        );

        let chroma = self.network.predict(&working)?;
        tracing::debug!("chroma prediction {:?}", chroma.shape());

        let colorized = image::from_lightness_and_chroma(&native, &chroma)?;
        tracing::debug!("colorized in {:?}", started.elapsed());

        Ok(colorized)
    }

    /// Colorize through the result cache.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::colorize`]; failures are not cached.
    pub fn colorize_cached(&self, pixels: &PixelArray) -> Result<(Fingerprint, Arc<PixelArray>)> {
        self.cache.get_or_compute(pixels, |input| self.colorize(input))
    }

    /// Render the lightness-only comparison image through the same reconstruction
    /// path as [`Pipeline::colorize`].
    ///
    /// # Errors
    ///
    /// Returns an error if the image is not a non-empty three-channel image.
    pub fn grayscale(&self, pixels: &PixelArray) -> Result<PixelArray> {
        image::grayscale_rendition(pixels)
    }

    /// Decode uploaded bytes, normalize channels, and colorize through the cache.
    ///
    /// # Errors
    ///
    /// Returns a decode-kind error for bytes that are not an image, otherwise as
    /// [`Pipeline::colorize_cached`].
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<Colorized> {
        let input = image::fix_channels(image::decode_image(bytes)?)?;
        let (height, width, _) = input.dim();
        tracing::info!("Colorizing {width}x{height} upload");

        let (fingerprint, output) = self.colorize_cached(&input)?;

        Ok(Colorized {
            fingerprint,
            input,
            output,
        })
    }

    /// Look up a previously colorized result.
    #[must_use]
    pub fn cached(&self, fingerprint: Fingerprint) -> Option<Arc<PixelArray>> {
        self.cache.get(fingerprint)
    }

    /// Result cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Colorize an image file and write the result as PNG.
    ///
    /// # Arguments
    ///
    /// * `input_path` - Path to the input image
    /// * `output_path` - Path to save the colorized PNG
    ///
    /// # Errors
    ///
    /// Returns an error if loading, colorizing or saving fails.
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> Result<PixelArray> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        tracing::info!("Processing image: {}", input_path.display());
        let input = image::fix_channels(image::load_image(input_path)?)?;

        let (_, output) = self.colorize_cached(&input)?;

        tracing::info!("Saving output to: {}", output_path.display());
        image::save_png(&output, output_path)?;

        tracing::info!("Processing complete");
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ndarray::{Array3, Array4};

    use crate::error::ErrorKind;
    use crate::image::{ChromaTensor, LightnessTensor};

    /// Predicts a fixed warm tint at a coarse resolution and counts calls.
    struct WarmTint {
        calls: AtomicUsize,
    }

    impl WarmTint {
        const fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ChromaNetwork for WarmTint {
        fn predict(&self, lightness: &LightnessTensor) -> Result<ChromaTensor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(lightness.shape(), &[1, 1, 256, 256]);

            let mut chroma = Array4::zeros((1, 2, 64, 64));
            chroma.index_axis_mut(ndarray::Axis(1), 0).fill(20.0);
            chroma.index_axis_mut(ndarray::Axis(1), 1).fill(40.0);
            Ok(chroma)
        }

        fn name(&self) -> &str {
            "warm-tint"
        }
    }

    fn pipeline() -> Pipeline<WarmTint> {
        Pipeline::with_network(Config::default(), WarmTint::new()).unwrap()
    }

    fn gradient(height: usize, width: usize) -> PixelArray {
        let gray = Array3::from_shape_fn((height, width, 1), |(y, x, _)| ((x + y) % 256) as u8);
        image::fix_channels(gray).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let zero = Config {
            cache_capacity: 0,
            ..Config::default()
        };
        assert_eq!(zero.validate().unwrap_err().kind(), ErrorKind::Startup);

        let ftp = Config {
            model_url: Some("ftp://example.invalid/model.onnx".to_string()),
            ..Config::default()
        };
        assert!(ftp.validate().is_err());
    }

    #[test]
    fn test_new_fails_fast_on_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            model_path: Some(dir.path().join("missing.onnx")),
            device: Device::Cpu,
            ..Config::default()
        };

        let err = Pipeline::new(config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Startup);
    }

    #[test]
    fn test_colorize_keeps_native_resolution() {
        let pipeline = pipeline();
        let input = gradient(512, 512);

        let output = pipeline.colorize(&input).unwrap();
        assert_eq!(output.dim(), (512, 512, 3));

        // Warm tint: red above blue wherever the pixel is not clipped to black or white.
        let (r, b) = (output[[200, 200, 0]], output[[200, 200, 2]]);
        assert!(r > b, "r={r} b={b}");
    }

    #[test]
    fn test_colorize_small_input_upsamples_chroma() {
        let pipeline = pipeline();
        let input = gradient(17, 33);

        let output = pipeline.colorize(&input).unwrap();
        assert_eq!(output.dim(), (17, 33, 3));
    }

    #[test]
    fn test_colorize_is_deterministic() {
        let pipeline = pipeline();
        let input = gradient(100, 80);

        assert_eq!(
            pipeline.colorize(&input).unwrap(),
            pipeline.colorize(&input).unwrap()
        );
    }

    #[test]
    fn test_colorize_rejects_single_channel() {
        let pipeline = pipeline();
        let gray = Array3::<u8>::zeros((10, 10, 1));

        let err = pipeline.colorize(&gray).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);
        assert_eq!(pipeline.network().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cached_colorize_runs_network_once() {
        let pipeline = pipeline();
        let input = gradient(64, 64);

        let (fp1, first) = pipeline.colorize_cached(&input).unwrap();
        let (fp2, second) = pipeline.colorize_cached(&input.clone()).unwrap();

        assert_eq!(fp1, fp2);
        assert_eq!(first, second);
        assert_eq!(pipeline.network().calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.cached(fp1).as_deref(), Some(&*first));
        assert_eq!(pipeline.cache_stats().hits, 1);
    }

    #[test]
    fn test_grayscale_and_rgb_uploads_share_a_result() {
        let pipeline = pipeline();
        let gray = Array3::from_shape_fn((8, 8, 1), |(y, x, _)| (y * 8 + x) as u8);

        let png = |pixels: &PixelArray| {
            let (h, w, c) = pixels.dim();
            let raw = pixels.iter().copied().collect();
            let img = if c == 1 {
                ::image::DynamicImage::ImageLuma8(
                    ::image::GrayImage::from_raw(w as u32, h as u32, raw).unwrap(),
                )
            } else {
                ::image::DynamicImage::ImageRgb8(
                    ::image::RgbImage::from_raw(w as u32, h as u32, raw).unwrap(),
                )
            };
            let mut buf = Cursor::new(Vec::new());
            img.write_to(&mut buf, ::image::ImageFormat::Png).unwrap();
            buf.into_inner()
        };

        let from_gray = pipeline.process_bytes(&png(&gray)).unwrap();
        let rgb = image::fix_channels(gray).unwrap();
        let from_rgb = pipeline.process_bytes(&png(&rgb)).unwrap();

        assert_eq!(from_gray.fingerprint, from_rgb.fingerprint);
        assert_eq!(from_gray.input, rgb);
        assert_eq!(pipeline.network().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_process_bytes_rejects_garbage() {
        let pipeline = pipeline();
        let err = pipeline.process_bytes(b"\x00\x01not an image").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(pipeline.cache_stats().misses, 0);
    }

    #[test]
    fn test_grayscale_rendition_matches_input_luminance() {
        let pipeline = pipeline();
        let input = gradient(20, 20);

        let gray = pipeline.grayscale(&input).unwrap();
        for (got, want) in gray.iter().zip(input.iter()) {
            assert!(got.abs_diff(*want) <= 1);
        }
    }

    #[test]
    fn test_process_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("in.png");
        let output_path = dir.path().join("colorized.png");
        std::fs::write(&input_path, image::encode_png(&gradient(30, 40)).unwrap()).unwrap();

        let pipeline = pipeline();
        let input = pipeline.process(&input_path, &output_path).unwrap();

        let output = image::load_image(&output_path).unwrap();
        assert_eq!(input.dim(), (30, 40, 3));
        assert_eq!(output.dim(), (30, 40, 3));
    }
}
