//! Model locating, downloading and loading utilities.

use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indicatif::{ProgressBar, ProgressStyle};
use ort::session::Session;

use crate::error::{Error, Result};

use super::Device;

/// Pretrained colorization networks the pipeline knows how to feed.
///
/// Both take L* at the working resolution and return unnormalized a*/b*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    /// Real-time user-guided colorization network (SIGGRAPH 2017), run without hints.
    #[default]
    Siggraph17,
    /// Classification-based colorization network (ECCV 2016).
    Eccv16,
}

impl ModelKind {
    /// Get the cached filename for this model kind.
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::Siggraph17 => "colorizer_siggraph17.onnx",
            Self::Eccv16 => "colorizer_eccv16.onnx",
        }
    }

    /// Short name used in logs and on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Siggraph17 => "siggraph17",
            Self::Eccv16 => "eccv16",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "siggraph17" => Ok(Self::Siggraph17),
            "eccv16" => Ok(Self::Eccv16),
            _ => Err(format!("unknown model `{s}`, expected siggraph17 or eccv16")),
        }
    }
}

/// Manages the model cache directory and downloads.
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a model cache in the platform cache directory.
    ///
    /// - Windows: `%LOCALAPPDATA%\colorizer\models`
    /// - Linux: `~/.cache/colorizer/models`
    /// - macOS: `~/Library/Caches/colorizer/models`
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new() -> Result<Self> {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_dir(base.join("colorizer").join("models"))
    }

    /// Create a model cache rooted at `cache_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_dir<P: Into<PathBuf>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.into();

        fs::create_dir_all(&cache_dir).map_err(|source| Error::CacheDir {
            path: cache_dir.clone(),
            source,
        })?;

        Ok(Self { cache_dir })
    }

    /// Directory cached models live in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the path to a model file, downloading it from `url` if it is not cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelNotFound`] if the file is missing and no URL is given,
    /// or a download error.
    pub fn get_model_path(&self, kind: ModelKind, url: Option<&str>) -> Result<PathBuf> {
        let path = self.cache_dir.join(kind.filename());

        if !path.exists() {
            let Some(url) = url else {
                return Err(Error::ModelNotFound {
                    name: kind.name().to_string(),
                    path,
                });
            };
            download_file(url, &path, kind.filename())?;
        }

        Ok(path)
    }
}

/// Load an ONNX session from `path` on the given device.
///
/// # Errors
///
/// Returns [`Error::ModelNotFound`] if the file does not exist and
/// [`Error::ModelLoad`] if the runtime rejects the model or the device.
pub fn load_session(path: &Path, device: Device) -> Result<Session> {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    if !path.is_file() {
        return Err(Error::ModelNotFound {
            name,
            path: path.to_path_buf(),
        });
    }

    let model_load = |source| Error::ModelLoad {
        name: name.clone(),
        source,
    };

    let builder = Session::builder().map_err(model_load)?;
    device
        .configure(builder)
        .map_err(model_load)?
        .commit_from_file(path)
        .map_err(model_load)
}

/// Download a file from a URL to a path with progress indication.
fn download_file(url: &str, path: &Path, name: &str) -> Result<()> {
    tracing::info!("Downloading {name} from {url}");

    let model_download = |source| Error::ModelDownload {
        name: name.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::new();
    let mut response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(model_download)?;

    let pb = response
        .content_length()
        .map_or_else(ProgressBar::new_spinner, ProgressBar::new);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {name}"));

    write_model(&mut response, path, &pb)?;
    pb.finish_with_message(format!("Downloaded {name}"));

    Ok(())
}

/// Stream `reader` into `path` through a temporary file.
///
/// On failure the temporary file is removed and `path` is left untouched.
fn write_model<R: Read>(reader: &mut R, path: &Path, pb: &ProgressBar) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let written = copy_to(reader, &temp_path, pb).and_then(|()| fs::rename(&temp_path, path));
    if let Err(source) = written {
        if let Err(err) = fs::remove_file(&temp_path) {
            tracing::debug!("could not remove {}: {err}", temp_path.display());
        }
        return Err(Error::ModelWrite {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(())
}

fn copy_to<R: Read>(reader: &mut R, path: &Path, pb: &ProgressBar) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;

    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])?;
        pb.inc(bytes_read as u64);
    }
    file.flush()
}
