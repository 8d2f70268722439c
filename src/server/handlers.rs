//! HTTP handlers for the colorizer pages.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{Html, IntoResponse, Response},
};

use crate::error::{Error, ErrorKind};
use crate::image;
use crate::model::ChromaNetwork;
use crate::pipeline::{Fingerprint, Pipeline};

use super::{page, DOWNLOAD_FILENAME};

/// Name of the multipart field carrying the upload.
const UPLOAD_FIELD: &str = "file";

/// Everything a handler can fail with, rendered as an HTML error page.
#[derive(Debug)]
pub enum AppError {
    /// A pipeline failure; the status follows its [`ErrorKind`].
    Pipeline(Error),
    /// The multipart body could not be read; the status comes from the error (413 past the limit).
    Upload(MultipartError),
    /// The request itself is malformed.
    BadRequest(String),
    /// The requested result is not (or no longer) cached.
    NotFound(String),
    /// A worker thread panicked or was cancelled.
    Internal(String),
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self::Pipeline(err)
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::Upload(err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("worker failed: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Pipeline(err) => {
                let status = match err.kind() {
                    ErrorKind::Decode => StatusCode::BAD_REQUEST,
                    ErrorKind::Inference | ErrorKind::Startup | ErrorKind::Output => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.to_string())
            }
            Self::Upload(err) => (err.status(), format!("invalid upload: {}", err.body_text())),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            tracing::error!("{status}: {message}");
        } else {
            tracing::warn!("{status}: {message}");
        }

        (status, Html(page::error_page(status, &message))).into_response()
    }
}

/// Upload form.
pub async fn index() -> Html<String> {
    Html(page::upload_page())
}

/// Colorize the uploaded file and render it next to the input.
pub async fn colorize<N>(
    State(pipeline): State<Arc<Pipeline<N>>>,
    mut multipart: Multipart,
) -> Result<Html<String>, AppError>
where
    N: ChromaNetwork + 'static,
{
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD) {
            upload = Some(field.bytes().await?);
            break;
        }
    }

    let bytes = upload
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("Please choose an image to upload.".to_string()))?;
    tracing::debug!("received upload of {} bytes", bytes.len());

    // Inference is blocking; keep it off the async workers
    let colorized = tokio::task::spawn_blocking(move || {
        let colorized = pipeline.process_bytes(&bytes)?;
        let output_png = image::encode_png(&colorized.output)?;
        let input_png = image::encode_png(&colorized.input)?;
        Ok::<_, Error>((colorized.fingerprint, output_png, input_png))
    })
    .await??;

    let (fingerprint, output_png, input_png) = colorized;
    tracing::debug!("rendering result {fingerprint}");
    Ok(Html(page::result_page(&output_png, &input_png)))
}

/// Serve a cached result as a PNG attachment.
///
/// Only results still in the cache can be fetched here; the result page embeds its own copy.
pub async fn download<N>(
    State(pipeline): State<Arc<Pipeline<N>>>,
    Path(id): Path<String>,
) -> Result<Response, AppError>
where
    N: ChromaNetwork + 'static,
{
    let fingerprint: Fingerprint = id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("`{id}` is not a result id")))?;

    let output = pipeline.cached(fingerprint).ok_or_else(|| {
        AppError::NotFound("This result has expired. Please upload the image again.".to_string())
    })?;

    let png = tokio::task::spawn_blocking(move || image::encode_png(&output)).await??;

    Ok((
        [
            (CONTENT_TYPE, "image/png".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILENAME}\""),
            ),
        ],
        png,
    )
        .into_response())
}
