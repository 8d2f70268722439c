//! Web front end: upload a picture, see it colorized, download the PNG.

mod handlers;
mod page;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::model::ChromaNetwork;
use crate::pipeline::Pipeline;

pub use handlers::AppError;

/// Default cap on the request body of an upload.
pub const DEFAULT_UPLOAD_LIMIT: usize = 32 * 1024 * 1024;

/// File name offered for the colorized download.
pub const DOWNLOAD_FILENAME: &str = "colorized_image.png";

/// Build the application router around a shared pipeline.
pub fn router<N>(pipeline: Arc<Pipeline<N>>, upload_limit: usize) -> Router
where
    N: ChromaNetwork + 'static,
{
    Router::new()
        .route("/", get(handlers::index))
        .route("/colorize", post(handlers::colorize::<N>))
        .route("/download/{fingerprint}", get(handlers::download::<N>))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(pipeline)
}

/// Serve the application on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve<N>(
    pipeline: Arc<Pipeline<N>>,
    addr: SocketAddr,
    upload_limit: usize,
) -> std::io::Result<()>
where
    N: ChromaNetwork + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(pipeline, upload_limit))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
