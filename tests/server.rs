//! End-to-end tests of the web front end with a stub network.

use std::io::Cursor;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::Engine;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use ndarray::Array4;
use tower::ServiceExt;

use colorizer::image::{ChromaTensor, LightnessTensor};
use colorizer::model::ChromaNetwork;
use colorizer::pipeline::Fingerprint;
use colorizer::server::{self, DEFAULT_UPLOAD_LIMIT};
use colorizer::{Config, Pipeline, Result};

const BOUNDARY: &str = "colorizer-test-boundary";

/// Tints everything toward blue at the working resolution.
struct BlueTint;

impl ChromaNetwork for BlueTint {
    fn predict(&self, lightness: &LightnessTensor) -> Result<ChromaTensor> {
        let (_, _, height, width) = lightness.dim();
        let mut chroma = Array4::zeros((1, 2, height, width));
        chroma.slice_mut(ndarray::s![0, 1, .., ..]).fill(-40.0);
        Ok(chroma)
    }

    fn name(&self) -> &str {
        "blue-tint"
    }
}

fn app() -> Router {
    app_with(Config::default(), DEFAULT_UPLOAD_LIMIT)
}

fn app_with(config: Config, upload_limit: usize) -> Router {
    let pipeline = Pipeline::with_network(config, BlueTint).unwrap();
    server::router(Arc::new(pipeline), upload_limit)
}

/// A 512x512 grayscale checkerboard with a diagonal ramp.
fn test_pattern_png() -> Vec<u8> {
    checkerboard_png(64)
}

fn checkerboard_png(square: u32) -> Vec<u8> {
    let img = GrayImage::from_fn(512, 512, |x, y| {
        let check = ((x / square) + (y / square)) % 2 == 0;
        let ramp = ((x + y) / 4) as u8;
        Luma([if check { ramp } else { 255 - ramp }])
    });

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn multipart_request(field: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"pattern.png\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/colorize")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Decode the PNG behind the page's download link.
fn download_link_png(html: &str) -> Vec<u8> {
    let anchor = html.find("download=\"colorized_image.png\"").expect("download link");
    let prefix = "href=\"data:image/png;base64,";
    let start = html[..anchor].rfind(prefix).expect("data URI") + prefix.len();
    let end = html[start..].find('"').unwrap() + start;

    base64::engine::general_purpose::STANDARD
        .decode(&html[start..end])
        .unwrap()
}

fn fingerprint_of(png: &[u8]) -> Fingerprint {
    let pixels = colorizer::image::fix_channels(colorizer::image::decode_image(png).unwrap());
    Fingerprint::of(&pixels.unwrap())
}

fn assert_blue_512(png: &[u8]) {
    let decoded = image::load_from_memory(png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (512, 512));
    let rgb = decoded.as_rgb8().expect("8-bit RGB output");
    let pixel = rgb.get_pixel(100, 300);
    assert!(pixel[2] > pixel[0], "expected a blue tint, got {pixel:?}");
}

#[tokio::test]
async fn test_index_serves_upload_form() {
    let response = app()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Please upload an image."));
    assert!(html.contains("enctype=\"multipart/form-data\""));
}

#[tokio::test]
async fn test_upload_then_download_png() {
    let app = app();

    let response = app
        .clone()
        .oneshot(multipart_request("file", &test_pattern_png()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("Colorized Image"));
    assert!(html.contains("Input Image"));
    let embedded = download_link_png(&html);
    assert_blue_512(&embedded);

    let link = format!("/download/{}", fingerprint_of(&test_pattern_png()));
    let response = app
        .oneshot(Request::get(link.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"colorized_image.png\""
    );

    let png = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(png.as_ref(), embedded.as_slice());
}

#[tokio::test]
async fn test_download_link_outlives_cache_eviction() {
    let config = Config {
        cache_capacity: 1,
        ..Config::default()
    };
    let app = app_with(config, DEFAULT_UPLOAD_LIMIT);

    let first = app
        .clone()
        .oneshot(multipart_request("file", &checkerboard_png(64)))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_html = body_text(first).await;

    let second = app
        .clone()
        .oneshot(multipart_request("file", &checkerboard_png(32)))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    // The first result is gone from the cache...
    let evicted = format!("/download/{}", fingerprint_of(&checkerboard_png(64)));
    let response = app
        .oneshot(Request::get(evicted.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // ...but its page still downloads it
    assert_blue_512(&download_link_png(&first_html));
}

#[tokio::test]
async fn test_oversized_upload_is_payload_too_large() {
    let response = app_with(Config::default(), 1024)
        .oneshot(multipart_request("file", &test_pattern_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let html = body_text(response).await;
    assert!(html.contains("invalid upload"));
}

#[tokio::test]
async fn test_corrupt_upload_is_bad_request() {
    let response = app()
        .oneshot(multipart_request("file", b"\x89PNG but not really"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("failed to decode image"));
}

#[tokio::test]
async fn test_missing_file_field_is_bad_request() {
    let response = app()
        .oneshot(multipart_request("picture", &test_pattern_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_download_is_not_found() {
    let response = app()
        .oneshot(
            Request::get("/download/00000000deadbeef")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_download_id_is_bad_request() {
    let response = app()
        .oneshot(Request::get("/download/zzz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
