//! HTTP contract tests for `POST /api/latex`.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; the
//! collaborators are fakes that count their calls.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use edgequake_img2latex::{
    build_router, ApiKey, ErrorResponse, ImageRef, InferenceClient, InferenceError,
    LatexResponse, Pipeline, PipelineConfig, StagedImage, StagingError, StagingStore,
    UploadedImage,
};
use http_body_util::BodyExt;
use reqwest::Url;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const BOUNDARY: &str = "img2latex-test-boundary";
const STAGED_URL: &str = "https://tmpfiles.org/dl/42/eq.png";

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    staged: AtomicUsize,
    inferred: AtomicUsize,
}

struct FakeStore {
    counters: Arc<Counters>,
    fail: bool,
}

#[async_trait]
impl StagingStore for FakeStore {
    async fn upload(&self, _image: &UploadedImage) -> Result<StagedImage, StagingError> {
        self.counters.staged.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StagingError::Status { status: 500 });
        }
        Ok(StagedImage::remote(Url::parse(STAGED_URL).unwrap()))
    }
}

struct FakeInference {
    counters: Arc<Counters>,
    received: Mutex<Option<ImageRef>>,
}

#[async_trait]
impl InferenceClient for FakeInference {
    async fn convert(&self, image: &ImageRef, _key: &ApiKey) -> Result<String, InferenceError> {
        self.counters.inferred.fetch_add(1, Ordering::SeqCst);
        *self.received.lock().unwrap() = Some(image.clone());
        Ok("\\frac{1}{2}".to_string())
    }
}

struct App {
    router: Router,
    counters: Arc<Counters>,
    inference: Arc<FakeInference>,
}

fn app_with(staging_fails: bool, max_upload_bytes: usize) -> App {
    let counters = Arc::new(Counters::default());
    let store = Arc::new(FakeStore {
        counters: Arc::clone(&counters),
        fail: staging_fails,
    });
    let inference = Arc::new(FakeInference {
        counters: Arc::clone(&counters),
        received: Mutex::new(None),
    });
    let config = PipelineConfig::builder().api_key("k").build().unwrap();
    let pipeline = Pipeline::new(Arc::new(config), store, inference.clone());
    App {
        router: build_router(Arc::new(pipeline), max_upload_bytes),
        counters,
        inference,
    }
}

fn app(staging_fails: bool) -> App {
    app_with(staging_fails, 1024 * 1024)
}

// ── Request helpers ──────────────────────────────────────────────────────────

/// One multipart part: (field name, filename, content type, bytes).
type PartSpec<'a> = (&'a str, Option<&'a str>, Option<&'a str>, &'a [u8]);

fn multipart_body(parts: &[PartSpec<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{name}\"");
        if let Some(filename) = filename {
            disposition.push_str(&format!("; filename=\"{filename}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(ct) = content_type {
            body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(parts: &[PartSpec<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/latex")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

fn error_of(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorResponse>(body)
        .expect("error body")
        .error
}

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn valid_png_returns_latex() {
    let app = app(false);
    let request = multipart_request(&[("image", Some("eq.png"), Some("image/png"), PNG)]);
    let (status, body) = send(app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    let body: LatexResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(body.latex, "\\frac{1}{2}");
    assert_eq!(
        *app.inference.received.lock().unwrap(),
        Some(ImageRef::Remote(Url::parse(STAGED_URL).unwrap()))
    );
    assert_eq!(app.counters.staged.load(Ordering::SeqCst), 1);
    assert_eq!(app.counters.inferred.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_form_is_missing_input() {
    let app = app(false);
    let (status, body) = send(app.router, multipart_request(&[])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "No file provided");
    assert_eq!(app.counters.staged.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn other_fields_without_image_is_missing_input() {
    let app = app(false);
    let request = multipart_request(&[("caption", None, None, b"hello")]);
    let (status, body) = send(app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "No file provided");
}

#[tokio::test]
async fn non_multipart_request_is_missing_input() {
    let app = app(false);
    let request = Request::builder()
        .method("POST")
        .uri("/api/latex")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "No file provided");
}

#[tokio::test]
async fn multipart_without_boundary_is_invalid_form() {
    let app = app(false);
    let request = Request::builder()
        .method("POST")
        .uri("/api/latex")
        .header(header::CONTENT_TYPE, "multipart/form-data")
        .body(Body::from(multipart_body(&[(
            "image",
            Some("eq.png"),
            Some("image/png"),
            PNG,
        )])))
        .unwrap();
    let (status, body) = send(app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "Invalid form data.");
    assert_eq!(app.counters.staged.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn text_file_is_invalid_input_without_collaborator_calls() {
    let app = app(false);
    let request = multipart_request(&[(
        "image",
        Some("notes.txt"),
        Some("text/plain"),
        b"not an image",
    )]);
    let (status, body) = send(app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "Invalid file type. Please upload an image.");
    assert_eq!(app.counters.staged.load(Ordering::SeqCst), 0);
    assert_eq!(app.counters.inferred.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_image_content_type_is_invalid_input() {
    for content_type in ["image/", "image/ png"] {
        let app = app(false);
        let request =
            multipart_request(&[("image", Some("eq.png"), Some(content_type), PNG)]);
        let (status, body) = send(app.router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "content type {content_type:?}");
        assert_eq!(error_of(&body), "Invalid file type. Please upload an image.");
        assert_eq!(app.counters.staged.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn image_part_without_content_type_is_invalid_input() {
    let app = app(false);
    let request = multipart_request(&[("image", Some("eq.png"), None, PNG)]);
    let (status, body) = send(app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "Invalid file type. Please upload an image.");
}

#[tokio::test]
async fn staging_failure_is_500_and_skips_inference() {
    let app = app(true);
    let request = multipart_request(&[("image", Some("eq.png"), Some("image/png"), PNG)]);
    let (status, body) = send(app.router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_of(&body), "Failed to upload to temporary storage");
    assert_eq!(app.counters.staged.load(Ordering::SeqCst), 1);
    assert_eq!(app.counters.inferred.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_upload_is_rejected_as_400() {
    let app = app_with(false, 64);
    let big = vec![0u8; 4096];
    let request = multipart_request(&[("image", Some("big.png"), Some("image/png"), &big)]);
    let (status, body) = send(app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_of(&body), "Image is too large.");
    assert_eq!(app.counters.staged.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = app(false);
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
}
