//! HTTP front-end: `POST /api/latex`.
//!
//! The handler reads the multipart `image` field into an
//! [`UploadedImage`], runs the [`Pipeline`] and maps the outcome onto a
//! status code and a small JSON body:
//!
//! | Outcome | Status | Body |
//! |---------|--------|------|
//! | markup | 200 | `{"latex": "..."}` |
//! | `MissingInput`, `InvalidInput` | 400 | `{"error": "..."}` |
//! | `UpstreamUnavailable`, `ConversionFailed`, `Internal` | 500 | `{"error": "..."}` |
//!
//! Requests are independent: no retries, no queueing, no concurrency limit.

use crate::convert::Pipeline;
use crate::error::{ConversionError, ErrorKind};
use crate::pipeline::input::UploadedImage;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mime_guess::Mime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub const LATEX_PATH: &str = "/api/latex";
pub const HEALTHZ_PATH: &str = "/healthz";
/// Multipart field that carries the image.
pub const IMAGE_FIELD: &str = "image";
/// Default request body cap (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const MSG_TOO_LARGE: &str = "Image is too large.";
const MSG_BAD_FORM: &str = "Invalid form data.";

/// Success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatexResponse {
    pub latex: String,
}

/// Failure body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Build the router. `max_upload_bytes` caps the whole request body.
pub fn build_router(pipeline: Arc<Pipeline>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(LATEX_PATH, post(convert_latex))
        .route(HEALTHZ_PATH, get(healthz))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(AppState { pipeline })
}

/// Serve `router` on `listener` until Ctrl-C or SIGTERM.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

/// HTTP status for a failed conversion.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MissingInput | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::UpstreamUnavailable | ErrorKind::ConversionFailed | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ConversionError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        let body = ErrorResponse {
            error: self.message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse { status: "ok" })
}

async fn convert_latex(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<LatexResponse>, ConversionError> {
    let image = match multipart {
        Ok(mut multipart) => read_image_field(&mut multipart).await?,
        Err(rejection) if is_multipart(&headers) => {
            warn!("Unreadable multipart request: {}", rejection.body_text());
            return Err(ConversionError::new(ErrorKind::InvalidInput, MSG_BAD_FORM));
        }
        Err(rejection) => {
            // Not a multipart request at all: there is no image to look at.
            debug!("Request is not multipart: {}", rejection.body_text());
            None
        }
    };

    let latex = state.pipeline.convert(image).await?;
    Ok(Json(LatexResponse { latex }))
}

/// Find the first `image` field. Other fields are skipped.
async fn read_image_field(
    multipart: &mut Multipart,
) -> Result<Option<UploadedImage>, ConversionError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(err) => return Err(multipart_error(err)),
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string).unwrap_or_default();
        let content = field.bytes().await.map_err(multipart_error)?;

        let mut image = UploadedImage::new(content, content_type);
        image.filename = filename;
        return Ok(Some(image));
    }
}

/// True when the request declares a `multipart/*` body, boundary or not.
fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<Mime>().ok())
        .is_some_and(|mime| mime.type_().as_str().eq_ignore_ascii_case("multipart"))
}

fn multipart_error(err: MultipartError) -> ConversionError {
    let status = err.status();
    warn!("Failed to read multipart payload ({}): {}", status, err.body_text());
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ConversionError::new(ErrorKind::InvalidInput, MSG_TOO_LARGE)
    } else {
        ConversionError::new(ErrorKind::InvalidInput, MSG_BAD_FORM)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received; draining connections"),
        _ = terminate => info!("SIGTERM received; draining connections"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(status_for(ErrorKind::MissingInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::InvalidInput), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_errors_map_to_500() {
        for kind in [
            ErrorKind::UpstreamUnavailable,
            ErrorKind::ConversionFailed,
            ErrorKind::Internal,
        ] {
            assert_eq!(status_for(kind), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn multipart_detection_ignores_boundary() {
        let mut headers = HeaderMap::new();
        assert!(!is_multipart(&headers));
        headers.insert(header::CONTENT_TYPE, "multipart/form-data".parse().unwrap());
        assert!(is_multipart(&headers));
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(!is_multipart(&headers));
    }

    #[test]
    fn conversion_error_response_has_error_body() {
        let response = ConversionError::missing_input().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
