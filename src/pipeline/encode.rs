//! Image encoding: staged image → `ImageData` for the vision model.
//!
//! A tmpfiles.org reference is passed through as a URL the provider fetches
//! itself. A file staged on our own disk is not reachable by the provider, so
//! its bytes are sent inline as base64 and the provider wraps them in a
//! `data:` URI.

use crate::pipeline::staging::ImageRef;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::path::Path;
use tracing::debug;

/// Wrap raw bytes as base64 `ImageData`.
pub fn encode_bytes(bytes: &[u8], content_type: &str) -> ImageData {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, content_type)
}

/// Read a staged file and encode it.
pub async fn encode_file(path: &Path, content_type: &str) -> std::io::Result<ImageData> {
    let bytes = tokio::fs::read(path).await?;
    Ok(encode_bytes(&bytes, content_type))
}

/// Turn a staged reference into the image attachment for the request.
pub async fn image_data_for(image: &ImageRef) -> std::io::Result<ImageData> {
    match image {
        ImageRef::Remote(url) => Ok(ImageData::from_url(url.as_str())),
        ImageRef::Local { path, content_type } => encode_file(path, content_type).await,
    }
}
