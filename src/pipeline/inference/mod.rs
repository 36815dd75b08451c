//! Inference: turn a staged image reference into LaTeX.
//!
//! The provider is an opaque capability behind [`InferenceClient`]. The only
//! production implementation is [`together::TogetherClient`]; tests supply
//! their own.

pub mod together;

use crate::config::ApiKey;
use crate::error::InferenceError;
use crate::pipeline::staging::ImageRef;
use async_trait::async_trait;

/// A vision model that reads an image and answers with LaTeX.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Convert the image at `image` to LaTeX using `credential`.
    ///
    /// Called at most once per conversion; implementations must not retry.
    /// The returned markup is passed to the caller verbatim.
    async fn convert(&self, image: &ImageRef, credential: &ApiKey)
        -> Result<String, InferenceError>;
}
