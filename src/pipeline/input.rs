//! Input validation: the uploaded image and the checks it must pass before
//! any collaborator is contacted.
//!
//! Both checks are pure. A request that fails here costs no network call and
//! no disk write.

use crate::error::ConversionError;
use bytes::Bytes;
use mime_guess::Mime;
use std::fmt;
use tracing::debug;

/// Name used when the client did not send a filename.
pub const DEFAULT_FILENAME: &str = "image";

/// An image as received from the client.
#[derive(Clone)]
pub struct UploadedImage {
    /// Raw file bytes.
    pub content: Bytes,
    /// Declared media type, e.g. `image/png`.
    pub content_type: String,
    /// Original filename. Advisory only: used to name staged artifacts.
    pub filename: Option<String>,
}

impl UploadedImage {
    pub fn new(content: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// The client filename, or [`DEFAULT_FILENAME`] when absent or blank.
    pub fn filename_or_default(&self) -> &str {
        self.filename
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_FILENAME)
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("content", &format_args!("<{} bytes>", self.content.len()))
            .field("content_type", &self.content_type)
            .field("filename", &self.filename)
            .finish()
    }
}

/// True when `content_type` is a well-formed image media type (`image/…`).
///
/// Media types are case-insensitive, so `IMAGE/PNG` is accepted. Values the
/// staging upload could not send as a part header (`image/`, `image/ png`)
/// are rejected here.
pub fn is_image_content_type(content_type: &str) -> bool {
    content_type.trim().parse::<Mime>().is_ok_and(|mime| {
        mime.type_().as_str().eq_ignore_ascii_case("image")
            && !mime.subtype().as_str().is_empty()
    })
}

/// Run the presence and type checks, in that order.
///
/// A zero-byte payload counts as missing: browsers submit an empty part when
/// the file input was left blank.
pub fn validate(image: Option<UploadedImage>) -> Result<UploadedImage, ConversionError> {
    let image = match image {
        Some(image) if !image.is_empty() => image,
        _ => {
            debug!("Rejecting request: no image payload");
            return Err(ConversionError::missing_input());
        }
    };

    if !is_image_content_type(&image.content_type) {
        debug!(
            "Rejecting request: content-type {:?} is not an image",
            image.content_type
        );
        return Err(ConversionError::invalid_type());
    }

    Ok(image)
}
