//! Staging: persist uploaded bytes somewhere the inference provider can read.
//!
//! The provider takes an image *reference*, not a request body, so every
//! upload is first staged. Two backends implement [`StagingStore`]:
//!
//! * [`local::LocalDiskStore`]: a uniquely named file in a staging directory
//! * [`tmpfiles::TmpfilesStore`]: an upload to tmpfiles.org
//!
//! ## Artifact lifetime
//!
//! A store returns a [`StagedImage`], which owns whatever it created. Local
//! files are deleted when the `StagedImage` is dropped, so cleanup happens on
//! every exit path of a conversion: success, failure, deadline expiry, or the
//! request future being dropped because the client went away.

pub mod local;
pub mod tmpfiles;

use crate::config::StagingBackend;
use crate::error::{Img2LatexError, StagingError};
use crate::pipeline::input::UploadedImage;
use async_trait::async_trait;
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, warn};

/// A place to put an uploaded image for the duration of one conversion.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Stage `image` and return a reference the inference client can use.
    ///
    /// Called at most once per conversion; implementations must not retry.
    async fn upload(&self, image: &UploadedImage) -> Result<StagedImage, StagingError>;
}

/// Where a staged image can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// A file on this machine.
    Local { path: PathBuf, content_type: String },
    /// A URL the provider can fetch directly.
    Remote(Url),
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRef::Local { path, .. } => write!(f, "{}", path.display()),
            ImageRef::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// A staged image, owned by exactly one conversion.
///
/// Dropping it deletes the local artifact (if any). Deletion failures are
/// logged and otherwise ignored.
pub struct StagedImage {
    reference: ImageRef,
    artifact: Option<TempPath>,
}

impl StagedImage {
    /// A remote reference; nothing to clean up locally.
    pub fn remote(url: Url) -> Self {
        Self {
            reference: ImageRef::Remote(url),
            artifact: None,
        }
    }

    /// A local file, deleted when this value is dropped.
    pub fn local(artifact: TempPath, content_type: impl Into<String>) -> Self {
        Self {
            reference: ImageRef::Local {
                path: artifact.to_path_buf(),
                content_type: content_type.into(),
            },
            artifact: Some(artifact),
        }
    }

    pub fn reference(&self) -> &ImageRef {
        &self.reference
    }

    /// Path of the local artifact, if this image was staged on disk.
    pub fn local_path(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }
}

impl fmt::Debug for StagedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedImage")
            .field("reference", &self.reference)
            .field("owns_artifact", &self.artifact.is_some())
            .finish()
    }
}

impl Drop for StagedImage {
    fn drop(&mut self) {
        let Some(artifact) = self.artifact.take() else {
            return;
        };
        let path = artifact.to_path_buf();
        match artifact.close() {
            Ok(()) => debug!("Removed staged image {}", path.display()),
            Err(e) => warn!("Failed to remove staged image {}: {}", path.display(), e),
        }
    }
}

/// Instantiate the configured staging backend.
pub fn build_store(
    backend: &StagingBackend,
    client: reqwest::Client,
) -> Result<Arc<dyn StagingStore>, Img2LatexError> {
    match backend {
        StagingBackend::LocalDisk { dir } => Ok(Arc::new(local::LocalDiskStore::new(dir)?)),
        StagingBackend::Tmpfiles { endpoint } => {
            Ok(Arc::new(tmpfiles::TmpfilesStore::new(client, endpoint)?))
        }
    }
}
