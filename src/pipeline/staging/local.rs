//! Local-disk staging backend.
//!
//! Each upload becomes one file named
//! `img2latex-<unix-millis>-<random>-<sanitised filename>` inside the staging
//! directory. The file is created exclusively (`O_EXCL`), so two concurrent
//! conversions can never end up with the same path even when the timestamp
//! and the client filename coincide.

use super::{StagedImage, StagingStore};
use crate::error::{Img2LatexError, StagingError};
use crate::pipeline::input::UploadedImage;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const NAME_PREFIX: &str = "img2latex";
const RANDOM_LEN: usize = 8;
const MAX_NAME_LEN: usize = 64;

static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Stages uploads as files in a local directory.
#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    dir: PathBuf,
}

impl LocalDiskStore {
    /// Use `dir` for staged files. The directory must already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, Img2LatexError> {
        let dir = dir.as_ref().to_path_buf();
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(Self { dir }),
            Ok(_) => Err(Img2LatexError::StagingDirUnusable {
                path: dir,
                reason: "not a directory".into(),
            }),
            Err(e) => Err(Img2LatexError::StagingDirUnusable {
                path: dir,
                reason: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl StagingStore for LocalDiskStore {
    async fn upload(&self, image: &UploadedImage) -> Result<StagedImage, StagingError> {
        let dir = self.dir.clone();
        let content = image.content.clone();
        let prefix = format!("{}-{}-", NAME_PREFIX, unix_millis());
        let suffix = format!("-{}", sanitise_filename(image.filename_or_default()));

        // tempfile's API is synchronous; keep the write off the async workers.
        let artifact = tokio::task::spawn_blocking(move || -> std::io::Result<_> {
            let mut file = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(&suffix)
                .rand_bytes(RANDOM_LEN)
                .tempfile_in(&dir)?;
            file.write_all(&content)?;
            file.flush()?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(|e| StagingError::Io(std::io::Error::other(e)))??;

        debug!("Staged {} bytes to {}", image.len(), artifact.display());
        Ok(StagedImage::local(artifact, image.content_type.clone()))
    }
}

/// Reduce a client filename to a short, filesystem-safe component.
///
/// Directory separators and anything outside `[A-Za-z0-9._-]` collapse to
/// `_`; leading dots are stripped so the result is never hidden or `..`.
pub fn sanitise_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned = RE_UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');
    let truncated: String = cleaned.chars().take(MAX_NAME_LEN).collect();
    if truncated.is_empty() {
        crate::pipeline::input::DEFAULT_FILENAME.to_string()
    } else {
        truncated
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
