//! tmpfiles.org staging backend.
//!
//! tmpfiles.org keeps an upload for one hour and answers with a *landing*
//! page URL:
//!
//! ```text
//! {"status":"success","data":{"url":"https://tmpfiles.org/12345/eq.png"}}
//! ```
//!
//! The landing page is HTML. The raw file lives under the same path with a
//! leading `dl` segment (`https://tmpfiles.org/dl/12345/eq.png`), and that
//! is the form the inference provider must be given. The rewrite is
//! [`direct_download_url`].

use super::{StagedImage, StagingStore};
use crate::error::{Img2LatexError, StagingError};
use crate::pipeline::input::UploadedImage;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

/// Multipart field name expected by the tmpfiles.org API.
const FILE_FIELD: &str = "file";
const DOWNLOAD_SEGMENT: &str = "dl";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    status: Option<String>,
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

/// Stages uploads on tmpfiles.org.
#[derive(Debug, Clone)]
pub struct TmpfilesStore {
    client: reqwest::Client,
    endpoint: Url,
}

impl TmpfilesStore {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self, Img2LatexError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            Img2LatexError::InvalidConfig(format!("tmpfiles endpoint '{endpoint}' is invalid: {e}"))
        })?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl StagingStore for TmpfilesStore {
    async fn upload(&self, image: &UploadedImage) -> Result<StagedImage, StagingError> {
        let part = Part::bytes(image.content.to_vec())
            .file_name(image.filename_or_default().to_string())
            .mime_str(&image.content_type)
            .map_err(|e| StagingError::Request(e.to_string()))?;
        let form = Form::new().part(FILE_FIELD, part);

        debug!("Uploading {} bytes to {}", image.len(), self.endpoint);
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| StagingError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("tmpfiles.org upload rejected with {}", status);
            return Err(StagingError::Status {
                status: status.as_u16(),
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| StagingError::MalformedResponse(e.without_url().to_string()))?;

        if let Some(s) = body.status.as_deref() {
            if s != "success" {
                return Err(StagingError::MalformedResponse(format!("status '{s}'")));
            }
        }

        let landing = body
            .data
            .map(|d| d.url)
            .ok_or_else(|| StagingError::MalformedResponse("missing data.url".into()))?;
        let landing = Url::parse(&landing)
            .map_err(|e| StagingError::MalformedResponse(format!("invalid url: {e}")))?;

        let direct = direct_download_url(&landing);
        debug!("Staged at {} (direct: {})", landing, direct);
        Ok(StagedImage::remote(direct))
    }
}

/// Rewrite a tmpfiles.org landing URL into its direct-download form by
/// inserting a `dl` first path segment. Already-direct URLs are returned
/// unchanged.
pub fn direct_download_url(landing: &Url) -> Url {
    let path = landing.path().trim_start_matches('/');
    let already_direct = path
        .split('/')
        .next()
        .is_some_and(|first| first == DOWNLOAD_SEGMENT);
    if already_direct {
        return landing.clone();
    }
    let mut direct = landing.clone();
    direct.set_path(&format!("/{}/{}", DOWNLOAD_SEGMENT, path));
    direct
}
