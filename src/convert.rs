//! The conversion pipeline: uploaded image in, LaTeX or a classified error out.
//!
//! ## Steps
//!
//! ```text
//! 1. presence check   ─┐ pure, no I/O
//! 2. type check       ─┘
//! 3. staging          ─┐ one shared deadline
//! 4. inference        ─┘
//! 5. cleanup          drop of the StagedImage guard
//! 6. result           markup passed through verbatim
//! ```
//!
//! Every step can end the invocation. There are no retries: staging and
//! inference are each attempted at most once, and a failed conversion must be
//! re-submitted by the caller with a fresh upload.

use crate::config::PipelineConfig;
use crate::error::{
    ConversionError, ConversionResult, ErrorKind, Img2LatexError, InferenceError, StagingError,
};
use crate::pipeline::inference::together::TogetherClient;
use crate::pipeline::inference::InferenceClient;
use crate::pipeline::input::{self, UploadedImage};
use crate::pipeline::staging::{self, StagingStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The conversion pipeline with its two collaborators.
///
/// Cheap to share: wrap it in an `Arc` and call [`Pipeline::convert`] from as
/// many tasks as you like. Invocations share no mutable state.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    store: Arc<dyn StagingStore>,
    inference: Arc<dyn InferenceClient>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        config: Arc<PipelineConfig>,
        store: Arc<dyn StagingStore>,
        inference: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            config,
            store,
            inference,
        }
    }

    /// Build the production pipeline described by `config`: the configured
    /// staging backend plus the Together AI client.
    pub fn from_config(config: PipelineConfig) -> Result<Self, Img2LatexError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Img2LatexError::HttpClient(e.to_string()))?;

        let store = staging::build_store(&config.staging, client)?;
        let inference: Arc<dyn InferenceClient> = Arc::new(TogetherClient::new(&config));

        Ok(Self::new(Arc::new(config), store, inference))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Convert one uploaded image to LaTeX.
    ///
    /// `None` means the request carried no image at all.
    pub async fn convert(&self, image: Option<UploadedImage>) -> ConversionResult {
        let start = Instant::now();

        // ── Steps 1–2: presence and type ─────────────────────────────────
        let image = input::validate(image)?;
        info!(
            "Converting {} ({}, {} bytes)",
            image.filename_or_default(),
            image.content_type,
            image.len()
        );

        let deadline = start + self.config.timeout;

        // ── Step 3: stage ────────────────────────────────────────────────
        let staged = match timeout_at(deadline, self.store.upload(&image)).await {
            Ok(Ok(staged)) => staged,
            Ok(Err(e)) => return Err(classify_staging(e)),
            Err(_) => {
                warn!(
                    "Staging did not finish within {:?}",
                    self.config.timeout
                );
                return Err(ConversionError::upstream_unavailable());
            }
        };
        drop(image);
        debug!("Staged image at {}", staged.reference());

        // ── Step 4: infer ────────────────────────────────────────────────
        let outcome = match timeout_at(
            deadline,
            self.inference.convert(staged.reference(), &self.config.api_key),
        )
        .await
        {
            Ok(Ok(latex)) => Ok(latex),
            Ok(Err(e)) => Err(classify_inference(e)),
            Err(_) => {
                warn!(
                    "Inference did not finish within {:?}",
                    self.config.timeout
                );
                Err(ConversionError::new(
                    ErrorKind::ConversionFailed,
                    format!(
                        "Failed to convert image: the inference provider did not answer within {}s",
                        self.config.timeout.as_secs_f32()
                    ),
                ))
            }
        };

        // ── Step 5: cleanup ──────────────────────────────────────────────
        drop(staged);

        // ── Step 6: result ───────────────────────────────────────────────
        match &outcome {
            Ok(latex) => info!(
                "Conversion complete: {} chars in {}ms",
                latex.len(),
                start.elapsed().as_millis()
            ),
            Err(e) => warn!(
                "Conversion failed ({}) after {}ms",
                e.kind().as_str(),
                start.elapsed().as_millis()
            ),
        }
        outcome
    }
}

/// Map a staging failure onto the pipeline taxonomy.
fn classify_staging(e: StagingError) -> ConversionError {
    match e {
        StagingError::Io(io) => {
            error!("Failed to stage image on local disk: {}", io);
            ConversionError::internal()
        }
        other => {
            warn!("Staging failed: {}", other);
            ConversionError::upstream_unavailable()
        }
    }
}

/// Map an inference failure onto the pipeline taxonomy.
fn classify_inference(e: InferenceError) -> ConversionError {
    match e {
        InferenceError::Io(io) => {
            error!("Failed to read staged image: {}", io);
            ConversionError::internal()
        }
        other => {
            warn!("Inference failed: {:?}", other);
            ConversionError::new(
                ErrorKind::ConversionFailed,
                format!("Failed to convert image: {}", other),
            )
        }
    }
}
