//! Configuration types for image-to-LaTeX conversion.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The config is read once at startup, wrapped
//! in an `Arc` and handed to the [`crate::Pipeline`]; nothing re-reads the
//! environment per request.

use crate::error::Img2LatexError;
use edgequake_llm::LLMProvider;
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default Together AI vision model.
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3.2-90B-Vision-Instruct-Turbo";

/// Default OpenAI-compatible base URL of the inference provider.
pub const DEFAULT_INFERENCE_URL: &str = "https://api.together.xyz/v1";

/// Default tmpfiles.org upload endpoint.
pub const DEFAULT_TMPFILES_ENDPOINT: &str = "https://tmpfiles.org/api/v1/upload";

/// Default deadline covering staging plus inference.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Inference provider credential.
///
/// `Debug` never prints the key.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for the `Authorization` header only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            f.write_str("ApiKey(<empty>)")
        } else {
            f.write_str("ApiKey(<redacted>)")
        }
    }
}

/// Where uploaded images are staged before inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingBackend {
    /// Write the image into a directory on local disk. The inference client
    /// then sends the file inline as a base64 `data:` URL.
    LocalDisk { dir: PathBuf },
    /// Upload the image to tmpfiles.org and pass the resulting URL.
    Tmpfiles { endpoint: String },
}

impl Default for StagingBackend {
    fn default() -> Self {
        StagingBackend::Tmpfiles {
            endpoint: DEFAULT_TMPFILES_ENDPOINT.to_string(),
        }
    }
}

impl StagingBackend {
    /// Local-disk staging in the system temporary directory.
    pub fn local_temp() -> Self {
        StagingBackend::LocalDisk {
            dir: std::env::temp_dir(),
        }
    }
}

/// Configuration for the conversion pipeline.
///
/// # Example
/// ```rust
/// use edgequake_img2latex::{PipelineConfig, StagingBackend};
///
/// let config = PipelineConfig::builder()
///     .api_key("tg-123")
///     .staging(StagingBackend::local_temp())
///     .timeout_secs(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.timeout.as_secs(), 20);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Inference provider API key. Required; blank keys fail `build()`.
    pub api_key: ApiKey,

    /// Vision model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// OpenAI-compatible base URL (without `/chat/completions`).
    /// Default: [`DEFAULT_INFERENCE_URL`].
    pub inference_base_url: String,

    /// Staging backend. Default: tmpfiles.org.
    pub staging: StagingBackend,

    /// Deadline covering staging and inference together. Default: 30 s.
    ///
    /// Vision inference on a large formula can take 10–20 s; the deadline
    /// bounds how long a request can hold a connection when the provider
    /// hangs.
    pub timeout: Duration,

    /// Maximum tokens the model may generate. Default: 1024.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.0 (transcription, not creativity).
    pub temperature: f32,

    /// Custom system prompt. If None, uses [`crate::prompts::LATEX_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `inference_base_url`
    /// and `model`; the provider carries its own credential.
    pub provider: Option<Arc<dyn LLMProvider>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            model: DEFAULT_MODEL.to_string(),
            inference_base_url: DEFAULT_INFERENCE_URL.to_string(),
            staging: StagingBackend::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_tokens: 1024,
            temperature: 0.0,
            system_prompt: None,
            provider: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_key", &self.api_key)
            .field("model", &self.model)
            .field("inference_base_url", &self.inference_base_url)
            .field("staging", &self.staging)
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("system_prompt", &self.system_prompt.as_ref().map(|_| "<custom>"))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = ApiKey::new(key);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn inference_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.inference_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn staging(mut self, backend: StagingBackend) -> Self {
        self.config.staging = backend;
        self
    }

    /// Deadline in whole seconds, clamped to 1–300.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout = Duration::from_secs(secs.clamp(1, 300));
        self
    }

    /// Deadline with sub-second precision. Zero is rejected by `build()`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Use an already-built provider instead of the OpenAI-compatible default.
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Img2LatexError> {
        let c = &self.config;
        if c.api_key.is_blank() {
            return Err(Img2LatexError::InvalidConfig(
                "an inference API key is required (set TOGETHER_API_KEY)".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(Img2LatexError::InvalidConfig("model must not be empty".into()));
        }
        validate_http_url("inference base URL", &c.inference_base_url)?;
        if let StagingBackend::Tmpfiles { endpoint } = &c.staging {
            validate_http_url("tmpfiles endpoint", endpoint)?;
        }
        if c.timeout.is_zero() {
            return Err(Img2LatexError::InvalidConfig(
                "timeout must be greater than zero".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Img2LatexError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

fn validate_http_url(what: &str, raw: &str) -> Result<(), Img2LatexError> {
    let url = Url::parse(raw)
        .map_err(|e| Img2LatexError::InvalidConfig(format!("{what} '{raw}' is invalid: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Img2LatexError::InvalidConfig(format!(
            "{what} must use http or https, got '{other}'"
        ))),
    }
}
