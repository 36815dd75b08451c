//! Error types for the edgequake-img2latex library.
//!
//! Three layers of errors reflect three distinct failure boundaries:
//!
//! * [`Img2LatexError`] (**Fatal**): the service cannot start at all
//!   (missing API key, unusable staging directory, HTTP client build failure).
//!   Returned from config builders and [`crate::Pipeline::from_config`].
//!
//! * [`StagingError`] / [`InferenceError`] (**Adapter boundary**): what a
//!   collaborator reports. They carry enough detail for the log but are never
//!   shown to an HTTP client as-is.
//!
//! * [`ConversionError`] (**Per-request outcome**): an [`ErrorKind`] plus a
//!   short, client-safe message. This is the `Err` side of
//!   [`ConversionResult`].

use std::path::PathBuf;
use thiserror::Error;

/// Message returned when the request carries no image payload.
pub const MSG_MISSING_INPUT: &str = "No file provided";
/// Message returned when the payload is not declared as `image/*`.
pub const MSG_INVALID_TYPE: &str = "Invalid file type. Please upload an image.";
/// Message returned when the staging store could not accept the upload.
pub const MSG_STAGING_FAILED: &str = "Failed to upload to temporary storage";
/// Message returned for anything unclassified.
pub const MSG_INTERNAL: &str = "Error processing image";

/// Outcome of one conversion: LaTeX markup or a classified failure.
pub type ConversionResult = Result<String, ConversionError>;

/// All fatal errors returned by the edgequake-img2latex library.
#[derive(Debug, Error)]
pub enum Img2LatexError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The staging directory does not exist or is not a directory.
    #[error("Staging directory '{path}' is not usable: {reason}")]
    StagingDirUnusable { path: PathBuf, reason: String },

    /// The shared HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Classification of a failed conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No image payload was supplied.
    MissingInput,
    /// The payload is not an image (or the form could not be parsed).
    InvalidInput,
    /// The staging store failed.
    UpstreamUnavailable,
    /// The inference provider failed.
    ConversionFailed,
    /// Anything not anticipated, e.g. a local filesystem failure.
    Internal,
}

impl ErrorKind {
    /// Stable snake_case label, used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingInput => "missing_input",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::ConversionFailed => "conversion_failed",
            ErrorKind::Internal => "internal",
        }
    }
}

/// A failed conversion: what went wrong, phrased for the end user.
///
/// The message never contains URLs, file paths or raw provider bodies; those
/// are logged where the failure is classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConversionError {
    kind: ErrorKind,
    message: String,
}

impl ConversionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_input() -> Self {
        Self::new(ErrorKind::MissingInput, MSG_MISSING_INPUT)
    }

    pub fn invalid_type() -> Self {
        Self::new(ErrorKind::InvalidInput, MSG_INVALID_TYPE)
    }

    pub fn upstream_unavailable() -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, MSG_STAGING_FAILED)
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::Internal, MSG_INTERNAL)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure reported by a [`crate::pipeline::staging::StagingStore`].
#[derive(Debug, Error)]
pub enum StagingError {
    /// The store answered with a non-success HTTP status.
    #[error("staging store returned HTTP {status}")]
    Status { status: u16 },

    /// The request never completed (DNS, TLS, connection reset, timeout).
    #[error("staging request failed: {0}")]
    Transport(String),

    /// The upload request could not be built (e.g. unparsable content-type).
    #[error("could not build staging request: {0}")]
    Request(String),

    /// The store answered 2xx but the body is not what we expect.
    #[error("staging store returned an unexpected response: {0}")]
    MalformedResponse(String),

    /// Writing the artifact to local disk failed.
    #[error("failed to write staged image: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by a [`crate::pipeline::inference::InferenceClient`].
///
/// `Display` output is safe to show to end users: it names the failure but
/// never includes the provider's response body or request URL. The `String`
/// payloads carry that detail for the log.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The provider rejected the credential.
    #[error("the inference provider rejected the API key")]
    Unauthorized(String),

    /// The provider is throttling us.
    #[error("the inference provider is rate limiting requests")]
    RateLimited(String),

    /// The provider did not answer in time.
    #[error("the inference provider timed out")]
    Timeout,

    /// The request never completed (DNS, TLS, connection reset).
    #[error("could not reach the inference provider")]
    Transport(String),

    /// The provider answered with an error.
    #[error("the inference provider returned an error")]
    Provider(String),

    /// The provider answered but without usable content.
    #[error("the inference provider returned no markup")]
    EmptyResponse,

    /// The provider answered with a body we could not decode.
    #[error("the inference provider returned an unexpected response")]
    MalformedResponse(String),

    /// Reading the locally staged image failed.
    #[error("failed to read staged image: {0}")]
    Io(#[from] std::io::Error),
}
