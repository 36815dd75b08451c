//! # edgequake-img2latex
//!
//! Convert images of handwritten or printed mathematics to LaTeX using a
//! Vision Language Model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image upload
//!  │
//!  ├─ 1. Input      presence + `image/*` check (no I/O on rejection)
//!  ├─ 2. Staging    local temp file, or tmpfiles.org URL (`/dl/` form)
//!  ├─ 3. Inference  one chat-completion call to a Llama vision model
//!  ├─ 4. Cleanup    staged file removed on every exit path
//!  └─ 5. Output     LaTeX exactly as the model returned it
//! ```
//!
//! The library can be embedded directly through [`Pipeline`], or run as an
//! HTTP service (`img2latex serve`) exposing `POST /api/latex`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2latex::{Pipeline, PipelineConfig, UploadedImage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .api_key(std::env::var("TOGETHER_API_KEY")?)
//!         .build()?;
//!     let pipeline = Pipeline::from_config(config)?;
//!
//!     let bytes = std::fs::read("equation.png")?;
//!     let image = UploadedImage::new(bytes, "image/png").with_filename("equation.png");
//!     println!("{}", pipeline.convert(Some(image)).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2latex` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ApiKey, PipelineConfig, PipelineConfigBuilder, StagingBackend};
pub use convert::Pipeline;
pub use error::{
    ConversionError, ConversionResult, ErrorKind, Img2LatexError, InferenceError, StagingError,
};
pub use pipeline::inference::InferenceClient;
pub use pipeline::input::UploadedImage;
pub use pipeline::staging::{ImageRef, StagedImage, StagingStore};
pub use server::{build_router, serve, ErrorResponse, LatexResponse};
