//! CLI binary for edgequake-img2latex.
//!
//! A thin shim over the library crate: `serve` runs the HTTP service,
//! `convert` pushes one local image through the same pipeline.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_img2latex::config::{
    DEFAULT_INFERENCE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, DEFAULT_TMPFILES_ENDPOINT,
};
use edgequake_img2latex::server::DEFAULT_MAX_UPLOAD_BYTES;
use edgequake_img2latex::{
    build_router, serve, Pipeline, PipelineConfig, StagingBackend, UploadedImage,
};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on the default address
  img2latex serve

  # Listen on all interfaces and stage uploads on local disk
  img2latex serve --bind 0.0.0.0:8080 --staging local

  # Convert one image and print the LaTeX
  img2latex convert equation.png

  # Call the running service
  curl -F image=@equation.png http://127.0.0.1:3000/api/latex

STAGING BACKENDS:
  tmpfiles   Upload to tmpfiles.org (kept 1 hour) and pass the /dl/ URL (default)
  local      Write a temp file and send it inline as a base64 data: URL

ENVIRONMENT VARIABLES:
  TOGETHER_API_KEY             Together AI API key (required)
  IMG2LATEX_MODEL              Vision model ID
  IMG2LATEX_INFERENCE_URL      OpenAI-compatible base URL
  IMG2LATEX_STAGING            tmpfiles | local
  IMG2LATEX_STAGING_DIR        Directory for local staging
  IMG2LATEX_TMPFILES_ENDPOINT  tmpfiles.org upload endpoint
  IMG2LATEX_TIMEOUT            Deadline for staging + inference, seconds
  IMG2LATEX_BIND               Listen address for `serve`
  IMG2LATEX_MAX_UPLOAD_BYTES   Request body cap for `serve`
  RUST_LOG                     Overrides --verbose / --quiet log filtering
"#;

/// Convert images of mathematics to LaTeX using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "img2latex",
    version,
    about = "Convert images of mathematics to LaTeX using Vision LLMs",
    long_about = "Convert images of handwritten or printed mathematical notation to LaTeX \
using a Llama vision model hosted on Together AI. Runs as an HTTP service exposing \
POST /api/latex, or converts a single file from the command line.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "IMG2LATEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "IMG2LATEX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "IMG2LATEX_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,

        /// Maximum request body size in bytes.
        #[arg(long, env = "IMG2LATEX_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_upload_bytes: usize,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Convert one image file and print the LaTeX to stdout.
    Convert {
        /// Image file to convert.
        input: PathBuf,

        /// Content type of the image. Guessed from the extension if omitted.
        #[arg(long)]
        content_type: Option<String>,

        /// Output JSON ({"latex": ...}) instead of raw LaTeX.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Together AI API key.
    #[arg(long, env = "TOGETHER_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Vision model ID.
    #[arg(long, env = "IMG2LATEX_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// OpenAI-compatible base URL of the inference provider.
    #[arg(long, env = "IMG2LATEX_INFERENCE_URL", default_value = DEFAULT_INFERENCE_URL)]
    inference_url: String,

    /// Where uploads are staged before inference.
    #[arg(long, env = "IMG2LATEX_STAGING", value_enum, default_value = "tmpfiles")]
    staging: StagingArg,

    /// Directory for `--staging local`. Default: the system temp directory.
    #[arg(long, env = "IMG2LATEX_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// tmpfiles.org upload endpoint.
    #[arg(long, env = "IMG2LATEX_TMPFILES_ENDPOINT", default_value = DEFAULT_TMPFILES_ENDPOINT)]
    tmpfiles_endpoint: String,

    /// Deadline for staging + inference, in seconds (1–300).
    #[arg(long, env = "IMG2LATEX_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Max tokens the model may generate.
    #[arg(long, env = "IMG2LATEX_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "IMG2LATEX_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "IMG2LATEX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum StagingArg {
    Tmpfiles,
    Local,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            bind,
            max_upload_bytes,
            pipeline,
        } => {
            let config = build_config(&pipeline).await?;
            tracing::info!("Starting with {:?}", config);
            let pipeline = Pipeline::from_config(config).context("Failed to build pipeline")?;
            let router = build_router(Arc::new(pipeline), max_upload_bytes);
            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            serve(listener, router).await.context("Server failed")?;
        }
        Command::Convert {
            input,
            content_type,
            json,
            pipeline,
        } => {
            let config = build_config(&pipeline).await?;
            let pipeline = Pipeline::from_config(config).context("Failed to build pipeline")?;

            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let content_type = content_type.unwrap_or_else(|| {
                mime_guess::from_path(&input)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });
            let mut image = UploadedImage::new(bytes, content_type);
            image.filename = input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());

            let latex = pipeline
                .convert(Some(image))
                .await
                .context("Conversion failed")?;

            let stdout = io::stdout();
            let mut handle = stdout.lock();
            if json {
                let body = serde_json::json!({ "latex": latex });
                writeln!(handle, "{body}").context("Failed to write to stdout")?;
            } else {
                handle
                    .write_all(latex.as_bytes())
                    .context("Failed to write to stdout")?;
                if !latex.ends_with('\n') {
                    handle
                        .write_all(b"\n")
                        .context("Failed to write to stdout")?;
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(args: &PipelineArgs) -> Result<PipelineConfig> {
    let staging = match args.staging {
        StagingArg::Tmpfiles => StagingBackend::Tmpfiles {
            endpoint: args.tmpfiles_endpoint.clone(),
        },
        StagingArg::Local => StagingBackend::LocalDisk {
            dir: args.staging_dir.clone().unwrap_or_else(std::env::temp_dir),
        },
    };

    let mut builder = PipelineConfig::builder()
        .api_key(args.api_key.clone())
        .model(args.model.clone())
        .inference_base_url(args.inference_url.clone())
        .staging(staging)
        .timeout_secs(args.timeout)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature);

    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}
