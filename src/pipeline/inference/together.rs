//! Together AI vision client, built on `edgequake-llm`.
//!
//! Together exposes an OpenAI-compatible `/chat/completions` endpoint with
//! Llama vision models, so the request goes through
//! [`OpenAIProvider::compatible`]. One request carries the system prompt plus
//! a user turn holding a short instruction and the image, either as the
//! staged URL or, for locally staged files, as base64 data.
//!
//! The provider is built per call from the credential handed to
//! [`InferenceClient::convert`], unless one was injected through
//! [`PipelineConfig::provider`].
//!
//! ## Retries
//!
//! The pipeline calls the provider once. The underlying OpenAI client backs
//! off on HTTP 429 and 5xx by itself; that backoff is cut short by the
//! conversion deadline, which then reports `ConversionFailed`.

use super::InferenceClient;
use crate::config::{ApiKey, PipelineConfig};
use crate::error::InferenceError;
use crate::pipeline::encode;
use crate::pipeline::staging::ImageRef;
use crate::prompts::{LATEX_SYSTEM_PROMPT, USER_INSTRUCTION};
use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError, OpenAIProvider,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const LOGGED_DETAIL_LIMIT: usize = 300;

enum ProviderSource {
    Injected(Arc<dyn LLMProvider>),
    Compatible { base_url: String, model: String },
}

/// Client for Together AI's OpenAI-compatible vision models.
pub struct TogetherClient {
    source: ProviderSource,
    options: CompletionOptions,
    system_prompt: String,
}

impl TogetherClient {
    pub fn new(config: &PipelineConfig) -> Self {
        let source = match &config.provider {
            Some(provider) => ProviderSource::Injected(Arc::clone(provider)),
            None => ProviderSource::Compatible {
                base_url: config.inference_base_url.clone(),
                model: config.model.clone(),
            },
        };
        Self {
            source,
            options: build_options(config),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| LATEX_SYSTEM_PROMPT.to_string()),
        }
    }

    fn provider_for(&self, credential: &ApiKey) -> Arc<dyn LLMProvider> {
        match &self.source {
            ProviderSource::Injected(provider) => Arc::clone(provider),
            ProviderSource::Compatible { base_url, model } => Arc::new(
                OpenAIProvider::compatible(credential.expose(), base_url.as_str())
                    .with_model(model.as_str()),
            ),
        }
    }

    /// System prompt, then the instruction with the image attached.
    fn build_messages(&self, image: ImageData) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user_with_images(USER_INSTRUCTION, vec![image]),
        ]
    }
}

#[async_trait]
impl InferenceClient for TogetherClient {
    async fn convert(
        &self,
        image: &ImageRef,
        credential: &ApiKey,
    ) -> Result<String, InferenceError> {
        let start = Instant::now();
        let image = encode::image_data_for(image).await?;
        let messages = self.build_messages(image);
        let provider = self.provider_for(credential);

        let response = provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(classify_llm_error)?;

        debug!(
            "{} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Map a provider error onto [`InferenceError`]. The full text is logged.
fn classify_llm_error(e: LlmError) -> InferenceError {
    warn!(
        "Inference provider call failed: {}",
        truncate(&e.to_string(), LOGGED_DETAIL_LIMIT)
    );
    match e {
        LlmError::AuthError(msg) => InferenceError::Unauthorized(msg),
        LlmError::ApiError(msg) if mentions_credential(&msg) => InferenceError::Unauthorized(msg),
        LlmError::RateLimited(msg) => InferenceError::RateLimited(msg),
        LlmError::Timeout => InferenceError::Timeout,
        LlmError::NetworkError(msg) => InferenceError::Transport(msg),
        LlmError::SerializationError(err) => InferenceError::MalformedResponse(err.to_string()),
        other => InferenceError::Provider(other.to_string()),
    }
}

/// OpenAI-compatible backends report a bad key as a plain API error.
fn mentions_credential(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("api key") || msg.contains("unauthorized") || msg.contains("authentication")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}\u{2026}")
    }
}
