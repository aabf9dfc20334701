//! Model backend seam: one method that opens a stream of text increments.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{BoxStream, Stream};
use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::core::sse::SseLineDecoder;
use crate::core::types::{Message, Provider};
use crate::io::config::DocAgentConfig;
use crate::io::gemini::GeminiBackend;
use crate::io::openrouter::OpenRouterBackend;

/// Incremental text produced by one model call.
pub type TextStream = BoxStream<'static, Result<String, BackendError>>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{provider} API key is missing. Please set it in the settings.")]
    MissingCredential { provider: Provider },
    #[error(
        "Invalid character found in request headers. Please check that your API key contains only standard ASCII characters."
    )]
    InvalidCredential,
    #[error("{provider} API error: {status} - {body}")]
    Http {
        provider: Provider,
        status: u16,
        body: String,
    },
    #[error("request failed: {0}")]
    Transport(String),
}

/// Everything a backend needs for one call.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system_instruction: String,
    /// Recent messages, already windowed, oldest first.
    pub history: Vec<Message>,
    pub prompt: String,
    pub api_key: String,
}

impl fmt::Debug for ModelRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRequest")
            .field("system_instruction_bytes", &self.system_instruction.len())
            .field("history", &self.history.len())
            .field("prompt", &self.prompt)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Open a streamed completion for `request`.
    ///
    /// Implementations must fail with [`BackendError::MissingCredential`]
    /// before any network activity when `request.api_key` is empty.
    async fn open_stream(&self, request: &ModelRequest) -> Result<TextStream, BackendError>;
}

/// One backend per provider.
#[derive(Clone)]
pub struct Backends {
    google: Arc<dyn ModelBackend>,
    openrouter: Arc<dyn ModelBackend>,
}

impl Backends {
    pub fn new(google: Arc<dyn ModelBackend>, openrouter: Arc<dyn ModelBackend>) -> Self {
        Self { google, openrouter }
    }

    /// The same backend for every provider.
    pub fn uniform(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            google: Arc::clone(&backend),
            openrouter: backend,
        }
    }

    /// HTTP backends sharing one client.
    pub fn from_config(config: &DocAgentConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(config.request_timeout())
            .build()
            .context("build http client")?;
        Ok(Self {
            google: Arc::new(GeminiBackend::new(client.clone(), config.gemini.clone())),
            openrouter: Arc::new(OpenRouterBackend::new(client, config.openrouter.clone())),
        })
    }

    pub fn get(&self, provider: Provider) -> Arc<dyn ModelBackend> {
        match provider {
            Provider::Google => Arc::clone(&self.google),
            Provider::OpenRouter => Arc::clone(&self.openrouter),
        }
    }
}

pub(crate) fn ensure_key(provider: Provider, api_key: &str) -> Result<(), BackendError> {
    if api_key.trim().is_empty() {
        return Err(BackendError::MissingCredential { provider });
    }
    Ok(())
}

/// Header value carrying a credential; non-visible-ASCII input is rejected.
pub(crate) fn credential_header(value: &str) -> Result<HeaderValue, BackendError> {
    let mut header = HeaderValue::from_str(value).map_err(|_| BackendError::InvalidCredential)?;
    header.set_sensitive(true);
    Ok(header)
}

pub(crate) fn transport_error(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

/// Reject non-success responses, preferring the provider's error message.
pub(crate) async fn check_status(
    provider: Provider,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| format!("failed to read {provider} error body"));
    Err(http_error(provider, status, body))
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn http_error(provider: Provider, status: StatusCode, body: String) -> BackendError {
    let body = serde_json::from_str::<ErrorWrapper>(&body)
        .ok()
        .and_then(|wrapper| {
            let message = wrapper.error.message?;
            Some(match wrapper.error.status {
                Some(status_text) if !status_text.is_empty() => {
                    format!("{status_text}: {message}")
                }
                _ => message,
            })
        })
        .unwrap_or(body);
    BackendError::Http {
        provider,
        status: status.as_u16(),
        body,
    }
}

/// Decode an SSE response body into text increments using `extract`.
pub(crate) fn sse_text_stream(
    response: reqwest::Response,
    extract: fn(&str) -> Option<String>,
) -> impl Stream<Item = Result<String, BackendError>> + Send + 'static {
    try_stream! {
        let mut decoder = SseLineDecoder::new();
        let mut bytes = response.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|err| BackendError::Transport(err.to_string()))?;
            for data in decoder.push(&chunk) {
                if let Some(text) = extract(&data) {
                    yield text;
                }
            }
        }
        if let Some(text) = decoder.finish().as_deref().and_then(extract) {
            yield text;
        }
    }
}
