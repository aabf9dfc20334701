//! OpenRouter backend (OpenAI-compatible chat completions, streamed).

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::sse::openai_delta;
use crate::core::types::Provider;
use crate::io::backend::{
    BackendError, ModelBackend, ModelRequest, TextStream, check_status, credential_header,
    ensure_key, sse_text_stream, transport_error,
};
use crate::io::config::OpenRouterConfig;

pub struct OpenRouterBackend {
    client: Client,
    config: OpenRouterConfig,
}

impl OpenRouterBackend {
    pub fn new(client: Client, config: OpenRouterConfig) -> Self {
        Self { client, config }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// `[system, ...history, user prompt]`; history authors are used as roles.
fn request_body<'a>(model: &'a str, request: &'a ModelRequest) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(ChatMessage {
        role: "system",
        content: &request.system_instruction,
    });
    messages.extend(request.history.iter().map(|message| ChatMessage {
        role: &message.author,
        content: &message.content,
    }));
    messages.push(ChatMessage {
        role: "user",
        content: &request.prompt,
    });
    ChatRequest {
        model,
        messages,
        stream: true,
    }
}

#[async_trait]
impl ModelBackend for OpenRouterBackend {
    #[instrument(skip_all, fields(provider = "openrouter", model = %self.config.model))]
    async fn open_stream(&self, request: &ModelRequest) -> Result<TextStream, BackendError> {
        ensure_key(Provider::OpenRouter, &request.api_key)?;
        let bearer = credential_header(&format!("Bearer {}", request.api_key))?;
        let body = request_body(&self.config.model, request);

        debug!(messages = body.messages.len(), "sending request");
        let response = self
            .client
            .post(&self.config.endpoint)
            .header(AUTHORIZATION, bearer)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(Provider::OpenRouter, response).await?;
        Ok(sse_text_stream(response, openai_delta).boxed())
    }
}
