//! Google Gemini backend (`streamGenerateContent` over SSE).

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::core::sse::gemini_text;
use crate::core::types::Provider;
use crate::io::backend::{
    BackendError, ModelBackend, ModelRequest, TextStream, check_status, credential_header,
    ensure_key, sse_text_stream, transport_error,
};
use crate::io::config::GeminiConfig;
use crate::prompt::gemini_turn;

pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(client: Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    fn url(&self) -> String {
        format!(
            "{}/{}:streamGenerateContent?alt=sse",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

/// History and prompt travel as one user turn; the protocol rides in
/// `system_instruction`.
fn request_body(request: &ModelRequest) -> Result<GenerateContentRequest, BackendError> {
    let turn = gemini_turn(&request.history, &request.prompt)
        .map_err(|err| BackendError::Transport(format!("{err:#}")))?;
    Ok(GenerateContentRequest {
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: turn }],
        }],
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: request.system_instruction.clone(),
            }],
        },
    })
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    #[instrument(skip_all, fields(provider = "google", model = %self.config.model))]
    async fn open_stream(&self, request: &ModelRequest) -> Result<TextStream, BackendError> {
        ensure_key(Provider::Google, &request.api_key)?;
        let key = credential_header(&request.api_key)?;
        let body = request_body(request)?;

        debug!(history = request.history.len(), "sending request");
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(Provider::Google, response).await?;
        Ok(sse_text_stream(response, gemini_text).boxed())
    }
}
