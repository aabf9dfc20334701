//! Agent cycle driver: one model call turned into a sequence of [`CycleEvent`]s.
//!
//! The whole response is buffered before it is interpreted, since the
//! separator may straddle network chunk boundaries.

use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::core::protocol::interpret_response;
use crate::core::types::{CycleEvent, Message};
use crate::io::backend::{BackendError, ModelBackend, ModelRequest};
use crate::prompt::{system_instruction, window};
use crate::reasoning::AgentSchema;
use crate::tree::DocNode;

/// Session state a cycle reads. Captured when the cycle starts.
#[derive(Debug, Clone)]
pub struct CycleInput {
    pub prompt: String,
    /// Full history; only the trailing window is sent.
    pub history: Vec<Message>,
    pub tree: Arc<DocNode>,
    pub schema: AgentSchema,
    pub selected_path: Option<String>,
    pub api_key: String,
}

/// Build the backend request for `input`.
///
/// Empty assistant messages (a cycle whose chat segment was empty) are not
/// sent to the model.
pub fn build_request(input: &CycleInput, history_window: usize) -> anyhow::Result<ModelRequest> {
    let history: Vec<Message> = input
        .history
        .iter()
        .filter(|message| !message.is_placeholder())
        .cloned()
        .collect();
    Ok(ModelRequest {
        system_instruction: system_instruction(
            &input.schema,
            &input.tree,
            input.selected_path.as_deref(),
        )?,
        history: window(&history, history_window).to_vec(),
        prompt: input.prompt.clone(),
        api_key: input.api_key.clone(),
    })
}

/// Run one cycle against `backend`.
///
/// Yields `Chunk` then `Update` on success. Any failure ends the stream with a
/// single `Error`.
pub fn run_cycle(
    backend: Arc<dyn ModelBackend>,
    input: CycleInput,
    history_window: usize,
) -> impl Stream<Item = CycleEvent> + Send + 'static {
    stream! {
        let request = match build_request(&input, history_window) {
            Ok(request) => request,
            Err(err) => {
                yield CycleEvent::Error(format!("Error calling API: {err:#}"));
                return;
            }
        };

        let buffer = match collect_text(backend.as_ref(), &request).await {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(error = %err, "backend call failed");
                yield CycleEvent::Error(format!("Error calling API: {err}"));
                return;
            }
        };
        info!(bytes = buffer.len(), "model response received");

        for event in interpret_response(&buffer) {
            yield event;
        }
    }
}

async fn collect_text(
    backend: &dyn ModelBackend,
    request: &ModelRequest,
) -> Result<String, BackendError> {
    let mut stream = backend.open_stream(request).await?;
    let mut buffer = String::new();
    while let Some(piece) = stream.next().await {
        let piece = piece?;
        debug!(bytes = piece.len(), "increment");
        buffer.push_str(&piece);
    }
    Ok(buffer)
}
