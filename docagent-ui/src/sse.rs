//! Server-Sent Events stream of session changes.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::sync::broadcast;
use tracing::warn;

use docagent::controller::SessionEvent;

use crate::state::AppState;

/// SSE event name for a session event; matches its JSON `type` tag.
fn event_name(event: &SessionEvent) -> &'static str {
    match event {
        SessionEvent::Message { .. } => "message",
        SessionEvent::Loading { .. } => "loading",
        SessionEvent::Schema { .. } => "schema",
        SessionEvent::Tree { .. } => "tree",
        SessionEvent::Selection { .. } => "selection",
        SessionEvent::Settings { .. } => "settings",
        SessionEvent::Warning { .. } => "warning",
        SessionEvent::Error { .. } => "error",
        SessionEvent::ContinuationScheduled { .. } => "continuation_scheduled",
        SessionEvent::Stopped => "stopped",
    }
}

fn to_sse(event: &SessionEvent) -> Option<Event> {
    match Event::default().event(event_name(event)).json_data(event) {
        Ok(sse) => Some(sse),
        Err(err) => {
            warn!(error = %err, "failed to encode session event");
            None
        }
    }
}

/// Forward `rx` as SSE events, starting with `connected`.
///
/// A lagging client gets `resync` and should refetch the session snapshot.
fn session_stream(
    mut rx: broadcast::Receiver<SessionEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(sse) = to_sse(&event) {
                        yield Ok(sse);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, asking it to resync");
                    yield Ok(Event::default().event("resync").data("{}"));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// SSE endpoint handler.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(session_stream(state.controller.subscribe())).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
