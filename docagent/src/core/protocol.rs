//! Response protocol: chat text, separator, then one JSON control payload.
//!
//! [`interpret_response`] is total over any input string; protocol and
//! payload violations come back as [`CycleEvent::Error`] values.

use std::sync::LazyLock;

use jsonschema::Validator;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::core::types::{AgentUpdate, CycleEvent};

/// Separates the chat segment from the control payload.
pub const SENTINEL: &str = "|||AGENT_RESPONSE_JSON|||";

const AGENT_UPDATE_SCHEMA: &str = include_str!("../../schemas/agent_update.schema.json");

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\n?(.*?)\n?```\s*$").expect("fence regex should compile")
});

static UPDATE_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(AGENT_UPDATE_SCHEMA).expect("embedded update schema should parse");
    jsonschema::validator_for(&schema).expect("embedded update schema should compile")
});

/// Split a fully buffered model response into cycle events.
///
/// - No separator: a single `Error` carrying the whole buffer.
/// - Otherwise: `Chunk(chat)` followed by either `Update` or `Error`.
pub fn interpret_response(buffer: &str) -> Vec<CycleEvent> {
    let Some(index) = buffer.find(SENTINEL) else {
        warn!(bytes = buffer.len(), "response missing separator");
        return vec![CycleEvent::Error(format!(
            "Agent did not return the required separator token and JSON object.\nFull response from LLM:\n{}",
            buffer
        ))];
    };

    let chat = &buffer[..index];
    let raw = strip_fence(buffer[index + SENTINEL.len()..].trim());

    let last = match parse_update(raw) {
        Ok(update) => CycleEvent::Update(update),
        Err(reason) => {
            warn!(bytes = raw.len(), %reason, "invalid control payload");
            CycleEvent::Error(format!(
                "Failed to parse JSON payload. Raw: '{}'. Error: {}",
                raw, reason
            ))
        }
    };
    vec![CycleEvent::Chunk(chat.to_string()), last]
}

/// Remove one enclosing markdown code fence, if present.
pub fn strip_fence(raw: &str) -> &str {
    match FENCE_RE.captures(raw).and_then(|caps| caps.get(1)) {
        Some(inner) if !inner.as_str().is_empty() => inner.as_str().trim(),
        _ => raw,
    }
}

/// Parse and validate a control payload. Nothing is coerced: a missing
/// `updatedSchema`, a non-boolean `autoContinue` or a malformed `fileUpdate`
/// is rejected with the validator's own messages.
pub fn parse_update(raw: &str) -> Result<AgentUpdate, String> {
    let value: Value = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    let messages: Vec<String> = UPDATE_VALIDATOR
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(format!(
            "payload does not match the update schema: {}",
            messages.join("; ")
        ));
    }
    serde_json::from_value(value).map_err(|err| err.to_string())
}
