//! Line decoding for server-sent-event style streaming responses.
//!
//! Network chunks do not respect line boundaries, so bytes are buffered until a
//! full line is available. Only `data:` lines are surfaced; the `[DONE]`
//! marker and every other line are dropped.

use serde_json::Value;

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct SseLineDecoder {
    pending: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk; returns the data payloads of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.pending);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\n', '\r']);
    let data = line.strip_prefix(DATA_PREFIX)?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.trim() == DONE_MARKER {
        return None;
    }
    Some(data.to_string())
}

/// Text increment of an OpenAI-compatible chunk (`choices[0].delta.content`).
///
/// Returns `None` for unparseable envelopes and chunks without content.
pub fn openai_delta(data: &str) -> Option<String> {
    let value: Value = serde_json::from_str(data).ok()?;
    let text = value
        .pointer("/choices/0/delta/content")?
        .as_str()?
        .to_string();
    (!text.is_empty()).then_some(text)
}

/// Text increment of a Gemini `streamGenerateContent` chunk.
///
/// Concatenates every text part of the first candidate.
pub fn gemini_text(data: &str) -> Option<String> {
    let value: Value = serde_json::from_str(data).ok()?;
    let parts = value.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}
