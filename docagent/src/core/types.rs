//! Shared deterministic types for the agent cycle.
//!
//! These types define the contracts between the protocol parser, the session
//! reducer and the controller. They carry no I/O.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::reasoning::AgentSchema;

pub const USER: &str = "user";
pub const ASSISTANT: &str = "assistant";

/// One chat message. `author` is usually `user` or `assistant`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            author: USER.to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            author: ASSISTANT.to_string(),
            content: content.into(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.author == ASSISTANT
    }

    /// An assistant message with empty content is a placeholder being streamed into.
    pub fn is_placeholder(&self) -> bool {
        self.is_assistant() && self.content.is_empty()
    }
}

/// Model provider backing the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Google,
    OpenRouter,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Google, Provider::OpenRouter];

    /// Stable identifier used in settings files and URLs.
    pub fn id(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::OpenRouter => "openrouter",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Google => "Google Gemini",
            Provider::OpenRouter => "OpenRouter",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(Provider::Google),
            "openrouter" => Ok(Provider::OpenRouter),
            other => Err(format!(
                "unknown provider '{}' (expected google or openrouter)",
                other
            )),
        }
    }
}

/// File edit proposed by the model. `path` is a full tree path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpdate {
    #[serde(rename = "fileName")]
    pub path: String,
    pub content: String,
}

/// Control payload that follows the sentinel in a model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUpdate {
    pub updated_schema: AgentSchema,
    #[serde(default)]
    pub file_update: Option<FileUpdate>,
    pub auto_continue: bool,
}

/// Event yielded by one agent cycle.
///
/// A successful cycle yields `Chunk` then `Update`; a failed one yields a single
/// `Error` (possibly after a `Chunk`).
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    /// The chat segment of the reply (everything before the sentinel).
    Chunk(String),
    Update(AgentUpdate),
    Error(String),
}
