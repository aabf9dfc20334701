//! The session aggregate and its reducer.
//!
//! Every mutation goes through [`apply`] with a [`SessionCommand`]; the reducer
//! performs no I/O and never fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::core::modes::audit_transition;
use crate::core::path::resolve;
use crate::core::tree_update::update_file;
use crate::core::types::{AgentUpdate, Message, Provider};
use crate::reasoning::{AgentSchema, initial_schema};
use crate::tree::{DocNode, default_tree};

pub const GREETING: &str = "Bonjour! I am AGENTX. I now operate with a more advanced reasoning model. Describe your project, and I'll generate the documentation while showing you my thought process. What we are building today?";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub history: Vec<Message>,
    pub schema: AgentSchema,
    pub tree: Arc<DocNode>,
    /// True from the first send until the cycle chain ends (error, stop, or
    /// an update without continuation).
    pub running: bool,
    pub selected_path: Option<String>,
    pub last_updated_file: Option<String>,
    pub provider: Provider,
    #[serde(skip_serializing)]
    pub api_keys: BTreeMap<Provider, String>,
    /// Mode-transition audit findings, oldest first.
    pub warnings: Vec<String>,
}

impl Session {
    pub fn new(tree: Arc<DocNode>, schema: AgentSchema) -> Self {
        Self {
            history: Vec::new(),
            schema,
            tree,
            running: false,
            selected_path: None,
            last_updated_file: None,
            provider: Provider::default(),
            api_keys: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Seeded template tree, initial schema and the assistant greeting.
    pub fn seeded() -> Self {
        let mut session = Self::new(default_tree(), initial_schema());
        session.history.push(Message::assistant(GREETING));
        session
    }

    /// Credential for `provider`, if one is set and non-empty.
    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        self.api_keys
            .get(&provider)
            .map(String::as_str)
            .filter(|key| !key.is_empty())
    }

    pub fn has_key(&self, provider: Provider) -> bool {
        self.api_key(provider).is_some()
    }
}

/// Closed set of session transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Append a message, replacing a trailing placeholder if there is one.
    AddMessage(Message),
    /// Overwrite the trailing assistant message; ignored otherwise.
    UpdateLastMessage(String),
    SetRunning(bool),
    ApplyAgentUpdate(AgentUpdate),
    SaveFile { path: String, content: String },
    SelectPath(Option<String>),
    SetProvider(Provider),
    SetApiKey { provider: Provider, key: String },
}

pub fn apply(session: &mut Session, command: SessionCommand) {
    match command {
        SessionCommand::AddMessage(message) => match session.history.last_mut() {
            Some(last) if last.is_placeholder() => *last = message,
            _ => session.history.push(message),
        },
        SessionCommand::UpdateLastMessage(content) => {
            if let Some(last) = session.history.last_mut()
                && last.is_assistant()
            {
                last.content = content;
            }
        }
        SessionCommand::SetRunning(running) => session.running = running,
        SessionCommand::ApplyAgentUpdate(update) => {
            if let Some(warning) = audit_transition(&session.schema, &update.updated_schema) {
                session.warnings.push(warning);
            }
            session.schema = update.updated_schema;
            if let Some(file) = update.file_update {
                let next = update_file(&session.tree, &file.path, &file.content);
                if resolve(&next, &file.path).is_some_and(DocNode::is_file) {
                    session.selected_path = Some(file.path.clone());
                    session.last_updated_file = Some(file.path);
                }
                session.tree = next;
            }
        }
        SessionCommand::SaveFile { path, content } => {
            session.tree = update_file(&session.tree, &path, &content);
        }
        SessionCommand::SelectPath(path) => session.selected_path = path,
        SessionCommand::SetProvider(provider) => session.provider = provider,
        SessionCommand::SetApiKey { provider, key } => {
            session.api_keys.insert(provider, key);
        }
    }
}
