//! Test-only helpers: small trees and a scripted model backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::Notify;

use crate::controller::SessionController;
use crate::core::protocol::SENTINEL;
use crate::core::session::Session;
use crate::core::types::Provider;
use crate::io::backend::{BackendError, Backends, ModelBackend, ModelRequest, TextStream};
use crate::io::config::DocAgentConfig;
use crate::reasoning::initial_schema;
use crate::tree::DocNode;

/// `docs/{README.md, design/{api.md, uml/class.md}, notes.md}`.
pub fn sample_tree() -> Arc<DocNode> {
    Arc::new(DocNode::folder(
        "docs",
        "Project documentation",
        vec![
            DocNode::file("README.md", "Entry point", "# Readme\n"),
            DocNode::folder(
                "design",
                "Design documents",
                vec![
                    DocNode::file("api.md", "API design", ""),
                    DocNode::folder(
                        "uml",
                        "Diagrams",
                        vec![DocNode::file("class.md", "Class diagram", "")],
                    ),
                ],
            ),
            DocNode::file("notes.md", "Scratch notes", ""),
        ],
    ))
}

/// A well-formed model response: `chat`, separator, then the payload.
pub fn agent_reply(chat: &str, mode: &str, file: Option<(&str, &str)>, auto_continue: bool) -> String {
    let file_update = file.map(|(path, content)| {
        serde_json::json!({ "fileName": path, "content": content })
    });
    let payload = serde_json::json!({
        "updatedSchema": { "mode": mode },
        "fileUpdate": file_update,
        "autoContinue": auto_continue,
    });
    format!("{}{}{}", chat, SENTINEL, payload)
}

/// Controller over [`sample_tree`] with a Google key set, backed by `backend`
/// for every provider and the default config (2.5 s continuation delay).
pub fn scripted_controller(backend: Arc<ScriptedBackend>) -> Arc<SessionController> {
    let mut session = Session::new(sample_tree(), initial_schema());
    session
        .api_keys
        .insert(Provider::Google, "test-key".to_string());
    SessionController::new(
        session,
        Backends::uniform(backend),
        DocAgentConfig::default(),
        None,
    )
}

enum Script {
    Reply(Vec<String>),
    ReplyThenFail(Vec<String>, BackendError),
    Fail(BackendError),
    /// Wait for the gate before replying.
    Gated(Arc<Notify>, Vec<String>),
}

/// Backend that replays canned increments in order and records every request.
///
/// Each `open_stream` call consumes the next script; an exhausted script list
/// fails with a transport error.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, increments: &[&str]) -> Self {
        self.push(Script::Reply(owned(increments)))
    }

    pub fn reply_then_fail(self, increments: &[&str], err: BackendError) -> Self {
        self.push(Script::ReplyThenFail(owned(increments), err))
    }

    pub fn fail(self, err: BackendError) -> Self {
        self.push(Script::Fail(err))
    }

    /// Reply only after `gate` is notified.
    pub fn gated_reply(self, gate: Arc<Notify>, increments: &[&str]) -> Self {
        self.push(Script::Gated(gate, owned(increments)))
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn push(self, script: Script) -> Self {
        self.scripts.lock().expect("scripts lock").push_back(script);
        self
    }
}

fn owned(increments: &[&str]) -> Vec<String> {
    increments.iter().map(|text| text.to_string()).collect()
}

fn replay(increments: Vec<String>) -> TextStream {
    stream::iter(increments.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn open_stream(&self, request: &ModelRequest) -> Result<TextStream, BackendError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let script = self.scripts.lock().expect("scripts lock").pop_front();
        match script {
            Some(Script::Reply(increments)) => Ok(replay(increments)),
            Some(Script::ReplyThenFail(increments, err)) => Ok(replay(increments)
                .chain(stream::once(async move { Err(err) }))
                .boxed()),
            Some(Script::Fail(err)) => Err(err),
            Some(Script::Gated(gate, increments)) => {
                gate.notified().await;
                Ok(replay(increments))
            }
            None => Err(BackendError::Transport("script exhausted".to_string())),
        }
    }
}
