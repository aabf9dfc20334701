//! Session controller: owns the session, runs cycles, and drives the
//! autonomous continuation loop.
//!
//! The session is guarded by one mutex; no lock is held across an await.
//! Every cycle carries a generation number, and events from a cycle whose
//! generation is no longer current (after a stop) are dropped.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::core::session::{Session, SessionCommand, apply};
use crate::core::types::{CycleEvent, Message, Provider};
use crate::cycle::{CycleInput, run_cycle};
use crate::io::backend::{BackendError, Backends, ModelBackend};
use crate::io::config::{DocAgentConfig, load_config};
use crate::io::paths::StatePaths;
use crate::io::settings::{Settings, load_settings, write_settings};
use crate::prompt::CONTINUE_PROMPT;
use crate::reasoning::AgentSchema;
use crate::tree::DocNode;

pub const STOP_NOTICE: &str = "⏹️ Autonomous process stopped by user.";

const EVENT_CAPACITY: usize = 256;

/// Change notifications for observers (the browser surface, the CLI).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The message at `index` was added or rewritten.
    Message { index: usize, message: Message },
    Loading { running: bool },
    Schema { schema: AgentSchema },
    Tree {
        tree: Arc<DocNode>,
        last_updated_file: Option<String>,
    },
    Selection { path: Option<String> },
    Settings {
        provider: Provider,
        configured: Vec<Provider>,
    },
    Warning { message: String },
    Error { message: String },
    ContinuationScheduled { delay_ms: u64 },
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Started { generation: u64 },
    /// A cycle chain is already running; nothing changed.
    Busy,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("Please set your {provider} API key in the settings.")]
    MissingCredential { provider: Provider },
}

struct PendingContinuation {
    id: u64,
    handle: JoinHandle<()>,
}

struct ControllerState {
    session: Session,
    generation: u64,
    /// Generation of the cycle currently talking to the backend.
    in_flight: Option<u64>,
    pending: Option<PendingContinuation>,
    next_continuation_id: u64,
}

pub struct SessionController {
    state: Mutex<ControllerState>,
    backends: Backends,
    config: DocAgentConfig,
    settings_path: Option<PathBuf>,
    events: broadcast::Sender<SessionEvent>,
    running: watch::Sender<bool>,
}

impl SessionController {
    pub fn new(
        session: Session,
        backends: Backends,
        config: DocAgentConfig,
        settings_path: Option<PathBuf>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (running, _) = watch::channel(session.running);
        Arc::new(Self {
            state: Mutex::new(ControllerState {
                session,
                generation: 0,
                in_flight: None,
                pending: None,
                next_continuation_id: 0,
            }),
            backends,
            config,
            settings_path,
            events,
            running,
        })
    }

    /// Seeded session with config and settings loaded from `paths`, talking to
    /// the HTTP backends.
    pub fn bootstrap(paths: &StatePaths) -> Result<Arc<Self>> {
        let config = load_config(&paths.config_path)?;
        let settings = load_settings(&paths.settings_path)?;
        let backends = Backends::from_config(&config)?;
        let mut session = Session::seeded();
        session.provider = settings.provider;
        session.api_keys = settings.api_keys;
        info!(
            state_dir = %paths.state_dir.display(),
            provider = settings.provider.id(),
            "session ready"
        );
        Ok(Self::new(
            session,
            backends,
            config,
            Some(paths.settings_path.clone()),
        ))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Resolve once no cycle chain is running.
    pub async fn wait_until_idle(&self) {
        let mut running = self.running.subscribe();
        let _ = running.wait_for(|running| !running).await;
    }

    /// Submit a user prompt.
    ///
    /// Returns `Busy` without touching the session while a chain is running.
    #[instrument(skip_all)]
    pub fn send(self: &Arc<Self>, prompt: &str) -> Result<SendOutcome, SendError> {
        if prompt.trim().is_empty() {
            return Err(SendError::EmptyPrompt);
        }
        let mut state = self.lock();
        if state.session.running {
            debug!("send rejected: cycle running");
            return Ok(SendOutcome::Busy);
        }
        let provider = state.session.provider;
        let api_key = state
            .session
            .api_key(provider)
            .map(str::to_string)
            .ok_or(SendError::MissingCredential { provider })?;

        let history = state.session.history.clone();
        self.dispatch(&mut state, SessionCommand::AddMessage(Message::user(prompt)));
        self.dispatch(&mut state, SessionCommand::SetRunning(true));
        self.dispatch(&mut state, SessionCommand::AddMessage(Message::assistant("")));
        let generation = self.start_cycle(&mut state, prompt.to_string(), history, api_key);
        Ok(SendOutcome::Started { generation })
    }

    /// Cancel the pending continuation and end the running chain.
    ///
    /// A cycle already talking to the backend is not aborted; its result is
    /// discarded when it arrives. Returns `false` when nothing was running.
    #[instrument(skip_all)]
    pub fn stop(&self) -> bool {
        let mut state = self.lock();
        if let Some(pending) = state.pending.take() {
            pending.handle.abort();
            info!(continuation = pending.id, "continuation cancelled");
        }
        if !state.session.running && state.in_flight.is_none() {
            return false;
        }
        state.generation += 1;
        state.in_flight = None;
        self.dispatch(&mut state, SessionCommand::SetRunning(false));
        self.dispatch(
            &mut state,
            SessionCommand::AddMessage(Message::assistant(STOP_NOTICE)),
        );
        self.emit(SessionEvent::Stopped);
        info!(generation = state.generation, "stopped by user");
        true
    }

    /// Replace a file's content from a user edit.
    pub fn save_file(&self, path: &str, content: &str) {
        let mut state = self.lock();
        self.dispatch(
            &mut state,
            SessionCommand::SaveFile {
                path: path.to_string(),
                content: content.to_string(),
            },
        );
    }

    pub fn select_path(&self, path: Option<String>) {
        let mut state = self.lock();
        self.dispatch(&mut state, SessionCommand::SelectPath(path));
    }

    pub fn set_provider(&self, provider: Provider) -> Result<()> {
        let mut state = self.lock();
        self.dispatch(&mut state, SessionCommand::SetProvider(provider));
        self.persist_settings(&state.session)
    }

    pub fn set_api_key(&self, provider: Provider, key: &str) -> Result<()> {
        let mut state = self.lock();
        self.dispatch(
            &mut state,
            SessionCommand::SetApiKey {
                provider,
                key: key.trim().to_string(),
            },
        );
        self.persist_settings(&state.session)
    }

    pub fn settings(&self) -> Settings {
        settings_of(&self.lock().session)
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Apply `command` and announce what changed.
    fn dispatch(&self, state: &mut ControllerState, command: SessionCommand) {
        let event = match &command {
            SessionCommand::AddMessage(_) | SessionCommand::UpdateLastMessage(_) => None,
            SessionCommand::SetRunning(running) => Some(SessionEvent::Loading { running: *running }),
            SessionCommand::SelectPath(path) => Some(SessionEvent::Selection { path: path.clone() }),
            _ => None,
        };
        let tree_before = Arc::clone(&state.session.tree);
        let warnings_before = state.session.warnings.len();
        let touches_history = matches!(
            command,
            SessionCommand::AddMessage(_) | SessionCommand::UpdateLastMessage(_)
        );
        let touches_schema = matches!(command, SessionCommand::ApplyAgentUpdate(_));
        let touches_settings = matches!(
            command,
            SessionCommand::SetProvider(_) | SessionCommand::SetApiKey { .. }
        );

        apply(&mut state.session, command);
        let session = &state.session;

        if let Some(event) = event {
            if let SessionEvent::Loading { running } = event {
                self.running.send_replace(running);
            }
            self.emit(event);
        }
        if touches_history && let Some(message) = session.history.last() {
            self.emit(SessionEvent::Message {
                index: session.history.len() - 1,
                message: message.clone(),
            });
        }
        if touches_schema {
            self.emit(SessionEvent::Schema {
                schema: session.schema.clone(),
            });
            for warning in &session.warnings[warnings_before..] {
                warn!(%warning, "mode transition audit");
                self.emit(SessionEvent::Warning {
                    message: warning.clone(),
                });
            }
        }
        if !Arc::ptr_eq(&tree_before, &session.tree) {
            self.emit(SessionEvent::Tree {
                tree: Arc::clone(&session.tree),
                last_updated_file: session.last_updated_file.clone(),
            });
            if touches_schema {
                self.emit(SessionEvent::Selection {
                    path: session.selected_path.clone(),
                });
            }
        }
        if touches_settings {
            self.emit(SessionEvent::Settings {
                provider: session.provider,
                configured: Provider::ALL
                    .into_iter()
                    .filter(|provider| session.has_key(*provider))
                    .collect(),
            });
        }
    }

    fn persist_settings(&self, session: &Session) -> Result<()> {
        let Some(path) = &self.settings_path else {
            return Ok(());
        };
        write_settings(path, &settings_of(session))
            .with_context(|| format!("persist settings {}", path.display()))
    }

    /// Bump the generation and spawn a cycle reading the current session.
    fn start_cycle(
        self: &Arc<Self>,
        state: &mut ControllerState,
        prompt: String,
        history: Vec<Message>,
        api_key: String,
    ) -> u64 {
        state.generation += 1;
        let generation = state.generation;
        state.in_flight = Some(generation);

        let provider = state.session.provider;
        let input = CycleInput {
            prompt,
            history,
            tree: Arc::clone(&state.session.tree),
            schema: state.session.schema.clone(),
            selected_path: state.session.selected_path.clone(),
            api_key,
        };
        let backend = self.backends.get(provider);
        info!(generation, provider = provider.id(), "cycle started");

        let this = Arc::clone(self);
        tokio::spawn(async move { this.drive_cycle(generation, backend, input).await });
        generation
    }

    #[instrument(skip_all, fields(generation = generation))]
    async fn drive_cycle(
        self: Arc<Self>,
        generation: u64,
        backend: Arc<dyn ModelBackend>,
        input: CycleInput,
    ) {
        let mut chat = String::new();
        let events = run_cycle(backend, input, self.config.history_window);
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            if !self.handle_event(generation, &mut chat, event) {
                break;
            }
        }
    }

    /// Apply one cycle event. Returns `false` once the cycle is finished or stale.
    fn handle_event(self: &Arc<Self>, generation: u64, chat: &mut String, event: CycleEvent) -> bool {
        let mut state = self.lock();
        if state.in_flight != Some(generation) {
            info!(
                generation,
                current = state.generation,
                "discarding late cycle result"
            );
            return false;
        }
        match event {
            CycleEvent::Chunk(text) => {
                chat.push_str(&text);
                self.dispatch(&mut state, SessionCommand::UpdateLastMessage(chat.clone()));
                true
            }
            CycleEvent::Update(update) => {
                let auto_continue = update.auto_continue;
                info!(
                    generation,
                    mode = update.updated_schema.mode(),
                    pending_steps = update.updated_schema.pending_steps(),
                    file = update.file_update.as_ref().map(|file| file.path.as_str()),
                    auto_continue,
                    "agent update received"
                );
                self.dispatch(&mut state, SessionCommand::ApplyAgentUpdate(update));
                state.in_flight = None;
                if auto_continue {
                    self.schedule_continuation(&mut state);
                } else {
                    self.dispatch(&mut state, SessionCommand::SetRunning(false));
                    info!(generation, "cycle chain finished");
                }
                false
            }
            CycleEvent::Error(message) => {
                warn!(generation, "cycle failed");
                let annotated = format!("{}\n\n**Error:** {}", chat, message);
                self.dispatch(&mut state, SessionCommand::UpdateLastMessage(annotated));
                self.emit(SessionEvent::Error { message });
                state.in_flight = None;
                self.dispatch(&mut state, SessionCommand::SetRunning(false));
                false
            }
        }
    }

    fn schedule_continuation(self: &Arc<Self>, state: &mut ControllerState) {
        state.next_continuation_id += 1;
        let id = state.next_continuation_id;
        let delay = self.config.continuation_delay();

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.fire_continuation(id);
        });
        if let Some(previous) = state.pending.replace(PendingContinuation { id, handle }) {
            previous.handle.abort();
        }
        info!(continuation = id, delay_ms = self.config.continuation_delay_ms, "continuation scheduled");
        self.emit(SessionEvent::ContinuationScheduled {
            delay_ms: self.config.continuation_delay_ms,
        });
    }

    /// Submit the continuation prompt against the session as it is now.
    ///
    /// No user message is added; only a fresh assistant placeholder.
    fn fire_continuation(self: &Arc<Self>, id: u64) {
        let mut state = self.lock();
        if state.pending.as_ref().map(|pending| pending.id) != Some(id) {
            debug!(continuation = id, "continuation superseded");
            return;
        }
        state.pending = None;
        if state.in_flight.is_some() || !state.session.running {
            debug!(continuation = id, "continuation skipped");
            return;
        }

        let provider = state.session.provider;
        let Some(api_key) = state.session.api_key(provider).map(str::to_string) else {
            let message = BackendError::MissingCredential { provider }.to_string();
            warn!(continuation = id, "continuation without credential");
            self.dispatch(
                &mut state,
                SessionCommand::AddMessage(Message::assistant(format!("**Error:** {}", message))),
            );
            self.emit(SessionEvent::Error { message });
            self.dispatch(&mut state, SessionCommand::SetRunning(false));
            return;
        };

        let history = state.session.history.clone();
        self.dispatch(&mut state, SessionCommand::AddMessage(Message::assistant("")));
        self.start_cycle(&mut state, CONTINUE_PROMPT.to_string(), history, api_key);
    }
}

fn settings_of(session: &Session) -> Settings {
    let mut settings = Settings {
        provider: session.provider,
        ..Settings::default()
    };
    for (provider, key) in &session.api_keys {
        settings.api_keys.insert(*provider, key.clone());
    }
    settings
}
