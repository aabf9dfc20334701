//! Shared application state for the UI server.

use std::sync::Arc;

use docagent::controller::SessionController;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The one session this server drives.
    pub controller: Arc<SessionController>,
}

impl AppState {
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self { controller }
    }
}
