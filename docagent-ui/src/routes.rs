//! HTTP route handlers for the UI API.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use docagent::controller::{SendError, SendOutcome};
use docagent::core::path::resolve;
use docagent::core::session::Session;
use docagent::core::types::Provider;
use docagent::io::archive::{ARCHIVE_NAME, archive_bytes};
use docagent::tree::DocNode;

use crate::state::AppState;

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/session", get(get_session))
        .route("/files/{*path}", get(get_file).put(put_file))
        .route("/selection", put(put_selection))
        .route("/messages", post(post_message))
        .route("/stop", post(post_stop))
        .route("/settings/provider", put(put_provider))
        .route("/settings/keys/{provider}", put(put_key))
        .route("/export", get(export))
}

/// JSON error body: `{"error": "..."}`.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        warn!(error = %format!("{:#}", err), "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Session snapshot plus which providers have a key. Keys never leave the server.
#[derive(Serialize)]
struct SessionView {
    #[serde(flatten)]
    session: Session,
    configured: Vec<Provider>,
}

/// GET /api/session
async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    let session = state.controller.snapshot();
    let configured = configured(&session);
    Json(SessionView {
        session,
        configured,
    })
}

fn configured(session: &Session) -> Vec<Provider> {
    Provider::ALL
        .into_iter()
        .filter(|provider| session.has_key(*provider))
        .collect()
}

/// GET /api/files/{*path} - the node at `path` (file or folder).
async fn get_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<DocNode>, StatusCode> {
    let session = state.controller.snapshot();
    resolve(&session.tree, &path)
        .map(|node| Json(node.clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Deserialize)]
struct SaveBody {
    content: String,
}

/// PUT /api/files/{*path} - folders and unknown paths are left untouched.
async fn put_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(body): Json<SaveBody>,
) -> StatusCode {
    state.controller.save_file(&path, &body.content);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct SelectionBody {
    path: Option<String>,
}

/// PUT /api/selection - the file the user is viewing, sent to the model as a
/// focus hint. `null` clears it.
async fn put_selection(
    State(state): State<AppState>,
    Json(body): Json<SelectionBody>,
) -> StatusCode {
    state.controller.select_path(body.path);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct SendBody {
    prompt: String,
}

/// POST /api/messages - 202 once a cycle starts, 409 while one is running.
async fn post_message(
    State(state): State<AppState>,
    Json(body): Json<SendBody>,
) -> Result<Response, ApiError> {
    match state.controller.send(&body.prompt) {
        Ok(SendOutcome::Started { generation }) => {
            info!(generation, "prompt accepted");
            Ok((StatusCode::ACCEPTED, Json(json!({ "generation": generation }))).into_response())
        }
        Ok(SendOutcome::Busy) => Err(ApiError::new(
            StatusCode::CONFLICT,
            "the agent is still working",
        )),
        Err(err @ SendError::EmptyPrompt) => {
            Err(ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))
        }
        Err(err @ SendError::MissingCredential { .. }) => Err(ApiError::new(
            StatusCode::PRECONDITION_FAILED,
            err.to_string(),
        )),
    }
}

/// POST /api/stop
async fn post_stop(State(state): State<AppState>) -> StatusCode {
    state.controller.stop();
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
struct SettingsView {
    provider: Provider,
    configured: Vec<Provider>,
}

fn settings_view(state: &AppState) -> Json<SettingsView> {
    let session = state.controller.snapshot();
    Json(SettingsView {
        provider: session.provider,
        configured: configured(&session),
    })
}

#[derive(Deserialize)]
struct ProviderBody {
    provider: Provider,
}

/// PUT /api/settings/provider
async fn put_provider(
    State(state): State<AppState>,
    Json(body): Json<ProviderBody>,
) -> Result<Json<SettingsView>, ApiError> {
    state
        .controller
        .set_provider(body.provider)
        .map_err(ApiError::internal)?;
    Ok(settings_view(&state))
}

#[derive(Deserialize)]
struct KeyBody {
    key: String,
}

/// PUT /api/settings/keys/{provider}
async fn put_key(
    State(state): State<AppState>,
    Path(provider): Path<Provider>,
    Json(body): Json<KeyBody>,
) -> Result<Json<SettingsView>, ApiError> {
    state
        .controller
        .set_api_key(provider, &body.key)
        .map_err(ApiError::internal)?;
    Ok(settings_view(&state))
}

/// GET /api/export - the current tree as a zip download.
async fn export(State(state): State<AppState>) -> Result<Response, ApiError> {
    let tree = state.controller.snapshot().tree;
    let bytes = archive_bytes(&tree).map_err(ApiError::internal)?;
    let disposition = format!("attachment; filename=\"{}\"", ARCHIVE_NAME);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use docagent::test_support::{ScriptedBackend, agent_reply, scripted_controller};

    use super::*;

    fn app(backend: ScriptedBackend) -> (Router, AppState) {
        let (router, state, _) = app_with_backend(backend);
        (router, state)
    }

    fn app_with_backend(backend: ScriptedBackend) -> (Router, AppState, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let state = AppState::new(scripted_controller(Arc::clone(&backend)));
        let router = Router::new()
            .nest("/api", api_router())
            .with_state(state.clone());
        (router, state, backend)
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        let response = router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, bytes.to_vec())
    }

    fn json_body(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).expect("json body")
    }

    #[tokio::test]
    async fn session_view_hides_keys() {
        let (router, _) = app(ScriptedBackend::new());
        let (status, body) = call(&router, "GET", "/api/session", None).await;
        assert_eq!(status, StatusCode::OK);

        let view = json_body(&body);
        assert_eq!(view["configured"], json!(["google"]));
        assert_eq!(view["provider"], "google");
        assert!(view.get("api_keys").is_none());
        assert!(!String::from_utf8_lossy(&body).contains("test-key"));
    }

    #[tokio::test]
    async fn file_routes_read_and_save() {
        let (router, _) = app(ScriptedBackend::new());

        let (status, body) = call(&router, "GET", "/api/files/docs/README.md", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["content"], "# Readme\n");

        let (status, _) = call(
            &router,
            "PUT",
            "/api/files/docs/README.md",
            Some(json!({ "content": "# Edited\n" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = call(&router, "GET", "/api/files/docs/README.md", None).await;
        assert_eq!(json_body(&body)["content"], "# Edited\n");

        let (status, _) = call(&router, "GET", "/api/files/docs/missing.md", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn message_status_codes() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let (router, state) = app(ScriptedBackend::new().gated_reply(
            Arc::clone(&gate),
            &[&agent_reply("Done.", "ANALYSIS", None, false)],
        ));

        let (status, _) = call(&router, "POST", "/api/messages", Some(json!({ "prompt": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&router, "POST", "/api/messages", Some(json!({ "prompt": "Build a CRM" }))).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, _) = call(&router, "POST", "/api/messages", Some(json!({ "prompt": "again" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        gate.notify_one();
        state.controller.wait_until_idle().await;

        let (status, _) = call(
            &router,
            "PUT",
            "/api/settings/provider",
            Some(json!({ "provider": "openrouter" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&router, "POST", "/api/messages", Some(json!({ "prompt": "hi" }))).await;
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(
            json_body(&body)["error"],
            "Please set your OpenRouter API key in the settings."
        );
    }

    #[tokio::test]
    async fn selection_becomes_focus_hint_for_next_cycle() {
        let (router, state, backend) = app_with_backend(
            ScriptedBackend::new().reply(&[&agent_reply("Looked.", "ANALYSIS", None, false)]),
        );

        let (status, _) = call(
            &router,
            "PUT",
            "/api/selection",
            Some(json!({ "path": "docs/design/api.md" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = call(&router, "GET", "/api/session", None).await;
        assert_eq!(json_body(&body)["selected_path"], "docs/design/api.md");

        let (status, _) = call(&router, "POST", "/api/messages", Some(json!({ "prompt": "Review this" }))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        state.controller.wait_until_idle().await;

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert!(
            requests[0]
                .system_instruction
                .ends_with("The user is currently viewing: docs/design/api.md")
        );

        let (status, _) = call(&router, "PUT", "/api/selection", Some(json!({ "path": null }))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.controller.snapshot().selected_path, None);
    }

    #[tokio::test]
    async fn stop_is_always_no_content() {
        let (router, _) = app(ScriptedBackend::new());
        let (status, _) = call(&router, "POST", "/api/stop", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn key_update_marks_provider_configured() {
        let (router, _) = app(ScriptedBackend::new());
        let (status, body) = call(
            &router,
            "PUT",
            "/api/settings/keys/openrouter",
            Some(json!({ "key": "sk-or" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["configured"], json!(["google", "openrouter"]));
    }

    #[tokio::test]
    async fn export_is_a_named_zip() {
        let (router, _) = app(ScriptedBackend::new());
        let request = Request::builder()
            .uri("/api/export")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"mon_super_projet_docs.zip\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert!(bytes.starts_with(b"PK"));
    }
}
