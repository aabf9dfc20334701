//! Docagent UI server - browser surface for the documentation agent session.

mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use docagent::controller::SessionController;
use docagent::io::paths::StatePaths;
use docagent::logging;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "docagent-ui")]
#[command(about = "Web UI for chatting with the documentation agent")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "8787")]
    port: u16,

    /// Directory holding config.toml and settings.json
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Directory containing UI static files
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_with_default("docagent_ui=info,docagent=info");

    let args = Args::parse();

    let paths = StatePaths::resolve(args.state_dir)?;
    info!(state_dir = %paths.state_dir.display(), "starting docagent-ui");

    let state = AppState::new(SessionController::bootstrap(&paths)?);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", routes::api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state);

    match args.ui_dir {
        Some(ui_dir) if ui_dir.exists() => {
            info!(ui_dir = %ui_dir.display(), "serving static UI files");
            app = app.fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true));
        }
        Some(ui_dir) => {
            info!(ui_dir = %ui_dir.display(), "UI directory not found, API-only mode");
        }
        None => info!("no UI directory given, API-only mode"),
    }

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
