//! nbrun dashboard server: upload a dataset, run the notebook script, view its outputs.

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
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "nbrun-ui")]
#[command(about = "Web dashboard for running a notebook script in the nbrun sandbox")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "3001")]
    port: u16,

    /// Working directory (holds the script, dataset and .nbrun/)
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Directory containing UI static files (defaults to ./ui/dist under the working directory)
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nbrun::logging::init_with_default("warn,nbrun=info,nbrun_ui=info");

    let args = Args::parse();

    let workdir = match args.workdir.canonicalize() {
        Ok(path) => path,
        Err(err) => {
            warn!(workdir = %args.workdir.display(), error = %err, "cannot canonicalize working directory");
            args.workdir
        }
    };
    info!(workdir = %workdir.display(), "starting nbrun-ui");

    let state = AppState::new(workdir.clone());

    sse::start_file_watcher(state.clone());

    let api_router = routes::api_router();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", api_router)
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state);

    let ui_dir = args
        .ui_dir
        .unwrap_or_else(|| workdir.join("ui").join("dist"));

    if ui_dir.exists() {
        info!(ui_dir = %ui_dir.display(), "serving static UI files");
        app = app.fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true));
    } else {
        info!(ui_dir = %ui_dir.display(), "UI directory not found, API-only mode");
    }

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
