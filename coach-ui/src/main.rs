//! Coach UI server - hosts independent feedback views over one shared history.

mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use clap::Parser;
use coach::io::clipboard::CommandClipboard;
use coach::io::config::load_config;
use coach::io::history_store::HistoryStore;
use coach::io::init::CoachPaths;
use coach::io::service::HttpImproveService;
use coach::io::storage::{FileStorage, MemoryStorage, Storage};
use coach::io::watch::spawn_history_watcher;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "coach-ui")]
#[command(about = "Local view host for the feedback coach")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "3001")]
    port: u16,

    /// Project directory (contains .coach/)
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Directory containing UI static files (defaults to ./ui/dist in the project)
    #[arg(long)]
    ui_dir: Option<PathBuf>,

    /// Keep history in `.coach/storage/`, shared with the CLI and other hosts.
    /// Without it, history lives only as long as this process.
    #[arg(long)]
    shared_storage: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("coach_ui=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let project_dir = args.project_dir.canonicalize().unwrap_or(args.project_dir);
    info!(project_dir = %project_dir.display(), "starting coach-ui");

    let paths = CoachPaths::new(&project_dir);
    let config = load_config(&paths.config_path)?.with_env_overrides()?;
    let storage: Arc<dyn Storage> = if args.shared_storage {
        info!(storage = %paths.storage_dir.display(), "using shared history storage");
        Arc::new(FileStorage::with_capacity_bytes(
            &paths.storage_dir,
            config.history.capacity_bytes,
        ))
    } else {
        Arc::new(MemoryStorage::with_capacity_bytes(
            config.history.capacity_bytes,
        ))
    };
    let store = Arc::new(HistoryStore::with_key(
        storage,
        config.history.storage_key.clone(),
    ));
    let service = HttpImproveService::new(&config.service).context("create service client")?;
    info!(endpoint = service.endpoint(), "improvement service");
    let clipboard = CommandClipboard::new(&config.clipboard)?;

    let state = AppState::new(Arc::clone(&store), Arc::new(service), Arc::new(clipboard));

    sse::spawn_history_forwarder(state.clone());
    if args.shared_storage {
        spawn_history_watcher(store, paths.storage_dir.clone(), Duration::from_millis(250));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", routes::api_router::<HttpImproveService>())
        .route("/events", get(sse::events_handler::<HttpImproveService>))
        .layer(cors)
        .with_state(state);

    let ui_dir = args
        .ui_dir
        .unwrap_or_else(|| project_dir.join("ui").join("dist"));

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
