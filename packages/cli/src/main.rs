// ABOUTME: Entry point for the skiff binary: control-surface server and chat demo
// ABOUTME: Loads .env, initializes tracing, and dispatches clap subcommands

use clap::{Parser, Subcommand};
use skiff_api::AppState;
use skiff_sandbox::{
    BackendKind, DockerBackend, LifecycleOrchestrator, RemoteBackend, UnifiedSandboxManager,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod chat;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "skiff", about = "Agent sessions with disposable execution sandboxes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control surface
    Serve,
    /// Interactive conversation with a sandbox-backed agent
    Chat {
        /// Environment spec: container image or sandbox template id
        #[arg(long, default_value = "py-env")]
        environment: String,
        /// Backend kind: local-container or remote-managed
        #[arg(long, default_value = "remote-managed")]
        backend: BackendKindArg,
    },
}

#[derive(Clone)]
struct BackendKindArg(BackendKind);

impl std::str::FromStr for BackendKindArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<BackendKind>().map(BackendKindArg)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Chat {
            environment,
            backend,
        } => chat::run(config, environment, backend.0).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let sandboxes = Arc::new(UnifiedSandboxManager::new());

    sandboxes
        .register_backend(Arc::new(RemoteBackend::from_env()))
        .await;
    match DockerBackend::new() {
        Ok(docker) => sandboxes.register_backend(Arc::new(docker)).await,
        Err(e) => warn!("Docker backend unavailable: {}", e),
    }

    let lifecycle = Arc::new(LifecycleOrchestrator::new(
        sandboxes.clone(),
        &config.storage_dir,
    )?);

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<axum::http::HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = skiff_api::create_router(AppState::new(lifecycle, sandboxes)).layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    println!("Skiff control surface listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
