use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dashmap::DashSet;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voxtype_server::config::ServerSettings;
use voxtype_server::error::ServerError;
use voxtype_server::state::AppState;
use voxtype_server::ws::sender::run_result_sender;
use voxtype_server::ws::storage::SocketRegistry;
use voxtype_transcribe::{Outbound, check_model, worker};

/// voxtype dictation server: accepts streamed audio over WebSocket and
/// returns partial and final transcripts.
#[derive(Parser)]
#[command(name = "voxtype-server", version)]
struct Cli {
    /// Path to a TOML config file (default: voxtype-server.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = ServerSettings::load(cli.config.as_deref())?;

    // Model files must exist before anything binds; a server without its
    // models exits non-zero having accepted no connections.
    check_model(&settings.engine)?;

    let live_sockets = Arc::new(DashSet::new());
    let handle = worker::spawn(settings.engine.clone(), live_sockets.clone())?;

    // Block until the engines are loaded (or failed to load).
    {
        let results = handle.results.clone();
        tokio::task::spawn_blocking(move || match results.recv() {
            Ok(Outbound::Ready) => Ok(()),
            _ => Err(ServerError::EngineStart),
        })
        .await??;
    }

    let registry = Arc::new(SocketRegistry::new());
    let state = AppState {
        registry: registry.clone(),
        live_sockets,
        tasks: handle.tasks.clone(),
    };
    let sender_task = tokio::spawn(run_result_sender(registry, handle.results.clone()));

    let addr = format!("{}:{}", settings.addr, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: addr.clone(),
            source: e,
        })?;
    info!(%addr, "voxtype server listening");

    let router = voxtype_server::build_router(state);
    tokio::select! {
        result = axum::serve(listener, router).into_future() => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
    }

    // Closing the task queue stops the worker, whose shutdown sentinel in
    // turn stops the result sender.
    handle.shutdown();
    let _ = sender_task.await;
    Ok(())
}
