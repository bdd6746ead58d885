use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use voxtype_client::config::ClientConfig;
use voxtype_client::hotword::HotWords;
use voxtype_client::net::WsHandle;
use voxtype_client::{capture, file, hotkey, mic, net, output};

/// voxtype dictation client. With no arguments it runs the microphone
/// push-to-talk client; with file arguments it transcribes them into
/// sidecar files.
#[derive(Parser)]
#[command(name = "voxtype-client", version)]
struct Cli {
    /// Media files to transcribe.
    files: Vec<PathBuf>,

    /// Path to a TOML config file (default: voxtype-client.toml if present).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Console plus a daily-rolling file log; the client often runs from a
    // desktop launcher where stdout goes nowhere.
    let file_appender = tracing_appender::rolling::daily("logs", "voxtype-client.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    let config = Arc::new(ClientConfig::load(cli.config.as_deref())?);

    if !cli.files.is_empty() {
        return file::transcribe_files(&cli.files, &config).await;
    }
    run_mic(config).await
}

async fn run_mic(config: Arc<ClientConfig>) -> anyhow::Result<()> {
    info!(
        server = %config.server_url,
        hotkey = %config.hotkey,
        "voxtype mic client starting, hold the hotkey to dictate"
    );

    let hotwords = Arc::new(HotWords::load(Path::new(".")));
    let output = output::build(&config);
    let audio_files = Arc::new(DashMap::new());

    let (event_tx, event_rx) = tokio::sync::mpsc::channel(256);
    let _capture = capture::spawn_capture_thread(event_tx.clone())?;
    hotkey::spawn_listener(&config.hotkey, event_tx)?;

    let ws = Arc::new(WsHandle::new());
    tokio::spawn(mic::run_utterances(
        event_rx,
        ws.clone(),
        config.clone(),
        audio_files.clone(),
    ));

    // Connection loop: attach whenever the server is reachable, dictation
    // frames are dropped (with a warning) while it is not.
    loop {
        match net::connect(&config.server_url).await {
            Ok((sink, stream)) => {
                info!("connected to server");
                ws.attach(sink).await;
                net::run_mic_receiver(
                    stream,
                    config.clone(),
                    hotwords.clone(),
                    output.clone(),
                    audio_files.clone(),
                )
                .await;
                ws.detach().await;
                warn!("disconnected from server, retrying");
            }
            Err(e) => debug!(error = %e, "server unavailable, retrying"),
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
}
