//! WebSocket plumbing shared by mic and file mode.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{info, warn};
use voxtype_protocol::ResultFrame;

use crate::config::ClientConfig;
use crate::hotword::HotWords;
use crate::output::SharedOutput;
use crate::{archive, markdown, text};

pub type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
pub type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connects to the server, negotiating the `binary` subprotocol.
pub async fn connect(url: &str) -> anyhow::Result<(WsSink, WsSource)> {
    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("binary"));
    let (stream, _) = connect_async(request).await?;
    Ok(stream.split())
}

/// The mic pipeline's handle to whatever connection is currently up.
/// Frames sent while disconnected are dropped with a warning — dictation
/// must not stall waiting for a server.
#[derive(Default)]
pub struct WsHandle {
    sink: Mutex<Option<WsSink>>,
}

impl WsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(&self, sink: WsSink) {
        *self.sink.lock().await = Some(sink);
    }

    pub async fn detach(&self) {
        *self.sink.lock().await = None;
    }

    /// Sends one frame; returns false if there is no connection or the
    /// send failed (the connection is dropped in that case).
    pub async fn send_text(&self, json: String) -> bool {
        let mut guard = self.sink.lock().await;
        match guard.as_mut() {
            None => {
                warn!("server not connected, frame dropped");
                false
            }
            Some(sink) => match sink.send(Message::text(json)).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "send failed, dropping connection");
                    *guard = None;
                    false
                }
            },
        }
    }
}

/// Mic-mode receive loop: waits for final results and turns them into
/// keystrokes, archive renames and markdown log lines. Returns when the
/// connection closes.
pub async fn run_mic_receiver(
    mut stream: WsSource,
    config: Arc<ClientConfig>,
    hotwords: Arc<HotWords>,
    output: SharedOutput,
    audio_files: Arc<DashMap<String, PathBuf>>,
) {
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            _ => continue,
        };
        let result = match ResultFrame::from_json(message.as_str()) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "unreadable result frame");
                continue;
            }
        };
        if !result.is_final {
            continue;
        }

        let delay = result.time_complete - result.time_submit;
        let mut out_text = text::strip_punc(&result.text, &config.trash_punc).to_string();
        out_text = hotwords.apply(&out_text, &config);

        {
            let output = output.clone();
            let to_type = out_text.clone();
            let typed = tokio::task::spawn_blocking(move || {
                output.lock().expect("output driver lock").emit(&to_type)
            })
            .await;
            match typed {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "failed to type result"),
                Err(e) => warn!(error = %e, "output task panicked"),
            }
        }

        if config.save_audio
            && let Some((_, path)) = audio_files.remove(&result.task_id)
        {
            match archive::rename_audio_file(
                &path,
                &out_text,
                result.time_start,
                config.audio_name_len,
            ) {
                Ok(renamed) => {
                    // The plain daily log is always written; keyword-split
                    // logs only when the keyword layer is on.
                    let keywords: &[String] = if config.hot_kwd {
                        &hotwords.keywords
                    } else {
                        &[]
                    };
                    if let Err(e) =
                        markdown::write_entry(&out_text, result.time_start, &renamed, keywords)
                    {
                        warn!(error = %e, "failed to write markdown log");
                    }
                }
                Err(e) => warn!(error = %e, "failed to rename audio file"),
            }
        }

        info!(delay = format!("{delay:.2}s"), text = %out_text, "recognized");
    }
    info!("connection closed");
}
