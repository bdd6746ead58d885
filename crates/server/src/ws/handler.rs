use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voxtype_protocol::{AudioFrame, FrameError};
use voxtype_transcribe::segment::SegmentBuffer;

use crate::state::AppState;

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.protocols(["binary"])
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!(%connection_id, "client connected");

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    state.registry.add(connection_id.clone(), sender.clone());
    state.live_sockets.insert(connection_id.clone());

    // Per-connection accumulator; reset by each task's final frame.
    let mut buffer = SegmentBuffer::new();

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Err(e) =
                    handle_frame(&state, &mut buffer, &connection_id, text.as_str()).await
                {
                    // A malformed frame corrupts the stream; close with a
                    // diagnostic rather than guessing at recovery.
                    warn!(%connection_id, error = %e, "bad frame, closing connection");
                    let mut guard = sender.lock().await;
                    let _ = guard.close().await;
                    break;
                }
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(%connection_id, error = %e, "websocket error");
                break;
            }
            _ => {}
        }
    }

    // In-flight tasks for this id are dropped by the worker's liveness
    // check once the id leaves the set.
    state.live_sockets.remove(&connection_id);
    state.registry.remove(&connection_id);
    info!(%connection_id, "client disconnected");
}

async fn handle_frame(
    state: &AppState,
    buffer: &mut SegmentBuffer,
    connection_id: &str,
    raw: &str,
) -> Result<(), FrameError> {
    let frame = AudioFrame::from_json(raw)?;
    let tasks = buffer.push(&frame, connection_id, now_epoch())?;

    for task in tasks {
        debug!(
            task_id = %task.task_id,
            offset = task.offset,
            is_final = task.is_final,
            "segment queued"
        );
        let tx = state.tasks.clone();
        // Blocking send on the bounded queue, off the I/O thread: a full
        // queue parks this loop and the socket stops being read.
        let sent = tokio::task::spawn_blocking(move || tx.send(task)).await;
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(_)) | Err(_) => {
                warn!(%connection_id, "task queue closed, dropping segment");
            }
        }
    }
    Ok(())
}

fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
