use std::sync::Arc;

use axum::extract::ws::Message;
use crossbeam_channel::Receiver;
use futures::SinkExt;
use tracing::{debug, info, warn};
use voxtype_protocol::Source;
use voxtype_transcribe::{Outbound, Transcript};

use crate::ws::storage::SocketRegistry;

/// Drains the worker's out-queue and routes each transcript to the
/// connection that streamed the audio. Runs for the server's lifetime and
/// exits on the worker's shutdown sentinel.
pub async fn run_result_sender(registry: Arc<SocketRegistry>, results: Receiver<Outbound>) {
    loop {
        let rx = results.clone();
        // The out-queue is a blocking channel; park on a blocking thread.
        let outbound = match tokio::task::spawn_blocking(move || rx.recv()).await {
            Ok(Ok(outbound)) => outbound,
            Ok(Err(_)) | Err(_) => break,
        };
        match outbound {
            Outbound::Ready => continue,
            Outbound::Shutdown => break,
            Outbound::Transcript(transcript) => deliver(&registry, transcript).await,
        }
    }
    debug!("result sender exited");
}

async fn deliver(registry: &SocketRegistry, transcript: Transcript) {
    let Some(sender) = registry.get(&transcript.socket_id) else {
        // The connection closed while this segment was decoding.
        debug!(task_id = %transcript.task_id, "connection gone, result dropped");
        return;
    };

    let frame = transcript.to_frame();
    {
        let mut guard = sender.lock().await;
        if let Err(e) = guard.send(Message::text(frame.to_json())).await {
            warn!(task_id = %transcript.task_id, error = %e, "failed to send result");
            return;
        }
    }

    match transcript.source {
        Source::Mic => {
            if transcript.is_final {
                info!(text = %transcript.text, "recognized");
            }
        }
        Source::File => {
            if transcript.is_final {
                info!(duration = transcript.duration, "file transcription complete");
            } else {
                debug!(duration = transcript.duration, "file transcription progress");
            }
        }
    }
}
