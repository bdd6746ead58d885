//! The utterance sender: turns hotkey-delimited capture events into one
//! streamed task per utterance.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voxtype_protocol::{AudioFrame, Source, encode_pcm};

use crate::archive::{self, AudioArchive};
use crate::capture::{CAPTURE_RATE, CaptureEvent};
use crate::config::ClientConfig;
use crate::downmix::downmix_48k_to_16k;
use crate::net::WsHandle;

/// Consumes capture events forever, emitting one task per Begin..Finish
/// span. Data outside a span is discarded.
pub async fn run_utterances(
    mut events: mpsc::Receiver<CaptureEvent>,
    ws: Arc<WsHandle>,
    config: Arc<ClientConfig>,
    audio_files: Arc<DashMap<String, PathBuf>>,
) {
    loop {
        // Idle until the hotkey starts an utterance.
        let time_start = loop {
            match events.recv().await {
                Some(CaptureEvent::Begin { time }) => break time,
                Some(_) => continue,
                None => return,
            }
        };

        let task_id = Uuid::new_v4().to_string();
        debug!(%task_id, "utterance started");
        send_utterance(&mut events, &ws, &config, &audio_files, &task_id, time_start).await;
    }
}

async fn send_utterance(
    events: &mut mpsc::Receiver<CaptureEvent>,
    ws: &WsHandle,
    config: &ClientConfig,
    audio_files: &DashMap<String, PathBuf>,
    task_id: &str,
    time_start: f64,
) {
    // Pre-trigger hold buffer: blocks captured before the threshold are
    // cached so the first syllables are kept, and a release before the
    // threshold cancels the utterance entirely.
    let mut cache: Vec<Vec<f32>> = Vec::new();
    let mut flushed = false;
    let mut duration = 0.0f64;
    let mut archive: Option<AudioArchive> = None;

    while let Some(event) = events.recv().await {
        match event {
            CaptureEvent::Data {
                time,
                samples,
                channels,
            } => {
                if time - time_start < config.threshold {
                    cache.push(samples);
                    continue;
                }

                if config.save_audio && archive.is_none() && !flushed {
                    match archive::create(channels, time_start) {
                        Ok((path, writer)) => {
                            audio_files.insert(task_id.to_string(), path);
                            archive = Some(writer);
                        }
                        Err(e) => warn!(error = %e, "cannot create archive file"),
                    }
                }

                let block: Vec<f32> = if cache.is_empty() {
                    samples
                } else {
                    cache.push(samples);
                    cache.drain(..).flatten().collect()
                };

                duration += block.len() as f64 / channels as f64 / CAPTURE_RATE as f64;
                if let Some(writer) = archive.as_mut() {
                    writer.write(&block);
                }

                let mono = downmix_48k_to_16k(&block, channels as usize);
                let frame = AudioFrame {
                    task_id: task_id.to_string(),
                    seg_duration: config.mic_seg_duration,
                    seg_overlap: config.mic_seg_overlap,
                    is_final: false,
                    time_start,
                    time_frame: time,
                    source: Source::Mic,
                    data: encode_pcm(&mono),
                };
                flushed = true;
                ws.send_text(frame.to_json()).await;
            }

            CaptureEvent::Finish { time } => {
                if let Some(writer) = archive.take() {
                    writer.finish();
                }

                if !flushed {
                    debug!(%task_id, "released before threshold, discarded");
                    return;
                }

                info!(%task_id, duration = format!("{duration:.2}s"), "utterance finished");
                let frame = AudioFrame {
                    task_id: task_id.to_string(),
                    seg_duration: config.mic_seg_duration,
                    seg_overlap: config.mic_seg_overlap,
                    is_final: true,
                    time_start,
                    time_frame: time,
                    source: Source::Mic,
                    data: String::new(),
                };
                if !ws.send_text(frame.to_json()).await {
                    // No server: the archive file stays, but there will be
                    // no transcript to rename it with.
                    audio_files.remove(task_id);
                }
                return;
            }

            CaptureEvent::Begin { .. } => {
                // Press without an intervening release (key repeat slips
                // through on some platforms).
                debug!(%task_id, "nested begin ignored");
            }
        }
    }
}
