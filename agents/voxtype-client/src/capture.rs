//! Microphone capture on a dedicated thread.
//!
//! The cpal stream is owned by its own OS thread (the stream handle is not
//! `Send` on every backend) and device callbacks never block: blocks are
//! pushed into the event queue with `try_send` and dropped if the consumer
//! is behind. Device loss schedules an idempotent reopen on the same
//! thread, off the I/O loop.

use std::time::Duration;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::now_epoch;

/// Capture sample rate; the wire format is derived by 3:1 decimation.
pub const CAPTURE_RATE: u32 = 48_000;

/// Device block size in seconds.
pub const BLOCK_SECS: f64 = 0.05;

/// Events flowing from the device and hotkey threads into the utterance
/// pipeline.
#[derive(Debug)]
pub enum CaptureEvent {
    /// Hotkey pressed: a new utterance starts now.
    Begin { time: f64 },
    /// One device block of interleaved samples at 48 kHz.
    Data {
        time: f64,
        samples: Vec<f32>,
        channels: u16,
    },
    /// Hotkey released: the utterance is complete.
    Finish { time: f64 },
}

enum CaptureCommand {
    Reopen,
}

/// Handle to the capture thread. Dropping it stops the thread.
pub struct CaptureControl {
    commands: std::sync::mpsc::Sender<CaptureCommand>,
}

impl CaptureControl {
    /// Requests a stream reopen (safe to call repeatedly).
    pub fn reopen(&self) {
        let _ = self.commands.send(CaptureCommand::Reopen);
    }
}

/// Starts the capture thread and opens the input stream. Fails if no
/// input stream can be opened at startup; later device loss is handled by
/// reopening in place.
pub fn spawn_capture_thread(events: mpsc::Sender<CaptureEvent>) -> anyhow::Result<CaptureControl> {
    let (command_tx, command_rx) = std::sync::mpsc::channel::<CaptureCommand>();
    let (startup_tx, startup_rx) = std::sync::mpsc::channel::<anyhow::Result<()>>();
    let error_tx = command_tx.clone();

    std::thread::Builder::new()
        .name("audio-capture".into())
        .spawn(move || {
            // The stream handle must live on this thread; report only the
            // outcome of the first open back to the caller.
            let mut stream = match open_stream(&events, &error_tx) {
                Ok(stream) => {
                    let _ = startup_tx.send(Ok(()));
                    Some(stream)
                }
                Err(e) => {
                    let _ = startup_tx.send(Err(e));
                    return;
                }
            };

            while let Ok(CaptureCommand::Reopen) = command_rx.recv() {
                // Collapse a burst of error callbacks into one reopen.
                while command_rx.try_recv().is_ok() {}
                info!("reopening input stream");
                drop(stream.take());
                std::thread::sleep(Duration::from_millis(100));
                match open_stream(&events, &error_tx) {
                    Ok(new_stream) => stream = Some(new_stream),
                    Err(e) => error!(error = %e, "failed to reopen input stream"),
                }
            }
        })
        .context("failed to spawn capture thread")?;

    startup_rx
        .recv()
        .context("capture thread exited before reporting")??;

    Ok(CaptureControl {
        commands: command_tx,
    })
}

fn open_stream(
    events: &mpsc::Sender<CaptureEvent>,
    errors: &std::sync::mpsc::Sender<CaptureCommand>,
) -> anyhow::Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow::anyhow!("no input device found"))?;
    let name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let supported = device
        .default_input_config()
        .context("failed to query input device")?;
    let channels = supported.channels().min(2);
    info!(device = %name, channels, "opening input stream at 48 kHz");

    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(CAPTURE_RATE),
        buffer_size: cpal::BufferSize::Fixed((CAPTURE_RATE as f64 * BLOCK_SECS) as u32),
    };

    let events = events.clone();
    let errors = errors.clone();
    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _| {
            // Device thread: never block. A full queue drops the block.
            let _ = events.try_send(CaptureEvent::Data {
                time: now_epoch(),
                samples: data.to_vec(),
                channels,
            });
        },
        move |err| {
            warn!(error = %err, "input stream error, scheduling reopen");
            let _ = errors.send(CaptureCommand::Reopen);
        },
        None,
    )?;
    stream.play()?;
    Ok(stream)
}
