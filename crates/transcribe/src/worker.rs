//! The recognizer worker: a dedicated OS thread that loads the speech
//! engines once, pulls [`Task`]s from a bounded queue, and pushes merged
//! [`Transcript`]s back. The only state shared with the async I/O loop is
//! the two queues and the live-socket set.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use dashmap::DashSet;
use tracing::{debug, error, info, warn};

use crate::asr::{self, Normalizer, Punctuator, Recognizer};
use crate::config::{EngineConfig, FormatFlags, PuncModel};
use crate::merge::merge_segment;
use crate::text;
use crate::{Task, Transcript};

/// Task queue capacity. A full queue blocks the receive coroutine, which
/// propagates backpressure to the client through the WebSocket.
const TASK_QUEUE_CAPACITY: usize = 64;

/// Worker poll interval, so queue shutdown is observed within a second.
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Messages on the out-queue.
#[derive(Debug)]
pub enum Outbound {
    /// Engines are loaded; the listener may start accepting clients.
    Ready,
    Transcript(Transcript),
    /// The worker exited — engine startup failure or task queue closed.
    Shutdown,
}

/// The speech engines the worker owns. Built once, on the worker thread.
pub struct Engines {
    pub recognizer: Box<dyn Recognizer>,
    pub punctuator: Option<Box<dyn Punctuator>>,
    pub normalizer: Option<Box<dyn Normalizer>>,
}

impl Engines {
    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        let recognizer = asr::build_recognizer(&config.recognize_model)?;
        // The punctuation collaborator serves both final-text passes; each
        // trait object gets its own client.
        let punctuator = match asr::build_punctuator(config.punc_model.as_ref())? {
            Some(service) => Some(Box::new(service) as Box<dyn Punctuator>),
            None => None,
        };
        let normalizer = match &config.punc_model {
            Some(PuncModel::Remote { endpoint }) => Some(Box::new(
                asr::remote::RemoteTextService::new(endpoint)?,
            ) as Box<dyn Normalizer>),
            None => None,
        };
        Ok(Self {
            recognizer,
            punctuator,
            normalizer,
        })
    }
}

/// Handle to a running worker: the task sender, the result receiver, and
/// the thread itself. Dropping the task sender stops the worker.
pub struct RecognizerHandle {
    pub tasks: Sender<Task>,
    pub results: Receiver<Outbound>,
    thread: thread::JoinHandle<()>,
}

impl RecognizerHandle {
    /// Blocks until the worker signals readiness.
    pub fn wait_ready(&self) -> anyhow::Result<()> {
        match self.results.recv() {
            Ok(Outbound::Ready) => Ok(()),
            _ => anyhow::bail!("recognizer worker failed to start"),
        }
    }

    /// Closes the task queue and joins the worker.
    pub fn shutdown(self) {
        drop(self.tasks);
        let _ = self.thread.join();
    }
}

/// Spawns the worker with engines built from configuration.
pub fn spawn(
    config: EngineConfig,
    live_sockets: Arc<DashSet<String>>,
) -> anyhow::Result<RecognizerHandle> {
    let flags = config.format_flags();
    spawn_with(move || Engines::from_config(&config), flags, live_sockets)
}

/// Spawns the worker with a caller-supplied engine constructor. The
/// constructor runs on the worker thread — model loading is heavy and must
/// not happen on the I/O loop.
pub fn spawn_with<F>(
    build: F,
    flags: FormatFlags,
    live_sockets: Arc<DashSet<String>>,
) -> anyhow::Result<RecognizerHandle>
where
    F: FnOnce() -> anyhow::Result<Engines> + Send + 'static,
{
    let (task_tx, task_rx) = bounded(TASK_QUEUE_CAPACITY);
    let (out_tx, out_rx) = unbounded();

    let thread = thread::Builder::new()
        .name("recognizer".into())
        .spawn(move || {
            let engines = match build() {
                Ok(engines) => engines,
                Err(e) => {
                    error!(error = %e, "failed to initialize speech engines");
                    let _ = out_tx.send(Outbound::Shutdown);
                    return;
                }
            };
            info!(engine = engines.recognizer.name(), "speech engines ready");
            let _ = out_tx.send(Outbound::Ready);
            worker_loop(&engines, flags, &task_rx, &out_tx, &live_sockets);
            let _ = out_tx.send(Outbound::Shutdown);
        })
        .map_err(|e| anyhow::anyhow!("failed to spawn recognizer thread: {e}"))?;

    Ok(RecognizerHandle {
        tasks: task_tx,
        results: out_rx,
        thread,
    })
}

fn worker_loop(
    engines: &Engines,
    flags: FormatFlags,
    tasks: &Receiver<Task>,
    out: &Sender<Outbound>,
    live_sockets: &DashSet<String>,
) {
    // Accumulators keyed by task_id, private to this thread. An entry is
    // created by the first segment and removed when its final result is
    // emitted.
    let mut results: HashMap<String, Transcript> = HashMap::new();

    loop {
        let task = match tasks.recv_timeout(RECV_TIMEOUT) {
            Ok(task) => task,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if !live_sockets.contains(&task.socket_id) {
            // Tasks of one task_id are ordered, so once the connection is
            // gone every later segment will be dropped too — the
            // accumulator can go now.
            debug!(task_id = %task.task_id, "connection gone, dropping task");
            results.remove(&task.task_id);
            continue;
        }

        let samples = voxtype_protocol::samples_from_bytes(&task.data);
        let output = match engines.recognizer.decode(&samples) {
            Ok(output) => output,
            Err(e) => {
                warn!(task_id = %task.task_id, error = %e, "segment decode failed, skipping");
                continue;
            }
        };

        let mut result = results.remove(&task.task_id).unwrap_or_else(|| {
            Transcript::new(
                task.task_id.clone(),
                task.socket_id.clone(),
                task.source,
            )
        });
        result.time_start = task.time_start;
        result.time_submit = task.time_submit;
        merge_segment(&mut result, &task, &output);

        if task.is_final {
            result.text = finalize_text(std::mem::take(&mut result.text), engines, flags);
            result.time_complete = now_epoch();
            result.is_final = true;
            let _ = out.send(Outbound::Transcript(result));
        } else {
            let _ = out.send(Outbound::Transcript(result.clone()));
            results.insert(task.task_id.clone(), result);
        }
    }
}

/// Final-only text post-processing: spacing, punctuation, number
/// normalization, spacing again. Collaborator failures degrade to the
/// unprocessed text.
fn finalize_text(mut text: String, engines: &Engines, flags: FormatFlags) -> String {
    if flags.spell {
        text = text::adjust_space(&text, true, false, false);
    }
    if flags.punc
        && !text.is_empty()
        && let Some(punctuator) = &engines.punctuator
    {
        match punctuator.punctuate(&text) {
            Ok(t) => text = t,
            Err(e) => warn!(error = %e, "punctuation pass failed"),
        }
    }
    if flags.num
        && !text.is_empty()
        && let Some(normalizer) = &engines.normalizer
    {
        match normalizer.normalize(&text) {
            Ok(t) => text = t,
            Err(e) => warn!(error = %e, "number normalization failed"),
        }
    }
    if flags.spell {
        text = text::adjust_space(&text, true, false, false);
    }
    text
}

fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
