use std::sync::Arc;

use crossbeam_channel::Sender;
use dashmap::DashSet;
use voxtype_transcribe::Task;

use crate::ws::storage::SocketRegistry;

/// Everything the connection handlers share: the socket registry, the
/// live-socket set read by the recognizer worker, and the task queue.
///
/// Passed explicitly — no process-wide globals.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SocketRegistry>,
    /// Connection ids currently open. The worker drops tasks whose id has
    /// been removed from this set.
    pub live_sockets: Arc<DashSet<String>>,
    /// Bounded queue to the recognizer worker; a full queue blocks the
    /// receive loop and backpressures the client.
    pub tasks: Sender<Task>,
}
