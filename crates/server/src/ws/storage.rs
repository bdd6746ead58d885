use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::stream::SplitSink;
use tokio::sync::Mutex;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Tracks the send half of every open connection by connection id. The
/// result sender looks connections up here to route transcripts back to
/// the client that streamed the audio.
#[derive(Default)]
pub struct SocketRegistry {
    connections: DashMap<String, WsSender>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, connection_id: String, sender: WsSender) {
        self.connections.insert(connection_id, sender);
    }

    pub fn remove(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    /// The sender for a connection, or None if it already closed.
    pub fn get(&self, connection_id: &str) -> Option<WsSender> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
