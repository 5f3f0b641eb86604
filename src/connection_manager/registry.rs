use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::websocket::OutboundMessage;

use super::stats::ConnectionStats;
use super::types::ConnectionHandle;

/// Tracks every open WebSocket connection.
///
/// Group membership lives in the notifier; this registry only answers "which
/// connections are open" for heartbeats, reaping and shutdown.
pub struct ConnectionManager {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a new connection
    pub fn register(&self, sender: mpsc::Sender<OutboundMessage>) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(sender));
        self.connections.insert(handle.id, handle.clone());

        tracing::debug!(connection_id = %handle.id, "Connection registered");

        handle
    }

    /// Unregister a connection. Unknown ids are ignored.
    pub fn unregister(&self, connection_id: Uuid) -> bool {
        let removed = self.connections.remove(&connection_id).is_some();
        if removed {
            tracing::debug!(connection_id = %connection_id, "Connection unregistered");
        }
        removed
    }

    /// Get connection by ID
    pub fn get_connection(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    /// Get all connections
    pub fn get_all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get statistics
    pub fn stats(&self) -> ConnectionStats {
        let oldest_connected_at = self
            .connections
            .iter()
            .map(|entry| entry.value().connected_at)
            .min();

        ConnectionStats {
            total_connections: self.connections.len(),
            oldest_connected_at,
        }
    }

    /// Find connections that have been inactive for longer than the timeout
    pub fn find_stale_connections(&self, timeout_secs: u64) -> Vec<Uuid> {
        let now = Utc::now();
        let timeout = chrono::Duration::seconds(timeout_secs as i64);

        self.connections
            .iter()
            .filter(|entry| now.signed_duration_since(entry.value().last_activity()) > timeout)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Ask stale connections to close and return how many were asked.
    ///
    /// The sessions unregister themselves (and leave their groups) once they
    /// observe the request.
    pub fn close_stale_connections(&self, timeout_secs: u64) -> usize {
        let stale = self.find_stale_connections(timeout_secs);
        let count = stale.len();

        for conn_id in stale {
            if let Some(handle) = self.get_connection(conn_id) {
                tracing::info!(connection_id = %conn_id, "Closing stale connection due to timeout");
                handle.request_close();
            }
        }

        count
    }

    /// Ask every open connection to close
    pub fn close_all(&self) -> usize {
        let connections = self.get_all_connections();
        for handle in &connections {
            handle.request_close();
        }
        connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
