//! Graceful shutdown handling for the user sync service.
//!
//! The shutdown sequence:
//! 1. Signals background tasks to stop
//! 2. Asks every open WebSocket session to close
//! 3. Waits (bounded) for sessions to unregister and leave their groups

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::connection_manager::ConnectionManager;
use crate::notification::ChangeNotifier;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for sessions to close (default: 10 seconds)
    pub drain_timeout: Duration,
    /// How often to re-check the connection count while draining
    pub poll_interval: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Handles graceful shutdown of the service
pub struct GracefulShutdown {
    connection_manager: Arc<ConnectionManager>,
    notifier: Arc<ChangeNotifier>,
    shutdown_tx: broadcast::Sender<()>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    /// Create a new graceful shutdown handler
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        notifier: Arc<ChangeNotifier>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self::with_config(
            connection_manager,
            notifier,
            shutdown_tx,
            ShutdownConfig::default(),
        )
    }

    /// Create with custom configuration
    pub fn with_config(
        connection_manager: Arc<ConnectionManager>,
        notifier: Arc<ChangeNotifier>,
        shutdown_tx: broadcast::Sender<()>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            connection_manager,
            notifier,
            shutdown_tx,
            config,
        }
    }

    /// Execute graceful shutdown sequence
    #[tracing::instrument(
        name = "graceful_shutdown",
        skip(self),
        fields(total_connections = self.connection_manager.connection_count())
    )]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = std::time::Instant::now();
        let mut result = ShutdownResult::default();

        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Signaling background tasks");
        // No receivers just means no background task is running
        let _ = self.shutdown_tx.send(());

        tracing::info!("Phase 2: Closing WebSocket sessions");
        result.close_requested = self.connection_manager.close_all();

        tracing::info!("Phase 3: Waiting for sessions to close");
        result.connections_closed = self.wait_for_connections_to_close().await;
        result.remaining_members = self.notifier.group_sizes().values().sum();

        result.duration = start.elapsed();
        result.success = self.connection_manager.connection_count() == 0;

        tracing::info!(
            close_requested = result.close_requested,
            connections_closed = result.connections_closed,
            remaining_members = result.remaining_members,
            duration_ms = result.duration.as_millis() as u64,
            "Graceful shutdown completed"
        );

        result
    }

    /// Wait for connections to close gracefully
    async fn wait_for_connections_to_close(&self) -> usize {
        let initial = self.connection_manager.connection_count();
        if initial == 0 {
            return 0;
        }

        let wait_future = async {
            while self.connection_manager.connection_count() > 0 {
                tokio::time::sleep(self.config.poll_interval).await;
            }
        };

        let _ = timeout(self.config.drain_timeout, wait_future).await;

        let final_count = self.connection_manager.connection_count();
        if final_count > 0 {
            tracing::warn!(
                remaining_connections = final_count,
                "Some connections did not close gracefully"
            );
        }

        initial.saturating_sub(final_count)
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Whether every session closed before the drain timeout
    pub success: bool,
    /// Number of sessions asked to close
    pub close_requested: usize,
    /// Number of connections that closed gracefully
    pub connections_closed: usize,
    /// Group members still registered when shutdown finished
    pub remaining_members: usize,
    /// Total time taken for shutdown
    pub duration: Duration,
}
