//! Lifecycle of one WebSocket connection

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::connection_manager::{ConnectionHandle, ConnectionManager};
use crate::metrics::ConnectionMetrics;
use crate::notification::{ChangeNotifier, Membership};

use super::OutboundMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// Why a session left the `Open` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame or end of stream from the peer
    PeerClosed,
    ReceiveError,
    WriteFailed,
    /// Stale-connection reaping or shutdown
    ServerRequested,
    /// The session was dropped without an explicit close
    Dropped,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::PeerClosed => "peer_closed",
            CloseReason::ReceiveError => "receive_error",
            CloseReason::WriteFailed => "write_failed",
            CloseReason::ServerRequested => "server_requested",
            CloseReason::Dropped => "dropped",
        }
    }
}

/// An open connection registered with the connection manager and joined to its group.
///
/// Both registrations are released in [`close`](Self::close), which `Drop` also
/// runs, so a panicking or cancelled connection task still leaves the group.
pub struct Session {
    handle: Arc<ConnectionHandle>,
    manager: Arc<ConnectionManager>,
    membership: Option<Membership>,
    state: SessionState,
    opened_at: Instant,
}

impl Session {
    /// `Connecting -> Open`: register the connection and join `group`
    pub fn open(
        manager: Arc<ConnectionManager>,
        notifier: &Arc<ChangeNotifier>,
        group: &str,
        sender: mpsc::Sender<OutboundMessage>,
    ) -> Self {
        let handle = manager.register(sender);
        let membership = notifier.join_scoped(group, handle.clone());
        ConnectionMetrics::record_opened();

        tracing::info!(connection_id = %handle.id, group = %group, "WebSocket session opened");

        Self {
            handle,
            manager,
            membership: Some(membership),
            state: SessionState::Open,
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.handle.id
    }

    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `Open -> Closed`: leave the group and unregister. Idempotent.
    pub fn close(&mut self, reason: CloseReason) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;

        // Dropping the membership leaves the group
        self.membership.take();
        self.manager.unregister(self.handle.id);

        let duration = self.opened_at.elapsed().as_secs_f64();
        ConnectionMetrics::record_closed(reason, duration);

        tracing::info!(
            connection_id = %self.handle.id,
            reason = reason.as_str(),
            duration_secs = duration,
            "WebSocket session closed"
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close(CloseReason::Dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::USER_UPDATES_GROUP;
    use std::time::Duration;

    fn components() -> (Arc<ConnectionManager>, Arc<ChangeNotifier>) {
        (
            Arc::new(ConnectionManager::new()),
            Arc::new(ChangeNotifier::new(Duration::from_millis(50))),
        )
    }

    #[test]
    fn test_open_joins_group() {
        let (manager, notifier) = components();
        let (tx, _rx) = mpsc::channel(4);

        let session = Session::open(manager.clone(), &notifier, USER_UPDATES_GROUP, tx);

        assert_eq!(session.state(), SessionState::Open);
        assert!(notifier.is_member(USER_UPDATES_GROUP, session.id()));
        assert_eq!(manager.connection_count(), 1);
    }

    #[test]
    fn test_close_leaves_group_once() {
        let (manager, notifier) = components();
        let (tx, _rx) = mpsc::channel(4);
        let mut session = Session::open(manager.clone(), &notifier, USER_UPDATES_GROUP, tx);
        let id = session.id();

        session.close(CloseReason::PeerClosed);
        session.close(CloseReason::WriteFailed);

        assert_eq!(session.state(), SessionState::Closed);
        assert!(!notifier.is_member(USER_UPDATES_GROUP, id));
        assert_eq!(manager.connection_count(), 0);
        assert_eq!(notifier.stats().total_leaves, 1);
    }

    #[test]
    fn test_drop_releases_membership() {
        let (manager, notifier) = components();
        let (tx, _rx) = mpsc::channel(4);
        let session = Session::open(manager.clone(), &notifier, USER_UPDATES_GROUP, tx);
        let id = session.id();

        drop(session);

        assert!(!notifier.is_member(USER_UPDATES_GROUP, id));
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_aborted_task_releases_membership() {
        let (manager, notifier) = components();
        let (tx, _rx) = mpsc::channel(4);

        let task_manager = manager.clone();
        let task_notifier = notifier.clone();
        let task = tokio::spawn(async move {
            let _session = Session::open(task_manager, &task_notifier, USER_UPDATES_GROUP, tx);
            std::future::pending::<()>().await;
        });

        while notifier.member_count(USER_UPDATES_GROUP) == 0 {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;

        assert_eq!(notifier.member_count(USER_UPDATES_GROUP), 0);
        assert_eq!(manager.connection_count(), 0);
    }
}
