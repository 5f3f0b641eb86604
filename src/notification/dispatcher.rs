use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc::error::SendTimeoutError;
use uuid::Uuid;

use crate::config::WebSocketConfig;
use crate::connection_manager::ConnectionHandle;
use crate::metrics::EventMetrics;
use crate::websocket::{OutboundMessage, ServerMessage};

use super::groups::GroupTable;
use super::{Action, ChangeEvent, Membership};

/// Maximum number of concurrent member sends
const MAX_CONCURRENT_SENDS: usize = 100;

/// Result of publishing one event
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResult {
    pub action: Action,
    /// Number of members the event was queued for
    pub delivered_to: usize,
    /// Number of members whose queue was closed or stayed full past the timeout
    pub failed: usize,
}

impl DeliveryResult {
    fn new(action: Action, delivered: usize, failed: usize) -> Self {
        Self {
            action,
            delivered_to: delivered,
            failed,
        }
    }

    pub fn recipients(&self) -> usize {
        self.delivered_to + self.failed
    }
}

/// Statistics for the notifier
#[derive(Debug, Default)]
pub struct NotifierStats {
    pub total_published: AtomicU64,
    pub total_delivered: AtomicU64,
    pub total_failed: AtomicU64,
    pub total_joins: AtomicU64,
    pub total_leaves: AtomicU64,
}

impl NotifierStats {
    pub fn snapshot(&self) -> NotifierStatsSnapshot {
        NotifierStatsSnapshot {
            total_published: self.total_published.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_joins: self.total_joins.load(Ordering::Relaxed),
            total_leaves: self.total_leaves.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of notifier statistics
#[derive(Debug, Clone, Serialize)]
pub struct NotifierStatsSnapshot {
    pub total_published: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
    pub total_joins: u64,
    pub total_leaves: u64,
}

/// Publish/subscribe fan-out over named groups of connections.
///
/// The membership table is private: connections enter and leave groups only through
/// [`join`](Self::join), [`join_scoped`](Self::join_scoped) and
/// [`leave`](Self::leave).
pub struct ChangeNotifier {
    groups: GroupTable,
    send_timeout: Duration,
    stats: NotifierStats,
}

impl ChangeNotifier {
    /// Create a notifier whose per-member delivery attempts give up after `send_timeout`
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            groups: GroupTable::new(),
            send_timeout,
            stats: NotifierStats::default(),
        }
    }

    pub fn from_config(config: &WebSocketConfig) -> Self {
        Self::new(config.send_timeout())
    }

    /// Add a connection to a group. Joining twice keeps a single membership.
    pub fn join(&self, group: &str, handle: Arc<ConnectionHandle>) {
        let connection_id = handle.id;
        if self.groups.insert(group, handle) {
            self.stats.total_joins.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(connection_id = %connection_id, group = %group, "Joined group");
        }
    }

    /// Join a group for the lifetime of the returned guard
    pub fn join_scoped(
        self: &Arc<Self>,
        group: &str,
        handle: Arc<ConnectionHandle>,
    ) -> Membership {
        let connection_id = handle.id;
        self.join(group, handle);
        Membership::new(self.clone(), group.to_string(), connection_id)
    }

    /// Remove a connection from a group. A no-op for non-members.
    pub fn leave(&self, group: &str, connection_id: Uuid) {
        if self.groups.remove(group, connection_id) {
            self.stats.total_leaves.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(connection_id = %connection_id, group = %group, "Left group");
        }
    }

    pub fn is_member(&self, group: &str, connection_id: Uuid) -> bool {
        self.groups.contains(group, connection_id)
    }

    pub fn member_count(&self, group: &str) -> usize {
        self.groups.member_count(group)
    }

    /// Member count of every non-empty group
    pub fn group_sizes(&self) -> HashMap<String, usize> {
        self.groups.sizes()
    }

    pub fn stats(&self) -> NotifierStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver `event` to every connection that is a member of `group` right now.
    ///
    /// Each member gets one bounded attempt; a member whose queue is closed or stays
    /// full past the send timeout misses this event and nobody else is affected.
    /// Returns once every attempt has finished, so consecutive calls from one caller
    /// are queued at each member in call order.
    #[tracing::instrument(
        name = "notifier.publish",
        skip(self, event),
        fields(action = event.action().as_str())
    )]
    pub async fn publish(&self, group: &str, event: ChangeEvent) -> DeliveryResult {
        let action = event.action();
        let members = self.groups.snapshot(group);

        let message = ServerMessage::UserUpdate(event.into_payload());
        let (delivered, failed) = self.send_to_members(&members, &message).await;

        self.stats.total_published.fetch_add(1, Ordering::Relaxed);
        self.stats.total_delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats.total_failed.fetch_add(failed as u64, Ordering::Relaxed);

        EventMetrics::record_published(action);
        EventMetrics::record_delivered(delivered as u64);
        EventMetrics::record_failed(failed as u64);

        tracing::debug!(
            group = %group,
            members = members.len(),
            delivered = delivered,
            failed = failed,
            "Published event"
        );

        DeliveryResult::new(action, delivered, failed)
    }

    /// Send one message to each member concurrently with bounded parallelism.
    /// The message is serialized once and shared.
    async fn send_to_members(
        &self,
        members: &[Arc<ConnectionHandle>],
        message: &ServerMessage,
    ) -> (usize, usize) {
        if members.is_empty() {
            return (0, 0);
        }

        let outbound = match OutboundMessage::preserialized(message) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to pre-serialize message, falling back to per-connection serialization");
                OutboundMessage::Raw(message.clone())
            }
        };

        let mut futures = FuturesUnordered::new();
        let mut delivered = 0;
        let mut failed = 0;

        for member in members {
            let member = member.clone();
            let msg = outbound.clone();
            let send_timeout = self.send_timeout;
            futures.push(async move {
                match member.send_timeout(msg, send_timeout).await {
                    Ok(()) => true,
                    Err(SendTimeoutError::Timeout(_)) => {
                        tracing::warn!(
                            connection_id = %member.id,
                            timeout_ms = send_timeout.as_millis() as u64,
                            "Delivery timed out, member queue full"
                        );
                        false
                    }
                    Err(SendTimeoutError::Closed(_)) => {
                        tracing::debug!(connection_id = %member.id, "Delivery failed, connection closed");
                        false
                    }
                }
            });

            // Process completed futures when we hit the concurrency limit
            while futures.len() >= MAX_CONCURRENT_SENDS {
                match futures.next().await {
                    Some(true) => delivered += 1,
                    Some(false) => failed += 1,
                    None => break,
                }
            }
        }

        while let Some(ok) = futures.next().await {
            if ok {
                delivered += 1;
            } else {
                failed += 1;
            }
        }

        (delivered, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use tokio::sync::mpsc;

    fn member(buffer: usize) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Arc::new(ConnectionHandle::new(tx)), rx)
    }

    fn relay(v: i64) -> ChangeEvent {
        let mut data = Map::new();
        data.insert("v".to_string(), json!(v));
        ChangeEvent::relayed(data)
    }

    fn received_json(msg: OutboundMessage) -> serde_json::Value {
        serde_json::from_str(&msg.to_json().unwrap().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_publish_to_empty_group() {
        let notifier = ChangeNotifier::new(Duration::from_millis(50));
        let result = notifier.publish("nobody", relay(1)).await;

        assert_eq!(result.delivered_to, 0);
        assert_eq!(result.failed, 0);
        assert_eq!(notifier.stats().total_published, 1);
    }

    #[tokio::test]
    async fn test_publish_reaches_members() {
        let notifier = ChangeNotifier::new(Duration::from_millis(50));
        let (a, mut rx_a) = member(4);
        let (b, mut rx_b) = member(4);
        notifier.join("g", a);
        notifier.join("g", b);

        let result = notifier.publish("g", relay(1)).await;
        assert_eq!(result.delivered_to, 2);
        assert_eq!(result.action, Action::UserUpdate);

        let expected = json!({"type": "user_update", "data": {"v": 1}});
        assert_eq!(received_json(rx_a.recv().await.unwrap()), expected);
        assert_eq!(received_json(rx_b.recv().await.unwrap()), expected);
    }

    #[tokio::test]
    async fn test_leave_non_member_is_noop() {
        let notifier = ChangeNotifier::new(Duration::from_millis(50));
        notifier.leave("g", Uuid::new_v4());

        let (a, _rx) = member(1);
        notifier.join("g", a.clone());
        notifier.leave("g", Uuid::new_v4());

        assert!(notifier.is_member("g", a.id));
        assert_eq!(notifier.stats().total_leaves, 0);
    }

    #[tokio::test]
    async fn test_scoped_membership_leaves_on_drop() {
        let notifier = Arc::new(ChangeNotifier::new(Duration::from_millis(50)));
        let (a, _rx) = member(1);

        let membership = notifier.join_scoped("g", a.clone());
        assert_eq!(membership.group(), "g");
        assert!(notifier.is_member("g", a.id));

        drop(membership);
        assert!(!notifier.is_member("g", a.id));
        assert!(notifier.group_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_times_out_without_blocking_others() {
        let notifier = ChangeNotifier::new(Duration::from_millis(20));
        let (slow, _slow_rx) = member(1);
        let (fast, mut fast_rx) = member(8);
        notifier.join("g", slow.clone());
        notifier.join("g", fast);

        // Fill the slow member's queue
        slow.send_timeout(OutboundMessage::Ping, Duration::from_millis(10))
            .await
            .unwrap();

        let result = notifier.publish("g", relay(1)).await;
        assert_eq!(result.delivered_to, 1);
        assert_eq!(result.failed, 1);
        assert!(fast_rx.recv().await.is_some());
    }
}
