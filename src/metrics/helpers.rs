//! Metrics helper structs for convenient metric recording

use std::collections::HashMap;

use prometheus::{Encoder, TextEncoder};

use crate::notification::Action;
use crate::websocket::CloseReason;

use super::{
    API_MUTATIONS_TOTAL, API_VALIDATION_FAILURES_TOTAL, CONNECTIONS_CLOSED_TOTAL,
    CONNECTIONS_OPEN, CONNECTIONS_OPENED_TOTAL, CONNECTION_DURATION, DELIVERIES_TOTAL,
    DELIVERY_FAILURES_TOTAL, EVENTS_PUBLISHED_TOTAL, GROUP_MEMBERS, HEARTBEAT_DURATION_MS,
    INBOUND_MESSAGES_TOTAL, STALE_CONNECTIONS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording connection metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_opened() {
        CONNECTIONS_OPENED_TOTAL.inc();
        CONNECTIONS_OPEN.inc();
    }

    pub fn record_closed(reason: CloseReason, duration_secs: f64) {
        CONNECTIONS_CLOSED_TOTAL
            .with_label_values(&[reason.as_str()])
            .inc();
        CONNECTIONS_OPEN.dec();
        CONNECTION_DURATION.observe(duration_secs);
    }

    /// Refresh the per-group member gauges
    pub fn set_group_sizes(sizes: &HashMap<String, usize>) {
        GROUP_MEMBERS.reset();
        for (group, count) in sizes {
            GROUP_MEMBERS
                .with_label_values(&[group.as_str()])
                .set(*count as i64);
        }
    }
}

/// Helper struct for recording event metrics
pub struct EventMetrics;

impl EventMetrics {
    pub fn record_published(action: Action) {
        EVENTS_PUBLISHED_TOTAL
            .with_label_values(&[action.as_str()])
            .inc();
    }

    pub fn record_delivered(count: u64) {
        DELIVERIES_TOTAL.inc_by(count);
    }

    pub fn record_failed(count: u64) {
        DELIVERY_FAILURES_TOTAL.inc_by(count);
    }
}

/// Helper struct for recording inbound message metrics
pub struct InboundMetrics;

impl InboundMetrics {
    pub fn record_received() {
        INBOUND_MESSAGES_TOTAL.with_label_values(&["relayed"]).inc();
    }

    pub fn record_malformed() {
        INBOUND_MESSAGES_TOTAL.with_label_values(&["malformed"]).inc();
    }
}

/// Helper struct for recording API metrics
pub struct ApiMetrics;

impl ApiMetrics {
    pub fn record_mutation(action: Action) {
        API_MUTATIONS_TOTAL
            .with_label_values(&[action.as_str()])
            .inc();
    }

    pub fn record_validation_failure() {
        API_VALIDATION_FAILURES_TOTAL.inc();
    }
}

/// Helper struct for heartbeat metrics
pub struct HeartbeatMetrics;

impl HeartbeatMetrics {
    pub fn record_duration_ms(ms: u64) {
        HEARTBEAT_DURATION_MS.observe(ms as f64);
    }

    pub fn record_stale(count: u64) {
        STALE_CONNECTIONS_TOTAL.inc_by(count);
    }
}
