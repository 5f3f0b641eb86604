//! Prometheus metrics for the user sync service.
//!
//! - Connection metrics (open sessions, lifetimes, close reasons)
//! - Event metrics (published by action, delivered, failed)
//! - Inbound message metrics
//! - API mutation metrics

mod helpers;

pub use helpers::{
    encode_metrics, ApiMetrics, ConnectionMetrics, EventMetrics, HeartbeatMetrics, InboundMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "user_sync";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Number of open WebSocket sessions
    pub static ref CONNECTIONS_OPEN: IntGauge = register_int_gauge!(
        format!("{}_connections_open", METRIC_PREFIX),
        "Number of open WebSocket sessions"
    ).unwrap();

    /// Total WebSocket sessions opened
    pub static ref CONNECTIONS_OPENED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket sessions opened"
    ).unwrap();

    /// Total WebSocket sessions closed, by reason
    pub static ref CONNECTIONS_CLOSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket sessions closed",
        &["reason"]
    ).unwrap();

    /// Session lifetime
    pub static ref CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket session duration in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 1800.0, 3600.0, 14400.0]
    ).unwrap();

    /// Members per group
    pub static ref GROUP_MEMBERS: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_group_members", METRIC_PREFIX),
        "Number of members per group",
        &["group"]
    ).unwrap();

    // ============================================================================
    // Event Metrics
    // ============================================================================

    /// Events published, by action
    pub static ref EVENTS_PUBLISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_events_published_total", METRIC_PREFIX),
        "Total events published",
        &["action"]
    ).unwrap();

    /// Per-member deliveries that were queued
    pub static ref DELIVERIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total per-member deliveries"
    ).unwrap();

    /// Per-member deliveries that failed
    pub static ref DELIVERY_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_failures_total", METRIC_PREFIX),
        "Total per-member delivery failures"
    ).unwrap();

    // ============================================================================
    // Inbound Metrics
    // ============================================================================

    /// Client messages received, by outcome
    pub static ref INBOUND_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_inbound_messages_total", METRIC_PREFIX),
        "Total client messages received",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // API Metrics
    // ============================================================================

    /// Successful user mutations, by operation
    pub static ref API_MUTATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_api_mutations_total", METRIC_PREFIX),
        "Total user mutations through the HTTP API",
        &["operation"]
    ).unwrap();

    /// Rejected user mutations
    pub static ref API_VALIDATION_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_api_validation_failures_total", METRIC_PREFIX),
        "Total user mutations rejected by validation"
    ).unwrap();

    // ============================================================================
    // Heartbeat Metrics
    // ============================================================================

    /// Heartbeat round duration
    pub static ref HEARTBEAT_DURATION_MS: Histogram = register_histogram!(
        format!("{}_heartbeat_duration_ms", METRIC_PREFIX),
        "Heartbeat round duration in milliseconds",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0]
    ).unwrap();

    /// Connections closed for inactivity
    pub static ref STALE_CONNECTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_stale_connections_total", METRIC_PREFIX),
        "Total connections closed for inactivity"
    ).unwrap();
}
