//! Health check and statistics endpoints.

use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::NotifierStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: ConnectionHealthResponse,
    pub store: StoreHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct ConnectionHealthResponse {
    pub total: usize,
    pub groups_count: usize,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
    pub users: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: ConnectionStats,
    pub notifications: NotifierStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_connected_at: Option<chrono::DateTime<chrono::Utc>>,
    pub groups: HashMap<String, usize>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let conn_stats = state.connection_manager.stats();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        connections: ConnectionHealthResponse {
            total: conn_stats.total_connections,
            groups_count: state.notifier.group_sizes().len(),
        },
        store: StoreHealthResponse {
            backend: state.store.backend_name().to_string(),
            users: state.store.count().await,
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let conn_stats = state.connection_manager.stats();

    Json(StatsResponse {
        connections: ConnectionStats {
            total_connections: conn_stats.total_connections,
            oldest_connected_at: conn_stats.oldest_connected_at,
            groups: state.notifier.group_sizes(),
        },
        notifications: state.notifier.stats(),
    })
}
