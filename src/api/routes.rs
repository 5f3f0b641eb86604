use axum::{routing::get, Router};

use crate::server::AppState;

use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::users::{create_user, delete_user, get_user, list_users, update_user};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // User records, with and without the trailing slash
        .nest(
            "/api",
            Router::new()
                .route("/users/", get(list_users).post(create_user))
                .route("/users", get(list_users).post(create_user))
                .route(
                    "/users/{id}/",
                    get(get_user).patch(update_user).delete(delete_user),
                )
                .route(
                    "/users/{id}",
                    get(get_user).patch(update_user).delete(delete_user),
                ),
        )
}
