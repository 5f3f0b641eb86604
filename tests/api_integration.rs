//! HTTP API integration tests
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`; a
//! connection joined to the notifier observes what each mutation publishes.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use user_sync_service::config::Settings;
use user_sync_service::connection_manager::ConnectionHandle;
use user_sync_service::notification::{Membership, USER_UPDATES_GROUP};
use user_sync_service::server::{create_app, AppState};
use user_sync_service::users::seed_sample_users;
use user_sync_service::websocket::OutboundMessage;

struct Listener {
    _membership: Membership,
    rx: mpsc::Receiver<OutboundMessage>,
}

impl Listener {
    fn join(state: &AppState) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let handle = Arc::new(ConnectionHandle::new(tx));
        let membership = state.notifier.join_scoped(USER_UPDATES_GROUP, handle);
        Self {
            _membership: membership,
            rx,
        }
    }

    fn next(&mut self) -> Option<Value> {
        let msg = self.rx.try_recv().ok()?;
        let text = msg.to_json().unwrap()?;
        Some(serde_json::from_str(&text).unwrap())
    }
}

fn app(state: &AppState) -> Router {
    create_app(state.clone())
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_create_user_publishes_create_event() {
    let state = AppState::new(Settings::default());
    let mut listener = Listener::join(&state);

    let (status, body) = send(
        app(&state),
        Method::POST,
        "/api/users/",
        Some(json!({"first_name": "John", "last_name": "Doe"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["first_name"], "John");
    assert_eq!(body["last_name"], "Doe");
    let id = body["id"].as_i64().unwrap();

    let event = listener.next().expect("create event");
    assert_eq!(event["type"], "user_update");
    assert_eq!(event["data"]["action"], "create");
    assert_eq!(event["data"]["user"]["id"], id);
    assert_eq!(event["data"]["user"]["first_name"], "John");
    assert!(listener.next().is_none());
}

#[tokio::test]
async fn test_list_users_in_id_order() {
    let state = AppState::new(Settings::default());
    seed_sample_users(state.store.as_ref()).await.unwrap();

    let (status, body) = send(app(&state), Method::GET, "/api/users/", None).await;

    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 4);
    assert_eq!(users[0]["first_name"], "John");
    assert_eq!(users[3]["first_name"], "Bob");
}

#[tokio::test]
async fn test_routes_without_trailing_slash() {
    let state = AppState::new(Settings::default());
    seed_sample_users(state.store.as_ref()).await.unwrap();

    let (status, _) = send(app(&state), Method::GET, "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app(&state), Method::GET, "/api/users/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Jane");
}

#[tokio::test]
async fn test_invalid_create_is_rejected_without_event() {
    let state = AppState::new(Settings::default());
    let mut listener = Listener::join(&state);

    let (status, body) = send(
        app(&state),
        Method::POST,
        "/api/users/",
        Some(json!({"first_name": "   "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["error"]["fields"]["first_name"][0],
        "This field may not be blank."
    );
    assert_eq!(
        body["error"]["fields"]["last_name"][0],
        "This field is required."
    );
    assert!(listener.next().is_none());
    assert_eq!(state.store.count().await, 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let state = AppState::new(Settings::default());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users/")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app(&state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_user_is_not_found() {
    let state = AppState::new(Settings::default());

    let (status, body) = send(app(&state), Method::GET, "/api/users/99/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(app(&state), Method::GET, "/api/users/abc/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patch_updates_and_publishes() {
    let state = AppState::new(Settings::default());
    seed_sample_users(state.store.as_ref()).await.unwrap();
    let mut listener = Listener::join(&state);

    let (status, body) = send(
        app(&state),
        Method::PATCH,
        "/api/users/1/",
        Some(json!({"last_name": "Dough"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "John");
    assert_eq!(body["last_name"], "Dough");

    let event = listener.next().expect("update event");
    assert_eq!(event["data"]["action"], "update");
    assert_eq!(event["data"]["user"]["last_name"], "Dough");
}

#[tokio::test]
async fn test_patch_unknown_user_publishes_nothing() {
    let state = AppState::new(Settings::default());
    let mut listener = Listener::join(&state);

    let (status, _) = send(
        app(&state),
        Method::PATCH,
        "/api/users/5/",
        Some(json!({"first_name": "Ghost"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(listener.next().is_none());
}

#[tokio::test]
async fn test_delete_publishes_user_id() {
    let state = AppState::new(Settings::default());
    seed_sample_users(state.store.as_ref()).await.unwrap();
    let mut listener = Listener::join(&state);

    let (status, body) = send(app(&state), Method::DELETE, "/api/users/3/", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let event = listener.next().expect("delete event");
    assert_eq!(
        event,
        json!({"type": "user_update", "data": {"action": "delete", "user_id": 3}})
    );

    let (status, _) = send(app(&state), Method::GET, "/api/users/3/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_stats() {
    let state = AppState::new(Settings::default());
    let _listener = Listener::join(&state);

    let (status, body) = send(app(&state), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"]["total"], 0);

    let (status, body) = send(app(&state), Method::GET, "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connections"]["groups"][USER_UPDATES_GROUP], 1);
    assert_eq!(body["notifications"]["total_joins"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let state = AppState::new(Settings::default());
    send(
        app(&state),
        Method::POST,
        "/api/users/",
        Some(json!({"first_name": "Jane", "last_name": "Smith"})),
    )
    .await;

    let response = app(&state)
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("user_sync_api_mutations_total"));
}
