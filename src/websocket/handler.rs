use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;

use crate::connection_manager::ConnectionHandle;
use crate::metrics::InboundMetrics;
use crate::notification::{ChangeEvent, ChangeNotifier, USER_UPDATES_GROUP};
use crate::server::AppState;

use super::message::{ClientMessage, OutboundMessage};
use super::session::{CloseReason, Session};

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip(ws, state))]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    tracing::debug!("WebSocket upgrade requested");

    ws.on_failed_upgrade(|e| {
        tracing::warn!(error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
#[tracing::instrument(name = "ws.connection", skip(socket, state), fields(otel.kind = "server"))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, rx) = mpsc::channel::<OutboundMessage>(state.settings.websocket.channel_buffer);

    let mut session = Session::open(
        state.connection_manager.clone(),
        &state.notifier,
        USER_UPDATES_GROUP,
        tx,
    );
    let handle = session.handle().clone();

    let (ws_sender, ws_receiver) = socket.split();

    // Both loops run inside this task so dropping it tears everything down
    let reason = tokio::select! {
        reason = write_outbound(ws_sender, rx, handle.clone()) => reason,
        reason = read_inbound(ws_receiver, &state.notifier, &handle) => reason,
    };

    session.close(reason);
}

/// Write queued messages to the socket until a write fails or the server asks the
/// connection to close
async fn write_outbound(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<OutboundMessage>,
    handle: Arc<ConnectionHandle>,
) -> CloseReason {
    loop {
        let msg = tokio::select! {
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => return CloseReason::ServerRequested,
            },
            _ = handle.closed() => {
                let _ = ws_sender.send(Message::Close(None)).await;
                return CloseReason::ServerRequested;
            }
        };

        let frame = match msg.into_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(connection_id = %handle.id, error = %e, "Failed to serialize message");
                continue;
            }
        };

        if let Err(e) = ws_sender.send(frame).await {
            tracing::debug!(connection_id = %handle.id, error = %e, "WebSocket write failed");
            return CloseReason::WriteFailed;
        }
    }
}

/// Read frames from the peer, relaying every well-formed message to the group
async fn read_inbound(
    mut ws_receiver: SplitStream<WebSocket>,
    notifier: &ChangeNotifier,
    handle: &Arc<ConnectionHandle>,
) -> CloseReason {
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle.update_activity();
                relay_text(text.as_str(), notifier, handle).await;
            }
            Ok(Message::Binary(_)) => {
                handle.update_activity();
                InboundMetrics::record_malformed();
                tracing::warn!(connection_id = %handle.id, "Dropping binary message");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Axum answers pings itself
                handle.update_activity();
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %handle.id, "Received close frame");
                return CloseReason::PeerClosed;
            }
            Err(e) => {
                tracing::warn!(connection_id = %handle.id, error = %e, "WebSocket receive error");
                return CloseReason::ReceiveError;
            }
        }
    }

    CloseReason::PeerClosed
}

/// Parse one text frame and publish it. Malformed messages are logged and dropped.
#[tracing::instrument(name = "ws.message", skip(text, notifier, handle), fields(connection_id = %handle.id))]
async fn relay_text(text: &str, notifier: &ChangeNotifier, handle: &Arc<ConnectionHandle>) {
    let msg = match ClientMessage::parse(text) {
        Ok(msg) => msg,
        Err(e) => {
            InboundMetrics::record_malformed();
            tracing::warn!(error = %e, "Dropping malformed client message");
            return;
        }
    };

    InboundMetrics::record_received();
    tracing::debug!(message_type = %msg.kind, "Relaying client message");

    notifier
        .publish(USER_UPDATES_GROUP, ChangeEvent::relayed(msg.data))
        .await;
}
