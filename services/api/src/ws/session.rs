//! Manages the WebSocket connection lifecycle for one caller: handshake,
//! relay, teardown.

use super::relay::{Relay, close_frame};
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};
use vidya_core::LiveSession;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Negotiates the upstream session and then runs the relay until either
/// side terminates. Failures never leak into other connections.
#[instrument(name = "ws_session", skip_all, fields(connection_id, voice))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id: u32 = rand::random();
    tracing::Span::current().record("connection_id", connection_id);
    info!("New WebSocket connection. Awaiting configuration...");

    let (socket_tx, mut socket_rx) = socket.split();
    let socket_tx = Arc::new(Mutex::new(socket_tx));

    let negotiated = match state.negotiator.negotiate(&mut socket_rx).await {
        Ok(Some(negotiated)) => negotiated,
        Ok(None) => return,
        Err(e) => {
            error!("Session negotiation failed: {}", e);
            close_caller(&socket_tx, e.close_code(), &e.to_string()).await;
            return;
        }
    };

    info!(
        voice = %negotiated.voice,
        greeting_sent = negotiated.greeting_sent,
        "Upstream session ready. Starting relay."
    );
    let LiveSession {
        sink,
        notifications,
    } = negotiated.session;
    let outcome = Relay::new(socket_tx, sink, state.relay_options)
        .run(socket_rx, notifications)
        .await;
    info!(
        direction = ?outcome.direction,
        failed = outcome.exit.is_failure(),
        "Relay finished."
    );
}

/// Sends a close frame and shuts the caller's send half.
async fn close_caller<S>(socket_tx: &Arc<Mutex<S>>, code: u16, reason: &str)
where
    S: Sink<Message> + Unpin,
{
    let mut sink = socket_tx.lock().await;
    let _ = sink
        .send(Message::Close(Some(close_frame(code, reason))))
        .await;
    let _ = sink.close().await;
}
