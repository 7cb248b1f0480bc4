//! `WebSocket` handler for the shared listener endpoint.
//!
//! Every client (canvas, admin, display) connects to `GET /ws/listener`.
//! On connect the client is registered with the broadcast bus and
//! immediately receives the current game state. Text frames from the
//! client are handed to the [`Coordinator`](doodle_core::Coordinator);
//! nothing is ever sent back to a single client in reply. All outbound
//! traffic is broadcast.
//!
//! If a client stops draining its queue the bus unregisters it and the
//! queue closes, which ends the connection here.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use doodle_core::MessageOutcome;
use tracing::{debug, info};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and register it
/// as a broadcast listener.
///
/// # Route
///
/// `GET /ws/listener`
pub async fn ws_listener(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Handle the `WebSocket` lifecycle: forward queued broadcast frames to
/// the socket and client frames to the coordinator until either side
/// goes away.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let coordinator = Arc::clone(&state.coordinator);
    let (id, mut rx) = coordinator.connect().await;

    loop {
        tokio::select! {
            // Broadcast frame queued for this listener.
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    debug!(listener = %id, "Listener queue closed");
                    break;
                };
                let msg = Message::Text(frame.as_ref().into());
                if socket.send(msg).await.is_err() {
                    debug!(listener = %id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let MessageOutcome::Hello(Some(role)) =
                            coordinator.handle_text(id, text.as_str()).await
                        {
                            info!(listener = %id, role = ?role, "Client identified");
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(listener = %id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(listener = %id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(listener = %id, "WebSocket error: {e}");
                        break;
                    }
                    _ => {
                        // Binary and pong frames carry nothing for us.
                    }
                }
            }
        }
    }

    coordinator.disconnect(id);
}
