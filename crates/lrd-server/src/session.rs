//! WebSocket session handling.
//!
//! One task per client. The session announces itself to the hub before the
//! handshake, answers the client hello, then pumps hub messages out and
//! drains client frames until either side ends the connection. The hub
//! hears about the session exactly twice: once on entry, once on exit,
//! whichever way the session ends.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::mpsc;

use crate::hub::ConnectionId;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// Handle WebSocket upgrade requests on the livereload endpoint.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (id, outbound) = state.hub.register().await;
    tracing::debug!(connection = id, "livereload client connected");

    run_session(socket, id, outbound).await;

    state.hub.unregister(id).await;
    tracing::debug!(connection = id, "livereload client disconnected");
}

/// Handshake plus pump loop for one connection.
async fn run_session(
    mut socket: WebSocket,
    id: ConnectionId,
    mut outbound: mpsc::Receiver<ServerMessage>,
) {
    if !handshake(&mut socket, id).await {
        return;
    }

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some(message) = queued else {
                    // The hub discarded this connection; nothing more
                    // will ever arrive.
                    break;
                };
                if send_json(&mut socket, &message).await.is_err() {
                    break;
                }
            }
            received = socket.recv() => {
                match received {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(connection = id, message = %text.as_str(), "client message");
                    }
                    Some(Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                }
            }
        }
    }
}

/// Receive the client hello and answer it.
///
/// The first data frame must decode as a JSON object; protocol lists and
/// other fields are not inspected further. Returns `false` when the
/// session should end instead of entering the pump loop.
async fn handshake(socket: &mut WebSocket, id: ConnectionId) -> bool {
    let hello = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => break text,
            // Control frames may precede the hello.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Binary(_))) => {
                tracing::warn!(connection = id, "binary frame instead of hello, closing");
                return false;
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return false,
        }
    };

    match serde_json::from_str::<ClientMessage>(hello.as_str()) {
        Ok(message) => {
            tracing::debug!(connection = id, command = %message.command, "client hello");
        }
        Err(error) => {
            tracing::warn!(connection = id, %error, "malformed hello, closing");
            return false;
        }
    }

    send_json(socket, &ServerMessage::hello()).await.is_ok()
}

/// Serialize one message and send it as a text frame.
async fn send_json(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}
