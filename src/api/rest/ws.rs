use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::channel::{ClientMessage, ServerMessage};
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let client_id = Uuid::new_v4();
    let mut room: Option<broadcast::Receiver<ServerMessage>> = None;

    info!(client_id = %client_id, "websocket client connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(client_id = %client_id, error = %err, "websocket receive failed");
                        break;
                    }
                };

                if let Some(reply) = handle_frame(&state, client_id, &text, &mut room) {
                    if send_frame(&mut socket, &reply).await.is_err() {
                        break;
                    }
                }
            }
            event = next_room_event(&mut room) => {
                match event {
                    Ok(message) => {
                        if send_frame(&mut socket, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(client_id = %client_id, skipped, "admin session lagged; samples dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    state.hub.leave(client_id);
    info!(client_id = %client_id, "websocket client disconnected");
}

/// Applies one client frame. Returns an error frame for the sender when the
/// frame is rejected.
fn handle_frame(
    state: &AppState,
    client_id: Uuid,
    raw: &str,
    room: &mut Option<broadcast::Receiver<ServerMessage>>,
) -> Option<ServerMessage> {
    let result = ClientMessage::parse(raw)
        .map_err(|err| err.to_string())
        .and_then(|message| match message {
            ClientMessage::JoinRoom(join) => {
                *room = state.hub.join(client_id, &join);
                Ok(())
            }
            ClientMessage::LocationUpdate(location) => state
                .hub
                .publish_location(client_id, location)
                .map(|_| ())
                .map_err(|err| err.to_string()),
        });

    match result {
        Ok(()) => None,
        Err(message) => {
            state.metrics.rejected_frames_total.inc();
            warn!(client_id = %client_id, reason = %message, "frame rejected");
            Some(ServerMessage::Error { message })
        }
    }
}

async fn next_room_event(
    room: &mut Option<broadcast::Receiver<ServerMessage>>,
) -> Result<ServerMessage, RecvError> {
    match room {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_frame(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize frame for ws");
            return Ok(());
        }
    };

    socket.send(Message::Text(json)).await
}
