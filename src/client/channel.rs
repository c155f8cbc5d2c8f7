//! Client side of the realtime channel.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::client::error::ChannelError;
use crate::models::channel::{ClientMessage, JoinRoom, ServerMessage};

/// Lifecycle and payload events observed on a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    ConnectError(String),
    Message(ServerMessage),
}

#[async_trait]
pub trait RealtimeChannel: Send {
    fn is_connected(&self) -> bool;

    /// Opens the connection if it is not already open.
    async fn connect(&mut self) -> Result<(), ChannelError>;

    async fn send(&mut self, message: ClientMessage) -> Result<(), ChannelError>;

    /// Next event, or `None` once the connection is closed and nothing is
    /// pending.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    async fn disconnect(&mut self);
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to the hub. Remembers the last `join-room` it sent
/// and replays it after every reconnect.
/// Only the latest unobserved lifecycle transition is kept.
pub struct WsChannel {
    url: String,
    connect_timeout: Duration,
    socket: Option<Socket>,
    membership: Option<JoinRoom>,
    lifecycle: Option<ChannelEvent>,
}

impl WsChannel {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            socket: None,
            membership: None,
            lifecycle: None,
        }
    }

    async fn write(&mut self, message: &ClientMessage) -> Result<(), ChannelError> {
        let json =
            serde_json::to_string(message).map_err(|err| ChannelError::Encode(err.to_string()))?;
        let socket = self.socket.as_mut().ok_or(ChannelError::Disconnected)?;

        if let Err(err) = socket.send(Message::Text(json)).await {
            self.drop_socket();
            return Err(ChannelError::Send(err.to_string()));
        }

        Ok(())
    }

    fn drop_socket(&mut self) {
        if self.socket.take().is_some() {
            info!(url = %self.url, "realtime channel disconnected");
            self.lifecycle = Some(ChannelEvent::Disconnected);
        }
    }

    fn connect_failed(&mut self, err: ChannelError) -> ChannelError {
        warn!(url = %self.url, error = %err, "realtime channel connect failed");
        self.lifecycle = Some(ChannelEvent::ConnectError(err.to_string()));
        err
    }
}

#[async_trait]
impl RealtimeChannel for WsChannel {
    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        if self.socket.is_some() {
            return Ok(());
        }

        let attempt = timeout(self.connect_timeout, connect_async(self.url.clone())).await;
        let socket = match attempt {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(err)) => return Err(self.connect_failed(ChannelError::Connect(err.to_string()))),
            Err(_) => {
                return Err(self.connect_failed(ChannelError::ConnectTimeout(self.connect_timeout)));
            }
        };

        self.socket = Some(socket);
        self.lifecycle = Some(ChannelEvent::Connected);
        info!(url = %self.url, "realtime channel connected");

        if let Some(join) = self.membership.clone() {
            debug!(user_id = %join.user_id, "replaying room membership");
            self.write(&ClientMessage::JoinRoom(join)).await?;
        }

        Ok(())
    }

    async fn send(&mut self, message: ClientMessage) -> Result<(), ChannelError> {
        if let ClientMessage::JoinRoom(join) = &message {
            self.membership = Some(join.clone());
        }

        self.write(&message).await
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            if let Some(event) = self.lifecycle.take() {
                return Some(event);
            }

            let socket = self.socket.as_mut()?;
            let frame = socket.next().await;

            match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => return Some(ChannelEvent::Message(message)),
                    Err(err) => warn!(error = %err, "ignoring malformed frame from hub"),
                },
                Some(Ok(Message::Close(_))) | None => self.drop_socket(),
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "realtime channel receive failed");
                    self.drop_socket();
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        self.membership = None;
        self.lifecycle = None;

        if let Some(mut socket) = self.socket.take() {
            if let Err(err) = socket.close(None).await {
                debug!(error = %err, "close handshake failed");
            }
            info!(url = %self.url, "realtime channel closed");
        }
    }
}
