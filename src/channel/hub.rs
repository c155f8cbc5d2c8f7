//! Room registry and fan-out for the realtime channel.
//!
//! Sessions that join as `admin` subscribe to a single broadcast room; courier
//! sessions are registered for routing checks only and never subscribe, so a
//! courier cannot observe another courier's samples.

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::channel::{JoinRoom, ServerMessage};
use crate::models::courier::CourierLocation;
use crate::models::user::Role;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, PartialEq)]
pub struct RoomMembership {
    pub client_id: Uuid,
    pub role: Role,
    pub courier_id: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum HubError {
    #[error("session has not joined a room")]
    NotJoined,

    #[error("only delivery sessions may publish locations")]
    NotCourier,

    #[error("session joined as {joined} but published for {claimed}")]
    CourierMismatch { joined: String, claimed: String },
}

pub struct RoomHub {
    sessions: DashMap<Uuid, RoomMembership>,
    admin_room: broadcast::Sender<ServerMessage>,
    metrics: Metrics,
}

impl RoomHub {
    pub fn new(buffer_size: usize, metrics: Metrics) -> Self {
        let (admin_room, _unused_rx) = broadcast::channel(buffer_size.max(1));

        Self {
            sessions: DashMap::new(),
            admin_room,
            metrics,
        }
    }

    /// Registers (or re-registers) a session. Admin sessions get a receiver
    /// for the admin room; the last join of a session wins.
    pub fn join(
        &self,
        client_id: Uuid,
        join: &JoinRoom,
    ) -> Option<broadcast::Receiver<ServerMessage>> {
        let membership = RoomMembership {
            client_id,
            role: join.user_type,
            courier_id: match join.user_type {
                Role::Delivery => Some(join.user_id.clone()),
                Role::Admin => None,
            },
        };

        if let Some(previous) = self.sessions.insert(client_id, membership) {
            self.metrics
                .channel_sessions
                .with_label_values(&[previous.role.as_str()])
                .dec();
        }
        self.metrics
            .channel_sessions
            .with_label_values(&[join.user_type.as_str()])
            .inc();

        info!(
            client_id = %client_id,
            user_id = %join.user_id,
            role = join.user_type.as_str(),
            "session joined room"
        );

        match join.user_type {
            Role::Admin => Some(self.admin_room.subscribe()),
            Role::Delivery => None,
        }
    }

    pub fn leave(&self, client_id: Uuid) {
        if let Some((_, membership)) = self.sessions.remove(&client_id) {
            self.metrics
                .channel_sessions
                .with_label_values(&[membership.role.as_str()])
                .dec();
            debug!(client_id = %client_id, role = membership.role.as_str(), "session left room");
        }
    }

    pub fn membership(&self, client_id: Uuid) -> Option<RoomMembership> {
        self.sessions.get(&client_id).map(|entry| entry.value().clone())
    }

    pub fn session_count(&self, role: Role) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().role == role)
            .count()
    }

    /// Broadcasts a courier's sample to every admin session. Returns the
    /// number of admin receivers it was handed to.
    pub fn publish_location(
        &self,
        client_id: Uuid,
        location: CourierLocation,
    ) -> Result<usize, HubError> {
        let membership = self.membership(client_id).ok_or(HubError::NotJoined)?;

        let joined = match (membership.role, membership.courier_id) {
            (Role::Delivery, Some(courier_id)) => courier_id,
            _ => return Err(HubError::NotCourier),
        };

        if joined != location.courier_id {
            return Err(HubError::CourierMismatch {
                joined,
                claimed: location.courier_id,
            });
        }

        let courier_id = location.courier_id.clone();
        let reached = self
            .admin_room
            .send(ServerMessage::LocationUpdate(location))
            .unwrap_or(0);

        let outcome = if reached > 0 { "delivered" } else { "no_subscribers" };
        self.metrics
            .location_updates_total
            .with_label_values(&[outcome])
            .inc();

        debug!(courier_id = %courier_id, admins = reached, "location fanned out");
        Ok(reached)
    }
}
