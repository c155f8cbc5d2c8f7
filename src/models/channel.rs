//! Frames exchanged over the realtime channel.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::courier::CourierLocation;
use crate::models::user::Role;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub user_id: String,
    pub user_type: Role,
}

/// Frames a client may send to the hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinRoom(JoinRoom),
    LocationUpdate(CourierLocation),
}

/// Frames the hub sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    LocationUpdate(CourierLocation),
    Error { message: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("user id cannot be empty")]
    EmptyUserId,

    #[error("courier id cannot be empty")]
    EmptyCourierId,

    #[error("latitude {0} out of range")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} out of range")]
    LongitudeOutOfRange(f64),
}

impl ClientMessage {
    /// Parses and validates a text frame.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        let message: ClientMessage =
            serde_json::from_str(raw).map_err(|err| FrameError::Malformed(err.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    pub fn validate(&self) -> Result<(), FrameError> {
        match self {
            ClientMessage::JoinRoom(join) => {
                if join.user_id.trim().is_empty() {
                    return Err(FrameError::EmptyUserId);
                }
                Ok(())
            }
            ClientMessage::LocationUpdate(location) => validate_location(location),
        }
    }
}

fn validate_location(location: &CourierLocation) -> Result<(), FrameError> {
    if location.courier_id.trim().is_empty() {
        return Err(FrameError::EmptyCourierId);
    }

    if !location.latitude.is_finite() || !(-90.0..=90.0).contains(&location.latitude) {
        return Err(FrameError::LatitudeOutOfRange(location.latitude));
    }

    if !location.longitude.is_finite() || !(-180.0..=180.0).contains(&location.longitude) {
        return Err(FrameError::LongitudeOutOfRange(location.longitude));
    }

    Ok(())
}
