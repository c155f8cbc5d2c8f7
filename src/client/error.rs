use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    PositionUnavailable,

    #[error("timed out waiting for a position fix")]
    Timeout,

    #[error("unknown location error: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChannelError {
    #[error("connect error: {0}")]
    Connect(String),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("channel is not connected")]
    Disconnected,

    #[error("send failed: {0}")]
    Send(String),

    #[error("failed to encode frame: {0}")]
    Encode(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

impl From<crate::error::AppError> for ClientError {
    fn from(err: crate::error::AppError) -> Self {
        ClientError::Config(err.to_string())
    }
}
