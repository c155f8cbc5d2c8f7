//! Device position sources.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::client::error::LocationError;
use crate::models::courier::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait PositionSource: Send {
    /// One position reading. Callers enforce `options.timeout` themselves and
    /// abandon the request when it elapses.
    async fn current_position(
        &mut self,
        options: &PositionOptions,
    ) -> Result<Position, LocationError>;
}

/// Replays a fixed list of waypoints, one per reading, looping at the end.
#[derive(Debug, Clone)]
pub struct RouteSource {
    waypoints: Vec<GeoPoint>,
    next: usize,
}

impl RouteSource {
    pub fn new(waypoints: Vec<GeoPoint>) -> Self {
        Self { waypoints, next: 0 }
    }

    /// Distribution centre and drop-off points around Bogotá.
    pub fn bogota_loop() -> Self {
        Self::new(vec![
            GeoPoint { lat: 4.6097, lng: -74.0817 },
            GeoPoint { lat: 4.6351, lng: -74.0703 },
            GeoPoint { lat: 4.6244, lng: -74.0647 },
            GeoPoint { lat: 4.5981, lng: -74.0758 },
        ])
    }
}

#[async_trait]
impl PositionSource for RouteSource {
    async fn current_position(
        &mut self,
        options: &PositionOptions,
    ) -> Result<Position, LocationError> {
        let point = *self
            .waypoints
            .get(self.next)
            .ok_or(LocationError::PositionUnavailable)?;
        self.next = (self.next + 1) % self.waypoints.len();

        Ok(Position {
            latitude: point.lat,
            longitude: point.lng,
            accuracy_m: Some(if options.high_accuracy { 5.0 } else { 50.0 }),
            timestamp: Utc::now(),
        })
    }
}
