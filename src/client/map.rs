//! Declarative marker set for the fleet map.
//!
//! The monitor describes the markers it wants; [`MarkerSet::diff`] turns two
//! consecutive descriptions into the changes a [`MapSurface`] must apply.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::courier::{CourierLocation, GeoPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub courier_id: String,
    pub position: GeoPoint,
    pub label: String,
    pub popup: String,
}

impl Marker {
    pub fn for_location(location: &CourierLocation) -> Self {
        Self {
            courier_id: location.courier_id.clone(),
            position: location.point(),
            label: location.display_name.clone(),
            popup: format!(
                "{} · last seen {}",
                location.display_name,
                format_captured_at(&location.captured_at)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerChange {
    Add(Marker),
    /// Remove the existing marker for this courier and add this one.
    Replace(Marker),
    Remove(String),
}

impl MarkerChange {
    pub fn courier_id(&self) -> &str {
        match self {
            MarkerChange::Add(marker) | MarkerChange::Replace(marker) => &marker.courier_id,
            MarkerChange::Remove(courier_id) => courier_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerSet {
    markers: BTreeMap<String, Marker>,
}

impl MarkerSet {
    pub fn insert(&mut self, marker: Marker) {
        self.markers.insert(marker.courier_id.clone(), marker);
    }

    pub fn get(&self, courier_id: &str) -> Option<&Marker> {
        self.markers.get(courier_id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    /// Changes that turn `self` into `next`, ordered by courier id.
    pub fn diff(&self, next: &MarkerSet) -> Vec<MarkerChange> {
        let mut changes = Vec::new();

        for (courier_id, marker) in &next.markers {
            match self.markers.get(courier_id) {
                None => changes.push(MarkerChange::Add(marker.clone())),
                Some(current) if current != marker => {
                    changes.push(MarkerChange::Replace(marker.clone()))
                }
                Some(_) => {}
            }
        }

        for courier_id in self.markers.keys() {
            if !next.markers.contains_key(courier_id) {
                changes.push(MarkerChange::Remove(courier_id.clone()));
            }
        }

        changes
    }
}

impl FromIterator<Marker> for MarkerSet {
    fn from_iter<I: IntoIterator<Item = Marker>>(iter: I) -> Self {
        let mut set = MarkerSet::default();
        for marker in iter {
            set.insert(marker);
        }
        set
    }
}

/// `HH:MM:SS` in UTC.
pub fn format_captured_at(captured_at: &DateTime<Utc>) -> String {
    captured_at.format("%H:%M:%S").to_string()
}

/// Rendering seam for the map widget.
pub trait MapSurface {
    fn apply(&mut self, changes: &[MarkerChange]);

    fn set_view(&mut self, viewport: &Viewport);
}

/// Surface that only logs, for headless sessions.
#[derive(Debug, Default)]
pub struct LogSurface;

impl MapSurface for LogSurface {
    fn apply(&mut self, changes: &[MarkerChange]) {
        for change in changes {
            match change {
                MarkerChange::Add(marker) | MarkerChange::Replace(marker) => info!(
                    courier_id = %marker.courier_id,
                    lat = marker.position.lat,
                    lng = marker.position.lng,
                    popup = %marker.popup,
                    "marker placed"
                ),
                MarkerChange::Remove(courier_id) => {
                    info!(courier_id = %courier_id, "marker removed")
                }
            }
        }
    }

    fn set_view(&mut self, viewport: &Viewport) {
        info!(
            lat = viewport.center.lat,
            lng = viewport.center.lng,
            zoom = viewport.zoom,
            "map recentered"
        );
    }
}
