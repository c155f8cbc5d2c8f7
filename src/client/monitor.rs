//! Admin-side live fleet state.
//!
//! Samples are applied in arrival order and always overwrite the previous
//! one for that courier; capture timestamps are not compared. Presence only
//! ever moves to `Active`.

use std::collections::HashMap;

use tracing::debug;

use crate::client::map::{Marker, MarkerChange, MarkerSet, Viewport};
use crate::geo::haversine_km;
use crate::models::courier::{CourierLocation, CourierPresence, GeoPoint, PresenceState};
use crate::models::package::Package;

pub const DEFAULT_CENTER: GeoPoint = GeoPoint {
    lat: 4.6097,
    lng: -74.0817,
};
pub const DEFAULT_ZOOM: u8 = 11;
pub const FOCUS_ZOOM: u8 = 13;
pub const DEFAULT_RECENTER_THRESHOLD_KM: f64 = 100.0;

/// Cached package annotated with its courier's derived presence.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPackage {
    pub package: Package,
    pub courier_presence: Option<PresenceState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationApplied {
    pub marker_changes: Vec<MarkerChange>,
    pub recentered: Option<Viewport>,
    pub packages_activated: usize,
}

#[derive(Debug)]
pub struct FleetMonitor {
    locations: HashMap<String, CourierLocation>,
    presence: HashMap<String, PresenceState>,
    packages: Vec<TrackedPackage>,
    rendered: MarkerSet,
    viewport: Viewport,
    recenter_threshold_km: f64,
}

impl Default for FleetMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_RECENTER_THRESHOLD_KM)
    }
}

impl FleetMonitor {
    pub fn new(recenter_threshold_km: f64) -> Self {
        Self {
            locations: HashMap::new(),
            presence: HashMap::new(),
            packages: Vec::new(),
            rendered: MarkerSet::default(),
            viewport: Viewport {
                center: DEFAULT_CENTER,
                zoom: DEFAULT_ZOOM,
            },
            recenter_threshold_km,
        }
    }

    pub fn on_location_received(&mut self, location: CourierLocation) -> LocationApplied {
        let first_courier = self.locations.is_empty();
        let courier_id = location.courier_id.clone();
        let point = location.point();

        self.locations.insert(courier_id.clone(), location);
        self.presence.insert(courier_id.clone(), PresenceState::Active);

        let packages_activated = self.propagate_presence(&courier_id);
        let marker_changes = self.render_markers(&courier_id);
        let recentered = self.maybe_recenter(first_courier, point);

        debug!(
            courier_id = %courier_id,
            packages_activated,
            recentered = recentered.is_some(),
            "courier location applied"
        );

        LocationApplied {
            marker_changes,
            recentered,
            packages_activated,
        }
    }

    /// Replaces the package cache with a fresh snapshot from the store.
    pub fn replace_packages(&mut self, packages: Vec<Package>) {
        self.packages = packages
            .into_iter()
            .map(|package| {
                let courier_presence = package
                    .assigned_to
                    .as_ref()
                    .and_then(|id| self.presence.get(id))
                    .copied();
                TrackedPackage {
                    package,
                    courier_presence,
                }
            })
            .collect();
    }

    pub fn location(&self, courier_id: &str) -> Option<&CourierLocation> {
        self.locations.get(courier_id)
    }

    pub fn presence(&self, courier_id: &str) -> Option<CourierPresence> {
        self.presence.get(courier_id).map(|state| CourierPresence {
            courier_id: courier_id.to_string(),
            state: *state,
        })
    }

    pub fn packages(&self) -> &[TrackedPackage] {
        &self.packages
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.rendered
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn courier_count(&self) -> usize {
        self.locations.len()
    }

    fn propagate_presence(&mut self, courier_id: &str) -> usize {
        let state = self.presence.get(courier_id).copied();
        let mut touched = 0;

        for tracked in &mut self.packages {
            if tracked.package.assigned_to.as_deref() == Some(courier_id) {
                tracked.courier_presence = state;
                touched += 1;
            }
        }

        touched
    }

    /// Diffs the rendered set against the cache. The updated courier's marker
    /// is always re-rendered, even when the sample repeats the last one.
    fn render_markers(&mut self, updated: &str) -> Vec<MarkerChange> {
        let desired: MarkerSet = self.locations.values().map(Marker::for_location).collect();
        let mut changes = self.rendered.diff(&desired);

        let touched = changes.iter().any(|change| change.courier_id() == updated);
        if !touched {
            if let Some(marker) = desired.get(updated) {
                changes.push(MarkerChange::Replace(marker.clone()));
            }
        }

        self.rendered = desired;
        changes
    }

    fn maybe_recenter(&mut self, first_courier: bool, point: GeoPoint) -> Option<Viewport> {
        let far_away = haversine_km(&self.viewport.center, &point) > self.recenter_threshold_km;
        if !first_courier && !far_away {
            return None;
        }

        self.viewport = Viewport {
            center: point,
            zoom: FOCUS_ZOOM,
        };
        Some(self.viewport)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{FleetMonitor, DEFAULT_CENTER, FOCUS_ZOOM};
    use crate::client::map::MarkerChange;
    use crate::client::testing::package;
    use crate::models::courier::{CourierLocation, GeoPoint, PresenceState};

    fn sample(courier_id: &str, lat: f64, lng: f64, minute: i64) -> CourierLocation {
        CourierLocation {
            courier_id: courier_id.to_string(),
            display_name: format!("Courier {courier_id}"),
            latitude: lat,
            longitude: lng,
            captured_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[test]
    fn last_processed_sample_wins_even_if_captured_earlier() {
        let mut monitor = FleetMonitor::default();

        monitor.on_location_received(sample("DEL001", 4.62, -74.07, 10));
        monitor.on_location_received(sample("DEL001", 4.61, -74.08, 5));

        let shown = monitor.location("DEL001").unwrap();
        assert_eq!((shown.latitude, shown.longitude), (4.61, -74.08));
        assert_eq!(shown.captured_at.format("%M").to_string(), "05");
        assert_eq!(monitor.courier_count(), 1);
    }

    #[test]
    fn first_courier_always_recenters() {
        let mut monitor = FleetMonitor::default();

        let applied = monitor.on_location_received(sample("DEL001", 4.6098, -74.0818, 0));

        let viewport = applied.recentered.unwrap();
        assert_eq!(viewport.center, GeoPoint { lat: 4.6098, lng: -74.0818 });
        assert_eq!(viewport.zoom, FOCUS_ZOOM);
        assert_ne!(monitor.viewport().center, DEFAULT_CENTER);
    }

    #[test]
    fn nearby_update_keeps_view_and_distant_update_recenters() {
        let mut monitor = FleetMonitor::default();
        monitor.on_location_received(sample("DEL001", 4.61, -74.08, 0));

        let near = monitor.on_location_received(sample("DEL002", 4.62, -74.07, 1));
        assert!(near.recentered.is_none());
        assert_eq!(monitor.viewport().center, GeoPoint { lat: 4.61, lng: -74.08 });

        let far = monitor.on_location_received(sample("DEL003", 40.7, -74.0, 2));
        assert_eq!(
            far.recentered.map(|v| v.center),
            Some(GeoPoint { lat: 40.7, lng: -74.0 })
        );
    }

    #[test]
    fn update_rerenders_exactly_one_marker() {
        let mut monitor = FleetMonitor::default();

        let first = monitor.on_location_received(sample("DEL001", 4.61, -74.08, 0));
        assert!(matches!(first.marker_changes.as_slice(), [MarkerChange::Add(_)]));

        monitor.on_location_received(sample("DEL002", 6.24, -75.58, 1));
        let moved = monitor.on_location_received(sample("DEL001", 4.63, -74.06, 2));

        match moved.marker_changes.as_slice() {
            [MarkerChange::Replace(marker)] => {
                assert_eq!(marker.courier_id, "DEL001");
                assert_eq!(marker.position, GeoPoint { lat: 4.63, lng: -74.06 });
            }
            other => panic!("unexpected changes {other:?}"),
        }
        assert_eq!(monitor.markers().len(), 2);
    }

    #[test]
    fn repeated_sample_still_rerenders_its_marker() {
        let mut monitor = FleetMonitor::default();
        let location = sample("DEL001", 4.61, -74.08, 0);

        monitor.on_location_received(location.clone());
        let repeated = monitor.on_location_received(location);

        match repeated.marker_changes.as_slice() {
            [MarkerChange::Replace(marker)] => assert_eq!(marker.courier_id, "DEL001"),
            other => panic!("unexpected changes {other:?}"),
        }
        assert_eq!(monitor.markers().len(), 1);
    }

    #[test]
    fn presence_propagates_to_assigned_packages() {
        let mut monitor = FleetMonitor::default();
        monitor.replace_packages(vec![
            package(1, Some("DEL001")),
            package(2, Some("DEL002")),
            package(3, Some("DEL001")),
            package(4, None),
        ]);

        let applied = monitor.on_location_received(sample("DEL001", 4.61, -74.08, 0));

        assert_eq!(applied.packages_activated, 2);
        let presence: Vec<Option<PresenceState>> = monitor
            .packages()
            .iter()
            .map(|tracked| tracked.courier_presence)
            .collect();
        assert_eq!(
            presence,
            vec![
                Some(PresenceState::Active),
                None,
                Some(PresenceState::Active),
                None
            ]
        );
        assert_eq!(
            monitor.presence("DEL001").map(|p| p.state),
            Some(PresenceState::Active)
        );
    }

    #[test]
    fn courier_without_packages_leaves_cache_untouched() {
        let mut monitor = FleetMonitor::default();
        monitor.replace_packages(vec![package(1, Some("DEL001")), package(2, None)]);
        let before = monitor.packages().to_vec();

        let applied = monitor.on_location_received(sample("DEL777", 4.61, -74.08, 0));

        assert_eq!(applied.packages_activated, 0);
        assert_eq!(monitor.packages(), before.as_slice());
        assert_eq!(
            monitor.presence("DEL777").map(|p| p.state),
            Some(PresenceState::Active)
        );
    }

    #[test]
    fn refetched_packages_keep_observed_presence() {
        let mut monitor = FleetMonitor::default();
        monitor.on_location_received(sample("DEL001", 4.61, -74.08, 0));

        monitor.replace_packages(vec![package(9, Some("DEL001")), package(10, Some("DEL002"))]);

        assert_eq!(
            monitor.packages()[0].courier_presence,
            Some(PresenceState::Active)
        );
        assert_eq!(monitor.packages()[1].courier_presence, None);
    }
}
