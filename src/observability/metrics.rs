use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub location_updates_total: IntCounterVec,
    pub channel_sessions: IntGaugeVec,
    pub rejected_frames_total: IntCounter,
    pub packages_created_total: IntCounter,
    pub status_updates_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let location_updates_total = IntCounterVec::new(
            Opts::new(
                "location_updates_total",
                "Location updates received from couriers by outcome",
            ),
            &["outcome"],
        )
        .expect("valid location_updates_total metric");

        let channel_sessions = IntGaugeVec::new(
            Opts::new("channel_sessions", "Realtime sessions currently joined, by role"),
            &["role"],
        )
        .expect("valid channel_sessions metric");

        let rejected_frames_total = IntCounter::new(
            "rejected_frames_total",
            "Realtime frames rejected at the hub boundary",
        )
        .expect("valid rejected_frames_total metric");

        let packages_created_total =
            IntCounter::new("packages_created_total", "Packages created through the API")
                .expect("valid packages_created_total metric");

        let status_updates_total = IntCounterVec::new(
            Opts::new("status_updates_total", "Package status updates by new status"),
            &["status"],
        )
        .expect("valid status_updates_total metric");

        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");
        registry
            .register(Box::new(channel_sessions.clone()))
            .expect("register channel_sessions");
        registry
            .register(Box::new(rejected_frames_total.clone()))
            .expect("register rejected_frames_total");
        registry
            .register(Box::new(packages_created_total.clone()))
            .expect("register packages_created_total");
        registry
            .register(Box::new(status_updates_total.clone()))
            .expect("register status_updates_total");

        Self {
            registry,
            location_updates_total,
            channel_sessions,
            rejected_frames_total,
            packages_created_total,
            status_updates_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
