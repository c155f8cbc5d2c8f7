//! Admin (dispatcher) session: fleet map plus package management.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::api::PackageApi;
use crate::client::channel::{ChannelEvent, RealtimeChannel};
use crate::client::error::ClientError;
use crate::client::map::MapSurface;
use crate::client::monitor::FleetMonitor;
use crate::client::notice::Notifier;
use crate::models::channel::{ClientMessage, JoinRoom, ServerMessage};
use crate::models::package::{NewPackage, Package, PackageStatus};
use crate::models::user::{DeliveryUser, Role};

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct AdminSession<C, A, S> {
    user_id: String,
    channel: C,
    api: A,
    monitor: FleetMonitor,
    surface: S,
    notifier: Notifier,
    couriers: Vec<DeliveryUser>,
    reconnect_delay: Duration,
}

impl<C, A, S> AdminSession<C, A, S>
where
    C: RealtimeChannel,
    A: PackageApi,
    S: MapSurface + Send,
{
    pub fn new(
        user_id: impl Into<String>,
        channel: C,
        api: A,
        monitor: FleetMonitor,
        surface: S,
        notifier: Notifier,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            channel,
            api,
            monitor,
            surface,
            notifier,
            couriers: Vec::new(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn monitor(&self) -> &FleetMonitor {
        &self.monitor
    }

    pub fn couriers(&self) -> &[DeliveryUser] {
        &self.couriers
    }

    /// Mounts the dashboard: shows the initial view, loads the roster and
    /// packages, and joins the admin room. Failures become notices.
    pub async fn start(&mut self) {
        self.surface.set_view(&self.monitor.viewport());

        if let Err(err) = self.refresh().await {
            self.notifier.error(format!("could not load packages: {err}"));
        }

        let join = ClientMessage::JoinRoom(JoinRoom {
            user_id: self.user_id.clone(),
            user_type: Role::Admin,
        });

        match self.channel.connect().await {
            Ok(()) => {
                if let Err(err) = self.channel.send(join).await {
                    self.notifier.warn(format!("could not join admin room: {err}"));
                }
            }
            Err(err) => {
                let _ = self.channel.send(join).await;
                self.notifier.warn(format!("realtime connection failed: {err}"));
            }
        }
    }

    /// Re-fetches the courier roster and the full package list.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        self.couriers = self.api.list_delivery_users().await?;
        let packages = self.api.list_packages().await?;
        self.monitor.replace_packages(packages);
        Ok(())
    }

    pub async fn create_package(&mut self, package: NewPackage) -> Result<Package, ClientError> {
        let created = match self.api.create_package(&package).await {
            Ok(created) => created,
            Err(err) => {
                self.notifier.error(format!("package not created: {err}"));
                return Err(err);
            }
        };

        self.notifier.info(format!("package {} created", created.id));
        if let Err(err) = self.refresh().await {
            self.notifier.warn(format!("could not reload packages: {err}"));
        }
        Ok(created)
    }

    pub async fn update_status(
        &mut self,
        package_id: i64,
        status: PackageStatus,
    ) -> Result<Package, ClientError> {
        let updated = match self.api.update_package_status(package_id, status).await {
            Ok(updated) => updated,
            Err(err) => {
                self.notifier.error(format!("status not updated: {err}"));
                return Err(err);
            }
        };

        if let Err(err) = self.refresh().await {
            self.notifier.warn(format!("could not reload packages: {err}"));
        }
        Ok(updated)
    }

    pub fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => info!(user_id = %self.user_id, "admin channel connected"),
            ChannelEvent::Disconnected => self.notifier.warn("realtime connection lost"),
            ChannelEvent::ConnectError(reason) => {
                self.notifier.warn(format!("realtime connection failed: {reason}"))
            }
            ChannelEvent::Message(ServerMessage::LocationUpdate(location)) => {
                let applied = self.monitor.on_location_received(location);
                if !applied.marker_changes.is_empty() {
                    self.surface.apply(&applied.marker_changes);
                }
                if let Some(viewport) = applied.recentered {
                    self.surface.set_view(&viewport);
                }
            }
            ChannelEvent::Message(ServerMessage::Error { message }) => {
                warn!(user_id = %self.user_id, reason = %message, "hub rejected a frame");
            }
        }
    }

    /// Processes channel events in arrival order until `cancel` fires, then
    /// closes the connection. A closed connection is re-opened after the
    /// reconnect delay.
    pub async fn run(&mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.channel.next_event() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = sleep(self.reconnect_delay) => {}
                        }
                        let _ = self.channel.connect().await;
                    }
                }
            }
        }

        self.channel.disconnect().await;
        info!(user_id = %self.user_id, "admin session closed");
    }
}
