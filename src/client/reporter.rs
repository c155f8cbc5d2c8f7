//! Courier-side sampling loop.

use std::time::Duration;

use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::channel::{ChannelEvent, RealtimeChannel};
use crate::client::error::{ChannelError, LocationError};
use crate::client::notice::Notifier;
use crate::client::position::{PositionOptions, PositionSource};
use crate::models::channel::{ClientMessage, JoinRoom, ServerMessage};
use crate::models::courier::CourierLocation;
use crate::models::user::Role;

const MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct CourierIdentity {
    pub courier_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReporterConfig {
    pub interval: Duration,
    pub initial_delay: Duration,
    pub position: PositionOptions,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            initial_delay: Duration::from_secs(2),
            position: PositionOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Published(CourierLocation),
    /// The channel was down; the sample was discarded.
    Dropped(CourierLocation),
}

pub struct LocationReporter<P, C> {
    identity: CourierIdentity,
    source: P,
    channel: C,
    config: ReporterConfig,
    notifier: Notifier,
}

impl<P, C> LocationReporter<P, C>
where
    P: PositionSource,
    C: RealtimeChannel,
{
    pub fn new(
        identity: CourierIdentity,
        source: P,
        channel: C,
        config: ReporterConfig,
        notifier: Notifier,
    ) -> Self {
        Self {
            identity,
            source,
            channel,
            config,
            notifier,
        }
    }

    pub fn identity(&self) -> &CourierIdentity {
        &self.identity
    }

    /// Connects and registers this courier in the delivery room.
    pub async fn join(&mut self) -> Result<(), ChannelError> {
        let join = ClientMessage::JoinRoom(JoinRoom {
            user_id: self.identity.courier_id.clone(),
            user_type: Role::Delivery,
        });

        if let Err(err) = self.channel.connect().await {
            // Keep the membership so the next reconnect replays it.
            let _ = self.channel.send(join).await;
            return Err(err);
        }

        self.channel.send(join).await
    }

    /// Takes one reading and publishes it when the channel is up.
    pub async fn sample(&mut self) -> Result<SampleOutcome, LocationError> {
        let options = self.config.position;
        let reading = match timeout(options.timeout, self.source.current_position(&options)).await
        {
            Ok(reading) => reading,
            Err(_) => Err(LocationError::Timeout),
        };

        let position = match reading {
            Ok(position) => position,
            Err(err) => {
                self.notifier.error(format!("could not read location: {err}"));
                return Err(err);
            }
        };

        let location = CourierLocation {
            courier_id: self.identity.courier_id.clone(),
            display_name: self.identity.display_name.clone(),
            latitude: position.latitude,
            longitude: position.longitude,
            captured_at: position.timestamp,
        };

        if !self.channel.is_connected() {
            warn!(courier_id = %location.courier_id, "channel down; dropping sample and reconnecting");
            if let Err(err) = self.channel.connect().await {
                self.notifier.warn(format!("realtime reconnect failed: {err}"));
            }
            return Ok(SampleOutcome::Dropped(location));
        }

        match self
            .channel
            .send(ClientMessage::LocationUpdate(location.clone()))
            .await
        {
            Ok(()) => {
                debug!(
                    courier_id = %location.courier_id,
                    lat = location.latitude,
                    lng = location.longitude,
                    "location published"
                );
                Ok(SampleOutcome::Published(location))
            }
            Err(err) => {
                self.notifier.warn(format!("location not sent: {err}"));
                Ok(SampleOutcome::Dropped(location))
            }
        }
    }

    /// Reacts to what the hub sends back. Couriers only ever receive
    /// lifecycle transitions and rejections.
    pub fn handle_event(&mut self, event: ChannelEvent) {
        let courier_id = &self.identity.courier_id;
        match event {
            ChannelEvent::Connected => info!(courier_id = %courier_id, "courier channel connected"),
            ChannelEvent::Disconnected => self.notifier.warn("realtime connection lost"),
            ChannelEvent::ConnectError(reason) => {
                debug!(courier_id = %courier_id, reason = %reason, "courier channel connect error")
            }
            ChannelEvent::Message(ServerMessage::Error { message }) => {
                self.notifier.warn(format!("location rejected by hub: {message}"))
            }
            ChannelEvent::Message(ServerMessage::LocationUpdate(location)) => {
                debug!(courier_id = %courier_id, from = %location.courier_id, "ignoring fleet update")
            }
        }
    }

    /// Samples once after the initial delay, then on every interval tick,
    /// until `cancel` fires. Failed samples wait for the next tick. Between
    /// ticks the channel is read so closes and rejections surface promptly.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(courier_id = %self.identity.courier_id, "location reporter started");

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(self.config.initial_delay) => {}
        }

        let mut ticker = interval(self.config.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Cleared once the channel has nothing left to report; re-armed by
        // each tick, which may reconnect.
        let mut listening = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.sample().await;
                    listening = true;
                }
                event = self.channel.next_event(), if listening => match event {
                    Some(event) => self.handle_event(event),
                    None => listening = false,
                }
            }
        }

        info!(courier_id = %self.identity.courier_id, "location reporter stopped");
    }

    pub async fn shutdown(&mut self) {
        self.channel.disconnect().await;
    }
}
