//! In-memory doubles for the client seams.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use crate::client::api::PackageApi;
use crate::client::channel::{ChannelEvent, RealtimeChannel};
use crate::client::error::{ChannelError, ClientError, LocationError};
use crate::client::map::{MapSurface, MarkerChange, Viewport};
use crate::client::position::{Position, PositionOptions, PositionSource};
use crate::models::channel::ClientMessage;
use crate::models::package::{NewPackage, Package, PackageStatus, Priority};
use crate::models::user::{DeliveryUser, Role, UserIdentity, UserStatus};

pub fn position(lat: f64, lng: f64) -> Position {
    Position {
        latitude: lat,
        longitude: lng,
        accuracy_m: Some(5.0),
        timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap(),
    }
}

#[derive(Default)]
struct ProbeState {
    connected: bool,
    refuse_connect: bool,
    connect_attempts: usize,
    disconnects: usize,
    sent: Vec<ClientMessage>,
}

#[derive(Clone, Default)]
pub struct ChannelProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl ChannelProbe {
    pub fn sent(&self) -> Vec<ClientMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().unwrap().connect_attempts
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    pub fn refuse_connect(&self) {
        self.state.lock().unwrap().refuse_connect = true;
    }
}

pub struct FakeChannel {
    probe: ChannelProbe,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl FakeChannel {
    fn build(connected: bool) -> (Self, ChannelProbe, mpsc::UnboundedSender<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = ChannelProbe::default();
        probe.state.lock().unwrap().connected = connected;

        (
            Self {
                probe: probe.clone(),
                events: rx,
            },
            probe,
            tx,
        )
    }

    pub fn connected() -> (Self, ChannelProbe, mpsc::UnboundedSender<ChannelEvent>) {
        Self::build(true)
    }

    pub fn disconnected() -> (Self, ChannelProbe, mpsc::UnboundedSender<ChannelEvent>) {
        Self::build(false)
    }
}

#[async_trait]
impl RealtimeChannel for FakeChannel {
    fn is_connected(&self) -> bool {
        self.probe.state.lock().unwrap().connected
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        let mut state = self.probe.state.lock().unwrap();
        state.connect_attempts += 1;
        if state.refuse_connect {
            return Err(ChannelError::Connect("connection refused".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn send(&mut self, message: ClientMessage) -> Result<(), ChannelError> {
        let mut state = self.probe.state.lock().unwrap();
        if !state.connected {
            return Err(ChannelError::Disconnected);
        }
        state.sent.push(message);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    async fn disconnect(&mut self) {
        let mut state = self.probe.state.lock().unwrap();
        state.connected = false;
        state.disconnects += 1;
    }
}

/// Returns scripted readings in order, then a fixed Bogotá fix forever.
pub struct ScriptedSource {
    script: VecDeque<Result<Position, LocationError>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Position, LocationError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl PositionSource for ScriptedSource {
    async fn current_position(
        &mut self,
        _options: &PositionOptions,
    ) -> Result<Position, LocationError> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(position(4.6097, -74.0817)))
    }
}

/// Never produces a fix.
pub struct StalledSource;

#[async_trait]
impl PositionSource for StalledSource {
    async fn current_position(
        &mut self,
        _options: &PositionOptions,
    ) -> Result<Position, LocationError> {
        std::future::pending().await
    }
}

#[derive(Clone, Default)]
pub struct RecordingSurface {
    pub changes: Arc<Mutex<Vec<MarkerChange>>>,
    pub views: Arc<Mutex<Vec<Viewport>>>,
}

impl MapSurface for RecordingSurface {
    fn apply(&mut self, changes: &[MarkerChange]) {
        self.changes.lock().unwrap().extend_from_slice(changes);
    }

    fn set_view(&mut self, viewport: &Viewport) {
        self.views.lock().unwrap().push(*viewport);
    }
}

#[derive(Default)]
struct StoreState {
    packages: Vec<Package>,
    users: Vec<DeliveryUser>,
    offline: bool,
    list_calls: usize,
}

/// Package store double with the same semantics as the REST service.
#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<StoreState>>,
}

impl FakeApi {
    pub fn with_packages(packages: Vec<Package>) -> Self {
        let api = Self::default();
        api.state.lock().unwrap().packages = packages;
        api.state.lock().unwrap().users = vec![DeliveryUser {
            id: "DEL001".to_string(),
            username: "carlos".to_string(),
            status: UserStatus::Working,
        }];
        api
    }

    pub fn go_offline(&self) {
        self.state.lock().unwrap().offline = true;
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    fn check_online(state: &StoreState) -> Result<(), ClientError> {
        if state.offline {
            return Err(ClientError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

pub fn package(id: i64, assigned_to: Option<&str>) -> Package {
    Package {
        id,
        delivery_address: format!("Calle {id} #45-67, Bogotá"),
        status: PackageStatus::InTransit,
        priority: Priority::Medium,
        assigned_to: assigned_to.map(str::to_string),
        phone: None,
        created_at: None,
        assigned_user: None,
    }
}

#[async_trait]
impl PackageApi for FakeApi {
    async fn login(&self, username: &str, _password: &str) -> Result<UserIdentity, ClientError> {
        Ok(UserIdentity {
            id: username.to_string(),
            username: username.to_string(),
            role: Role::Admin,
        })
    }

    async fn list_delivery_users(&self) -> Result<Vec<DeliveryUser>, ClientError> {
        let state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        Ok(state.users.clone())
    }

    async fn list_packages(&self) -> Result<Vec<Package>, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        state.list_calls += 1;
        Ok(state.packages.clone())
    }

    async fn list_courier_packages(&self, courier_id: &str) -> Result<Vec<Package>, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        state.list_calls += 1;
        Ok(state
            .packages
            .iter()
            .filter(|package| package.assigned_to.as_deref() == Some(courier_id))
            .cloned()
            .collect())
    }

    async fn create_package(&self, new: &NewPackage) -> Result<Package, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        let id = state.packages.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let created = Package {
            id,
            delivery_address: new.delivery_address.clone(),
            status: new.status.unwrap_or_default(),
            priority: new.priority.unwrap_or_default(),
            assigned_to: new.assigned_to.clone(),
            phone: new.phone.clone(),
            created_at: Some(Utc::now()),
            assigned_user: None,
        };
        state.packages.push(created.clone());
        Ok(created)
    }

    async fn update_package_status(
        &self,
        package_id: i64,
        status: PackageStatus,
    ) -> Result<Package, ClientError> {
        let mut state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        let package = state
            .packages
            .iter_mut()
            .find(|package| package.id == package_id)
            .ok_or_else(|| ClientError::Rejected {
                status: 404,
                message: format!("package {package_id} not found"),
            })?;
        package.status = status;
        Ok(package.clone())
    }
}
