use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fleet_tracker::api::rest::router;
use fleet_tracker::api::rest::users::register_account;
use fleet_tracker::client::api::{HttpPackageApi, PackageApi};
use fleet_tracker::client::channel::{ChannelEvent, RealtimeChannel, WsChannel};
use fleet_tracker::client::error::{ChannelError, ClientError};
use fleet_tracker::models::channel::{ClientMessage, JoinRoom, ServerMessage};
use fleet_tracker::models::courier::CourierLocation;
use fleet_tracker::models::package::{NewPackage, PackageStatus};
use fleet_tracker::models::user::{CreateUserRequest, Role};
use fleet_tracker::state::AppState;
use tokio::time::{sleep, timeout};

async fn spawn_server() -> (String, Arc<AppState>) {
    let state = Arc::new(AppState::new(64));
    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr.to_string(), state)
}

async fn joined(addr: &str, user_id: &str, role: Role) -> WsChannel {
    let mut channel = WsChannel::new(format!("ws://{addr}/ws"), Duration::from_secs(5));
    channel.connect().await.unwrap();
    channel
        .send(ClientMessage::JoinRoom(JoinRoom {
            user_id: user_id.to_string(),
            user_type: role,
        }))
        .await
        .unwrap();

    assert_eq!(
        timeout(Duration::from_secs(1), channel.next_event()).await.unwrap(),
        Some(ChannelEvent::Connected)
    );
    channel
}

async fn wait_for_sessions(state: &AppState, admins: usize, couriers: usize) {
    for _ in 0..200 {
        if state.hub.session_count(Role::Admin) == admins
            && state.hub.session_count(Role::Delivery) == couriers
        {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("sessions never joined");
}

fn sample(courier_id: &str, lat: f64, lng: f64) -> CourierLocation {
    CourierLocation {
        courier_id: courier_id.to_string(),
        display_name: courier_id.to_string(),
        latitude: lat,
        longitude: lng,
        captured_at: Utc::now(),
    }
}

#[tokio::test]
async fn admin_sees_every_courier_and_couriers_see_nothing() {
    let (addr, state) = spawn_server().await;

    let mut admin = joined(&addr, "admin-1", Role::Admin).await;
    let mut first = joined(&addr, "DEL001", Role::Delivery).await;
    let mut second = joined(&addr, "DEL002", Role::Delivery).await;
    wait_for_sessions(&state, 1, 2).await;

    first
        .send(ClientMessage::LocationUpdate(sample("DEL001", 4.61, -74.08)))
        .await
        .unwrap();
    second
        .send(ClientMessage::LocationUpdate(sample("DEL002", 6.24, -75.58)))
        .await
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..2 {
        match timeout(Duration::from_secs(2), admin.next_event()).await.unwrap() {
            Some(ChannelEvent::Message(ServerMessage::LocationUpdate(loc))) => {
                seen.push(loc.courier_id)
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    seen.sort();
    assert_eq!(seen, vec!["DEL001".to_string(), "DEL002".to_string()]);

    assert!(timeout(Duration::from_millis(200), first.next_event())
        .await
        .is_err());
    assert!(timeout(Duration::from_millis(200), second.next_event())
        .await
        .is_err());
}

#[tokio::test]
async fn spoofed_courier_id_is_rejected_to_sender_only() {
    let (addr, state) = spawn_server().await;

    let mut admin = joined(&addr, "admin-1", Role::Admin).await;
    let mut courier = joined(&addr, "DEL001", Role::Delivery).await;
    wait_for_sessions(&state, 1, 1).await;

    courier
        .send(ClientMessage::LocationUpdate(sample("DEL002", 4.61, -74.08)))
        .await
        .unwrap();

    match timeout(Duration::from_secs(2), courier.next_event()).await.unwrap() {
        Some(ChannelEvent::Message(ServerMessage::Error { message })) => {
            assert!(message.contains("DEL002"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(timeout(Duration::from_millis(200), admin.next_event())
        .await
        .is_err());
}

#[tokio::test]
async fn closing_a_session_leaves_the_room() {
    let (addr, state) = spawn_server().await;

    let mut admin = joined(&addr, "admin-1", Role::Admin).await;
    wait_for_sessions(&state, 1, 0).await;

    admin.disconnect().await;
    assert!(!admin.is_connected());
    wait_for_sessions(&state, 0, 0).await;

    let err = admin
        .send(ClientMessage::LocationUpdate(sample("DEL001", 4.61, -74.08)))
        .await
        .unwrap_err();
    assert_eq!(err, ChannelError::Disconnected);
}

#[tokio::test]
async fn connect_to_closed_port_reports_connect_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut channel = WsChannel::new(format!("ws://{addr}/ws"), Duration::from_secs(2));
    assert!(channel.connect().await.is_err());
    assert!(matches!(
        channel.next_event().await,
        Some(ChannelEvent::ConnectError(_))
    ));
    assert_eq!(channel.next_event().await, None);
}

#[tokio::test]
async fn repeated_connect_failures_keep_only_the_latest_event() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut channel = WsChannel::new(format!("ws://{addr}/ws"), Duration::from_secs(2));
    for _ in 0..20 {
        assert!(channel.connect().await.is_err());
    }

    assert!(matches!(
        channel.next_event().await,
        Some(ChannelEvent::ConnectError(_))
    ));
    assert_eq!(channel.next_event().await, None);
}

#[tokio::test]
async fn http_client_round_trips_the_package_contract() {
    let (addr, state) = spawn_server().await;
    let courier = register_account(
        &state,
        CreateUserRequest {
            username: "carlos".to_string(),
            password: "ruta-norte".to_string(),
            role: Role::Delivery,
        },
    )
    .unwrap();
    let api = HttpPackageApi::new(format!("http://{addr}/api"));

    let identity = api.login("carlos", "ruta-norte").await.unwrap();
    assert_eq!(identity.id, courier.id);
    assert_eq!(identity.role, Role::Delivery);

    let created = api
        .create_package(&NewPackage {
            delivery_address: "Calle 85 #34-56, Bogotá".to_string(),
            assigned_to: Some(courier.id.clone()),
            ..NewPackage::default()
        })
        .await
        .unwrap();
    assert_eq!(created.status, PackageStatus::InTransit);

    api.update_package_status(created.id, PackageStatus::Delivered)
        .await
        .unwrap();

    let mine = api.list_courier_packages(&courier.id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, PackageStatus::Delivered);
    assert_eq!(
        mine[0].assigned_user.as_ref().map(|u| u.username.as_str()),
        Some("carlos")
    );

    let roster = api.list_delivery_users().await.unwrap();
    assert_eq!(roster.len(), 1);

    match api.login("carlos", "wrong").await {
        Err(ClientError::Rejected { status, .. }) => assert_eq!(status, 401),
        other => panic!("unexpected login result {other:?}"),
    }
}
