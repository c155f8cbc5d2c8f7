//! Headless courier: logs in, then replays a route around Bogotá on the
//! realtime channel until Ctrl-C.

use fleet_tracker::client::api::{HttpPackageApi, PackageApi};
use fleet_tracker::client::channel::WsChannel;
use fleet_tracker::client::courier::CourierSession;
use fleet_tracker::client::error::ClientError;
use fleet_tracker::client::notice::Notifier;
use fleet_tracker::client::position::{PositionOptions, RouteSource};
use fleet_tracker::client::reporter::{CourierIdentity, LocationReporter, ReporterConfig};
use fleet_tracker::config::ClientConfig;
use fleet_tracker::models::user::Role;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let api = HttpPackageApi::new(config.api_base_url.clone());
    let user = api.login(&config.username, &config.password).await?;
    if user.role != Role::Delivery {
        return Err(ClientError::Config(format!(
            "{} is not a delivery account",
            user.username
        )));
    }

    let (notifier, mut notices) = Notifier::channel();
    tokio::spawn(async move { while notices.recv().await.is_some() {} });

    let reporter = LocationReporter::new(
        CourierIdentity {
            courier_id: user.id.clone(),
            display_name: user.username.clone(),
        },
        RouteSource::bogota_loop(),
        WsChannel::new(config.ws_url.clone(), config.connect_timeout),
        ReporterConfig {
            interval: config.report_interval,
            initial_delay: config.report_initial_delay,
            position: PositionOptions {
                high_accuracy: true,
                timeout: config.position_timeout,
                maximum_age: config.position_maximum_age,
            },
        },
        notifier.clone(),
    );

    let mut session = CourierSession::new(api, reporter, notifier);
    if let Ok(packages) = session.refresh_packages().await {
        tracing::info!(courier_id = %user.id, packages = packages.len(), "assigned packages loaded");
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for shutdown signal");
        }
        signal_cancel.cancel();
    });

    session.run(cancel).await;
    Ok(())
}
