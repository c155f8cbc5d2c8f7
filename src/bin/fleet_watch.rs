//! Headless admin dashboard: logs every marker change and recenter.

use fleet_tracker::client::admin::AdminSession;
use fleet_tracker::client::api::{HttpPackageApi, PackageApi};
use fleet_tracker::client::channel::WsChannel;
use fleet_tracker::client::error::ClientError;
use fleet_tracker::client::map::LogSurface;
use fleet_tracker::client::monitor::FleetMonitor;
use fleet_tracker::client::notice::Notifier;
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
    if user.role != Role::Admin {
        return Err(ClientError::Config(format!(
            "{} is not an admin account",
            user.username
        )));
    }

    let (notifier, mut notices) = Notifier::channel();
    tokio::spawn(async move { while notices.recv().await.is_some() {} });

    let mut session = AdminSession::new(
        user.id.clone(),
        WsChannel::new(config.ws_url.clone(), config.connect_timeout),
        api,
        FleetMonitor::new(config.recenter_threshold_km),
        LogSurface,
        notifier,
    );
    session.start().await;
    tracing::info!(
        packages = session.monitor().packages().len(),
        couriers = session.couriers().len(),
        "fleet dashboard ready"
    );

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
