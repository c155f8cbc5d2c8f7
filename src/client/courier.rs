//! Courier session: own package list plus the location reporter.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::api::PackageApi;
use crate::client::channel::RealtimeChannel;
use crate::client::error::ClientError;
use crate::client::notice::Notifier;
use crate::client::position::PositionSource;
use crate::client::reporter::LocationReporter;
use crate::models::package::{Package, PackageStatus};

pub struct CourierSession<A, P, C> {
    api: A,
    reporter: LocationReporter<P, C>,
    packages: Vec<Package>,
    notifier: Notifier,
}

impl<A, P, C> CourierSession<A, P, C>
where
    A: PackageApi,
    P: PositionSource,
    C: RealtimeChannel,
{
    pub fn new(api: A, reporter: LocationReporter<P, C>, notifier: Notifier) -> Self {
        Self {
            api,
            reporter,
            packages: Vec::new(),
            notifier,
        }
    }

    pub fn courier_id(&self) -> &str {
        &self.reporter.identity().courier_id
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Re-fetches the packages assigned to this courier.
    pub async fn refresh_packages(&mut self) -> Result<&[Package], ClientError> {
        match self
            .api
            .list_courier_packages(&self.reporter.identity().courier_id)
            .await
        {
            Ok(packages) => {
                self.packages = packages;
                Ok(&self.packages)
            }
            Err(err) => {
                self.notifier.error(format!("could not load packages: {err}"));
                Err(err)
            }
        }
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

        self.notifier.info(format!(
            "package {} marked {}",
            updated.id,
            updated.status.as_str()
        ));
        let _ = self.refresh_packages().await;
        Ok(updated)
    }

    /// Joins the delivery room and reports location until `cancel` fires,
    /// then closes the connection.
    pub async fn run(&mut self, cancel: CancellationToken) {
        if let Err(err) = self.reporter.join().await {
            self.notifier.warn(format!("realtime connection failed: {err}"));
        }

        self.reporter.run(cancel).await;
        self.reporter.shutdown().await;
        info!(courier_id = %self.courier_id(), "courier session closed");
    }
}
