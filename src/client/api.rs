//! REST contract of the package store.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::error::ClientError;
use crate::models::package::{NewPackage, Package, PackageStatus, StatusUpdate};
use crate::models::user::{DeliveryUser, LoginRequest, LoginResponse, UserIdentity};

#[async_trait]
pub trait PackageApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<UserIdentity, ClientError>;

    async fn list_delivery_users(&self) -> Result<Vec<DeliveryUser>, ClientError>;

    async fn list_packages(&self) -> Result<Vec<Package>, ClientError>;

    async fn list_courier_packages(&self, courier_id: &str) -> Result<Vec<Package>, ClientError>;

    async fn create_package(&self, package: &NewPackage) -> Result<Package, ClientError>;

    async fn update_package_status(
        &self,
        package_id: i64,
        status: PackageStatus,
    ) -> Result<Package, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpPackageApi {
    client: Client,
    base_url: String,
}

impl HttpPackageApi {
    /// `base_url` includes the `/api` prefix, e.g. `http://localhost:3000/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());

    Err(ClientError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl PackageApi for HttpPackageApi {
    async fn login(&self, username: &str, password: &str) -> Result<UserIdentity, ClientError> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&request)
            .send()
            .await?;

        let login: LoginResponse = decode(response).await?;
        Ok(login.user)
    }

    async fn list_delivery_users(&self) -> Result<Vec<DeliveryUser>, ClientError> {
        let response = self.client.get(self.url("/users/delivery")).send().await?;
        decode(response).await
    }

    async fn list_packages(&self) -> Result<Vec<Package>, ClientError> {
        let response = self.client.get(self.url("/packages")).send().await?;
        decode(response).await
    }

    async fn list_courier_packages(&self, courier_id: &str) -> Result<Vec<Package>, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/packages/delivery/{courier_id}")))
            .send()
            .await?;
        decode(response).await
    }

    async fn create_package(&self, package: &NewPackage) -> Result<Package, ClientError> {
        let response = self
            .client
            .post(self.url("/packages"))
            .json(package)
            .send()
            .await?;
        decode(response).await
    }

    async fn update_package_status(
        &self,
        package_id: i64,
        status: PackageStatus,
    ) -> Result<Package, ClientError> {
        let response = self
            .client
            .put(self.url(&format!("/packages/{package_id}/status")))
            .json(&StatusUpdate { status })
            .send()
            .await?;
        decode(response).await
    }
}
