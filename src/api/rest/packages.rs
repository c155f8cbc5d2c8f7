use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use tracing::info;

use crate::error::AppError;
use crate::models::package::{NewPackage, Package, StatusUpdate};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/packages", get(list_packages).post(create_package))
        .route("/packages/delivery/:user_id", get(list_courier_packages))
        .route("/packages/:id/status", put(update_package_status))
}

/// Embeds the roster entry of the assigned courier, when it is known.
fn with_assigned_user(state: &AppState, mut package: Package) -> Package {
    package.assigned_user = package
        .assigned_to
        .as_ref()
        .and_then(|id| state.accounts.get(id))
        .map(|account| account.value().as_delivery_user());
    package
}

fn snapshot<F>(state: &AppState, keep: F) -> Vec<Package>
where
    F: Fn(&Package) -> bool,
{
    let mut packages: Vec<Package> = state
        .packages
        .iter()
        .filter(|entry| keep(entry.value()))
        .map(|entry| with_assigned_user(state, entry.value().clone()))
        .collect();
    packages.sort_by_key(|package| package.id);
    packages
}

async fn list_packages(State(state): State<Arc<AppState>>) -> Json<Vec<Package>> {
    Json(snapshot(&state, |_| true))
}

async fn list_courier_packages(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<Vec<Package>> {
    Json(snapshot(&state, |package| {
        package.assigned_to.as_deref() == Some(user_id.as_str())
    }))
}

async fn create_package(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewPackage>,
) -> Result<Json<Package>, AppError> {
    let delivery_address = payload.delivery_address.trim().to_string();
    if delivery_address.is_empty() {
        return Err(AppError::BadRequest(
            "delivery_address cannot be empty".to_string(),
        ));
    }

    let package = Package {
        id: state.next_package_id(),
        delivery_address,
        status: payload.status.unwrap_or_default(),
        priority: payload.priority.unwrap_or_default(),
        assigned_to: payload.assigned_to.filter(|id| !id.trim().is_empty()),
        phone: payload.phone.filter(|phone| !phone.trim().is_empty()),
        created_at: Some(Utc::now()),
        assigned_user: None,
    };

    state.packages.insert(package.id, package.clone());
    state.metrics.packages_created_total.inc();

    info!(
        package_id = package.id,
        assigned_to = ?package.assigned_to,
        "package created"
    );

    Ok(Json(with_assigned_user(&state, package)))
}

async fn update_package_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<StatusUpdate>,
) -> Result<Json<Package>, AppError> {
    let updated = {
        let mut package = state
            .packages
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("package {} not found", id)))?;

        package.status = payload.status;
        package.clone()
    };

    state
        .metrics
        .status_updates_total
        .with_label_values(&[payload.status.as_str()])
        .inc();

    info!(package_id = id, status = payload.status.as_str(), "package status updated");

    Ok(Json(with_assigned_user(&state, updated)))
}
