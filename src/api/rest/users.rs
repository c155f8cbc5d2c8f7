use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use dashmap::mapref::entry::Entry;
use tracing::info;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;
use crate::models::user::{
    CreateUserRequest, DeliveryUser, LoginRequest, LoginResponse, Role, UserIdentity, UserStatus,
};
use crate::state::{Account, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/delivery", get(list_delivery_users))
        .route("/auth/login", post(login))
}

/// Adds an account to the roster. Usernames are unique.
pub fn register_account(
    state: &AppState,
    request: CreateUserRequest,
) -> Result<Account, AppError> {
    let username = request.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::BadRequest("username cannot be empty".to_string()));
    }

    if request.password.is_empty() {
        return Err(AppError::BadRequest("password cannot be empty".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    match state.usernames.entry(username.clone()) {
        Entry::Occupied(_) => {
            return Err(AppError::Conflict(format!("username {username} already exists")));
        }
        Entry::Vacant(slot) => {
            slot.insert(id.clone());
        }
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            state.usernames.remove(&username);
            return Err(err);
        }
    };

    let account = Account {
        id,
        username,
        password_hash,
        role: request.role,
        status: UserStatus::Working,
    };

    state.accounts.insert(account.id.clone(), account.clone());
    info!(user_id = %account.id, role = account.role.as_str(), "account registered");

    Ok(account)
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<UserIdentity>, AppError> {
    let account = register_account(&state, payload)?;
    Ok(Json(account.identity()))
}

async fn list_delivery_users(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryUser>> {
    let mut users: Vec<DeliveryUser> = state
        .accounts
        .iter()
        .filter(|entry| entry.value().role == Role::Delivery)
        .map(|entry| entry.value().as_delivery_user())
        .collect();
    users.sort_by(|a, b| a.username.cmp(&b.username));

    Json(users)
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let account = state
        .find_account_by_username(payload.username.trim())
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&payload.password, &account.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    info!(user_id = %account.id, role = account.role.as_str(), "login succeeded");
    Ok(Json(LoginResponse {
        user: account.identity(),
    }))
}
