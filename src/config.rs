use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::models::user::{CreateUserRequest, Role};

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub seed_accounts: Vec<CreateUserRequest>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            seed_accounts: match env::var("SEED_ACCOUNTS") {
                Ok(raw) => parse_seed_accounts(&raw)?,
                Err(_) => Vec::new(),
            },
        })
    }
}

/// Parses `username:password:role` entries separated by commas. The password
/// is everything between the first and the last colon.
pub fn parse_seed_accounts(raw: &str) -> Result<Vec<CreateUserRequest>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let Some((username, (password, role))) = entry
                .split_once(':')
                .and_then(|(username, rest)| rest.rsplit_once(':').map(|pair| (username, pair)))
            else {
                return Err(AppError::Internal(format!(
                    "invalid SEED_ACCOUNTS entry {entry:?}: expected username:password:role"
                )));
            };

            let role = match role {
                "admin" => Role::Admin,
                "delivery" => Role::Delivery,
                other => {
                    return Err(AppError::Internal(format!(
                        "invalid role {other:?} in SEED_ACCOUNTS"
                    )));
                }
            };

            Ok(CreateUserRequest {
                username: username.to_string(),
                password: password.to_string(),
                role,
            })
        })
        .collect()
}

/// Settings shared by the courier and admin client binaries.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_url: String,
    pub log_level: String,
    pub connect_timeout: Duration,
    pub report_interval: Duration,
    pub report_initial_delay: Duration,
    pub position_timeout: Duration,
    pub position_maximum_age: Duration,
    pub recenter_threshold_km: f64,
    pub username: String,
    pub password: String,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000/api".to_string()),
            ws_url: env::var("WS_URL").unwrap_or_else(|_| "ws://localhost:3000/ws".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            connect_timeout: Duration::from_secs(parse_or_default("CONNECT_TIMEOUT_SECS", 20)?),
            report_interval: Duration::from_secs(parse_or_default("REPORT_INTERVAL_SECS", 10)?),
            report_initial_delay: Duration::from_millis(parse_or_default(
                "REPORT_INITIAL_DELAY_MS",
                2000,
            )?),
            position_timeout: Duration::from_secs(parse_or_default("POSITION_TIMEOUT_SECS", 10)?),
            position_maximum_age: Duration::from_secs(parse_or_default(
                "POSITION_MAX_AGE_SECS",
                60,
            )?),
            recenter_threshold_km: parse_or_default("RECENTER_THRESHOLD_KM", 100.0)?,
            username: required("FLEET_USERNAME")?,
            password: required("FLEET_PASSWORD")?,
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Internal(format!("{key} must be set")))
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
