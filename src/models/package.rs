use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::DeliveryUser;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PackageStatus {
    #[default]
    #[serde(rename = "En transito")]
    InTransit,
    #[serde(rename = "Entregado")]
    Delivered,
    #[serde(rename = "Regresado")]
    Returned,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::InTransit => "En transito",
            PackageStatus::Delivered => "Entregado",
            PackageStatus::Returned => "Regresado",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    pub id: i64,
    pub delivery_address: String,
    pub status: PackageStatus,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_user: Option<DeliveryUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewPackage {
    pub delivery_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PackageStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: PackageStatus,
}
