use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use crate::channel::hub::RoomHub;
use crate::models::package::Package;
use crate::models::user::{DeliveryUser, Role, UserIdentity, UserStatus};
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
}

impl Account {
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.id.clone(),
            username: self.username.clone(),
            role: self.role,
        }
    }

    pub fn as_delivery_user(&self) -> DeliveryUser {
        DeliveryUser {
            id: self.id.clone(),
            username: self.username.clone(),
            status: self.status,
        }
    }
}

pub struct AppState {
    pub accounts: DashMap<String, Account>,
    /// username -> account id. The entry is claimed before the account is
    /// stored, so a username maps to at most one account.
    pub usernames: DashMap<String, String>,
    pub packages: DashMap<i64, Package>,
    pub hub: RoomHub,
    pub metrics: Metrics,
    next_package_id: AtomicI64,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        let metrics = Metrics::new();

        Self {
            accounts: DashMap::new(),
            usernames: DashMap::new(),
            packages: DashMap::new(),
            hub: RoomHub::new(event_buffer_size, metrics.clone()),
            metrics,
            next_package_id: AtomicI64::new(1),
        }
    }

    pub fn next_package_id(&self) -> i64 {
        self.next_package_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn find_account_by_username(&self, username: &str) -> Option<Account> {
        let id = self.usernames.get(username)?.value().clone();
        self.accounts.get(&id).map(|entry| entry.value().clone())
    }
}
