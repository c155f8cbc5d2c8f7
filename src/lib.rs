pub mod api;
pub mod auth;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod observability;
pub mod state;
