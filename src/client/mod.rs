//! Role-specific client controllers.
//!
//! Each session owns its realtime connection and REST client explicitly; the
//! connection lives exactly as long as the session's `run` call.

pub mod admin;
pub mod api;
pub mod channel;
pub mod courier;
pub mod error;
pub mod map;
pub mod monitor;
pub mod notice;
pub mod position;
pub mod reporter;

#[cfg(test)]
pub(crate) mod testing;
