pub mod channel;
pub mod courier;
pub mod package;
pub mod user;
