//! Worker-side client for the registration channel

pub mod keepalive;

pub use keepalive::{KeepaliveClient, KeepaliveConfig};
