//! HTTP/WebSocket server for Waypoint

pub mod http;
pub mod websocket;

pub use http::{run, AppState};
