//! Waypoint - internal checklist gateway
//!
//! Waypoint serves a checklist application backed by MongoDB and keeps a live
//! registry of worker machines connected over WebSocket. Observers subscribe
//! to membership changes, and authenticated clients can relay payloads to a
//! connected worker by address.
//!
//! ## Services
//!
//! - **Registry**: live worker membership over `/ws/workers/register`
//! - **Updates**: observer fan-out over `/ws/workers/updates`
//! - **Relay**: `POST /relay` forwards a payload to one connected worker
//! - **Checklists**: CRUD over MongoDB-backed checklists and locations

pub mod auth;
pub mod config;
pub mod db;
pub mod registry;
pub mod routes;
pub mod server;
pub mod types;
pub mod worker;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, WaypointError};
