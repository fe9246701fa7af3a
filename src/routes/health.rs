//! Health and version endpoints

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub node_id: String,
    pub uptime_seconds: u64,
    pub workers: usize,
    pub observers: usize,
    pub database: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub git_commit: &'static str,
    pub build_timestamp: &'static str,
}

/// GET /health and /healthz
pub fn health_check(state: &Arc<AppState>) -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "ok",
            node_id: state.args.node_id.to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            workers: state.registry.worker_count(),
            observers: state.registry.observer_count(),
            database: if state.mongo.is_some() {
                "connected"
            } else {
                "disabled"
            },
        },
    )
}

/// GET /version
pub fn version_info() -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &VersionResponse {
            version: env!("CARGO_PKG_VERSION"),
            git_commit: env!("GIT_COMMIT_SHORT"),
            build_timestamp: env!("BUILD_TIMESTAMP"),
        },
    )
}
