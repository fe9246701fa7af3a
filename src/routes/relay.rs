//! HTTP route for relaying a payload to a connected worker
//!
//! POST /relay { "target_ip": ..., "payload": ... }

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::registry::RelayError;
use crate::routes::{error_response, json_response, parse_json_body, BoxBody};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    pub target_ip: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct RelayResponse {
    pub status: &'static str,
}

/// POST /relay
pub async fn handle_relay(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let body: RelayRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}"))
        }
    };

    if body.target_ip.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Missing required field: target_ip");
    }

    let result = state.registry.relay(&body.target_ip, &body.payload);
    relay_response(&body.target_ip, result)
}

/// Map a relay outcome onto the response contract:
/// 200 ok, 404 unknown address, 500 when the worker's connection rejected
/// the payload.
fn relay_response(target_ip: &str, result: Result<(), RelayError>) -> Response<BoxBody> {
    match result {
        Ok(()) => {
            info!("Relayed payload to worker at {}", target_ip);
            json_response(StatusCode::OK, &RelayResponse { status: "ok" })
        }
        Err(RelayError::NotFound) => {
            warn!("Relay target {} not connected", target_ip);
            error_response(StatusCode::NOT_FOUND, "worker not connected")
        }
        Err(err @ RelayError::SendFailed(_)) => {
            warn!("Relay to {} failed: {}", target_ip, err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(response: Response<BoxBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_relay_ok_maps_to_200() {
        let response = relay_response("10.0.0.5", Ok(()));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_unknown_worker_maps_to_404() {
        let response = relay_response("10.0.0.9", Err(RelayError::NotFound));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, r#"{"error":"worker not connected"}"#);
    }

    #[tokio::test]
    async fn test_send_failure_maps_to_500_with_cause() {
        let response = relay_response(
            "10.0.0.5",
            Err(RelayError::SendFailed("channel closed".into())),
        );
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_string(response).await,
            r#"{"error":"send failed: channel closed"}"#
        );
    }
}
