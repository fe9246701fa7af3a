//! HTTP routes for Waypoint

pub mod auth_routes;
pub mod checklists;
pub mod health;
pub mod locations;
pub mod relay;

pub use auth_routes::{authenticate_request, handle_auth_request};
pub use checklists::handle_checklists_request;
pub use health::{health_check, version_info};
pub use locations::{handle_get_location, handle_list_locations};
pub use relay::handle_relay;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::types::WaypointError;

/// Boxed response body shared by all route handlers
pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest request body any JSON endpoint accepts
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Error payload returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(full_body(json))
        .unwrap()
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response<BoxBody> {
    json_response(status, &ErrorResponse::new(message))
}

pub(crate) fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Read and deserialize a JSON request body.
///
/// The body is wrapped with `Limited` so an oversized request is rejected as
/// soon as the limit is crossed, not after buffering the whole thing.
pub(crate) async fn parse_json_body<T, B>(req: Request<B>) -> Result<T, WaypointError>
where
    T: for<'de> Deserialize<'de>,
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| WaypointError::Http(format!("Failed to read body: {}", e)))?
        .to_bytes();

    serde_json::from_slice(&bytes)
        .map_err(|e| WaypointError::Http(format!("Invalid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    fn request_with_body(body: impl Into<Bytes>) -> Request<Full<Bytes>> {
        Request::builder().body(Full::new(body.into())).unwrap()
    }

    #[tokio::test]
    async fn test_parse_json_body_round_trip() {
        let req = request_with_body(r#"{"name":"Server 2"}"#);
        let parsed: Named = parse_json_body(req).await.unwrap();
        assert_eq!(parsed.name, "Server 2");
    }

    #[tokio::test]
    async fn test_parse_json_body_rejects_invalid_json() {
        let req = request_with_body("not json");
        let result: Result<Named, _> = parse_json_body(req).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_parse_json_body_rejects_oversized_body() {
        let huge = format!(r#"{{"name":"{}"}}"#, "x".repeat(MAX_BODY_BYTES));
        let req = request_with_body(huge);
        let result: Result<Named, _> = parse_json_body(req).await;
        assert!(result.is_err());
    }
}
