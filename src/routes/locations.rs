//! HTTP routes for locations
//!
//! - GET /locations        - List location names
//! - GET /locations/{name} - Objects available at one location

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::db::schemas::location::{LocationDoc, LocationObject, LOCATION_COLLECTION};
use crate::routes::{error_response, json_response, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct LocationNames {
    pub locations: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LocationDetail {
    pub name: String,
    pub object_list: Vec<LocationObject>,
}

/// GET /locations
pub async fn handle_list_locations(state: Arc<AppState>) -> Response<BoxBody> {
    let Some(mongo) = &state.mongo else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
    };

    let collection = match mongo.collection::<LocationDoc>(LOCATION_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to open locations collection: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    match collection.find_many(bson::doc! {}).await {
        Ok(docs) => {
            let locations = docs.into_iter().map(|d| d.name).collect();
            json_response(StatusCode::OK, &LocationNames { locations })
        }
        Err(e) => {
            error!("Failed to list locations: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

/// Decode a percent-encoded path segment, falling back to the raw text when
/// the encoding is invalid.
fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// GET /locations/{name}
pub async fn handle_get_location(state: Arc<AppState>, raw_name: &str) -> Response<BoxBody> {
    let name = decode_segment(raw_name);
    let name = name.as_str();

    let Some(mongo) = &state.mongo else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available");
    };

    let collection = match mongo.collection::<LocationDoc>(LOCATION_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to open locations collection: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    match collection.find_one(bson::doc! { "name": name }).await {
        Ok(Some(doc)) => json_response(
            StatusCode::OK,
            &LocationDetail {
                name: doc.name,
                object_list: doc.object_list,
            },
        ),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("Unknown location: {name}")),
        Err(e) => {
            error!("Failed to fetch location '{}': {}", name, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_segment_space() {
        assert_eq!(decode_segment("Warehouse%20A"), "Warehouse A");
    }

    #[test]
    fn test_decode_segment_non_ascii() {
        assert_eq!(
            decode_segment("%D0%A1%D0%BA%D0%BB%D0%B0%D0%B4"),
            "Склад"
        );
    }

    #[test]
    fn test_decode_segment_plain_passthrough() {
        assert_eq!(decode_segment("Dock-3"), "Dock-3");
    }

    #[test]
    fn test_decode_segment_invalid_utf8_falls_back() {
        assert_eq!(decode_segment("%FF%FE"), "%FF%FE");
    }
}
