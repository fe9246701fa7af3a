//! HTTP routes for checklists
//!
//! - GET    /checklists      - List saved checklists
//! - POST   /checklists      - Save a new checklist
//! - GET    /checklists/{id} - Fetch one checklist
//! - PUT    /checklists/{id} - Replace a checklist's items
//! - DELETE /checklists/{id} - Soft-delete a checklist

use bson::{doc, oid::ObjectId};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::db::mongo::MongoCollection;
use crate::db::schemas::checklist::{ChecklistDoc, ChecklistItem, CHECKLIST_COLLECTION};
use crate::routes::{error_response, json_response, parse_json_body, BoxBody};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ChecklistPayload {
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Serialize)]
pub struct ChecklistSummary {
    pub id: String,
    pub created_at: String,
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Serialize)]
pub struct ChecklistCreated {
    pub status: &'static str,
    pub id: String,
}

/// Dispatch /checklists requests. Returns None for paths outside /checklists.
pub async fn handle_checklists_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    if path != "/checklists" && !path.starts_with("/checklists/") {
        return None;
    }

    let collection = match open_collection(&state).await {
        Ok(c) => c,
        Err(resp) => return Some(resp),
    };

    let method = req.method().clone();
    let response = if path == "/checklists" {
        match method {
            Method::GET => handle_list(&collection).await,
            Method::POST => handle_create(req, &collection).await,
            _ => error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
        }
    } else {
        let id = path.trim_start_matches("/checklists/").to_string();
        let oid = match ObjectId::parse_str(&id) {
            Ok(oid) => oid,
            Err(_) => {
                return Some(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid checklist id: {id}"),
                ))
            }
        };

        match method {
            Method::GET => handle_get(&collection, oid).await,
            Method::PUT => handle_update(req, &collection, oid).await,
            Method::DELETE => handle_delete(&collection, oid).await,
            _ => error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
        }
    };

    Some(response)
}

async fn open_collection(
    state: &AppState,
) -> Result<MongoCollection<ChecklistDoc>, Response<BoxBody>> {
    let Some(mongo) = &state.mongo else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Database not available",
        ));
    };

    mongo
        .collection::<ChecklistDoc>(CHECKLIST_COLLECTION)
        .await
        .map_err(|e| {
            error!("Failed to open checklists collection: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        })
}

fn summarize(doc: ChecklistDoc) -> ChecklistSummary {
    let id = doc._id.map(|oid| oid.to_hex()).unwrap_or_default();

    let created_at = doc
        .metadata
        .created_at
        .map(|dt| dt.to_chrono().format("%d-%m-%y %H:%M").to_string())
        .unwrap_or_default();

    ChecklistSummary {
        id,
        created_at,
        items: doc.items,
    }
}

/// GET /checklists
async fn handle_list(collection: &MongoCollection<ChecklistDoc>) -> Response<BoxBody> {
    match collection.find_many(doc! {}).await {
        Ok(docs) => {
            let summaries: Vec<ChecklistSummary> = docs.into_iter().map(summarize).collect();
            json_response(StatusCode::OK, &summaries)
        }
        Err(e) => {
            error!("Failed to list checklists: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

/// POST /checklists
async fn handle_create(
    req: Request<Incoming>,
    collection: &MongoCollection<ChecklistDoc>,
) -> Response<BoxBody> {
    let payload: ChecklistPayload = match parse_json_body(req).await {
        Ok(p) => p,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}"))
        }
    };

    if payload.items.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Checklist must not be empty");
    }

    let doc = ChecklistDoc {
        _id: None,
        metadata: Default::default(),
        items: payload.items,
    };

    match collection.insert_one(doc).await {
        Ok(oid) => {
            info!("Saved checklist {}", oid.to_hex());
            json_response(
                StatusCode::CREATED,
                &ChecklistCreated {
                    status: "ok",
                    id: oid.to_hex(),
                },
            )
        }
        Err(e) => {
            error!("Failed to save checklist: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

/// GET /checklists/{id}
async fn handle_get(
    collection: &MongoCollection<ChecklistDoc>,
    oid: ObjectId,
) -> Response<BoxBody> {
    match collection.find_one(doc! { "_id": oid }).await {
        Ok(Some(doc)) => json_response(StatusCode::OK, &summarize(doc)),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Checklist not found"),
        Err(e) => {
            error!("Failed to fetch checklist {}: {}", oid.to_hex(), e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

/// PUT /checklists/{id}
async fn handle_update(
    req: Request<Incoming>,
    collection: &MongoCollection<ChecklistDoc>,
    oid: ObjectId,
) -> Response<BoxBody> {
    let payload: ChecklistPayload = match parse_json_body(req).await {
        Ok(p) => p,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}"))
        }
    };

    if payload.items.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Checklist must not be empty");
    }

    let items = match bson::to_bson(&payload.items) {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to serialize checklist items: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Serialization error");
        }
    };

    let update = doc! {
        "$set": {
            "items": items,
            "metadata.updated_at": bson::DateTime::now(),
        }
    };

    let filter = doc! { "_id": oid, "metadata.is_deleted": { "$ne": true } };
    match collection.update_one(filter, update).await {
        Ok(result) if result.matched_count == 0 => {
            error_response(StatusCode::NOT_FOUND, "Checklist not found")
        }
        Ok(_) => json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" })),
        Err(e) => {
            error!("Failed to update checklist {}: {}", oid.to_hex(), e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

/// DELETE /checklists/{id}
async fn handle_delete(
    collection: &MongoCollection<ChecklistDoc>,
    oid: ObjectId,
) -> Response<BoxBody> {
    let filter = doc! { "_id": oid, "metadata.is_deleted": { "$ne": true } };
    match collection.soft_delete(filter).await {
        Ok(result) if result.matched_count == 0 => {
            error_response(StatusCode::NOT_FOUND, "Checklist not found")
        }
        Ok(_) => {
            info!("Deleted checklist {}", oid.to_hex());
            json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" }))
        }
        Err(e) => {
            error!("Failed to delete checklist {}: {}", oid.to_hex(), e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}
