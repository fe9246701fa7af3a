//! HTTP routes for authentication
//!
//! - POST /auth/login  - Verify admin credentials, set the session cookie
//! - POST /auth/logout - Clear the session cookie
//! - GET  /auth/me     - Return the authenticated username

use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::jwt::TOKEN_COOKIE;
use crate::auth::{extract_token_from_cookie, extract_token_from_header, verify_admin_login, Claims};
use crate::routes::{error_response, json_response, parse_json_body, BoxBody};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
    pub username: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub username: String,
}

/// Resolve the authenticated user for a request, from the session cookie or
/// an Authorization bearer header.
pub fn authenticate_request(state: &AppState, req: &Request<Incoming>) -> Option<Claims> {
    let cookie_header = req
        .headers()
        .get(hyper::header::COOKIE)
        .and_then(|v| v.to_str().ok());

    if let Some(token) = extract_token_from_cookie(cookie_header) {
        if let Ok(claims) = state.jwt.verify_token(&token) {
            return Some(claims);
        }
    }

    let auth_header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Some(token) = extract_token_from_header(auth_header) {
        if let Ok(claims) = state.jwt.verify_token(token) {
            return Some(claims);
        }
    }

    None
}

/// Dispatch /auth/* requests. Returns None for paths outside /auth.
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    if !path.starts_with("/auth") {
        return None;
    }
    let path = path.split('?').next().unwrap_or(path).to_string();

    let response = match (req.method().clone(), path.as_str()) {
        (Method::POST, "/auth/login") => handle_login(req, state).await,
        (Method::POST, "/auth/logout") => handle_logout(),
        (Method::GET, "/auth/me") => handle_me(req, state),
        (_, "/auth/login") | (_, "/auth/logout") | (_, "/auth/me") => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        _ => error_response(StatusCode::NOT_FOUND, format!("Not found: {path}")),
    };

    Some(response)
}

/// POST /auth/login
async fn handle_login(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}"))
        }
    };

    if body.username.is_empty() || body.password.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: username, password",
        );
    }

    if !verify_admin_login(&state.args, &body.username, &body.password) {
        warn!("Login failed for '{}'", body.username);
        return error_response(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }

    let token = match state.jwt.create_token(&body.username) {
        Ok(t) => t,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Token error: {e}"),
            )
        }
    };

    info!("User '{}' logged in", body.username);

    let expires_in = state.jwt.expiry_seconds();
    let body = LoginResponse {
        status: "ok",
        username: body.username,
        expires_in,
    };
    let json = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header(
            hyper::header::SET_COOKIE,
            format!(
                "{TOKEN_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={expires_in}"
            ),
        )
        .body(crate::routes::full_body(json))
        .unwrap()
}

/// POST /auth/logout
fn handle_logout() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header(
            hyper::header::SET_COOKIE,
            format!("{TOKEN_COOKIE}=; HttpOnly; Path=/; Max-Age=0"),
        )
        .body(crate::routes::full_body(r#"{"status":"ok"}"#))
        .unwrap()
}

/// GET /auth/me
fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    match authenticate_request(&state, &req) {
        Some(claims) => json_response(
            StatusCode::OK,
            &MeResponse {
                username: claims.sub,
            },
        ),
        None => error_response(StatusCode::UNAUTHORIZED, "Not authenticated"),
    }
}
