//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. WebSocket endpoints
//! upgrade through hyper-tungstenite; everything else is matched on
//! (method, path).

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::MongoClient;
use crate::registry::WorkerRegistry;
use crate::routes::{self, BoxBody};
use crate::server::websocket;
use crate::types::WaypointError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub jwt: JwtValidator,
    pub mongo: Option<MongoClient>,
    pub registry: Arc<WorkerRegistry>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, mongo: Option<MongoClient>) -> Self {
        let jwt = JwtValidator::new(&args.jwt_secret(), args.jwt_expiry_seconds);
        Self {
            args,
            jwt,
            mongo,
            registry: Arc::new(WorkerRegistry::new()),
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), WaypointError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Waypoint listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - relaxed configuration requirements");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .with_upgrades()
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    // Auth routes consume the request and are never gated
    if path.starts_with("/auth") {
        if let Some(response) = routes::handle_auth_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    // WebSocket upgrades. Worker and observer channels are deliberately open;
    // machines on the internal network register without a session.
    match (&method, path.as_str()) {
        (&Method::GET, "/ws/workers/register") => {
            if hyper_tungstenite::is_upgrade_request(&req) {
                return Ok(to_boxed(
                    websocket::handle_register_upgrade(state, req, addr).await,
                ));
            }
            return Ok(to_boxed(bad_request_response(
                "Endpoint requires WebSocket upgrade",
            )));
        }
        (&Method::GET, "/ws/workers/updates") => {
            if hyper_tungstenite::is_upgrade_request(&req) {
                return Ok(to_boxed(
                    websocket::handle_updates_upgrade(state, req).await,
                ));
            }
            return Ok(to_boxed(bad_request_response(
                "Endpoint requires WebSocket upgrade",
            )));
        }
        (&Method::GET, "/ws") => {
            if hyper_tungstenite::is_upgrade_request(&req) {
                return Ok(to_boxed(websocket::handle_echo_upgrade(req).await));
            }
            return Ok(to_boxed(bad_request_response(
                "Endpoint requires WebSocket upgrade",
            )));
        }
        _ => {}
    }

    let response = match (method.clone(), path.as_str()) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(&state),

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        // Everything below requires an authenticated session
        _ => {
            if routes::authenticate_request(&state, &req).is_none() {
                return Ok(to_boxed(unauthorized_response()));
            }

            match (method, path.as_str()) {
                (Method::POST, "/relay") => {
                    routes::handle_relay(req, Arc::clone(&state)).await
                }
                (Method::GET, "/locations") => {
                    routes::handle_list_locations(Arc::clone(&state)).await
                }
                (Method::GET, p) if p.starts_with("/locations/") => {
                    let name = p.trim_start_matches("/locations/").to_string();
                    routes::handle_get_location(Arc::clone(&state), &name).await
                }
                (_, p) if p == "/checklists" || p.starts_with("/checklists/") => {
                    match routes::handle_checklists_request(req, Arc::clone(&state)).await {
                        Some(response) => response,
                        None => to_boxed(not_found_response(&path)),
                    }
                }
                _ => to_boxed(not_found_response(&path)),
            }
        }
    };

    Ok(response)
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Bad request response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Bad Request",
        "message": message,
    });

    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Unauthorized response
fn unauthorized_response() -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not authenticated",
    });

    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
