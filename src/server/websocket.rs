//! WebSocket upgrade and connection handling
//!
//! Three endpoints upgrade here:
//! - `/ws/workers/register` — long-lived worker registration channel
//! - `/ws/workers/updates`  — observer subscription to worker-list updates
//! - `/ws`                  — plain echo endpoint
//!
//! Every connection gets an mpsc outbox plus a writer task that pumps queued
//! frames into the socket sink. The registry only ever holds the outbox, so
//! sends from broadcast/relay never block on socket I/O and a closed outbox
//! doubles as a disconnect signal.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::registry::{PeerTx, WorkerRegistry};
use crate::server::http::AppState;

/// WebSocket type after upgrade
type HyperWebSocket =
    hyper_tungstenite::WebSocketStream<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>;

/// Name a worker registers under when its identity message is missing or
/// malformed. Protocol errors never reject the connection.
const UNNAMED: &str = "Unnamed";

/// Handle WebSocket upgrade for the worker registration channel
pub async fn handle_register_upgrade(
    state: Arc<AppState>,
    req: Request<Incoming>,
    addr: SocketAddr,
) -> Response<Full<Bytes>> {
    match hyper_tungstenite::upgrade(req, None) {
        Ok((response, websocket)) => {
            let registry = Arc::clone(&state.registry);
            tokio::spawn(async move {
                match websocket.await {
                    Ok(ws) => run_registration(ws, registry, addr.ip().to_string()).await,
                    Err(e) => error!("Registration WebSocket upgrade failed: {:?}", e),
                }
            });

            let (parts, _) = response.into_parts();
            Response::from_parts(parts, Full::new(Bytes::new()))
        }
        Err(e) => upgrade_error(e),
    }
}

/// Handle WebSocket upgrade for the observer update channel
pub async fn handle_updates_upgrade(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    match hyper_tungstenite::upgrade(req, None) {
        Ok((response, websocket)) => {
            let registry = Arc::clone(&state.registry);
            tokio::spawn(async move {
                match websocket.await {
                    Ok(ws) => run_updates(ws, registry).await,
                    Err(e) => error!("Updates WebSocket upgrade failed: {:?}", e),
                }
            });

            let (parts, _) = response.into_parts();
            Response::from_parts(parts, Full::new(Bytes::new()))
        }
        Err(e) => upgrade_error(e),
    }
}

/// Handle WebSocket upgrade for the echo endpoint
pub async fn handle_echo_upgrade(req: Request<Incoming>) -> Response<Full<Bytes>> {
    match hyper_tungstenite::upgrade(req, None) {
        Ok((response, websocket)) => {
            tokio::spawn(async move {
                match websocket.await {
                    Ok(ws) => run_echo(ws).await,
                    Err(e) => error!("Echo WebSocket upgrade failed: {:?}", e),
                }
            });

            let (parts, _) = response.into_parts();
            Response::from_parts(parts, Full::new(Bytes::new()))
        }
        Err(e) => upgrade_error(e),
    }
}

fn upgrade_error(e: hyper_tungstenite::tungstenite::error::ProtocolError) -> Response<Full<Bytes>> {
    error!("WebSocket upgrade error: {:?}", e);
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(Full::new(Bytes::from(format!(
            "WebSocket upgrade failed: {e}"
        ))))
        .unwrap()
}

/// Split a socket into an outbox plus a writer task pumping into the sink.
///
/// The writer exits when every sender clone is dropped or the sink errors;
/// either way the outbox starts failing, which the registry treats as proof
/// of disconnection.
fn spawn_writer(ws_sink: futures_util::stream::SplitSink<HyperWebSocket, Message>) -> PeerTx {
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    tokio::spawn(async move {
        let mut sink = ws_sink;
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });
    tx
}

/// Per-connection state machine for the registration channel.
///
/// Await-Identity -> Registered -> Drain -> Closed. Removal and the final
/// broadcast run on every exit path once an entry exists; a connection that
/// dies before sending its identity leaves no trace.
async fn run_registration(ws: HyperWebSocket, registry: Arc<WorkerRegistry>, ip: String) {
    let (sink, mut stream) = ws.split();
    let outbox = spawn_writer(sink);

    // Await-Identity: block until the first text frame
    let name = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => break parse_identity(&text),
            Some(Ok(Message::Ping(data))) => {
                let _ = outbox.send(Message::Pong(data));
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!("Worker from {} disconnected before identifying", ip);
                return;
            }
            Some(Ok(_)) => {
                // Binary or stray frames before the identity count as a
                // malformed identity, same as unparseable JSON.
                break UNNAMED.to_string();
            }
            Some(Err(e)) => {
                warn!("Worker from {} errored before identifying: {}", ip, e);
                return;
            }
        }
    };

    let id = registry.add_worker(&name, &ip, outbox.clone());
    registry.broadcast();

    // Drain: inbound content is ignored, this loop only pulls the liveness line
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(data)) => {
                let _ = outbox.send(Message::Pong(data));
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Worker '{}' at {} connection error: {}", name, ip, e);
                break;
            }
        }
    }

    // Closed: unconditional cleanup plus one final broadcast
    registry.remove_worker(id);
    registry.broadcast();
    info!("Worker '{}' at {} disconnected", name, ip);
}

/// Per-connection handler for the observer update channel.
async fn run_updates(ws: HyperWebSocket, registry: Arc<WorkerRegistry>) {
    let (sink, mut stream) = ws.split();
    let outbox = spawn_writer(sink);

    let id = registry.add_observer(outbox.clone());

    // Direct initial push so a late joiner sees the current list immediately
    if !registry.send_snapshot(&outbox) {
        registry.remove_observer(id);
        return;
    }

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(data)) => {
                let _ = outbox.send(Message::Pong(data));
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Observer connection error: {}", e);
                break;
            }
        }
    }

    registry.remove_observer(id);
}

/// Echo endpoint: repeats every text frame back with a prefix.
async fn run_echo(ws: HyperWebSocket) {
    let (sink, mut stream) = ws.split();
    let outbox = spawn_writer(sink);

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if outbox
                    .send(Message::Text(format!("Message received: {text}")))
                    .is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(data)) => {
                let _ = outbox.send(Message::Pong(data));
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
}

/// Parse the identity message `{"name": ...}`, defaulting when malformed.
fn parse_identity(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("name").and_then(|n| n.as_str()).map(str::to_string))
        .unwrap_or_else(|| UNNAMED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identity_well_formed() {
        assert_eq!(parse_identity(r#"{"name": "Server 2"}"#), "Server 2");
    }

    #[test]
    fn test_parse_identity_missing_name_defaults() {
        assert_eq!(parse_identity(r#"{"host": "x"}"#), UNNAMED);
    }

    #[test]
    fn test_parse_identity_malformed_defaults() {
        assert_eq!(parse_identity("not json"), UNNAMED);
        assert_eq!(parse_identity(r#"{"name": 42}"#), UNNAMED);
    }
}
