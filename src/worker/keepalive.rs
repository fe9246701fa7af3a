//! Worker keepalive loop
//!
//! Maintains a registration connection to the gateway: dial, announce
//! identity, then ping on an interval forever. Any failure tears the
//! connection down and the loop redials after a fixed backoff. The loop only
//! exits on shutdown; it never gives up on its own.

use futures_util::{Sink, SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::AgentArgs;
use crate::types::WaypointError;

/// Settings for one keepalive loop
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Registration endpoint, e.g. `ws://gateway:8000/ws/workers/register`
    pub endpoint: String,
    /// Name announced in the identity message
    pub name: String,
    /// Interval between liveness pings
    pub ping_interval: Duration,
    /// Delay before redialing after a failure
    pub backoff: Duration,
}

impl From<&AgentArgs> for KeepaliveConfig {
    fn from(args: &AgentArgs) -> Self {
        Self {
            endpoint: args.waypoint_url.clone(),
            name: args.worker_name.clone(),
            ping_interval: args.ping_interval(),
            backoff: args.reconnect_backoff(),
        }
    }
}

/// Long-running registration client
pub struct KeepaliveClient {
    config: KeepaliveConfig,
}

impl KeepaliveClient {
    pub fn new(config: KeepaliveConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` flips to true.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let endpoint = self.config.endpoint.clone();
        let dial = move || {
            let endpoint = endpoint.clone();
            async move {
                let (ws, _) = tokio_tungstenite::connect_async(endpoint.as_str())
                    .await
                    .map_err(|e| WaypointError::WebSocket(e.to_string()))?;

                let (sink, mut stream) = ws.split();

                // Inbound frames carry nothing the worker acts on; drain them
                // so the connection stays healthy.
                tokio::spawn(async move {
                    while let Some(Ok(msg)) = stream.next().await {
                        debug!("Gateway frame: {:?}", msg);
                    }
                });

                Ok(sink)
            }
        };

        run_with_dialer(self.config, shutdown, dial).await;
    }
}

/// Core loop, generic over how connections are established so the retry and
/// ping behavior can be driven without a live gateway.
async fn run_with_dialer<D, Fut, S>(
    config: KeepaliveConfig,
    mut shutdown: watch::Receiver<bool>,
    mut dial: D,
) where
    D: FnMut() -> Fut,
    Fut: Future<Output = Result<S, WaypointError>>,
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        if *shutdown.borrow() {
            return;
        }

        let mut sink = tokio::select! {
            result = dial() => match result {
                Ok(sink) => sink,
                Err(e) => {
                    warn!("Connection to {} failed: {}", config.endpoint, e);
                    if wait_or_shutdown(&mut shutdown, config.backoff).await {
                        return;
                    }
                    continue;
                }
            },
            _ = shutdown.changed() => return,
        };

        let identity = serde_json::json!({ "name": config.name }).to_string();
        if let Err(e) = sink.send(Message::Text(identity)).await {
            warn!("Failed to announce identity to {}: {}", config.endpoint, e);
            if wait_or_shutdown(&mut shutdown, config.backoff).await {
                return;
            }
            continue;
        }

        info!("Registered with {} as '{}'", config.endpoint, config.name);

        loop {
            if wait_or_shutdown(&mut shutdown, config.ping_interval).await {
                let _ = sink.close().await;
                return;
            }

            if let Err(e) = sink.send(Message::Text("ping".into())).await {
                warn!("Ping to {} failed: {}", config.endpoint, e);
                break;
            }
        }

        if wait_or_shutdown(&mut shutdown, config.backoff).await {
            return;
        }
    }
}

/// Sleep for `duration`, returning true if shutdown was requested first.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        result = shutdown.changed() => match result {
            Ok(()) => *shutdown.borrow(),
            // Sender dropped counts as shutdown
            Err(_) => true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as futures_mpsc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_config() -> KeepaliveConfig {
        KeepaliveConfig {
            endpoint: "ws://test/ws/workers/register".into(),
            name: "Server 2".into(),
            ping_interval: Duration::from_secs(30),
            backoff: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_connected_then_announces_and_pings() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = futures_mpsc::unbounded::<Message>();

        let dial_attempts = Arc::clone(&attempts);
        let dial = move || {
            let n = dial_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let tx = tx.clone();
            async move {
                if n < 4 {
                    Err(WaypointError::WebSocket("connection refused".into()))
                } else {
                    Ok(tx)
                }
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_with_dialer(test_config(), shutdown_rx, dial));

        // Identity first, after three failed dials worth of backoff
        let first = rx.next().await.unwrap();
        assert_eq!(first, Message::Text(r#"{"name":"Server 2"}"#.into()));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);

        // Then pings on the interval
        assert_eq!(rx.next().await.unwrap(), Message::Text("ping".into()));
        assert_eq!(rx.next().await.unwrap(), Message::Text("ping".into()));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_redials_after_send_failure() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = futures_mpsc::unbounded::<Message>();

        let dial_attempts = Arc::clone(&attempts);
        let dial = move || {
            let n = dial_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let tx = tx.clone();
            async move {
                if n == 1 {
                    // First connection dies immediately: a closed sink makes
                    // the identity send fail.
                    let (dead_tx, _) = futures_mpsc::unbounded::<Message>();
                    Ok(dead_tx)
                } else {
                    Ok(tx)
                }
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_with_dialer(test_config(), shutdown_rx, dial));

        // Second connection succeeds and announces
        let first = rx.next().await.unwrap();
        assert_eq!(first, Message::Text(r#"{"name":"Server 2"}"#.into()));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop_mid_backoff() {
        let (tx, _rx) = futures_mpsc::unbounded::<Message>();
        let dial = move || {
            let _tx = tx.clone();
            async move {
                Err::<futures_mpsc::UnboundedSender<Message>, _>(WaypointError::WebSocket(
                    "connection refused".into(),
                ))
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_with_dialer(test_config(), shutdown_rx, dial));

        // Let the loop enter its backoff sleep, then request shutdown
        tokio::task::yield_now().await;
        shutdown_tx.send(true).unwrap();

        task.await.unwrap();
    }
}
