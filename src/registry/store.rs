//! Worker and observer registry
//!
//! Holds the authoritative set of connected workers and subscribed observers.
//! Connection handles are mpsc outboxes: every WebSocket connection owns a
//! writer task that pumps its outbox into the socket, so a closed outbox means
//! the connection is gone.
//!
//! All mutation goes through one exclusive lock. The lock is never held across
//! an await point; `broadcast` copies the snapshot and the observer outboxes
//! under the lock and performs sends after releasing it, so removals triggered
//! by failed sends cannot race the iteration.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Outbox handle for one WebSocket connection
pub type PeerTx = mpsc::UnboundedSender<Message>;

/// Identity of a registered worker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

/// Identity of a subscribed observer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Sanitized projection of a worker entry, safe to serialize to observers.
///
/// The live connection handle never appears here; observers only ever see
/// name and address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub name: String,
    pub ip: String,
}

/// Relay failure reported to the caller
#[derive(Error, Debug)]
pub enum RelayError {
    /// No worker with the requested address is connected
    #[error("worker not connected")]
    NotFound,
    /// The worker's connection rejected the payload
    #[error("send failed: {0}")]
    SendFailed(String),
}

struct WorkerSlot {
    id: WorkerId,
    name: String,
    ip: String,
    outbox: PeerTx,
}

struct ObserverSlot {
    id: ObserverId,
    outbox: PeerTx,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    workers: Vec<WorkerSlot>,
    observers: Vec<ObserverSlot>,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory registry of connected workers and observers
pub struct WorkerRegistry {
    inner: Mutex<Inner>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic elsewhere; the registry data itself
        // cannot be left torn by any of our critical sections.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a worker connection.
    ///
    /// Duplicate names and duplicate addresses are permitted; each connection
    /// is tracked independently and removal goes by the returned id.
    pub fn add_worker(&self, name: &str, ip: &str, outbox: PeerTx) -> WorkerId {
        let mut inner = self.lock();
        let id = WorkerId(inner.next_id());
        inner.workers.push(WorkerSlot {
            id,
            name: name.to_string(),
            ip: ip.to_string(),
            outbox,
        });
        info!("Registered worker '{}' at {} ({:?})", name, ip, id);
        id
    }

    /// Remove a worker by connection identity. Idempotent.
    pub fn remove_worker(&self, id: WorkerId) -> bool {
        let mut inner = self.lock();
        let before = inner.workers.len();
        inner.workers.retain(|w| w.id != id);
        let removed = inner.workers.len() < before;
        if removed {
            info!("Deregistered worker {:?}", id);
        }
        removed
    }

    /// Subscribe an observer connection.
    pub fn add_observer(&self, outbox: PeerTx) -> ObserverId {
        let mut inner = self.lock();
        let id = ObserverId(inner.next_id());
        inner.observers.push(ObserverSlot { id, outbox });
        debug!("Observer subscribed ({:?})", id);
        id
    }

    /// Remove an observer by connection identity. Idempotent.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut inner = self.lock();
        let before = inner.observers.len();
        inner.observers.retain(|o| o.id != id);
        let removed = inner.observers.len() < before;
        if removed {
            debug!("Observer unsubscribed ({:?})", id);
        }
        removed
    }

    pub fn worker_count(&self) -> usize {
        self.lock().workers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// Point-in-time copy of the worker list, in insertion order.
    pub fn snapshot(&self) -> Vec<WorkerInfo> {
        self.lock()
            .workers
            .iter()
            .map(|w| WorkerInfo {
                name: w.name.clone(),
                ip: w.ip.clone(),
            })
            .collect()
    }

    /// Push the current snapshot to a single connection.
    ///
    /// Used for the initial push when an observer subscribes, so a late joiner
    /// does not have to wait for the next membership change. Returns false if
    /// the connection is already gone.
    pub fn send_snapshot(&self, outbox: &PeerTx) -> bool {
        let snapshot = self.snapshot();
        let payload = match serde_json::to_string(&snapshot) {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to serialize worker list: {}", e);
                return false;
            }
        };
        outbox.send(Message::Text(payload)).is_ok()
    }

    /// Fan the current worker list out to every subscribed observer.
    ///
    /// Best-effort and per-target isolated: one failed send never blocks
    /// delivery to the rest. An observer whose send fails is treated as
    /// disconnected and pruned, not retried.
    pub fn broadcast(&self) {
        let (payload, targets) = {
            let inner = self.lock();
            let snapshot: Vec<WorkerInfo> = inner
                .workers
                .iter()
                .map(|w| WorkerInfo {
                    name: w.name.clone(),
                    ip: w.ip.clone(),
                })
                .collect();
            let payload = match serde_json::to_string(&snapshot) {
                Ok(p) => p,
                Err(e) => {
                    error!("Failed to serialize worker list: {}", e);
                    return;
                }
            };
            let targets: Vec<(ObserverId, PeerTx)> = inner
                .observers
                .iter()
                .map(|o| (o.id, o.outbox.clone()))
                .collect();
            (payload, targets)
        };

        let mut dead = Vec::new();
        for (id, outbox) in targets {
            if outbox.send(Message::Text(payload.clone())).is_err() {
                dead.push(id);
            }
        }

        for id in dead {
            warn!("Observer {:?} unreachable during broadcast, pruning", id);
            self.remove_observer(id);
        }
    }

    /// Forward a payload to the worker registered at `address`.
    ///
    /// When duplicate addresses exist the first match in insertion order wins.
    /// A send failure is reported to the caller and does NOT remove the worker
    /// from the registry; worker liveness is owned by its registration
    /// channel's own receive loop.
    pub fn relay(&self, address: &str, payload: &serde_json::Value) -> Result<(), RelayError> {
        let outbox = {
            let inner = self.lock();
            inner
                .workers
                .iter()
                .find(|w| w.ip == address)
                .map(|w| w.outbox.clone())
        };

        let outbox = outbox.ok_or(RelayError::NotFound)?;
        outbox
            .send(Message::Text(payload.to_string()))
            .map_err(|e| RelayError::SendFailed(e.to_string()))?;

        debug!("Relayed payload to worker at {}", address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn recv_text(rx: &mut UnboundedReceiver<Message>) -> Option<String> {
        match rx.try_recv() {
            Ok(Message::Text(t)) => Some(t),
            _ => None,
        }
    }

    fn infos(json: &str) -> Vec<WorkerInfo> {
        serde_json::from_str(json).expect("observer push should be a worker list")
    }

    #[test]
    fn test_registration_visible_in_snapshot_and_broadcast() {
        let registry = WorkerRegistry::new();
        let (obs_tx, mut obs_rx) = unbounded_channel();
        registry.add_observer(obs_tx);

        let before = registry.snapshot().len();
        let (tx, _rx) = unbounded_channel();
        registry.add_worker("Server 2", "10.0.0.5", tx);
        registry.broadcast();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), before + 1);
        assert!(snapshot.contains(&WorkerInfo {
            name: "Server 2".into(),
            ip: "10.0.0.5".into()
        }));

        let push = infos(&recv_text(&mut obs_rx).unwrap());
        assert_eq!(push, snapshot);
    }

    #[test]
    fn test_deregistration_visible_in_snapshot_and_broadcast() {
        let registry = WorkerRegistry::new();
        let (tx, _rx) = unbounded_channel();
        let id = registry.add_worker("Server 2", "10.0.0.5", tx);
        let (obs_tx, mut obs_rx) = unbounded_channel();
        registry.add_observer(obs_tx);

        assert!(registry.remove_worker(id));
        registry.broadcast();

        assert!(registry.snapshot().is_empty());
        let push = infos(&recv_text(&mut obs_rx).unwrap());
        assert!(push.is_empty());

        // Removal is idempotent
        assert!(!registry.remove_worker(id));
    }

    #[test]
    fn test_late_observer_gets_full_list_first() {
        let registry = WorkerRegistry::new();
        let (tx1, _rx1) = unbounded_channel();
        let (tx2, _rx2) = unbounded_channel();
        registry.add_worker("Server 2", "10.0.0.5", tx1);
        registry.add_worker("Server 3", "10.0.0.6", tx2);

        let (obs_tx, mut obs_rx) = unbounded_channel();
        registry.add_observer(obs_tx.clone());
        assert!(registry.send_snapshot(&obs_tx));

        let first = infos(&recv_text(&mut obs_rx).unwrap());
        assert_eq!(
            first,
            vec![
                WorkerInfo {
                    name: "Server 2".into(),
                    ip: "10.0.0.5".into()
                },
                WorkerInfo {
                    name: "Server 3".into(),
                    ip: "10.0.0.6".into()
                },
            ]
        );
    }

    #[test]
    fn test_broadcast_isolates_failed_observer() {
        let registry = WorkerRegistry::new();

        let (dead_tx, dead_rx) = unbounded_channel();
        registry.add_observer(dead_tx);
        drop(dead_rx); // connection gone

        let (live_tx, mut live_rx) = unbounded_channel();
        registry.add_observer(live_tx);

        let (tx, _rx) = unbounded_channel();
        registry.add_worker("Server 2", "10.0.0.5", tx);
        registry.broadcast();

        // Healthy observer still received the push
        let push = infos(&recv_text(&mut live_rx).unwrap());
        assert_eq!(push.len(), 1);

        // Dead observer was pruned, healthy one was not
        assert_eq!(registry.observer_count(), 1);
    }

    #[test]
    fn test_relay_to_unknown_address() {
        let registry = WorkerRegistry::new();
        let (tx, _rx) = unbounded_channel();
        registry.add_worker("Server 2", "10.0.0.5", tx);

        let result = registry.relay("203.0.113.9", &serde_json::json!({"foo": "bar"}));
        assert!(matches!(result, Err(RelayError::NotFound)));
        // Lookup failure must not mutate the registry
        assert_eq!(registry.worker_count(), 1);
    }

    #[test]
    fn test_relay_delivers_exact_payload() {
        let registry = WorkerRegistry::new();
        let (tx, mut rx) = unbounded_channel();
        registry.add_worker("Server 2", "10.0.0.5", tx);

        let payload = serde_json::json!({"foo": "bar"});
        registry.relay("10.0.0.5", &payload).unwrap();

        let delivered = recv_text(&mut rx).unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&delivered).unwrap(),
            payload
        );
    }

    #[test]
    fn test_relay_failure_does_not_prune_worker() {
        let registry = WorkerRegistry::new();
        let (tx, rx) = unbounded_channel();
        registry.add_worker("Server 2", "10.0.0.5", tx);
        drop(rx); // worker connection dead but not yet drained

        let result = registry.relay("10.0.0.5", &serde_json::json!({"foo": "bar"}));
        assert!(matches!(result, Err(RelayError::SendFailed(_))));

        // Unlike broadcast, relay failure is not a liveness signal; the
        // registration channel's own drain loop owns the removal.
        assert_eq!(registry.worker_count(), 1);
    }

    #[test]
    fn test_duplicate_addresses_first_match_wins() {
        let registry = WorkerRegistry::new();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        registry.add_worker("old", "10.0.0.5", tx1);
        registry.add_worker("new", "10.0.0.5", tx2);

        registry.relay("10.0.0.5", &serde_json::json!("hi")).unwrap();
        assert!(recv_text(&mut rx1).is_some());
        assert!(recv_text(&mut rx2).is_none());
    }

    #[test]
    fn test_membership_scenario() {
        let registry = WorkerRegistry::new();

        let (w2_tx, _w2_rx) = unbounded_channel();
        let w2 = registry.add_worker("Server 2", "10.0.0.5", w2_tx);
        registry.broadcast();

        let (obs_tx, mut obs_rx) = unbounded_channel();
        registry.add_observer(obs_tx.clone());
        registry.send_snapshot(&obs_tx);
        assert_eq!(
            recv_text(&mut obs_rx).unwrap(),
            r#"[{"name":"Server 2","ip":"10.0.0.5"}]"#
        );

        let (w3_tx, _w3_rx) = unbounded_channel();
        registry.add_worker("Server 3", "10.0.0.6", w3_tx);
        registry.broadcast();
        assert_eq!(
            recv_text(&mut obs_rx).unwrap(),
            r#"[{"name":"Server 2","ip":"10.0.0.5"},{"name":"Server 3","ip":"10.0.0.6"}]"#
        );

        registry.remove_worker(w2);
        registry.broadcast();
        assert_eq!(
            recv_text(&mut obs_rx).unwrap(),
            r#"[{"name":"Server 3","ip":"10.0.0.6"}]"#
        );
    }
}
