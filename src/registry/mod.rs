//! Live worker registry
//!
//! In-memory source of truth for currently connected worker processes and the
//! observers subscribed to membership updates. Lives only as long as the
//! gateway process; nothing here touches persistent storage.

pub mod store;

pub use store::{ObserverId, PeerTx, RelayError, WorkerId, WorkerInfo, WorkerRegistry};
