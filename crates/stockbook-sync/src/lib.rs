//! # stockbook-sync: Offline Sync Reconciler
//!
//! Pushes locally pending products and transactions to a remote authority
//! whenever the device is online. Local writes never wait for the network.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sync Architecture                               │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                NetworkReconciler (reconciler.rs)                 │  │
//! │  │                                                                  │  │
//! │  │  Spawned as a Tokio task next to the UI                         │  │
//! │  │  Triggers: connectivity, local mutations, interval, manual      │  │
//! │  │  One push in flight at a time                                   │  │
//! │  └───────────────┬──────────────────────────────┬───────────────────┘  │
//! │                  │                              │                       │
//! │                  ▼                              ▼                       │
//! │  ┌────────────────────────────┐  ┌────────────────────────────────┐    │
//! │  │  stockbook-db SyncTracker  │  │  RemoteAuthority (remote.rs)   │    │
//! │  │                            │  │                                │    │
//! │  │  pending_items()           │  │  SimulatedRemote (default)     │    │
//! │  │  mark_snapshot_synced()    │  │  WebSocketRemote (remote_url)  │    │
//! │  └────────────────────────────┘  └────────────────────────────────┘    │
//! │                                                                         │
//! │  STATUS EVENTS (SyncEventEmitter):                                     │
//! │  • status   - online / in-flight / pending count / last error          │
//! │  • progress - pending vs synced after each push                        │
//! │  • error    - failed attempts (always retried on the next trigger)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Sync configuration (mode, device ID, remote URL, timeouts)
//! - [`error`] - Sync error types
//! - [`protocol`] - Wire messages for the WebSocket remote
//! - [`reconciler`] - `NetworkReconciler` and its background loop
//! - [`remote`] - `RemoteAuthority` trait and implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockbook_sync::{NetworkReconciler, SyncConfig};
//!
//! let config = SyncConfig::load_or_default(None);
//! let handle = NetworkReconciler::new(config, database.clone())?.spawn();
//!
//! // Wire the platform's connectivity monitor
//! handle.set_online(false).await;
//! handle.set_online(true).await; // drains pending changes
//!
//! let status = handle.status().await;
//! println!("Pending: {}", status.pending_count);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod protocol;
pub mod reconciler;
pub mod remote;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DeviceConfig, SyncConfig, SyncMode, SyncSettings};
pub use error::{SyncError, SyncResult};
pub use protocol::{PushAck, SyncBatch, SyncMessage, PROTOCOL_VERSION};
pub use reconciler::{
    NetworkReconciler, NoOpEmitter, ReconcilerBuilder, ReconcilerHandle, ReconcilerStatus,
    SyncEventEmitter, SyncOutcome, SyncedCounts,
};
pub use remote::{remote_from_config, RemoteAuthority, SimulatedRemote, WebSocketRemote};
