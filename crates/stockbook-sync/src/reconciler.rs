//! # Network Reconciler
//!
//! Pushes every `PendingSync` entity to the remote authority whenever the
//! device is online, and marks them `Synced` once the remote accepts.
//!
//! ## Reconciler Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       NetworkReconciler                                 │
//! │                                                                         │
//! │  TRIGGERS (run loop)                    ONE ATTEMPT (sync_now)          │
//! │  ───────────────────                    ──────────────────────          │
//! │  set_online(false → true) ──┐           1. mode enabled? online?        │
//! │  ChangeFeed local mutation ─┼──► spawn  2. in-flight flag (CAS)         │
//! │  poll interval tick ────────┤    sync   3. pending_items() snapshot     │
//! │  handle.trigger() ──────────┘           4. remote.push(batch) + timeout │
//! │                                         5. mark_snapshot_synced         │
//! │                                         6. clear flag, refresh status   │
//! │                                         7. rerun if a trigger was       │
//! │                                            refused during 2-6           │
//! │                                                                         │
//! │  FAILURE: step 4 or earlier fails ─► log, record last_error,            │
//! │           statuses untouched, retried on the next trigger               │
//! │                                                                         │
//! │  STATUS EVENTS (SyncEventEmitter):                                      │
//! │  emit_status   - snapshot after every change                            │
//! │  emit_progress - { pending, synced } after a successful push            │
//! │  emit_error    - { message, retryable } after a failed attempt          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! Any number of callers may invoke [`NetworkReconciler::sync_now`] at once.
//! Exactly one attempt is in flight at a time; the rest return
//! [`SyncOutcome::AlreadyRunning`] without touching the database or the
//! remote. A refused caller leaves a rerun request behind, so the attempt
//! in flight runs once more before releasing the flag and picks up
//! whatever was committed while it was on the wire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use stockbook_db::Database;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{SyncConfig, SyncMode};
use crate::error::{SyncError, SyncResult};
use crate::protocol::SyncBatch;
use crate::remote::{remote_from_config, RemoteAuthority};

// =============================================================================
// Reconciler Status
// =============================================================================

/// Snapshot of the reconciler for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilerStatus {
    pub mode: SyncMode,

    /// Last connectivity state reported through `set_online`.
    pub online: bool,

    /// A push is currently awaiting the remote.
    pub in_flight: bool,

    /// Pending entities across all syncable collections, as of the last
    /// attempt.
    pub pending_count: i64,

    /// Last successful attempt (RFC 3339).
    pub last_sync: Option<String>,

    /// Message of the last failed attempt. Cleared on success.
    pub last_error: Option<String>,
}

impl Default for ReconcilerStatus {
    fn default() -> Self {
        ReconcilerStatus {
            mode: SyncMode::Online,
            online: true,
            in_flight: false,
            pending_count: 0,
            last_sync: None,
            last_error: None,
        }
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives reconciler notifications (implemented by the UI shell).
pub trait SyncEventEmitter: Send + Sync {
    fn emit_status(&self, status: &ReconcilerStatus);

    fn emit_progress(&self, pending: i64, synced: i64);

    fn emit_error(&self, message: &str, retryable: bool);
}

/// Emitter that drops every event.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &ReconcilerStatus) {}
    fn emit_progress(&self, _pending: i64, _synced: i64) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Sync Outcome
// =============================================================================

/// Rows flipped to `Synced` by one successful attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncedCounts {
    pub products: u64,
    pub transactions: u64,
    pub multi_transactions: u64,
    /// Pushed rows left pending because they changed during the round trip.
    pub stale: u64,
}

impl SyncedCounts {
    pub fn total(&self) -> u64 {
        self.products + self.transactions + self.multi_transactions
    }
}

/// Result of one [`NetworkReconciler::sync_now`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Sync mode is `offline`.
    Disabled,
    /// No connectivity.
    Offline,
    /// Another attempt holds the in-flight flag.
    AlreadyRunning,
    NothingPending,
    Synced(SyncedCounts),
    /// Nothing was marked; every pending entity is still pending.
    Failed { reason: String, retryable: bool },
}

impl SyncOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }
}

/// Clears the in-flight flag when the attempt ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Network Reconciler
// =============================================================================

/// Drains pending entities to the remote authority.
///
/// Cheap to clone; clones share the in-flight flag, connectivity state and
/// status snapshot.
#[derive(Clone)]
pub struct NetworkReconciler {
    inner: Arc<Inner>,
}

struct Inner {
    db: Database,
    config: SyncConfig,
    remote: Arc<dyn RemoteAuthority>,
    emitter: Arc<dyn SyncEventEmitter>,
    push_timeout: Duration,
    in_flight: AtomicBool,
    /// Set by callers refused while an attempt was in flight.
    rerun_requested: AtomicBool,
    online: watch::Sender<bool>,
    status: RwLock<ReconcilerStatus>,
}

impl NetworkReconciler {
    /// Reconciler with the remote selected by `config` and no emitter.
    pub fn new(config: SyncConfig, db: Database) -> SyncResult<Self> {
        ReconcilerBuilder::new(config).with_database(db).build()
    }

    pub fn builder(config: SyncConfig) -> ReconcilerBuilder {
        ReconcilerBuilder::new(config)
    }

    pub fn is_online(&self) -> bool {
        *self.inner.online.borrow()
    }

    pub fn remote_name(&self) -> &'static str {
        self.inner.remote.name()
    }

    pub async fn status(&self) -> ReconcilerStatus {
        self.inner.status.read().await.clone()
    }

    /// Records a connectivity change. A running loop (see [`spawn`](Self::spawn))
    /// starts a sync on every offline → online transition.
    ///
    /// ## Returns
    /// `true` if the state actually changed.
    pub async fn set_online(&self, online: bool) -> bool {
        let previous = self.inner.online.send_replace(online);
        if previous == online {
            return false;
        }

        info!(online, "Connectivity changed");
        self.update_status(|status| status.online = online).await;
        true
    }

    /// Runs one sync attempt now.
    ///
    /// Never returns an error: failures are logged, recorded in the status
    /// snapshot and reported as [`SyncOutcome::Failed`].
    pub async fn sync_now(&self) -> SyncOutcome {
        if !self.inner.config.is_sync_enabled() {
            debug!("Sync disabled, leaving changes pending");
            return SyncOutcome::Disabled;
        }
        if !self.is_online() {
            debug!("Offline, leaving changes pending");
            return SyncOutcome::Offline;
        }
        if !self.try_begin() {
            debug!("Sync already in flight, rerun requested");
            return SyncOutcome::AlreadyRunning;
        }

        let mut outcome = self.attempt().await;
        while self.inner.rerun_requested.swap(false, Ordering::SeqCst) && self.try_begin() {
            debug!("Changes arrived during push, syncing again");
            match self.attempt().await {
                SyncOutcome::NothingPending => {}
                rerun => outcome = rerun,
            }
        }
        outcome
    }

    /// Takes the in-flight flag. On failure a rerun is requested from the
    /// holder; if the holder released the flag in the meantime, the flag is
    /// taken here instead so the request cannot be dropped.
    fn try_begin(&self) -> bool {
        let inner = &self.inner;
        loop {
            if inner
                .in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
            inner.rerun_requested.store(true, Ordering::SeqCst);
            if inner.in_flight.load(Ordering::SeqCst) {
                return false;
            }
        }
    }

    /// One push with the in-flight flag held. Releases the flag on return.
    async fn attempt(&self) -> SyncOutcome {
        let _flight = InFlight(&self.inner.in_flight);
        self.update_status(|status| status.in_flight = true).await;

        let outcome = match self.push_pending().await {
            Ok(None) => SyncOutcome::NothingPending,
            Ok(Some(counts)) => SyncOutcome::Synced(counts),
            Err(e) => {
                let retryable = e.is_retryable();
                warn!(error = %e, retryable, "Sync failed, pending changes left untouched");
                self.inner.emitter.emit_error(&e.to_string(), retryable);
                SyncOutcome::Failed {
                    reason: e.to_string(),
                    retryable,
                }
            }
        };

        let pending = match self.inner.db.sync_tracker().pending_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "Failed to count pending changes");
                None
            }
        };
        let finished_at = chrono::Utc::now().to_rfc3339();

        self.update_status(|status| {
            status.in_flight = false;
            if let Some(count) = pending {
                status.pending_count = count;
            }
            match &outcome {
                SyncOutcome::Synced(_) | SyncOutcome::NothingPending => {
                    status.last_sync = Some(finished_at);
                    status.last_error = None;
                }
                SyncOutcome::Failed { reason, .. } => status.last_error = Some(reason.clone()),
                _ => {}
            }
        })
        .await;

        if let SyncOutcome::Synced(counts) = &outcome {
            self.inner
                .emitter
                .emit_progress(pending.unwrap_or_default(), counts.total() as i64);
        }

        outcome
    }

    /// Snapshot, push, mark. `Ok(None)` when there was nothing to push.
    async fn push_pending(&self) -> SyncResult<Option<SyncedCounts>> {
        let tracker = self.inner.db.sync_tracker();
        let pending = tracker.pending_items().await?;
        if pending.is_empty() {
            return Ok(None);
        }

        let batch = SyncBatch::from_pending(self.inner.config.device_id(), pending);
        info!(
            batch_id = %batch.batch_id,
            entities = batch.len(),
            remote = self.inner.remote.name(),
            "Pushing pending changes"
        );

        match timeout(self.inner.push_timeout, self.inner.remote.push(&batch)).await {
            Ok(pushed) => pushed?,
            Err(_) => return Err(SyncError::Timeout(self.inner.push_timeout)),
        }

        let marked = tracker.mark_snapshot_synced(&batch.version_snapshot()).await?;
        let mut counts = SyncedCounts {
            products: marked.products,
            transactions: marked.transactions,
            multi_transactions: marked.multi_transactions,
            stale: 0,
        };
        counts.stale = (batch.len() as u64).saturating_sub(counts.total());

        if counts.stale > 0 {
            debug!(stale = counts.stale, "Entities changed during push, left pending");
        }
        info!(batch_id = %batch.batch_id, synced = counts.total(), "Push accepted");
        Ok(Some(counts))
    }

    async fn update_status(&self, f: impl FnOnce(&mut ReconcilerStatus)) {
        let snapshot = {
            let mut status = self.inner.status.write().await;
            f(&mut status);
            status.clone()
        };
        self.inner.emitter.emit_status(&snapshot);
    }

    // =========================================================================
    // Background Loop
    // =========================================================================

    /// Starts the trigger loop on the current runtime.
    pub fn spawn(self) -> ReconcilerHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(self.clone().run(trigger_rx, shutdown_rx));

        ReconcilerHandle {
            reconciler: self,
            trigger_tx,
            shutdown_tx,
            task,
        }
    }

    async fn run(self, mut trigger_rx: mpsc::Receiver<()>, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut online_rx = self.inner.online.subscribe();
        let mut changes = self.inner.db.changes().subscribe();
        let mut ticker = tokio::time::interval(self.inner.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            mode = %self.inner.config.mode(),
            remote = self.inner.remote.name(),
            "Network reconciler started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Network reconciler shutting down");
                    break;
                }

                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *online_rx.borrow_and_update() {
                        info!("Back online, syncing pending changes");
                        self.spawn_sync();
                    }
                }

                event = changes.recv() => match event {
                    Ok(event) if event.is_local_mutation() => self.spawn_sync(),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Change feed lagged");
                        self.spawn_sync();
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Change feed closed");
                        break;
                    }
                },

                _ = ticker.tick() => self.spawn_sync(),

                Some(()) = trigger_rx.recv() => self.spawn_sync(),
            }
        }
    }

    fn spawn_sync(&self) {
        let reconciler = self.clone();
        tokio::spawn(async move {
            let outcome = reconciler.sync_now().await;
            debug!(?outcome, "Sync attempt finished");
        });
    }
}

// =============================================================================
// Reconciler Handle
// =============================================================================

/// Controls a reconciler loop started with [`NetworkReconciler::spawn`].
///
/// Dropping the handle stops the loop.
pub struct ReconcilerHandle {
    reconciler: NetworkReconciler,
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Requests a sync attempt (manual "sync now" button).
    pub fn trigger(&self) {
        // A full channel already holds a pending trigger
        let _ = self.trigger_tx.try_send(());
    }

    pub async fn set_online(&self, online: bool) -> bool {
        self.reconciler.set_online(online).await
    }

    pub async fn status(&self) -> ReconcilerStatus {
        self.reconciler.status().await
    }

    pub fn reconciler(&self) -> &NetworkReconciler {
        &self.reconciler
    }

    /// Stops the loop and waits for it. An attempt already in flight runs
    /// to completion on its own task.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "Reconciler loop panicked");
        }
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

pub struct ReconcilerBuilder {
    config: SyncConfig,
    db: Option<Database>,
    remote: Option<Arc<dyn RemoteAuthority>>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
    push_timeout: Option<Duration>,
    online: bool,
}

impl ReconcilerBuilder {
    pub fn new(config: SyncConfig) -> Self {
        ReconcilerBuilder {
            config,
            db: None,
            remote: None,
            emitter: None,
            push_timeout: None,
            online: true,
        }
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    /// Overrides the remote selected by the config.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteAuthority>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Overrides `push_timeout_secs` with a finer bound.
    pub fn push_timeout(mut self, push_timeout: Duration) -> Self {
        self.push_timeout = Some(push_timeout);
        self
    }

    /// Initial connectivity. Defaults to online.
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub fn build(self) -> SyncResult<NetworkReconciler> {
        let db = self
            .db
            .ok_or_else(|| SyncError::InvalidConfig("Database required".into()))?;
        self.config.validate()?;

        let remote = match self.remote {
            Some(remote) => remote,
            None => remote_from_config(&self.config)?,
        };
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));
        let push_timeout = self.push_timeout.unwrap_or_else(|| self.config.push_timeout());
        let (online, _) = watch::channel(self.online);

        let status = ReconcilerStatus {
            mode: self.config.mode(),
            online: self.online,
            ..Default::default()
        };

        Ok(NetworkReconciler {
            inner: Arc::new(Inner {
                db,
                config: self.config,
                remote,
                emitter,
                push_timeout,
                in_flight: AtomicBool::new(false),
                rerun_requested: AtomicBool::new(false),
                online,
                status: RwLock::new(status),
            }),
        })
    }
}
