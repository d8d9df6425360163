//! # Change Feed
//!
//! Broadcast notifications for every committed write, so consumers (the UI,
//! the pending-count badge, the sync reconciler) can re-run their queries.
//!
//! ```text
//! ProductRepository ─┐
//! StockLedger ───────┼──► ChangeFeed (broadcast) ──┬──► UI live queries
//! SyncTracker ───────┘                             └──► NetworkReconciler
//! ```
//!
//! Events are sent only after the SQL transaction commits. A slow
//! subscriber that falls behind receives `RecvError::Lagged` and should
//! simply re-query.

use serde::Serialize;
use stockbook_core::Collection;
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of buffered events per subscriber.
const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    /// Only `sync_status` changed (marked synced).
    Synced,
}

/// One committed change to one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub id: String,
}

impl ChangeEvent {
    pub fn new(collection: Collection, kind: ChangeKind, id: impl Into<String>) -> Self {
        ChangeEvent {
            collection,
            kind,
            id: id.into(),
        }
    }

    /// True for events that create new pending work for the reconciler.
    pub fn is_local_mutation(&self) -> bool {
        self.kind != ChangeKind::Synced && self.collection.syncable().is_some()
    }
}

/// Cloneable sender side of the change broadcast.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        ChangeFeed { tx }
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publishes committed changes. No subscribers is not an error.
    pub fn publish(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            trace!(collection = ?event.collection, kind = ?event.kind, id = %event.id, "Change");
            let _ = self.tx.send(event);
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_published_events() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();

        feed.publish([ChangeEvent::new(Collection::Products, ChangeKind::Created, "p1")]);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, "p1");
        assert!(event.is_local_mutation());
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let feed = ChangeFeed::new();
        feed.publish([ChangeEvent::new(Collection::Brands, ChangeKind::Created, "b1")]);
    }

    #[test]
    fn test_synced_and_catalog_events_are_not_local_mutations() {
        assert!(!ChangeEvent::new(Collection::Products, ChangeKind::Synced, "p1").is_local_mutation());
        assert!(!ChangeEvent::new(Collection::Categories, ChangeKind::Created, "c1").is_local_mutation());
    }
}
