//! # Sync Tracker
//!
//! Tracks which syncable rows still need to reach the remote authority.
//!
//! ## Status Flags
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every local write (same SQL transaction as the data change):          │
//! │     sync_status  = 'pending_sync'                                       │
//! │     sync_version = sync_version + 1                                     │
//! │                                                                         │
//! │  NetworkReconciler                                                      │
//! │       │                                                                 │
//! │       ├─ 1. pending_items()  ──► snapshot {id, sync_version, body}      │
//! │       │                                                                 │
//! │       ├─ 2. push(snapshot)   ──► remote authority                       │
//! │       │                                                                 │
//! │       └─ 3. mark_synced_at_versions(snapshot ids + versions)            │
//! │              UPDATE ... WHERE id = ? AND sync_version = ?               │
//! │                                                                         │
//! │  A row edited during step 2 has a newer version, so step 3 leaves it   │
//! │  pending for the next round.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Marking never touches `updated_at` or `sync_version`, which makes it
//! idempotent.

use serde::Serialize;
use sqlx::SqliteConnection;
use stockbook_core::{MultiTransaction, Product, SyncCollection, SyncStatus, Transaction};
use tracing::debug;

use crate::changes::{ChangeEvent, ChangeKind};
use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::multi_transaction::fetch_all_multi_transactions;
use crate::repository::product::PRODUCT_COLUMNS;
use crate::repository::transaction::TRANSACTION_COLUMNS;

/// Everything currently `PendingSync`, read fresh from storage.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingItems {
    pub products: Vec<Product>,
    pub transactions: Vec<Transaction>,
    pub multi_transactions: Vec<MultiTransaction>,
}

impl PendingItems {
    pub fn len(&self) -> usize {
        self.products.len() + self.transactions.len() + self.multi_transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(id, sync_version)` of every pending row, as read.
    pub fn versions(&self) -> VersionSnapshot {
        VersionSnapshot {
            products: self.products.iter().map(|p| (p.id.clone(), p.sync_version)).collect(),
            transactions: self
                .transactions
                .iter()
                .map(|t| (t.id.clone(), t.sync_version))
                .collect(),
            multi_transactions: self
                .multi_transactions
                .iter()
                .map(|t| (t.id.clone(), t.sync_version))
                .collect(),
        }
    }
}

/// Row versions captured when a batch was read, per collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSnapshot {
    pub products: Vec<(String, i64)>,
    pub transactions: Vec<(String, i64)>,
    pub multi_transactions: Vec<(String, i64)>,
}

impl VersionSnapshot {
    pub fn len(&self) -> usize {
        self.products.len() + self.transactions.len() + self.multi_transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rows flipped to `Synced`, per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkedCounts {
    pub products: u64,
    pub transactions: u64,
    pub multi_transactions: u64,
}

impl MarkedCounts {
    pub fn total(&self) -> u64 {
        self.products + self.transactions + self.multi_transactions
    }

    fn record(&mut self, collection: SyncCollection) {
        match collection {
            SyncCollection::Products => self.products += 1,
            SyncCollection::Transactions => self.transactions += 1,
            SyncCollection::MultiTransactions => self.multi_transactions += 1,
        }
    }
}

type Mark<'a> = (SyncCollection, &'a str, Option<i64>);

#[derive(Debug, Clone)]
pub struct SyncTracker {
    db: Database,
}

impl SyncTracker {
    pub fn new(db: Database) -> Self {
        SyncTracker { db }
    }

    /// All rows pending sync across the three syncable collections, in
    /// insertion order. Never cached.
    pub async fn pending_items(&self) -> DbResult<PendingItems> {
        let pending = SyncStatus::PendingSync.as_str();
        let mut conn = self.db.pool().acquire().await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sync_status = ?1 ORDER BY rowid"
        ))
        .bind(pending)
        .fetch_all(&mut *conn)
        .await?;

        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE sync_status = ?1 ORDER BY rowid"
        ))
        .bind(pending)
        .fetch_all(&mut *conn)
        .await?;

        let multi_transactions = fetch_all_multi_transactions(
            &mut conn,
            &format!("WHERE sync_status = '{pending}' ORDER BY rowid"),
        )
        .await?;

        Ok(PendingItems {
            products,
            transactions,
            multi_transactions,
        })
    }

    /// Number of rows pending sync across all syncable collections.
    pub async fn pending_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products WHERE sync_status = ?1) +
                (SELECT COUNT(*) FROM transactions WHERE sync_status = ?1) +
                (SELECT COUNT(*) FROM multi_transactions WHERE sync_status = ?1)
            "#,
        )
        .bind(SyncStatus::PendingSync.as_str())
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    /// Flips exactly the given rows to `Synced`. Unknown ids are ignored and
    /// an empty slice is a no-op.
    ///
    /// ## Returns
    /// Number of rows whose status changed.
    pub async fn mark_synced(&self, collection: SyncCollection, ids: &[String]) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let marks: Vec<Mark> = ids.iter().map(|id| (collection, id.as_str(), None)).collect();
        Ok(self.mark(&marks).await?.total())
    }

    /// Like [`mark_synced`](Self::mark_synced), but only for rows still at the
    /// given `sync_version`.
    pub async fn mark_synced_at_versions(
        &self,
        collection: SyncCollection,
        versions: &[(String, i64)],
    ) -> DbResult<u64> {
        if versions.is_empty() {
            return Ok(0);
        }
        let marks: Vec<Mark> = versions
            .iter()
            .map(|(id, version)| (collection, id.as_str(), Some(*version)))
            .collect();
        Ok(self.mark(&marks).await?.total())
    }

    /// Marks a whole pushed batch in one SQL transaction: either every row
    /// still at its snapshot version is flipped, or none is.
    pub async fn mark_snapshot_synced(&self, snapshot: &VersionSnapshot) -> DbResult<MarkedCounts> {
        if snapshot.is_empty() {
            return Ok(MarkedCounts::default());
        }
        let marks: Vec<Mark> = [
            (SyncCollection::Products, &snapshot.products),
            (SyncCollection::Transactions, &snapshot.transactions),
            (SyncCollection::MultiTransactions, &snapshot.multi_transactions),
        ]
        .into_iter()
        .flat_map(|(collection, versions)| {
            versions
                .iter()
                .map(move |(id, version)| (collection, id.as_str(), Some(*version)))
        })
        .collect();
        self.mark(&marks).await
    }

    async fn mark(&self, marks: &[Mark<'_>]) -> DbResult<MarkedCounts> {
        let _guard = self.db.write_guard().await;
        let mut tx = self.db.pool().begin().await?;

        let mut counts = MarkedCounts::default();
        let mut changed = Vec::new();
        for &(collection, id, version) in marks {
            if mark_row(&mut tx, collection, id, version).await? {
                counts.record(collection);
                changed.push(ChangeEvent::new(collection.into(), ChangeKind::Synced, id));
            }
        }
        tx.commit().await?;

        debug!(
            requested = marks.len(),
            marked = counts.total(),
            "Marked synced"
        );
        self.db.changes().publish(changed);
        Ok(counts)
    }
}

async fn mark_row(
    conn: &mut SqliteConnection,
    collection: SyncCollection,
    id: &str,
    version: Option<i64>,
) -> DbResult<bool> {
    let result = sqlx::query(&format!(
        "UPDATE {} SET sync_status = ?1 \
         WHERE id = ?2 AND sync_status <> ?1 AND (?3 IS NULL OR sync_version = ?3)",
        collection.table_name()
    ))
    .bind(SyncStatus::Synced.as_str())
    .bind(id)
    .bind(version)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use stockbook_core::{NewProduct, ProductUpdate};

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (id, name) in [("p1", "Arroz"), ("p2", "Frijol")] {
            db.products()
                .add(NewProduct {
                    id: Some(id.to_string()),
                    name: name.to_string(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_new_rows_are_pending() {
        let db = setup().await;
        let tracker = db.sync_tracker();

        let pending = tracker.pending_items().await.unwrap();
        assert_eq!(pending.products.len(), 2);
        assert!(pending.transactions.is_empty());
        assert_eq!(tracker.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mark_synced_only_given_ids() {
        let db = setup().await;
        let tracker = db.sync_tracker();

        let marked = tracker
            .mark_synced(SyncCollection::Products, &["p1".to_string()])
            .await
            .unwrap();
        assert_eq!(marked, 1);

        let pending = tracker.pending_items().await.unwrap();
        assert_eq!(pending.products.len(), 1);
        assert_eq!(pending.products[0].id, "p2");
    }

    #[tokio::test]
    async fn test_mark_synced_is_idempotent_and_keeps_fields() {
        let db = setup().await;
        let tracker = db.sync_tracker();
        let before = db.products().get("p1").await.unwrap().unwrap();
        let ids = vec!["p1".to_string()];

        assert_eq!(tracker.mark_synced(SyncCollection::Products, &ids).await.unwrap(), 1);
        let once = db.products().get("p1").await.unwrap().unwrap();
        assert_eq!(tracker.mark_synced(SyncCollection::Products, &ids).await.unwrap(), 0);
        let twice = db.products().get("p1").await.unwrap().unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.sync_status, SyncStatus::Synced);
        assert_eq!(once.updated_at, before.updated_at);
        assert_eq!(once.sync_version, before.sync_version);
    }

    #[tokio::test]
    async fn test_empty_ids_is_noop() {
        let db = setup().await;
        let mut rx = db.changes().subscribe();

        let marked = db
            .sync_tracker()
            .mark_synced(SyncCollection::Products, &[])
            .await
            .unwrap();
        assert_eq!(marked, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_version_stays_pending() {
        let db = setup().await;
        let tracker = db.sync_tracker();
        let snapshot = db.products().get("p1").await.unwrap().unwrap();

        db.products()
            .update(
                "p1",
                ProductUpdate {
                    current_stock: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let marked = tracker
            .mark_synced_at_versions(
                SyncCollection::Products,
                &[(snapshot.id.clone(), snapshot.sync_version)],
            )
            .await
            .unwrap();
        assert_eq!(marked, 0);
        assert_eq!(tracker.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_marks_all_collections_together() {
        let db = setup().await;
        let tracker = db.sync_tracker();
        let snapshot = tracker.pending_items().await.unwrap().versions();
        assert_eq!(snapshot.products.len(), 2);

        db.products()
            .update(
                "p2",
                ProductUpdate {
                    current_stock: Some(7),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut rx = db.changes().subscribe();
        let counts = tracker.mark_snapshot_synced(&snapshot).await.unwrap();
        assert_eq!(
            counts,
            MarkedCounts {
                products: 1,
                ..Default::default()
            }
        );
        assert_eq!(rx.try_recv().unwrap().id, "p1");
        assert!(rx.try_recv().is_err());

        let pending = tracker.pending_items().await.unwrap();
        assert_eq!(pending.products.len(), 1);
        assert_eq!(pending.products[0].id, "p2");
    }

    #[tokio::test]
    async fn test_snapshot_failure_marks_nothing() {
        let db = setup().await;
        let tracker = db.sync_tracker();
        let mut snapshot = tracker.pending_items().await.unwrap().versions();
        snapshot.transactions.push(("t1".to_string(), 1));

        // Products are updated first; the transactions update then fails
        sqlx::query("ALTER TABLE transactions RENAME TO transactions_archived")
            .execute(db.pool())
            .await
            .unwrap();

        assert!(tracker.mark_snapshot_synced(&snapshot).await.is_err());
        let still_pending: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE sync_status = 'pending_sync'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(still_pending, 2);
    }
}
