//! Reconciler behavior against an in-memory database and scripted remotes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use stockbook_core::{
    MultiTransactionInput, NewProduct, ProductUpdate, SyncStatus, TransactionItem, TransactionType,
};
use stockbook_db::{Database, DbConfig};
use stockbook_sync::{
    NetworkReconciler, RemoteAuthority, SimulatedRemote, SyncBatch, SyncConfig, SyncError,
    SyncOutcome, SyncResult,
};

// =============================================================================
// Scripted remotes
// =============================================================================

/// Counts pushes and accepts after `delay`.
struct CountingRemote {
    pushes: AtomicUsize,
    delay: Duration,
}

impl CountingRemote {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(CountingRemote {
            pushes: AtomicUsize::new(0),
            delay,
        })
    }

    fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteAuthority for CountingRemote {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn push(&self, _batch: &SyncBatch) -> SyncResult<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

struct RejectingRemote;

#[async_trait]
impl RemoteAuthority for RejectingRemote {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    async fn push(&self, batch: &SyncBatch) -> SyncResult<()> {
        Err(SyncError::Rejected {
            batch_id: batch.batch_id.clone(),
            reason: "maintenance".to_string(),
        })
    }
}

/// Edits a product while the push is on the wire.
struct EditingRemote {
    db: Database,
}

#[async_trait]
impl RemoteAuthority for EditingRemote {
    fn name(&self) -> &'static str {
        "editing"
    }

    async fn push(&self, _batch: &SyncBatch) -> SyncResult<()> {
        self.db
            .products()
            .update(
                "arroz",
                ProductUpdate {
                    current_stock: Some(99),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn database() -> Database {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    for (id, stock) in [("arroz", 20), ("aceite", 5)] {
        db.products()
            .add(NewProduct {
                id: Some(id.to_string()),
                name: id.to_string(),
                current_stock: stock,
                min_stock_level: 2,
                ..Default::default()
            })
            .await
            .unwrap();
    }
    db
}

async fn record_sale(db: &Database) {
    db.ledger()
        .add_multi_transaction(MultiTransactionInput {
            id: None,
            kind: TransactionType::Exit,
            items: vec![TransactionItem::new("arroz", 2, 350)],
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            notes: None,
            created_by: "caja".to_string(),
            buyer_name: None,
            supplier_name: None,
        })
        .await
        .unwrap();
}

fn reconciler(db: &Database, remote: Arc<dyn RemoteAuthority>) -> NetworkReconciler {
    NetworkReconciler::builder(SyncConfig::default())
        .with_database(db.clone())
        .with_remote(remote)
        .build()
        .unwrap()
}

async fn pending(db: &Database) -> i64 {
    db.sync_tracker().pending_count().await.unwrap()
}

async fn wait_for_pending(db: &Database, expected: i64) {
    for _ in 0..200 {
        if pending(db).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pending count never reached {expected}, still {}", pending(db).await);
}

async fn restock_aceite(db: &Database) {
    db.products()
        .update(
            "aceite",
            ProductUpdate {
                current_stock: Some(40),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

// =============================================================================
// sync_now
// =============================================================================

#[tokio::test]
async fn successful_push_marks_every_collection() {
    let db = database().await;
    record_sale(&db).await;
    let reconciler = reconciler(&db, Arc::new(SimulatedRemote::new(Duration::from_millis(5))));

    match reconciler.sync_now().await {
        SyncOutcome::Synced(counts) => {
            assert_eq!(counts.products, 2);
            assert_eq!(counts.multi_transactions, 1);
            assert_eq!(counts.stale, 0);
        }
        other => panic!("Expected Synced, got {other:?}"),
    }
    assert_eq!(pending(&db).await, 0);

    let arroz = db.products().get("arroz").await.unwrap().unwrap();
    assert_eq!(arroz.sync_status, SyncStatus::Synced);
    assert_eq!(arroz.current_stock, 18);
}

#[tokio::test]
async fn rejected_push_leaves_statuses_untouched() {
    let db = database().await;
    record_sale(&db).await;
    let before = db.sync_tracker().pending_items().await.unwrap();
    let reconciler = reconciler(&db, Arc::new(RejectingRemote));

    let outcome = reconciler.sync_now().await;
    assert!(matches!(outcome, SyncOutcome::Failed { retryable: true, .. }));

    let after = db.sync_tracker().pending_items().await.unwrap();
    assert_eq!(after.products, before.products);
    assert_eq!(after.multi_transactions, before.multi_transactions);
    assert!(after
        .products
        .iter()
        .all(|p| p.sync_status == SyncStatus::PendingSync));

    let status = reconciler.status().await;
    assert!(status.last_error.unwrap().contains("maintenance"));
    assert!(!status.in_flight);
    assert_eq!(status.pending_count, 3);
}

#[tokio::test]
async fn timeout_counts_as_failure() {
    let db = database().await;
    let remote = CountingRemote::new(Duration::from_secs(5));
    let reconciler = NetworkReconciler::builder(SyncConfig::default())
        .with_database(db.clone())
        .with_remote(remote.clone())
        .push_timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    match reconciler.sync_now().await {
        SyncOutcome::Failed { reason, retryable } => {
            assert!(retryable);
            assert!(reason.contains("timed out"));
        }
        other => panic!("Expected Failed, got {other:?}"),
    }
    assert_eq!(remote.pushes(), 1);
    assert_eq!(pending(&db).await, 2);

    // The flag is released: the next attempt reaches the remote again
    reconciler.sync_now().await;
    assert_eq!(remote.pushes(), 2);
}

#[tokio::test]
async fn concurrent_attempts_collapse_into_one_push() {
    let db = database().await;
    let remote = CountingRemote::new(Duration::from_millis(100));
    let reconciler = reconciler(&db, remote.clone());

    let (a, b) = tokio::join!(reconciler.sync_now(), reconciler.sync_now());
    let outcomes = [a, b];

    assert_eq!(remote.pushes(), 1);
    assert_eq!(
        outcomes.iter().filter(|o| matches!(o, SyncOutcome::Synced(_))).count(),
        1
    );
    assert!(outcomes.contains(&SyncOutcome::AlreadyRunning));
    assert_eq!(pending(&db).await, 0);
}

#[tokio::test]
async fn refused_attempt_reruns_after_push_in_flight() {
    let db = database().await;
    let remote = CountingRemote::new(Duration::from_millis(300));
    let reconciler = reconciler(&db, remote.clone());

    let (first, second) = tokio::join!(reconciler.sync_now(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        restock_aceite(&db).await;
        reconciler.sync_now().await
    });

    assert_eq!(second, SyncOutcome::AlreadyRunning);
    match first {
        SyncOutcome::Synced(counts) => assert_eq!(counts.products, 1),
        other => panic!("Expected Synced, got {other:?}"),
    }
    assert_eq!(remote.pushes(), 2);
    assert_eq!(pending(&db).await, 0);
    let aceite = db.products().get("aceite").await.unwrap().unwrap();
    assert_eq!(aceite.current_stock, 40);
    assert_eq!(aceite.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn edit_during_push_stays_pending() {
    let db = database().await;
    let reconciler = reconciler(&db, Arc::new(EditingRemote { db: db.clone() }));

    match reconciler.sync_now().await {
        SyncOutcome::Synced(counts) => {
            assert_eq!(counts.products, 1);
            assert_eq!(counts.stale, 1);
        }
        other => panic!("Expected Synced, got {other:?}"),
    }

    let arroz = db.products().get("arroz").await.unwrap().unwrap();
    assert_eq!(arroz.sync_status, SyncStatus::PendingSync);
    assert_eq!(arroz.current_stock, 99);
    let aceite = db.products().get("aceite").await.unwrap().unwrap();
    assert_eq!(aceite.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn offline_mode_never_pushes() {
    let db = database().await;
    let remote = CountingRemote::new(Duration::from_millis(1));
    let mut config = SyncConfig::default();
    config.apply_overrides(|key| (key == "STOCKBOOK_SYNC_MODE").then(|| "offline".to_string()));
    let reconciler = NetworkReconciler::builder(config)
        .with_database(db.clone())
        .with_remote(remote.clone())
        .build()
        .unwrap();

    assert_eq!(reconciler.sync_now().await, SyncOutcome::Disabled);
    assert_eq!(remote.pushes(), 0);
    assert_eq!(pending(&db).await, 2);
}

// =============================================================================
// Background loop
// =============================================================================

#[tokio::test]
async fn coming_online_drains_pending_changes() {
    let db = database().await;
    let remote = CountingRemote::new(Duration::from_millis(5));
    let handle = NetworkReconciler::builder(SyncConfig::default())
        .with_database(db.clone())
        .with_remote(remote.clone())
        .online(false)
        .build()
        .unwrap()
        .spawn();

    record_sale(&db).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(remote.pushes(), 0);
    assert_eq!(pending(&db).await, 3);

    assert!(handle.set_online(true).await);
    wait_for_pending(&db, 0).await;
    assert!(handle.status().await.online);

    handle.shutdown().await;
}

#[tokio::test]
async fn local_mutation_triggers_sync_while_online() {
    let db = database().await;
    let handle = reconciler(&db, Arc::new(SimulatedRemote::new(Duration::from_millis(1)))).spawn();

    // The first interval tick drains the seeded products
    wait_for_pending(&db, 0).await;

    record_sale(&db).await;
    wait_for_pending(&db, 0).await;
    assert!(db
        .multi_transactions()
        .list()
        .await
        .unwrap()
        .iter()
        .all(|t| t.sync_status == SyncStatus::Synced));

    handle.shutdown().await;
}

#[tokio::test]
async fn changes_committed_mid_push_go_out_without_waiting_for_the_tick() {
    let db = database().await;
    let remote = CountingRemote::new(Duration::from_millis(300));
    let handle = reconciler(&db, remote.clone()).spawn();

    // The first interval tick starts pushing the seeded products
    for _ in 0..100 {
        if handle.status().await.in_flight {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(handle.status().await.in_flight);

    record_sale(&db).await;
    restock_aceite(&db).await;
    wait_for_pending(&db, 0).await;
    assert!(remote.pushes() >= 2);

    handle.shutdown().await;
}

#[tokio::test]
async fn manual_trigger_respects_connectivity() {
    let db = database().await;
    let remote = CountingRemote::new(Duration::from_millis(1));
    let handle = NetworkReconciler::builder(SyncConfig::default())
        .with_database(db.clone())
        .with_remote(remote.clone())
        .online(false)
        .build()
        .unwrap()
        .spawn();

    handle.trigger();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(remote.pushes(), 0);

    handle.reconciler().set_online(true).await;
    wait_for_pending(&db, 0).await;
    let pushes = remote.pushes();

    // Nothing pending: a manual trigger does not reach the remote
    handle.trigger();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(remote.pushes(), pushes);

    handle.shutdown().await;
}
