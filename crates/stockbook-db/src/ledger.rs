//! # Stock Ledger
//!
//! Persists transactions together with their stock and price effects.
//!
//! ## Invariant
//! A product's `current_stock` equals its initial stock plus the signed
//! quantity of every stored transaction line that references it.
//!
//! ## Critical Sections
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update_multi_transaction(id, input)                                    │
//! │                                                                         │
//! │  write_lock ──► BEGIN                                                   │
//! │                   │                                                     │
//! │                   ├─ 1. load OLD items                                  │
//! │                   │     reverse each: entry → -qty, exit → +qty         │
//! │                   │                                                     │
//! │                   ├─ 2. replace row + items (number unchanged)          │
//! │                   │                                                     │
//! │                   └─ 3. apply NEW items to the reverted baseline        │
//! │                   │                                                     │
//! │                 COMMIT ──► ChangeFeed                                   │
//! │                                                                         │
//! │  Any storage error rolls back all three steps. A missing product is    │
//! │  not an error: its line is skipped and the loop continues.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger performs no validation. Callers run
//! `stockbook_core::validation` before submitting.

use sqlx::SqliteConnection;
use stockbook_core::ledger::{self as rules, normalize_items, total_amount};
use stockbook_core::{
    Collection, MultiTransaction, MultiTransactionInput, NewTransaction, Product, SyncStatus,
    Transaction, TransactionItem, TransactionType,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::changes::{ChangeEvent, ChangeKind};
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::multi_transaction as multi_rows;
use crate::repository::next_transaction_number;
use crate::repository::product::{fetch_product, today, write_product};
use crate::repository::transaction as single_rows;

/// Products touched inside one critical section, in first-touch order.
#[derive(Debug, Default)]
struct Touched(Vec<String>);

impl Touched {
    fn record(&mut self, id: &str) {
        if !self.0.iter().any(|seen| seen == id) {
            self.0.push(id.to_string());
        }
    }

    fn into_events(self) -> impl Iterator<Item = ChangeEvent> {
        self.0
            .into_iter()
            .map(|id| ChangeEvent::new(Collection::Products, ChangeKind::Updated, id))
    }
}

/// Loads a product, lets `f` change it, and writes it back as a local
/// mutation. Returns `false` (and writes nothing) when the product is gone.
async fn adjust_product<F>(
    conn: &mut SqliteConnection,
    product_id: &str,
    touched: &mut Touched,
    f: F,
) -> DbResult<bool>
where
    F: FnOnce(&mut Product),
{
    let Some(mut product) = fetch_product(conn, product_id).await? else {
        debug!(product_id = %product_id, "Product missing, line skipped");
        return Ok(false);
    };

    f(&mut product);
    product.touch(today());
    write_product(conn, &product).await?;
    touched.record(product_id);
    Ok(true)
}

async fn apply_items(
    conn: &mut SqliteConnection,
    kind: TransactionType,
    items: &[TransactionItem],
    touched: &mut Touched,
) -> DbResult<()> {
    for item in items {
        adjust_product(conn, &item.product_id, touched, |p| rules::apply_item(p, kind, item)).await?;
    }
    Ok(())
}

async fn reverse_items(
    conn: &mut SqliteConnection,
    kind: TransactionType,
    items: &[TransactionItem],
    touched: &mut Touched,
) -> DbResult<()> {
    for item in items {
        adjust_product(conn, &item.product_id, touched, |p| rules::reverse_item(p, kind, item)).await?;
    }
    Ok(())
}

/// Transaction-driven stock mutations.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = db.ledger();
///
/// let txn = ledger.add_multi_transaction(input).await?;
/// let txn = ledger.update_multi_transaction(&txn.id, edited).await?;
/// ledger.delete_multi_transaction(&txn.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct StockLedger {
    db: Database,
}

impl StockLedger {
    pub fn new(db: Database) -> Self {
        StockLedger { db }
    }

    // =========================================================================
    // Multi Transactions
    // =========================================================================

    /// Records a multi-item transaction and applies it to stock and prices.
    ///
    /// Line totals and the transaction total are recomputed from
    /// `unit_price * quantity`. The transaction number is generated here and
    /// never changes afterwards.
    ///
    /// ## Returns
    /// * `Ok(MultiTransaction)` - Stored transaction, `PendingSync`
    /// * `Err(DbError::DuplicateId)` - Caller-supplied id already exists
    pub async fn add_multi_transaction(&self, input: MultiTransactionInput) -> DbResult<MultiTransaction> {
        let mut items = input.items;
        normalize_items(&mut items);

        let _guard = self.db.write_guard().await;
        let mut tx = self.db.pool().begin().await?;

        let txn = MultiTransaction {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            transaction_number: next_transaction_number(&mut tx, multi_rows::TABLE).await?,
            kind: input.kind,
            total_amount_cents: total_amount(&items).cents(),
            items,
            date: input.date,
            notes: input.notes,
            created_by: input.created_by,
            buyer_name: input.buyer_name,
            supplier_name: input.supplier_name,
            sync_status: SyncStatus::PendingSync,
            sync_version: 1,
        };

        multi_rows::insert_multi_transaction(&mut tx, &txn).await?;
        let mut touched = Touched::default();
        apply_items(&mut tx, txn.kind, &txn.items, &mut touched).await?;
        tx.commit().await?;

        info!(
            id = %txn.id,
            number = %txn.transaction_number,
            kind = %txn.kind,
            items = txn.items.len(),
            total_cents = txn.total_amount_cents,
            "Multi transaction recorded"
        );
        self.publish(Collection::MultiTransactions, ChangeKind::Created, &txn.id, touched);
        Ok(txn)
    }

    /// Replaces a transaction's body: reverse the old lines, store the new
    /// body under the same id and number, apply the new lines.
    ///
    /// ## Returns
    /// * `Ok(MultiTransaction)` - The stored transaction after the edit
    /// * `Err(DbError::NotFound)` - No transaction with this id
    pub async fn update_multi_transaction(
        &self,
        id: &str,
        input: MultiTransactionInput,
    ) -> DbResult<MultiTransaction> {
        let mut items = input.items;
        normalize_items(&mut items);

        let _guard = self.db.write_guard().await;
        let mut tx = self.db.pool().begin().await?;

        let old = multi_rows::fetch_multi_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("MultiTransaction", id))?;

        let mut touched = Touched::default();
        reverse_items(&mut tx, old.kind, &old.items, &mut touched).await?;

        let txn = MultiTransaction {
            id: old.id,
            transaction_number: old.transaction_number,
            kind: input.kind,
            total_amount_cents: total_amount(&items).cents(),
            items,
            date: input.date,
            notes: input.notes,
            created_by: input.created_by,
            buyer_name: input.buyer_name,
            supplier_name: input.supplier_name,
            sync_status: SyncStatus::PendingSync,
            sync_version: old.sync_version + 1,
        };
        multi_rows::replace_multi_transaction(&mut tx, &txn).await?;

        apply_items(&mut tx, txn.kind, &txn.items, &mut touched).await?;
        tx.commit().await?;

        info!(id = %txn.id, items = txn.items.len(), "Multi transaction edited");
        self.publish(Collection::MultiTransactions, ChangeKind::Updated, &txn.id, touched);
        Ok(txn)
    }

    /// Reverses a transaction's stock effect and removes it. Idempotent.
    ///
    /// ## Returns
    /// Whether a transaction was removed.
    pub async fn delete_multi_transaction(&self, id: &str) -> DbResult<bool> {
        let _guard = self.db.write_guard().await;
        let mut tx = self.db.pool().begin().await?;

        let Some(old) = multi_rows::fetch_multi_transaction(&mut tx, id).await? else {
            debug!(id = %id, "Multi transaction already gone");
            return Ok(false);
        };

        let mut touched = Touched::default();
        reverse_items(&mut tx, old.kind, &old.items, &mut touched).await?;
        multi_rows::delete_multi_transaction_row(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, number = %old.transaction_number, "Multi transaction deleted");
        self.publish(Collection::MultiTransactions, ChangeKind::Deleted, id, touched);
        Ok(true)
    }

    // =========================================================================
    // Single Transactions (legacy)
    // =========================================================================

    /// Records a legacy single transaction and applies its stock change.
    /// Prices are not propagated for this form.
    pub async fn add_transaction(&self, input: NewTransaction) -> DbResult<Transaction> {
        let _guard = self.db.write_guard().await;
        let mut tx = self.db.pool().begin().await?;

        let txn = Transaction {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            transaction_number: next_transaction_number(&mut tx, single_rows::TABLE).await?,
            product_id: input.product_id,
            kind: input.kind,
            quantity: input.quantity,
            unit_price_cents: input.unit_price_cents,
            total_price_cents: input.unit_price_cents * input.quantity,
            date: input.date,
            notes: input.notes,
            created_by: input.created_by,
            buyer_name: input.buyer_name,
            sync_status: SyncStatus::PendingSync,
            sync_version: 1,
        };

        single_rows::insert_transaction(&mut tx, &txn).await?;
        let mut touched = Touched::default();
        let (kind, qty) = (txn.kind, txn.quantity);
        adjust_product(&mut tx, &txn.product_id, &mut touched, |p| {
            rules::apply_quantity(p, kind, qty)
        })
        .await?;
        tx.commit().await?;

        info!(id = %txn.id, number = %txn.transaction_number, kind = %txn.kind, "Transaction recorded");
        self.publish(Collection::Transactions, ChangeKind::Created, &txn.id, touched);
        Ok(txn)
    }

    /// Reverses a legacy transaction's stock change and removes it. Idempotent.
    pub async fn delete_transaction(&self, id: &str) -> DbResult<bool> {
        let _guard = self.db.write_guard().await;
        let mut tx = self.db.pool().begin().await?;

        let Some(old) = single_rows::fetch_transaction(&mut tx, id).await? else {
            return Ok(false);
        };

        let mut touched = Touched::default();
        adjust_product(&mut tx, &old.product_id, &mut touched, |p| {
            rules::reverse_quantity(p, old.kind, old.quantity)
        })
        .await?;
        single_rows::delete_transaction_row(&mut tx, id).await?;
        tx.commit().await?;

        info!(id = %id, "Transaction deleted");
        self.publish(Collection::Transactions, ChangeKind::Deleted, id, touched);
        Ok(true)
    }

    fn publish(&self, collection: Collection, kind: ChangeKind, id: &str, touched: Touched) {
        self.db.changes().publish(
            std::iter::once(ChangeEvent::new(collection, kind, id)).chain(touched.into_events()),
        );
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
