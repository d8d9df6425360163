//! # Multi Transaction Repository
//!
//! Read access to multi-item transactions and the row-level helpers the
//! StockLedger writes them with.
//!
//! ## Storage
//! ```text
//! multi_transactions            multi_transaction_items
//! ┌───────────────────┐         ┌──────────────────────────────┐
//! │ id            PK  │◄────────┤ transaction_id  (cascade)    │
//! │ transaction_number│   1..n  │ position        0, 1, 2 ...  │
//! │ type              │         │ product_id      (weak)       │
//! │ total_amount_cents│         │ quantity / prices            │
//! └───────────────────┘         └──────────────────────────────┘
//! ```

use std::collections::HashMap;

use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::{MultiTransaction, TransactionItem};

use crate::error::{DbError, DbResult};

pub(crate) const TABLE: &str = "multi_transactions";

pub(crate) const MULTI_TRANSACTION_COLUMNS: &str = "id, transaction_number, type, \
     total_amount_cents, date, notes, created_by, buyer_name, supplier_name, \
     sync_status, sync_version";

const ITEM_COLUMNS: &str =
    "product_id, quantity, unit_price_cents, total_price_cents, purchase_price_cents";

#[derive(sqlx::FromRow)]
struct ItemRow {
    transaction_id: String,
    #[sqlx(flatten)]
    item: TransactionItem,
}

// =============================================================================
// Connection-level helpers
// =============================================================================

async fn fetch_items(conn: &mut SqliteConnection, id: &str) -> DbResult<Vec<TransactionItem>> {
    let items = sqlx::query_as::<_, TransactionItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM multi_transaction_items \
         WHERE transaction_id = ?1 ORDER BY position"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

pub(crate) async fn fetch_multi_transaction(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<MultiTransaction>> {
    let txn = sqlx::query_as::<_, MultiTransaction>(&format!(
        "SELECT {MULTI_TRANSACTION_COLUMNS} FROM multi_transactions WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match txn {
        Some(mut txn) => {
            txn.items = fetch_items(conn, id).await?;
            Ok(Some(txn))
        }
        None => Ok(None),
    }
}

async fn insert_items(conn: &mut SqliteConnection, txn: &MultiTransaction) -> DbResult<()> {
    for (position, item) in txn.items.iter().enumerate() {
        sqlx::query(&format!(
            "INSERT INTO multi_transaction_items (transaction_id, position, {ITEM_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ))
        .bind(&txn.id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.total_price_cents)
        .bind(item.purchase_price_cents)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub(crate) async fn insert_multi_transaction(
    conn: &mut SqliteConnection,
    txn: &MultiTransaction,
) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO multi_transactions ({MULTI_TRANSACTION_COLUMNS}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
    ))
    .bind(&txn.id)
    .bind(&txn.transaction_number)
    .bind(txn.kind)
    .bind(txn.total_amount_cents)
    .bind(txn.date)
    .bind(&txn.notes)
    .bind(&txn.created_by)
    .bind(&txn.buyer_name)
    .bind(&txn.supplier_name)
    .bind(txn.sync_status)
    .bind(txn.sync_version)
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from(e).with_id(&txn.id))?;

    insert_items(conn, txn).await
}

/// Replaces the stored body and items of an existing transaction.
/// `transaction_number` is never rewritten.
pub(crate) async fn replace_multi_transaction(
    conn: &mut SqliteConnection,
    txn: &MultiTransaction,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE multi_transactions SET
            type = ?2,
            total_amount_cents = ?3,
            date = ?4,
            notes = ?5,
            created_by = ?6,
            buyer_name = ?7,
            supplier_name = ?8,
            sync_status = ?9,
            sync_version = ?10
        WHERE id = ?1
        "#,
    )
    .bind(&txn.id)
    .bind(txn.kind)
    .bind(txn.total_amount_cents)
    .bind(txn.date)
    .bind(&txn.notes)
    .bind(&txn.created_by)
    .bind(&txn.buyer_name)
    .bind(&txn.supplier_name)
    .bind(txn.sync_status)
    .bind(txn.sync_version)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM multi_transaction_items WHERE transaction_id = ?1")
        .bind(&txn.id)
        .execute(&mut *conn)
        .await?;

    insert_items(conn, txn).await
}

pub(crate) async fn delete_multi_transaction_row(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM multi_transaction_items WHERE transaction_id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM multi_transactions WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Loads transactions with their items. `tail_sql` is appended verbatim
/// (a `WHERE` and/or `ORDER BY` clause).
pub(crate) async fn fetch_all_multi_transactions(
    conn: &mut SqliteConnection,
    tail_sql: &str,
) -> DbResult<Vec<MultiTransaction>> {
    let mut txns = sqlx::query_as::<_, MultiTransaction>(&format!(
        "SELECT {MULTI_TRANSACTION_COLUMNS} FROM multi_transactions {tail_sql}"
    ))
    .fetch_all(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT transaction_id, {ITEM_COLUMNS} FROM multi_transaction_items \
         ORDER BY transaction_id, position"
    ))
    .fetch_all(&mut *conn)
    .await?;

    let mut by_txn: HashMap<String, Vec<TransactionItem>> = HashMap::new();
    for row in rows {
        by_txn.entry(row.transaction_id).or_default().push(row.item);
    }
    for txn in &mut txns {
        txn.items = by_txn.remove(&txn.id).unwrap_or_default();
    }
    Ok(txns)
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct MultiTransactionRepository {
    pool: SqlitePool,
}

impl MultiTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MultiTransactionRepository { pool }
    }

    /// Gets a transaction with its items, or `None`.
    pub async fn get(&self, id: &str) -> DbResult<Option<MultiTransaction>> {
        let mut conn = self.pool.acquire().await?;
        fetch_multi_transaction(&mut conn, id).await
    }

    /// All transactions, newest date first.
    pub async fn list(&self) -> DbResult<Vec<MultiTransaction>> {
        let mut conn = self.pool.acquire().await?;
        fetch_all_multi_transactions(&mut conn, "ORDER BY date DESC, rowid DESC").await
    }

    pub async fn get_by_number(&self, transaction_number: &str) -> DbResult<Option<MultiTransaction>> {
        let mut conn = self.pool.acquire().await?;
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM multi_transactions WHERE transaction_number = ?1")
                .bind(transaction_number)
                .fetch_optional(&mut *conn)
                .await?;
        match id {
            Some(id) => fetch_multi_transaction(&mut conn, &id).await,
            None => Ok(None),
        }
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM multi_transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
