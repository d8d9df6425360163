//! # Single Transaction Repository
//!
//! Read access to the legacy one-product transactions. Writes go through
//! [`crate::ledger::StockLedger`], which pairs every row with its stock
//! change.

use sqlx::{SqliteConnection, SqlitePool};
use stockbook_core::Transaction;

use crate::error::{DbError, DbResult};

pub(crate) const TABLE: &str = "transactions";

pub(crate) const TRANSACTION_COLUMNS: &str = "id, transaction_number, product_id, type, quantity, \
     unit_price_cents, total_price_cents, date, notes, created_by, buyer_name, \
     sync_status, sync_version";

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn fetch_transaction(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Transaction>> {
    let txn = sqlx::query_as::<_, Transaction>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(txn)
}

pub(crate) async fn insert_transaction(conn: &mut SqliteConnection, txn: &Transaction) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO transactions ({TRANSACTION_COLUMNS}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
    ))
    .bind(&txn.id)
    .bind(&txn.transaction_number)
    .bind(&txn.product_id)
    .bind(txn.kind)
    .bind(txn.quantity)
    .bind(txn.unit_price_cents)
    .bind(txn.total_price_cents)
    .bind(txn.date)
    .bind(&txn.notes)
    .bind(&txn.created_by)
    .bind(&txn.buyer_name)
    .bind(txn.sync_status)
    .bind(txn.sync_version)
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from(e).with_id(&txn.id))?;
    Ok(())
}

pub(crate) async fn delete_transaction_row(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM transactions WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Transaction>> {
        let mut conn = self.pool.acquire().await?;
        fetch_transaction(&mut conn, id).await
    }

    /// All single transactions, newest date first.
    pub async fn list(&self) -> DbResult<Vec<Transaction>> {
        let txns = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY date DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(txns)
    }

    /// Transactions touching one product, newest first.
    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<Transaction>> {
        let txns = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE product_id = ?1 ORDER BY date DESC, rowid DESC"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(txns)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
