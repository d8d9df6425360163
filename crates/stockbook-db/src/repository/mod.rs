//! # Repository Module
//!
//! Entity storage for Stockbook.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.products()            ProductRepository       add / update / put   │
//! │                                                   delete / query       │
//! │  db.catalog(kind)         CatalogRepository       categories, brands,  │
//! │                                                   product types        │
//! │  db.transactions()        TransactionRepository   read-only            │
//! │  db.multi_transactions()  MultiTransactionRepo    read-only            │
//! │  db.sync_tracker()        SyncTracker             pending / synced     │
//! │                                                                         │
//! │  Transaction writes go through crate::ledger::StockLedger, which       │
//! │  reuses the row helpers exported here as pub(crate).                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod multi_transaction;
pub mod product;
pub mod sync;
pub mod transaction;

use chrono::Utc;
use sqlx::SqliteConnection;
use stockbook_core::ledger::format_transaction_number;

use crate::error::DbResult;

/// Next `TXN-<millis>-<seq>` number for `table`, with `seq` starting at the
/// current row count plus one and skipping any number already taken.
///
/// `table` is one of the `TABLE` constants of [`transaction`] or
/// [`multi_transaction`].
pub(crate) async fn next_transaction_number(conn: &mut SqliteConnection, table: &str) -> DbResult<String> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(&mut *conn)
        .await?;
    let millis = Utc::now().timestamp_millis();

    let mut seq = count;
    loop {
        let number = format_transaction_number(millis, seq);
        let taken: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {table} WHERE transaction_number = ?1)"
        ))
        .bind(&number)
        .fetch_one(&mut *conn)
        .await?;
        if !taken {
            return Ok(number);
        }
        seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_numbers_are_per_table_and_skip_taken() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let first = next_transaction_number(&mut conn, multi_transaction::TABLE).await.unwrap();
        assert!(first.starts_with("TXN-"));
        assert!(first.ends_with("-0001"));

        sqlx::query(
            "INSERT INTO multi_transactions (id, transaction_number, type, total_amount_cents, \
             date, created_by, sync_status, sync_version) \
             VALUES ('m1', ?1, 'entry', 0, '2024-05-01', 'tester', 'pending_sync', 1)",
        )
        .bind(&first)
        .execute(&mut *conn)
        .await
        .unwrap();

        let second = next_transaction_number(&mut conn, multi_transaction::TABLE).await.unwrap();
        assert!(second.ends_with("-0002"));

        let single = next_transaction_number(&mut conn, transaction::TABLE).await.unwrap();
        assert!(single.ends_with("-0001"));
    }
}
