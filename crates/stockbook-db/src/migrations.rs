//! # Database Migrations
//!
//! Embedded SQL migrations plus the legacy-record backfill.
//!
//! ## How Migrations Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  Database::new                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  MIGRATOR.run ── compare embedded vs _sqlx_migrations, run pending     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  backfill_legacy_records                                               │
//! │       │                                                                 │
//! │       ├── transaction_number IS NULL → TXN-<millis>-<seq>              │
//! │       ├── unit_price_cents   IS NULL → 0                               │
//! │       └── total_price_cents  IS NULL → 0                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  App continues startup                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Create a new file in `migrations/sqlite/` with the next sequence number
//! 2. Name format: `NNN_description.sql`
//! 3. **NEVER** modify existing migrations - always add new ones

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::error::DbResult;
use crate::repository::multi_transaction;
use crate::repository::transaction;
use crate::repository::next_transaction_number;

/// Embedded migrations from the workspace `migrations/sqlite` directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations, then backfills legacy rows.
///
/// ## Safety
/// - Idempotent: safe to run multiple times
/// - Ordered: migrations run in filename order (001, 002, ...)
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    let mut tx = pool.begin().await?;
    let repaired = backfill_legacy_records(&mut tx).await?;
    tx.commit().await?;

    if repaired > 0 {
        warn!(rows = repaired, "Backfilled legacy transaction records");
    }

    info!("All migrations applied successfully");
    Ok(())
}

/// Fills in fields that older records were stored without.
///
/// Rows are repaired rather than rejected. Returns the number of rows touched.
pub async fn backfill_legacy_records(conn: &mut SqliteConnection) -> DbResult<u64> {
    let mut touched = 0;

    for table in ["transactions", "multi_transaction_items"] {
        touched += sqlx::query(&format!(
            "UPDATE {table} SET unit_price_cents = 0 WHERE unit_price_cents IS NULL"
        ))
        .execute(&mut *conn)
        .await?
        .rows_affected();

        touched += sqlx::query(&format!(
            "UPDATE {table} SET total_price_cents = COALESCE(unit_price_cents, 0) * quantity \
             WHERE total_price_cents IS NULL"
        ))
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }

    let missing: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM transactions \
         WHERE transaction_number IS NULL OR transaction_number = '' ORDER BY rowid",
    )
    .fetch_all(&mut *conn)
    .await?;
    for id in &missing {
        let number = next_transaction_number(conn, transaction::TABLE).await?;
        sqlx::query("UPDATE transactions SET transaction_number = ?1 WHERE id = ?2")
            .bind(&number)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    touched += missing.len() as u64;

    let missing: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM multi_transactions \
         WHERE transaction_number IS NULL OR transaction_number = '' ORDER BY rowid",
    )
    .fetch_all(&mut *conn)
    .await?;
    for id in &missing {
        let number = next_transaction_number(conn, multi_transaction::TABLE).await?;
        sqlx::query("UPDATE multi_transactions SET transaction_number = ?1 WHERE id = ?2")
            .bind(&number)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    touched += missing.len() as u64;

    Ok(touched)
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_backfills_legacy_transactions() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        sqlx::query(
            "INSERT INTO transactions (id, product_id, type, quantity, date, created_by) \
             VALUES ('legacy-1', 'p1', 'entry', 4, '2023-01-10', 'admin')",
        )
        .execute(&mut *conn)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO multi_transactions (id, transaction_number, type, date, created_by) \
             VALUES ('legacy-2', '', 'exit', '2023-01-11', 'admin')",
        )
        .execute(&mut *conn)
        .await
        .unwrap();

        let touched = backfill_legacy_records(&mut conn).await.unwrap();
        assert_eq!(touched, 4);

        let (number, unit, total): (String, i64, i64) = sqlx::query_as(
            "SELECT transaction_number, unit_price_cents, total_price_cents \
             FROM transactions WHERE id = 'legacy-1'",
        )
        .fetch_one(&mut *conn)
        .await
        .unwrap();
        assert!(number.starts_with("TXN-"));
        assert_eq!((unit, total), (0, 0));

        let number: String =
            sqlx::query_scalar("SELECT transaction_number FROM multi_transactions WHERE id = 'legacy-2'")
                .fetch_one(&mut *conn)
                .await
                .unwrap();
        assert!(number.starts_with("TXN-"));

        // Second run finds nothing to do.
        assert_eq!(backfill_legacy_records(&mut conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_migration_status_reports_all_applied() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (total, applied) = migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }
}
