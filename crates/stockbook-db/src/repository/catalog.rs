//! # Catalog Repository
//!
//! Categories, brands and product types: three `{id, name}` lists that
//! products reference by id. One repository type serves all three,
//! dispatched by [`CatalogKind`].

use stockbook_core::query::resolve_name;
use stockbook_core::{CatalogEntry, CatalogKind};
use tracing::debug;
use uuid::Uuid;

use crate::changes::{ChangeEvent, ChangeKind};
use crate::error::{DbError, DbResult};
use crate::pool::Database;

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    db: Database,
    kind: CatalogKind,
}

impl CatalogRepository {
    pub fn new(db: Database, kind: CatalogKind) -> Self {
        CatalogRepository { db, kind }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    /// Adds an entry under a fresh UUID (or the caller's id).
    pub async fn add(&self, id: Option<String>, name: &str) -> DbResult<CatalogEntry> {
        let entry = CatalogEntry {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: name.trim().to_string(),
        };

        let _guard = self.db.write_guard().await;
        sqlx::query(&format!(
            "INSERT INTO {} (id, name) VALUES (?1, ?2)",
            self.kind.table_name()
        ))
        .bind(&entry.id)
        .bind(&entry.name)
        .execute(self.db.pool())
        .await
        .map_err(|e| DbError::from(e).with_id(&entry.id))?;

        debug!(kind = ?self.kind, id = %entry.id, name = %entry.name, "Catalog entry added");
        self.db.changes().publish([ChangeEvent::new(
            self.kind.collection(),
            ChangeKind::Created,
            &entry.id,
        )]);
        Ok(entry)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<CatalogEntry>> {
        let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
            "SELECT id, name FROM {} WHERE id = ?1",
            self.kind.table_name()
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(entry)
    }

    /// All entries in insertion order.
    pub async fn list(&self) -> DbResult<Vec<CatalogEntry>> {
        let entries = sqlx::query_as::<_, CatalogEntry>(&format!(
            "SELECT id, name FROM {} ORDER BY rowid",
            self.kind.table_name()
        ))
        .fetch_all(self.db.pool())
        .await?;
        Ok(entries)
    }

    /// Removes an entry. Idempotent; products keep the dangling id.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let _guard = self.db.write_guard().await;
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", self.kind.table_name()))
            .bind(id)
            .execute(self.db.pool())
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.db
                .changes()
                .publish([ChangeEvent::new(self.kind.collection(), ChangeKind::Deleted, id)]);
        }
        Ok(removed)
    }

    /// Display name for a product's reference, `"N/A"` when it dangles.
    pub async fn resolve_name(&self, id: &str) -> DbResult<String> {
        let entries = self.list().await?;
        Ok(resolve_name(&entries, id).to_string())
    }
}
