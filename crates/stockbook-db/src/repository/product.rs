//! # Product Repository
//!
//! Entity-store operations for products.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add / update / put                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  write_lock ──► BEGIN                                                   │
//! │                   │                                                     │
//! │                   ▼                                                     │
//! │                 row written with                                        │
//! │                   updated_at   = today                                  │
//! │                   sync_status  = pending_sync   ← same statement       │
//! │                   sync_version = version + 1                            │
//! │                   │                                                     │
//! │                   ▼                                                     │
//! │                 COMMIT ──► ChangeFeed                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The connection-level helpers (`fetch_product`, `write_product`) are shared
//! with the StockLedger so ledger reads and writes run inside its own SQL
//! transaction.

use chrono::{Local, NaiveDate};
use futures_util::TryStreamExt;
use sqlx::SqliteConnection;
use stockbook_core::{Collection, NewProduct, Product, ProductUpdate};
use tracing::{debug, info};
use uuid::Uuid;

use crate::changes::{ChangeEvent, ChangeKind};
use crate::error::{DbError, DbResult};
use crate::pool::Database;

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, description, barcode, category, brand, \
     product_type, current_stock, min_stock_level, purchase_price_cents, selling_price_cents, \
     expiration_date, image, image_type, created_at, updated_at, last_verified, \
     sync_status, sync_version";

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

pub(crate) async fn insert_product(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
    ))
    .bind(&product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.barcode)
    .bind(&product.category)
    .bind(&product.brand)
    .bind(&product.product_type)
    .bind(product.current_stock)
    .bind(product.min_stock_level)
    .bind(product.purchase_price_cents)
    .bind(product.selling_price_cents)
    .bind(product.expiration_date)
    .bind(&product.image)
    .bind(&product.image_type)
    .bind(product.created_at)
    .bind(product.updated_at)
    .bind(product.last_verified)
    .bind(product.sync_status)
    .bind(product.sync_version)
    .execute(&mut *conn)
    .await
    .map_err(|e| DbError::from(e).with_id(&product.id))?;

    Ok(())
}

/// Full replace by id. Returns whether a row was updated.
pub(crate) async fn write_product(conn: &mut SqliteConnection, product: &Product) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products SET
            name = ?2,
            description = ?3,
            barcode = ?4,
            category = ?5,
            brand = ?6,
            product_type = ?7,
            current_stock = ?8,
            min_stock_level = ?9,
            purchase_price_cents = ?10,
            selling_price_cents = ?11,
            expiration_date = ?12,
            image = ?13,
            image_type = ?14,
            created_at = ?15,
            updated_at = ?16,
            last_verified = ?17,
            sync_status = ?18,
            sync_version = ?19
        WHERE id = ?1
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.barcode)
    .bind(&product.category)
    .bind(&product.brand)
    .bind(&product.product_type)
    .bind(product.current_stock)
    .bind(product.min_stock_level)
    .bind(product.purchase_price_cents)
    .bind(product.selling_price_cents)
    .bind(product.expiration_date)
    .bind(&product.image)
    .bind(&product.image_type)
    .bind(product.created_at)
    .bind(product.updated_at)
    .bind(product.last_verified)
    .bind(product.sync_status)
    .bind(product.sync_version)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Calendar date used for `created_at` / `updated_at`.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product storage.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.add(NewProduct { name: "Arroz 1kg".into(), ..Default::default() }).await?;
/// let same = repo.get(&product.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    db: Database,
}

impl ProductRepository {
    pub fn new(db: Database) -> Self {
        ProductRepository { db }
    }

    /// Adds a product under a fresh UUID (or the caller's id).
    ///
    /// ## Returns
    /// * `Ok(Product)` - The stored product, `PendingSync`, version 1
    /// * `Err(DbError::DuplicateId)` - The caller-supplied id is taken
    pub async fn add(&self, new: NewProduct) -> DbResult<Product> {
        let id = new.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let product = new.into_product(id, today());

        let _guard = self.db.write_guard().await;
        let mut conn = self.db.pool().acquire().await?;
        insert_product(&mut conn, &product).await?;
        drop(conn);

        info!(id = %product.id, name = %product.name, "Product added");
        self.db
            .changes()
            .publish([ChangeEvent::new(Collection::Products, ChangeKind::Created, &product.id)]);
        Ok(product)
    }

    /// Gets a product by id.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found (never an error)
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_product(&mut conn, id).await
    }

    /// Merges a partial update into an existing product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The updated product
    /// * `Err(DbError::NotFound)` - No product with this id
    pub async fn update(&self, id: &str, update: ProductUpdate) -> DbResult<Product> {
        let _guard = self.db.write_guard().await;
        let mut tx = self.db.pool().begin().await?;

        let mut product = fetch_product(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        update.apply_to(&mut product);
        product.touch(today());
        write_product(&mut tx, &product).await?;
        tx.commit().await?;

        debug!(id = %id, version = product.sync_version, "Product updated");
        self.db
            .changes()
            .publish([ChangeEvent::new(Collection::Products, ChangeKind::Updated, id)]);
        Ok(product)
    }

    /// Full replace by id, inserting when the id is new.
    ///
    /// Sync bookkeeping is taken from the stored row: the written product is
    /// `PendingSync`, dated today, with the version after the stored one.
    pub async fn put(&self, mut product: Product) -> DbResult<Product> {
        let _guard = self.db.write_guard().await;
        let mut tx = self.db.pool().begin().await?;

        let kind = match fetch_product(&mut tx, &product.id).await? {
            Some(stored) => {
                product.sync_version = stored.sync_version;
                product.touch(today());
                write_product(&mut tx, &product).await?;
                ChangeKind::Updated
            }
            None => {
                product.sync_version = 0;
                product.touch(today());
                insert_product(&mut tx, &product).await?;
                ChangeKind::Created
            }
        };
        tx.commit().await?;

        self.db
            .changes()
            .publish([ChangeEvent::new(Collection::Products, kind, &product.id)]);
        Ok(product)
    }

    /// Deletes a product. Idempotent; transactions referencing it are left
    /// alone and the ledger skips their lines from now on.
    ///
    /// ## Returns
    /// Whether a row was removed.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let _guard = self.db.write_guard().await;
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(id = %id, "Product deleted");
            self.db
                .changes()
                .publish([ChangeEvent::new(Collection::Products, ChangeKind::Deleted, id)]);
        }
        Ok(removed)
    }

    /// All products in insertion order.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        self.query(|_| true).await
    }

    /// Products matching `predicate`, in insertion order.
    ///
    /// Re-executed on every call; rows are streamed and filtered as they
    /// arrive.
    pub async fn query<F>(&self, predicate: F) -> DbResult<Vec<Product>>
    where
        F: Fn(&Product) -> bool,
    {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY rowid");
        let mut rows = sqlx::query_as::<_, Product>(&sql).fetch(self.db.pool());

        let mut matched = Vec::new();
        while let Some(product) = rows.try_next().await? {
            if predicate(&product) {
                matched.push(product);
            }
        }
        Ok(matched)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
