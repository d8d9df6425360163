//! # Query Facade
//!
//! Derived read-only views over products. Every call re-reads storage, so a
//! consumer that re-runs its query after a [`ChangeFeed`](crate::ChangeFeed)
//! event always sees committed state.
//!
//! Predicates live in `stockbook_core::query`; this module only feeds them
//! rows.

use chrono::NaiveDate;
use stockbook_core::query::{expires_within, matches_search, ProductFilter};
use stockbook_core::Product;

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::product::{today, PRODUCT_COLUMNS};

#[derive(Debug, Clone)]
pub struct QueryFacade {
    db: Database,
}

impl QueryFacade {
    pub fn new(db: Database) -> Self {
        QueryFacade { db }
    }

    /// Products with `current_stock < min_stock_level`, in insertion order.
    pub async fn below_minimum_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE current_stock < min_stock_level ORDER BY rowid"
        ))
        .fetch_all(self.db.pool())
        .await?;
        Ok(products)
    }

    /// Products expiring between today and `today + days`, both inclusive.
    pub async fn expiring_within_days(&self, days: i64) -> DbResult<Vec<Product>> {
        self.expiring_within_days_from(today(), days).await
    }

    /// [`expiring_within_days`](Self::expiring_within_days) against an
    /// explicit reference date.
    pub async fn expiring_within_days_from(&self, today: NaiveDate, days: i64) -> DbResult<Vec<Product>> {
        self.db
            .products()
            .query(|p| expires_within(p, today, days))
            .await
    }

    /// Case-insensitive match on name or description, substring match on
    /// barcode. An empty query returns every product.
    pub async fn search(&self, query: &str) -> DbResult<Vec<Product>> {
        let query = query.trim();
        self.db.products().query(|p| matches_search(p, query)).await
    }

    /// Products matching every criterion of `filter`.
    pub async fn filter(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        self.filter_at(filter, today()).await
    }

    pub async fn filter_at(&self, filter: &ProductFilter, today: NaiveDate) -> DbResult<Vec<Product>> {
        self.db.products().query(|p| filter.matches(p, today)).await
    }
}
