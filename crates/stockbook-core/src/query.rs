//! # Query Predicates
//!
//! Pure read-side predicates over products. `stockbook-db`'s QueryFacade
//! runs them over freshly loaded rows; the UI can run them over an
//! in-memory list.
//!
//! ## Filter Buckets
//! ```text
//! Stock level (min = min_stock_level)
//!   ──────────────┬─────────────────────────┬──────────────────►
//!        low      │         normal          │       high
//!     stock < min │  min ≤ stock ≤ 2 × min  │  stock > 2 × min
//!
//! Expiration (days = expiration_date - today)
//!   ──────────────────────────────┬────────────────────────────►
//!          expiring soon          │            good
//!          days ≤ 30              │            days > 30
//!   (already expired included)
//!
//! No expiration date: fails both expiration buckets.
//! ```

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{CatalogEntry, Product};
use crate::{EXPIRING_SOON_DAYS, UNRESOLVED_NAME};

// =============================================================================
// Simple Predicates
// =============================================================================

/// `current_stock < min_stock_level`.
#[inline]
pub fn is_below_minimum(product: &Product) -> bool {
    product.current_stock < product.min_stock_level
}

/// Expiration date falls in `[today, today + days]`, both ends inclusive.
///
/// Products without an expiration date never match.
pub fn expires_within(product: &Product, today: NaiveDate, days: i64) -> bool {
    match product.expiration_date {
        Some(date) => date >= today && date <= today + Duration::days(days),
        None => false,
    }
}

/// Case-insensitive substring match on name or description, plain substring
/// match on barcode.
pub fn matches_search(product: &Product, query: &str) -> bool {
    let needle = query.to_lowercase();
    product.name.to_lowercase().contains(&needle)
        || product.description.to_lowercase().contains(&needle)
        || product
            .barcode
            .as_deref()
            .map(|barcode| barcode.contains(query))
            .unwrap_or(false)
}

/// Resolves a weak catalog reference to a display name.
///
/// ## Example
/// ```rust
/// use stockbook_core::query::resolve_name;
/// use stockbook_core::CatalogEntry;
///
/// let categories = vec![CatalogEntry { id: "c1".into(), name: "Bebidas".into() }];
/// assert_eq!(resolve_name(&categories, "c1"), "Bebidas");
/// assert_eq!(resolve_name(&categories, "gone"), "N/A");
/// ```
pub fn resolve_name<'a>(entries: &'a [CatalogEntry], id: &str) -> &'a str {
    entries
        .iter()
        .find(|entry| entry.id == id)
        .map(|entry| entry.name.as_str())
        .unwrap_or(UNRESOLVED_NAME)
}

// =============================================================================
// Filter
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum StockLevel {
    #[default]
    All,
    Low,
    Normal,
    High,
}

impl StockLevel {
    pub fn matches(&self, product: &Product) -> bool {
        let stock = product.current_stock;
        let min = product.min_stock_level;
        match self {
            StockLevel::All => true,
            StockLevel::Low => stock < min,
            StockLevel::Normal => stock >= min && stock <= min * 2,
            StockLevel::High => stock > min * 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum ExpirationStatus {
    #[default]
    All,
    ExpiringSoon,
    Good,
}

impl ExpirationStatus {
    pub fn matches(&self, product: &Product, today: NaiveDate) -> bool {
        if *self == ExpirationStatus::All {
            return true;
        }
        let Some(date) = product.expiration_date else {
            return false;
        };
        let days_left = (date - today).num_days();
        match self {
            ExpirationStatus::All => true,
            ExpirationStatus::ExpiringSoon => days_left <= EXPIRING_SOON_DAYS,
            ExpirationStatus::Good => days_left > EXPIRING_SOON_DAYS,
        }
    }
}

/// Conjunctive product filter. Empty sets and `All` buckets match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductFilter {
    pub categories: Vec<String>,
    pub brands: Vec<String>,
    pub types: Vec<String>,
    pub stock_level: StockLevel,
    pub expiration_status: ExpirationStatus,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product, today: NaiveDate) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&product.category) {
            return false;
        }
        if !self.brands.is_empty() && !self.brands.contains(&product.brand) {
            return false;
        }
        if !self.types.is_empty() {
            match &product.product_type {
                Some(t) if self.types.contains(t) => {}
                _ => return false,
            }
        }
        self.stock_level.matches(product) && self.expiration_status.matches(product, today)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewProduct;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn product(stock: i64, min: i64, expires_in: Option<i64>) -> Product {
        NewProduct {
            name: "Leche Entera".to_string(),
            description: "Caja 1L".to_string(),
            barcode: Some("7501055300075".to_string()),
            category: "lacteos".to_string(),
            brand: "alpura".to_string(),
            product_type: Some("perecedero".to_string()),
            current_stock: stock,
            min_stock_level: min,
            expiration_date: expires_in.map(|d| today() + Duration::days(d)),
            ..Default::default()
        }
        .into_product("p1".to_string(), today())
    }

    #[test]
    fn test_below_minimum() {
        assert!(is_below_minimum(&product(4, 5, None)));
        assert!(!is_below_minimum(&product(5, 5, None)));
    }

    #[test]
    fn test_expires_within_is_inclusive() {
        assert!(expires_within(&product(1, 1, Some(30)), today(), 30));
        assert!(!expires_within(&product(1, 1, Some(31)), today(), 30));
        assert!(expires_within(&product(1, 1, Some(0)), today(), 30));
        assert!(!expires_within(&product(1, 1, Some(-1)), today(), 30));
        assert!(!expires_within(&product(1, 1, None), today(), 30));
    }

    #[test]
    fn test_search() {
        let p = product(1, 1, None);
        assert!(matches_search(&p, "leche"));
        assert!(matches_search(&p, "CAJA"));
        assert!(matches_search(&p, "055300"));
        assert!(!matches_search(&p, "queso"));
    }

    #[test]
    fn test_stock_level_buckets() {
        assert!(StockLevel::Low.matches(&product(4, 5, None)));
        assert!(StockLevel::Normal.matches(&product(5, 5, None)));
        assert!(StockLevel::Normal.matches(&product(10, 5, None)));
        assert!(StockLevel::High.matches(&product(11, 5, None)));
        assert!(!StockLevel::High.matches(&product(10, 5, None)));
    }

    #[test]
    fn test_expiration_buckets() {
        let soon = product(1, 1, Some(30));
        let good = product(1, 1, Some(31));
        let expired = product(1, 1, Some(-3));
        let undated = product(1, 1, None);

        assert!(ExpirationStatus::ExpiringSoon.matches(&soon, today()));
        assert!(ExpirationStatus::ExpiringSoon.matches(&expired, today()));
        assert!(ExpirationStatus::Good.matches(&good, today()));
        assert!(!ExpirationStatus::ExpiringSoon.matches(&undated, today()));
        assert!(!ExpirationStatus::Good.matches(&undated, today()));
        assert!(ExpirationStatus::All.matches(&undated, today()));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let p = product(20, 5, Some(60));

        let filter = ProductFilter {
            categories: vec!["lacteos".to_string()],
            types: vec!["perecedero".to_string()],
            stock_level: StockLevel::High,
            expiration_status: ExpirationStatus::Good,
            ..Default::default()
        };
        assert!(filter.matches(&p, today()));

        let filter = ProductFilter {
            brands: vec!["lala".to_string()],
            ..filter
        };
        assert!(!filter.matches(&p, today()));
        assert!(ProductFilter::default().matches(&p, today()));
    }

    #[test]
    fn test_filter_deserializes_kebab_buckets() {
        let filter: ProductFilter =
            serde_json::from_str(r#"{"stockLevel":"low","expirationStatus":"expiring-soon"}"#).unwrap();
        assert_eq!(filter.stock_level, StockLevel::Low);
        assert_eq!(filter.expiration_status, ExpirationStatus::ExpiringSoon);
    }
}
