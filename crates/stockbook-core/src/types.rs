//! # Domain Types
//!
//! Core domain types used throughout Stockbook.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │ MultiTransaction│   │  CatalogEntry   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id             │       │
//! │  │  category ──────┼──►│  transaction_no │   │  name           │       │
//! │  │  brand    (weak)│   │  type           │   │                 │       │
//! │  │  current_stock  │◄──┼─ items[]  (weak)│   │ Category, Brand,│       │
//! │  │  prices (cents) │   │  total_amount   │   │ ProductType     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   SyncStatus    │   │ TransactionType │   │   Collection    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  PendingSync    │   │  Entry          │   │  enum-indexed   │       │
//! │  │  Synced         │   │  Exit           │   │  dispatch       │       │
//! │  │  SyncFailed     │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Weak References
//! Products point at catalog entries by id, and transactions point at
//! products by id. Neither side is enforced: a dangling catalog id renders as
//! "N/A", and a dangling product id is skipped by the ledger.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Sync Status
// =============================================================================

/// Where an entity stands relative to the remote authority.
///
/// ## Lifecycle
/// ```text
///   add / update ──► PendingSync ──push ok──► Synced
///                        ▲                      │
///                        └────── mutation ──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Mutated locally, not yet confirmed by the remote authority.
    PendingSync,
    /// Confirmed by the remote authority.
    Synced,
    /// Reserved for an explicit rejection. The reconciler leaves failed
    /// pushes as `PendingSync` so they are retried.
    SyncFailed,
}

impl SyncStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::PendingSync => "pending_sync",
            SyncStatus::Synced => "synced",
            SyncStatus::SyncFailed => "sync_failed",
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::PendingSync
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_sync" => Ok(SyncStatus::PendingSync),
            "synced" => Ok(SyncStatus::Synced),
            "sync_failed" => Ok(SyncStatus::SyncFailed),
            other => Err(CoreError::UnknownSyncStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Transaction Type
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Inbound: stock is added, prices follow the supplier's unit price.
    Entry,
    /// Outbound: stock is removed.
    Exit,
}

impl TransactionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Entry => "entry",
            TransactionType::Exit => "exit",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(TransactionType::Entry),
            "exit" => Ok(TransactionType::Exit),
            other => Err(CoreError::UnknownTransactionType(other.to_string())),
        }
    }
}

// =============================================================================
// Collections
// =============================================================================

/// Every collection held by the entity store.
///
/// Replaces string-keyed collection lookup with an exhaustive enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Products,
    Categories,
    Brands,
    ProductTypes,
    Transactions,
    MultiTransactions,
}

impl Collection {
    /// Backing table name.
    pub const fn table_name(&self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Categories => "categories",
            Collection::Brands => "brands",
            Collection::ProductTypes => "product_types",
            Collection::Transactions => "transactions",
            Collection::MultiTransactions => "multi_transactions",
        }
    }

    /// The sync-tracked view of this collection, if it carries a sync status.
    pub const fn syncable(&self) -> Option<SyncCollection> {
        match self {
            Collection::Products => Some(SyncCollection::Products),
            Collection::Transactions => Some(SyncCollection::Transactions),
            Collection::MultiTransactions => Some(SyncCollection::MultiTransactions),
            Collection::Categories | Collection::Brands | Collection::ProductTypes => None,
        }
    }
}

/// The collections that carry `sync_status` and are pushed to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum SyncCollection {
    Products,
    Transactions,
    MultiTransactions,
}

impl SyncCollection {
    pub const ALL: [SyncCollection; 3] = [
        SyncCollection::Products,
        SyncCollection::Transactions,
        SyncCollection::MultiTransactions,
    ];

    pub const fn table_name(&self) -> &'static str {
        match self {
            SyncCollection::Products => "products",
            SyncCollection::Transactions => "transactions",
            SyncCollection::MultiTransactions => "multi_transactions",
        }
    }
}

impl From<SyncCollection> for Collection {
    fn from(c: SyncCollection) -> Self {
        match c {
            SyncCollection::Products => Collection::Products,
            SyncCollection::Transactions => Collection::Transactions,
            SyncCollection::MultiTransactions => Collection::MultiTransactions,
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// The three append-only classification lists a product can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum CatalogKind {
    Category,
    Brand,
    ProductType,
}

impl CatalogKind {
    pub const fn collection(&self) -> Collection {
        match self {
            CatalogKind::Category => Collection::Categories,
            CatalogKind::Brand => Collection::Brands,
            CatalogKind::ProductType => Collection::ProductTypes,
        }
    }

    pub const fn table_name(&self) -> &'static str {
        self.collection().table_name()
    }
}

/// A named classification entry: `{id, name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
}

pub type Category = CatalogEntry;
pub type Brand = CatalogEntry;
pub type ProductType = CatalogEntry;

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
///
/// Prices are stored in the base currency as integer cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Opaque unique id (UUID v4 unless supplied by the caller).
    pub id: String,

    /// Display name.
    pub name: String,

    pub description: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Category id (weak reference).
    pub category: String,

    /// Brand id (weak reference).
    pub brand: String,

    /// Product type id (weak reference).
    pub product_type: Option<String>,

    /// Units on hand. Not clamped: exits may drive it negative.
    pub current_stock: i64,

    /// Threshold under which the product is reported as low stock.
    pub min_stock_level: i64,

    pub purchase_price_cents: i64,

    pub selling_price_cents: i64,

    #[ts(as = "Option<String>")]
    pub expiration_date: Option<NaiveDate>,

    pub image: Option<Vec<u8>>,

    /// MIME type of `image`.
    pub image_type: Option<String>,

    #[ts(as = "String")]
    pub created_at: NaiveDate,

    #[ts(as = "String")]
    pub updated_at: NaiveDate,

    /// Date of the last physical stock count.
    #[ts(as = "Option<String>")]
    pub last_verified: Option<NaiveDate>,

    pub sync_status: SyncStatus,

    /// Bumped on every write; lets the reconciler detect writes that land
    /// while a push is in flight.
    pub sync_version: i64,
}

impl Product {
    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Marks the product as locally mutated on `today`.
    pub fn touch(&mut self, today: NaiveDate) {
        self.updated_at = today;
        self.sync_status = SyncStatus::PendingSync;
        self.sync_version += 1;
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    /// Caller-supplied id. A fresh UUID is generated when `None`.
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub barcode: Option<String>,
    pub category: String,
    pub brand: String,
    pub product_type: Option<String>,
    pub current_stock: i64,
    pub min_stock_level: i64,
    pub purchase_price_cents: i64,
    pub selling_price_cents: i64,
    #[ts(as = "Option<String>")]
    pub expiration_date: Option<NaiveDate>,
    pub image: Option<Vec<u8>>,
    pub image_type: Option<String>,
    #[ts(as = "Option<String>")]
    pub last_verified: Option<NaiveDate>,
}

impl NewProduct {
    /// Builds the stored form: `PendingSync`, version 1, dated `today`.
    pub fn into_product(self, id: String, today: NaiveDate) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            barcode: self.barcode,
            category: self.category,
            brand: self.brand,
            product_type: self.product_type,
            current_stock: self.current_stock,
            min_stock_level: self.min_stock_level,
            purchase_price_cents: self.purchase_price_cents,
            selling_price_cents: self.selling_price_cents,
            expiration_date: self.expiration_date,
            image: self.image,
            image_type: self.image_type,
            created_at: today,
            updated_at: today,
            last_verified: self.last_verified,
            sync_status: SyncStatus::PendingSync,
            sync_version: 1,
        }
    }
}

/// Partial product update. `None` leaves a field unchanged; for nullable
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub barcode: Option<Option<String>>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub product_type: Option<Option<String>>,
    pub current_stock: Option<i64>,
    pub min_stock_level: Option<i64>,
    pub purchase_price_cents: Option<i64>,
    pub selling_price_cents: Option<i64>,
    #[ts(as = "Option<Option<String>>")]
    pub expiration_date: Option<Option<NaiveDate>>,
    pub image: Option<Option<Vec<u8>>>,
    pub image_type: Option<Option<String>>,
    #[ts(as = "Option<Option<String>>")]
    pub last_verified: Option<Option<NaiveDate>>,
}

impl ProductUpdate {
    /// Merges the set fields into `product`. Does not touch sync bookkeeping.
    pub fn apply_to(self, product: &mut Product) {
        if let Some(v) = self.name {
            product.name = v;
        }
        if let Some(v) = self.description {
            product.description = v;
        }
        if let Some(v) = self.barcode {
            product.barcode = v;
        }
        if let Some(v) = self.category {
            product.category = v;
        }
        if let Some(v) = self.brand {
            product.brand = v;
        }
        if let Some(v) = self.product_type {
            product.product_type = v;
        }
        if let Some(v) = self.current_stock {
            product.current_stock = v;
        }
        if let Some(v) = self.min_stock_level {
            product.min_stock_level = v;
        }
        if let Some(v) = self.purchase_price_cents {
            product.purchase_price_cents = v;
        }
        if let Some(v) = self.selling_price_cents {
            product.selling_price_cents = v;
        }
        if let Some(v) = self.expiration_date {
            product.expiration_date = v;
        }
        if let Some(v) = self.image {
            product.image = v;
        }
        if let Some(v) = self.image_type {
            product.image_type = v;
        }
        if let Some(v) = self.last_verified {
            product.last_verified = v;
        }
    }
}

// =============================================================================
// Single Transaction (legacy)
// =============================================================================

/// Legacy one-product transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub transaction_number: String,
    pub product_id: String,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "type"))]
    pub kind: TransactionType,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: String,
    pub buyer_name: Option<String>,
    pub sync_status: SyncStatus,
    pub sync_version: i64,
}

/// Input for recording a legacy single transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub id: Option<String>,
    pub product_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: String,
    pub buyer_name: Option<String>,
}

// =============================================================================
// Multi Transaction
// =============================================================================

/// One line of a multi-item transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    /// Product id (weak reference).
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Always `unit_price_cents * quantity` once normalized.
    pub total_price_cents: i64,
    /// Purchase price correction carried by exit lines.
    pub purchase_price_cents: Option<i64>,
}

impl TransactionItem {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        TransactionItem {
            product_id: product_id.into(),
            quantity,
            unit_price_cents,
            total_price_cents: unit_price_cents * quantity,
            purchase_price_cents: None,
        }
    }

    pub fn with_purchase_price(mut self, cents: i64) -> Self {
        self.purchase_price_cents = Some(cents);
        self
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

/// A transaction covering one or more product lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MultiTransaction {
    pub id: String,
    /// `TXN-<millis>-<seq>`; immutable once generated.
    pub transaction_number: String,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "type"))]
    pub kind: TransactionType,
    /// Loaded from `multi_transaction_items`.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<TransactionItem>,
    pub total_amount_cents: i64,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: String,
    pub buyer_name: Option<String>,
    pub supplier_name: Option<String>,
    pub sync_status: SyncStatus,
    pub sync_version: i64,
}

impl MultiTransaction {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

/// Body of a multi-item transaction, used for both create and edit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MultiTransactionInput {
    /// Caller-supplied id for creation; ignored by edits.
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub items: Vec<TransactionItem>,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: String,
    pub buyer_name: Option<String>,
    pub supplier_name: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_sync_status_round_trips_through_str() {
        for status in [SyncStatus::PendingSync, SyncStatus::Synced, SyncStatus::SyncFailed] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("pending".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_transaction_type_serializes_lowercase() {
        let json = serde_json::to_string(&TransactionType::Exit).unwrap();
        assert_eq!(json, "\"exit\"");
        assert!(matches!(
            "refund".parse::<TransactionType>(),
            Err(CoreError::UnknownTransactionType(_))
        ));
    }

    #[test]
    fn test_only_three_collections_are_syncable() {
        assert_eq!(Collection::Products.syncable(), Some(SyncCollection::Products));
        assert_eq!(Collection::Brands.syncable(), None);
        assert_eq!(CatalogKind::ProductType.table_name(), "product_types");
    }

    #[test]
    fn test_new_product_starts_pending() {
        let product = NewProduct {
            name: "Arroz 1kg".to_string(),
            current_stock: 10,
            ..Default::default()
        }
        .into_product("p1".to_string(), date(2024, 5, 1));

        assert_eq!(product.sync_status, SyncStatus::PendingSync);
        assert_eq!(product.sync_version, 1);
        assert_eq!(product.created_at, product.updated_at);
    }

    #[test]
    fn test_product_update_merges_only_set_fields() {
        let mut product = NewProduct {
            name: "Arroz 1kg".to_string(),
            barcode: Some("7501".to_string()),
            expiration_date: Some(date(2024, 6, 1)),
            ..Default::default()
        }
        .into_product("p1".to_string(), date(2024, 5, 1));

        ProductUpdate {
            name: Some("Arroz 2kg".to_string()),
            expiration_date: Some(None),
            ..Default::default()
        }
        .apply_to(&mut product);

        assert_eq!(product.name, "Arroz 2kg");
        assert_eq!(product.barcode.as_deref(), Some("7501"));
        assert_eq!(product.expiration_date, None);
    }

    #[test]
    fn test_touch_marks_pending_and_bumps_version() {
        let mut product = NewProduct::default().into_product("p1".to_string(), date(2024, 5, 1));
        product.sync_status = SyncStatus::Synced;

        product.touch(date(2024, 5, 3));

        assert_eq!(product.sync_status, SyncStatus::PendingSync);
        assert_eq!(product.sync_version, 2);
        assert_eq!(product.updated_at, date(2024, 5, 3));
    }

    #[test]
    fn test_multi_transaction_serializes_type_field() {
        let txn = MultiTransaction {
            id: "t1".to_string(),
            transaction_number: "TXN-1-0001".to_string(),
            kind: TransactionType::Entry,
            items: vec![TransactionItem::new("p1", 2, 500)],
            total_amount_cents: 1000,
            date: date(2024, 5, 1),
            notes: None,
            created_by: "admin".to_string(),
            buyer_name: None,
            supplier_name: Some("Acme".to_string()),
            sync_status: SyncStatus::PendingSync,
            sync_version: 1,
        };
        let value = serde_json::to_value(&txn).unwrap();
        assert_eq!(value["type"], "entry");
        assert_eq!(value["transactionNumber"], "TXN-1-0001");
        assert_eq!(value["items"][0]["totalPriceCents"], 1000);
    }
}
