//! # stockbook-db: Local Storage Layer for Stockbook
//!
//! SQLite persistence for the inventory ledger, through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Data Flow                              │
//! │                                                                         │
//! │  UI action (record sale, edit product)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    stockbook-db (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐  ┌───────────────┐  ┌──────────────────┐  │   │
//! │  │   │   Database    │  │  Repositories │  │   StockLedger    │  │   │
//! │  │   │   (pool.rs)   │◄─│  products     │◄─│   (ledger.rs)    │  │   │
//! │  │   │  write lock   │  │  catalog      │  │  apply / reverse │  │   │
//! │  │   │  ChangeFeed   │  │  transactions │  └──────────────────┘  │   │
//! │  │   └───────────────┘  │  SyncTracker  │  ┌──────────────────┐  │   │
//! │  │                      └───────────────┘  │   QueryFacade    │  │   │
//! │  │                                         └──────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, write lock, repository accessors
//! - [`migrations`] - Embedded migrations and legacy backfill
//! - [`error`] - Database error types
//! - [`repository`] - Entity storage and sync status bookkeeping
//! - [`ledger`] - Transaction writes with their stock effects
//! - [`query`] - Derived product views
//! - [`changes`] - Post-commit change notifications
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockbook_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/stockbook.db")).await?;
//!
//! let txn = db.ledger().add_multi_transaction(input).await?;
//! let low = db.queries().below_minimum_stock().await?;
//! let pending = db.sync_tracker().pending_items().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod changes;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use changes::{ChangeEvent, ChangeFeed, ChangeKind};
pub use error::{DbError, DbResult};
pub use ledger::StockLedger;
pub use pool::{Database, DbConfig};
pub use query::QueryFacade;

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::multi_transaction::MultiTransactionRepository;
pub use repository::product::ProductRepository;
pub use repository::sync::{MarkedCounts, PendingItems, SyncTracker, VersionSnapshot};
pub use repository::transaction::TransactionRepository;
