//! # stockbook-core: Pure Domain Logic for Stockbook
//!
//! Entities, money, the stock/price rules of the ledger and the read-side
//! predicates, all as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI layer (out of scope)                      │   │
//! │  │    Inventory ──► Transactions ──► Reports ──► Settings          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockbook-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │   query   │  │   │
//! │  │   │  Product  │  │   Money   │  │  deltas   │  │ predicates│  │   │
//! │  │   │  MultiTxn │  │  markup   │  │  pricing  │  │  filters  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 stockbook-db (Storage Layer)                    │   │
//! │  │          SQLite entity store, StockLedger, SyncTracker          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Product, MultiTransaction, Category, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`ledger`] - Stock deltas and price propagation
//! - [`query`] - Read-side predicates (low stock, expiring, search, filter)
//! - [`error`] - Domain error types
//! - [`validation`] - Form-level validation run before persistence
//!
//! ## Example Usage
//!
//! ```rust
//! use stockbook_core::money::Money;
//!
//! let purchase = Money::from_cents(20000);
//! assert_eq!(purchase.with_markup_bps(3000).cents(), 26000);
//! ```

pub mod error;
pub mod ledger;
pub mod money;
pub mod query;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Markup applied to the purchase price of every entry item, in basis points.
///
/// 3000 bps = 30%: a unit bought at 200.00 is priced at 260.00.
pub const ENTRY_MARKUP_BPS: u32 = 3000;

/// Days ahead that count as "expiring soon" in product filters.
pub const EXPIRING_SOON_DAYS: i64 = 30;

/// Name shown for a category, brand or type reference that no longer resolves.
pub const UNRESOLVED_NAME: &str = "N/A";
