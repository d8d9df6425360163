//! # Ledger Math
//!
//! Pure stock and price rules applied by the StockLedger. The storage layer
//! loads products, calls into this module, and writes them back.
//!
//! ## Apply / Reverse
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_item(product, kind, item)                                        │
//! │                                                                         │
//! │   Entry ──► stock += qty                                                │
//! │             purchase = unit_price                                       │
//! │             selling  = unit_price × 1.30                                │
//! │                                                                         │
//! │   Exit  ──► stock -= qty                                                │
//! │             if item.purchase_price is set:                              │
//! │                 purchase = item.purchase_price                          │
//! │                 selling  = unit_price                                   │
//! │                                                                         │
//! │  reverse_item(product, kind, item)                                      │
//! │                                                                         │
//! │   stock -= delta(kind, qty)      prices are left as they are            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock is never clamped. Availability is the caller's concern (see
//! [`crate::validation::validate_stock_availability`]).

use crate::money::Money;
use crate::types::{Product, TransactionItem, TransactionType};
use crate::ENTRY_MARKUP_BPS;

/// Signed stock change for `quantity` units moving in direction `kind`.
#[inline]
pub const fn stock_delta(kind: TransactionType, quantity: i64) -> i64 {
    match kind {
        TransactionType::Entry => quantity,
        TransactionType::Exit => -quantity,
    }
}

/// Applies one line's stock and price effect to `product`.
///
/// Does not touch `updated_at` or sync bookkeeping; the caller does that when
/// it persists the product.
pub fn apply_item(product: &mut Product, kind: TransactionType, item: &TransactionItem) {
    product.current_stock += stock_delta(kind, item.quantity);

    match kind {
        TransactionType::Entry => {
            let unit = item.unit_price();
            product.purchase_price_cents = unit.cents();
            product.selling_price_cents = unit.with_markup_bps(ENTRY_MARKUP_BPS).cents();
        }
        TransactionType::Exit => {
            if let Some(purchase) = item.purchase_price_cents {
                product.purchase_price_cents = purchase;
                product.selling_price_cents = item.unit_price_cents;
            }
        }
    }
}

/// Undoes one line's stock effect.
pub fn reverse_item(product: &mut Product, kind: TransactionType, item: &TransactionItem) {
    product.current_stock -= stock_delta(kind, item.quantity);
}

/// Applies a legacy single-transaction movement. Stock only.
pub fn apply_quantity(product: &mut Product, kind: TransactionType, quantity: i64) {
    product.current_stock += stock_delta(kind, quantity);
}

/// Undoes a legacy single-transaction movement.
pub fn reverse_quantity(product: &mut Product, kind: TransactionType, quantity: i64) {
    product.current_stock -= stock_delta(kind, quantity);
}

/// Recomputes every line total from `unit_price * quantity`.
///
/// Submitted totals are never trusted.
pub fn normalize_items(items: &mut [TransactionItem]) {
    for item in items.iter_mut() {
        item.total_price_cents = item.unit_price().multiply_quantity(item.quantity).cents();
    }
}

/// Sum of line totals.
pub fn total_amount(items: &[TransactionItem]) -> Money {
    items.iter().map(TransactionItem::total_price).sum()
}

/// Formats a transaction number as `TXN-<millis>-<existing + 1, 4 digits>`.
///
/// ## Example
/// ```rust
/// use stockbook_core::ledger::format_transaction_number;
///
/// assert_eq!(format_transaction_number(1715000000000, 41), "TXN-1715000000000-0042");
/// ```
pub fn format_transaction_number(timestamp_millis: i64, existing_count: i64) -> String {
    format!("TXN-{}-{:04}", timestamp_millis, existing_count + 1)
}

// =============================================================================
// Unit Tests
// =============================================================================
