//! # Validation Module
//!
//! Form-level checks run by callers before anything reaches the ledger.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Form (caller)                                                │
//! │  ├── THIS MODULE: required names, positive quantities                  │
//! │  └── validate_stock_availability for exits                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: StockLedger (stockbook-db)                                   │
//! │  └── Trusts its input. No re-validation, stock is never clamped        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── PRIMARY KEY / UNIQUE constraints                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockbook_core::validation::{validate_product_name, validate_quantity};
//!
//! assert!(validate_product_name("Arroz 1kg").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::{CoreError, ValidationError};
use crate::types::{MultiTransactionInput, NewProduct, NewTransaction, Product, TransactionItem, TransactionType};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted product name.
pub const MAX_NAME_LEN: usize = 200;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a line quantity: strictly positive.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a price or stock figure that must not be negative.
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn require(field: &str, value: Option<&str>) -> ValidationResult<()> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(ValidationError::Required {
            field: field.to_string(),
        }),
    }
}

/// Exit transactions need a buyer, entry transactions a supplier.
fn validate_counterparty(
    kind: TransactionType,
    buyer_name: Option<&str>,
    supplier_name: Option<&str>,
) -> ValidationResult<()> {
    match kind {
        TransactionType::Exit => require("buyer_name", buyer_name),
        TransactionType::Entry => require("supplier_name", supplier_name),
    }
}

// =============================================================================
// Entity Validators
// =============================================================================

/// Validates a product before it is created.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_non_negative("min_stock_level", product.min_stock_level)?;
    validate_non_negative("purchase_price", product.purchase_price_cents)?;
    validate_non_negative("selling_price", product.selling_price_cents)?;
    Ok(())
}

/// Validates one transaction line.
pub fn validate_item(index: usize, item: &TransactionItem) -> ValidationResult<()> {
    if item.product_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: format!("items[{index}].product_id"),
        });
    }
    if item.quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: format!("items[{index}].quantity"),
        });
    }
    validate_non_negative(&format!("items[{index}].unit_price"), item.unit_price_cents)?;
    if let Some(purchase) = item.purchase_price_cents {
        validate_non_negative(&format!("items[{index}].purchase_price"), purchase)?;
    }
    Ok(())
}

/// Validates a multi-item transaction form.
///
/// ## Rules
/// - Exit: `buyer_name` required
/// - Entry: `supplier_name` required
/// - At least one item, each with a product and a positive quantity
pub fn validate_multi_transaction(input: &MultiTransactionInput) -> ValidationResult<()> {
    validate_counterparty(
        input.kind,
        input.buyer_name.as_deref(),
        input.supplier_name.as_deref(),
    )?;

    if input.items.is_empty() {
        return Err(ValidationError::NoItems);
    }

    for (index, item) in input.items.iter().enumerate() {
        validate_item(index, item)?;
    }

    Ok(())
}

/// Validates a legacy single transaction form.
///
/// Legacy transactions never carried a supplier, so only exits are checked
/// for a counterparty.
pub fn validate_transaction(input: &NewTransaction) -> ValidationResult<()> {
    if input.product_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "product_id".to_string(),
        });
    }
    validate_quantity(input.quantity)?;
    validate_non_negative("unit_price", input.unit_price_cents)?;
    if input.kind == TransactionType::Exit {
        require("buyer_name", input.buyer_name.as_deref())?;
    }
    Ok(())
}

// =============================================================================
// Stock Availability
// =============================================================================

/// Checks that every exit line can be served from current stock.
///
/// Lines for the same product are summed before comparing. Entries always
/// pass, and so do lines whose product `lookup` cannot find (the ledger will
/// skip them anyway).
///
/// ## Arguments
/// * `kind` - Transaction direction
/// * `items` - Lines to check
/// * `lookup` - Resolves a product id to the current product
///
/// ## Example
/// ```rust
/// use stockbook_core::validation::validate_stock_availability;
/// use stockbook_core::{TransactionItem, TransactionType};
///
/// let items = vec![TransactionItem::new("p1", 5, 100)];
/// let result = validate_stock_availability(TransactionType::Entry, &items, |_| None);
/// assert!(result.is_ok());
/// ```
pub fn validate_stock_availability<'a, F>(
    kind: TransactionType,
    items: &[TransactionItem],
    lookup: F,
) -> Result<(), CoreError>
where
    F: Fn(&str) -> Option<&'a Product>,
{
    if kind == TransactionType::Entry {
        return Ok(());
    }

    let mut requested: Vec<(&str, i64)> = Vec::new();
    for item in items {
        match requested.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, qty)) => *qty += item.quantity,
            None => requested.push((item.product_id.as_str(), item.quantity)),
        }
    }

    for (product_id, qty) in requested {
        if let Some(product) = lookup(product_id) {
            if qty > product.current_stock {
                return Err(CoreError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.current_stock,
                    requested: qty,
                });
            }
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn input(kind: TransactionType, items: Vec<TransactionItem>) -> MultiTransactionInput {
        MultiTransactionInput {
            id: None,
            kind,
            items,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            notes: None,
            created_by: "admin".to_string(),
            buyer_name: None,
            supplier_name: None,
        }
    }

    fn product(id: &str, stock: i64) -> Product {
        NewProduct {
            name: format!("Product {id}"),
            current_stock: stock,
            ..Default::default()
        }
        .into_product(id.to_string(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }

    #[test]
    fn test_product_name() {
        assert!(validate_product_name("Arroz 1kg").is_ok());
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name(&"A".repeat(201)).is_err());
    }

    #[test]
    fn test_exit_requires_buyer() {
        let form = input(TransactionType::Exit, vec![TransactionItem::new("p1", 1, 100)]);
        assert_eq!(
            validate_multi_transaction(&form),
            Err(ValidationError::Required {
                field: "buyer_name".to_string()
            })
        );

        let form = MultiTransactionInput {
            buyer_name: Some("Ana".to_string()),
            ..form
        };
        assert!(validate_multi_transaction(&form).is_ok());
    }

    #[test]
    fn test_entry_requires_supplier() {
        let form = MultiTransactionInput {
            supplier_name: Some("  ".to_string()),
            ..input(TransactionType::Entry, vec![TransactionItem::new("p1", 1, 100)])
        };
        assert_eq!(
            validate_multi_transaction(&form),
            Err(ValidationError::Required {
                field: "supplier_name".to_string()
            })
        );
    }

    #[test]
    fn test_item_rules() {
        let form = MultiTransactionInput {
            supplier_name: Some("Acme".to_string()),
            ..input(
                TransactionType::Entry,
                vec![
                    TransactionItem::new("p1", 1, 100),
                    TransactionItem::new("p2", 0, 100),
                ],
            )
        };
        assert_eq!(
            validate_multi_transaction(&form),
            Err(ValidationError::MustBePositive {
                field: "items[1].quantity".to_string()
            })
        );

        let empty = MultiTransactionInput {
            supplier_name: Some("Acme".to_string()),
            ..input(TransactionType::Entry, vec![])
        };
        assert_eq!(validate_multi_transaction(&empty), Err(ValidationError::NoItems));
    }

    #[test]
    fn test_stock_availability_sums_lines_per_product() {
        let p1 = product("p1", 5);
        let lookup = |id: &str| if id == "p1" { Some(&p1) } else { None };

        let items = vec![
            TransactionItem::new("p1", 3, 100),
            TransactionItem::new("p1", 3, 100),
            TransactionItem::new("missing", 50, 100),
        ];
        let err = validate_stock_availability(TransactionType::Exit, &items, lookup).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            }
        ));

        let items = vec![TransactionItem::new("p1", 5, 100)];
        assert!(validate_stock_availability(TransactionType::Exit, &items, lookup).is_ok());
    }
}
