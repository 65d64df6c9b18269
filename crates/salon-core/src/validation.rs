//! # Validation Module
//!
//! Input validation for checkout requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Checkout UI (external)                                       │
//! │  ├── Form checks, immediate feedback                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required fields (client name, receipt number)                     │
//! │  ├── Line sanity (quantity, prices, allocations)                       │
//! │  └── Cash tendered vs. total                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (remaining_quantity >= 0)                                   │
//! │  └── UNIQUE (receipt_number)                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`ValidationError`] means finalize is never attempted.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{LineItem, PaymentMethod, ProductLine, ServiceLine};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_RECEIPT_NUMBER_LEN: usize = 50;
const MAX_CLIENT_NAME_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates the client name printed on the receipt.
///
/// ## Example
/// ```rust
/// use salon_core::validation::validate_client_name;
///
/// assert!(validate_client_name("Maria Santos").is_ok());
/// assert!(validate_client_name("   ").is_err());
/// ```
pub fn validate_client_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "client name".to_string(),
        });
    }

    if name.chars().count() > MAX_CLIENT_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "client name".to_string(),
            max: MAX_CLIENT_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a receipt number.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens, underscores and slashes only
pub fn validate_receipt_number(receipt: &str) -> ValidationResult<()> {
    let receipt = receipt.trim();

    if receipt.is_empty() {
        return Err(ValidationError::Required {
            field: "receipt number".to_string(),
        });
    }

    if receipt.len() > MAX_RECEIPT_NUMBER_LEN {
        return Err(ValidationError::TooLong {
            field: "receipt number".to_string(),
            max: MAX_RECEIPT_NUMBER_LEN,
        });
    }

    if !receipt
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "receipt number".to_string(),
            reason: "must contain only letters, numbers, '-', '_' and '/'".to_string(),
        });
    }

    Ok(())
}

/// Validates a required identifier (branch, stylist, product).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a product quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a non-negative amount (prices, tax, costs). Zero is allowed.
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates cash received against the bill total.
///
/// Only cash payments carry a tendered amount; card and e-wallet are
/// settled on an external terminal for the exact total.
pub fn validate_cash_tendered(
    method: PaymentMethod,
    tendered: Option<Money>,
    total: Money,
) -> ValidationResult<()> {
    if method != PaymentMethod::Cash {
        return Ok(());
    }

    let tendered = tendered.ok_or_else(|| ValidationError::Required {
        field: "amount tendered".to_string(),
    })?;

    if tendered < total {
        return Err(ValidationError::InsufficientPayment {
            total_cents: total.cents(),
            received_cents: tendered.cents(),
        });
    }

    Ok(())
}

// =============================================================================
// Line Validators
// =============================================================================

fn invalid_line(line: usize, err: ValidationError) -> ValidationError {
    ValidationError::InvalidLine {
        line,
        reason: err.to_string(),
    }
}

fn validate_service_line(service: &ServiceLine) -> ValidationResult<()> {
    validate_id("service id", &service.service_id)?;
    validate_id("stylist id", &service.stylist_id)?;
    validate_non_negative("base price", service.base_price)?;
    validate_non_negative("price", service.price())?;
    Ok(())
}

fn validate_product_line(product: &ProductLine) -> ValidationResult<()> {
    validate_id("product id", &product.product_id)?;
    validate_quantity(product.quantity)?;
    validate_non_negative("base price", product.base_price)?;
    validate_non_negative("unit cost", product.unit_cost)?;

    if product.batch_allocations.iter().any(|a| a.quantity <= 0) {
        return Err(ValidationError::MustBePositive {
            field: "allocation quantity".to_string(),
        });
    }

    let mut seen = HashSet::new();
    if let Some(repeated) = product.batch_allocations.iter().find(|a| !seen.insert(a.batch_id.as_str())) {
        return Err(ValidationError::InvalidFormat {
            field: "batch allocations".to_string(),
            reason: format!("batch {} is listed more than once", repeated.batch_number),
        });
    }

    if !product.batch_allocations.is_empty() && product.allocated_quantity() != product.quantity {
        return Err(ValidationError::InvalidFormat {
            field: "batch allocations".to_string(),
            reason: format!(
                "cover {} units but the line quantity is {}",
                product.allocated_quantity(),
                product.quantity
            ),
        });
    }

    Ok(())
}

/// Validates one cart line; errors are tagged with the line index.
pub fn validate_line(index: usize, item: &LineItem) -> ValidationResult<()> {
    match item {
        LineItem::Service(s) => validate_service_line(s),
        LineItem::Product(p) => validate_product_line(p),
    }
    .map_err(|e| invalid_line(index, e))
}

/// Validates cart size and every line.
pub fn validate_items(items: &[LineItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if items.len() > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    items
        .iter()
        .enumerate()
        .try_for_each(|(i, item)| validate_line(i, item))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::BatchAllocation;
    use crate::money::Rate;
    use crate::types::ClientType;

    fn product_line(quantity: i64, allocations: &[i64]) -> LineItem {
        LineItem::Product(ProductLine {
            product_id: "serum".to_string(),
            name: "Serum".to_string(),
            base_price: Money::from_cents(45_000),
            quantity,
            unit_cost: Money::from_cents(20_000),
            commission_percentage: Rate::zero(),
            commissioner_id: None,
            batch_allocations: allocations
                .iter()
                .enumerate()
                .map(|(i, q)| BatchAllocation {
                    batch_id: format!("b{i}"),
                    batch_number: format!("LOT-{i}"),
                    quantity: *q,
                    expiration_date: None,
                })
                .collect(),
        })
    }

    fn service_line(stylist: &str, adjustment: i64) -> LineItem {
        LineItem::Service(ServiceLine {
            service_id: "cut".to_string(),
            name: "Haircut".to_string(),
            base_price: Money::from_cents(30_000),
            stylist_id: stylist.to_string(),
            client_type: ClientType::Transfer,
            adjustment: Money::from_cents(adjustment),
            adjustment_reason: Some("loyal client".to_string()),
        })
    }

    #[test]
    fn test_validate_client_name() {
        assert!(validate_client_name("Maria Santos").is_ok());
        assert!(validate_client_name("").is_err());
        assert!(validate_client_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_receipt_number() {
        assert!(validate_receipt_number("MKT-2025-000123").is_ok());
        assert!(validate_receipt_number("OR/0042").is_ok());
        assert!(matches!(
            validate_receipt_number(" "),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_receipt_number("has space").is_err());
        assert!(validate_receipt_number(&"9".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_cash_tendered() {
        let total = Money::from_cents(47_000);
        assert!(validate_cash_tendered(PaymentMethod::Cash, Some(Money::from_cents(50_000)), total).is_ok());
        assert!(validate_cash_tendered(PaymentMethod::Cash, Some(total), total).is_ok());
        assert_eq!(
            validate_cash_tendered(PaymentMethod::Cash, Some(Money::from_cents(40_000)), total),
            Err(ValidationError::InsufficientPayment {
                total_cents: 47_000,
                received_cents: 40_000
            })
        );
        assert!(validate_cash_tendered(PaymentMethod::Cash, None, total).is_err());
        assert!(validate_cash_tendered(PaymentMethod::Card, None, total).is_ok());
    }

    #[test]
    fn test_allocations_must_cover_quantity() {
        assert!(validate_line(0, &product_line(3, &[])).is_ok());
        assert!(validate_line(0, &product_line(3, &[2, 1])).is_ok());
        assert!(matches!(
            validate_line(4, &product_line(3, &[2])),
            Err(ValidationError::InvalidLine { line: 4, .. })
        ));
        assert!(validate_line(0, &product_line(3, &[3, 0])).is_err());
    }

    #[test]
    fn test_repeated_batch_is_invalid_line() {
        let LineItem::Product(mut product) = product_line(3, &[2, 1]) else {
            unreachable!()
        };
        product.batch_allocations[1].batch_id = product.batch_allocations[0].batch_id.clone();
        product.batch_allocations[1].batch_number = product.batch_allocations[0].batch_number.clone();

        let err = validate_line(2, &LineItem::Product(product)).unwrap_err();
        match err {
            ValidationError::InvalidLine { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("LOT-0"), "{reason}");
            }
            other => panic!("expected InvalidLine, got {other:?}"),
        }
    }

    #[test]
    fn test_service_needs_stylist_and_non_negative_price() {
        assert!(validate_line(0, &service_line("stylist-1", -5_000)).is_ok());
        assert!(validate_line(0, &service_line("", 0)).is_err());
        assert!(validate_line(0, &service_line("stylist-1", -40_000)).is_err());
    }

    #[test]
    fn test_validate_items() {
        assert!(validate_items(&[]).is_err());
        assert!(validate_items(&[service_line("s", 0), product_line(1, &[])]).is_ok());

        let too_many: Vec<LineItem> = (0..=MAX_CART_ITEMS).map(|_| service_line("s", 0)).collect();
        assert!(matches!(
            validate_items(&too_many),
            Err(ValidationError::OutOfRange { .. })
        ));
    }
}
