//! # Inventory Records
//!
//! Batches, allocations, stock counters and the stock movement log.
//!
//! ## Stock Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  (branch, product)                                                      │
//! │                                                                         │
//! │   Batch B1  exp 2025-06-01  remaining 3  ─┐                             │
//! │   Batch B2  exp 2025-07-01  remaining 10 ─┼─► StockRecord.real_time_stock│
//! │   Batch B3  exp 2024-12-01  remaining 4  ✗ (expired, not counted)       │
//! │                                           │        = 13                 │
//! │                                           ▼                             │
//! │                           StockMovement log (every mutation)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A batch is never deleted, only drained to zero.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Batch
// =============================================================================

/// A quantity of one product received together at one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: String,
    pub branch_id: String,
    pub product_id: String,
    /// Supplier / delivery batch number printed on the stock.
    pub batch_number: String,
    /// Units left. Never negative.
    pub remaining_quantity: i64,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub expiration_date: Option<NaiveDate>,
    pub unit_cost: Money,
}

impl Batch {
    /// A batch is expired once `as_of` is past its expiration date.
    /// Stock is still sellable on the expiration date itself.
    pub fn is_expired(&self, as_of: NaiveDate) -> bool {
        matches!(self.expiration_date, Some(exp) if exp < as_of)
    }

    /// Whether FIFO allocation may draw from this batch.
    pub fn is_available(&self, as_of: NaiveDate) -> bool {
        self.remaining_quantity > 0 && !self.is_expired(as_of)
    }
}

/// Data for a delivery receipt; becomes a [`Batch`] when stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBatch {
    pub branch_id: String,
    pub product_id: String,
    pub batch_number: String,
    pub quantity: i64,
    pub expiration_date: Option<NaiveDate>,
    pub unit_cost: Money,
}

/// `realTimeStock` as derived from batches: remaining units over all
/// non-expired batches.
pub fn derived_stock<'a, I>(batches: I, as_of: NaiveDate) -> i64
where
    I: IntoIterator<Item = &'a Batch>,
{
    batches
        .into_iter()
        .filter(|b| !b.is_expired(as_of))
        .map(|b| b.remaining_quantity.max(0))
        .sum()
}

// =============================================================================
// Batch Allocation
// =============================================================================

/// Units of one product line drawn from one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BatchAllocation {
    pub batch_id: String,
    pub batch_number: String,
    pub quantity: i64,
    #[ts(as = "Option<String>")]
    pub expiration_date: Option<NaiveDate>,
}

// =============================================================================
// Stock Record
// =============================================================================

/// The authoritative stock counter for a `(branch, product)` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub branch_id: String,
    pub product_id: String,
    pub real_time_stock: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Movements
// =============================================================================

/// Source of a stock mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Delivery receipt created a batch.
    Receipt,
    /// Sale finalize drained a batch.
    Sale,
    /// Units left this branch in a transfer.
    TransferOut,
    /// Units arrived from another branch.
    TransferIn,
}

impl MovementKind {
    /// Whether this movement removes units from the branch.
    pub fn is_outbound(&self) -> bool {
        matches!(self, MovementKind::Sale | MovementKind::TransferOut)
    }

    /// `units` as logged on a movement row: negative when outbound.
    pub fn signed(&self, units: i64) -> i64 {
        if self.is_outbound() {
            -units.abs()
        } else {
            units.abs()
        }
    }
}

/// One row of the stock audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: String,
    pub branch_id: String,
    pub product_id: String,
    pub batch_id: String,
    pub kind: MovementKind,
    /// Signed: negative for outbound movements.
    pub quantity: i64,
    /// `real_time_stock` after the movement was applied.
    pub resulting_stock: i64,
    /// Sale id or transfer id.
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(remaining: i64, exp: Option<&str>) -> Batch {
        Batch {
            id: "b".to_string(),
            branch_id: "makati".to_string(),
            product_id: "serum".to_string(),
            batch_number: "LOT-1".to_string(),
            remaining_quantity: remaining,
            received_at: Utc::now(),
            expiration_date: exp.map(|d| d.parse().unwrap()),
            unit_cost: Money::from_cents(15_000),
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_expiry_is_inclusive_of_expiration_date() {
        let b = batch(5, Some("2025-06-01"));
        assert!(!b.is_expired(day("2025-05-31")));
        assert!(!b.is_expired(day("2025-06-01")));
        assert!(b.is_expired(day("2025-06-02")));
    }

    #[test]
    fn test_batch_without_expiration_never_expires() {
        assert!(!batch(1, None).is_expired(day("2999-01-01")));
    }

    #[test]
    fn test_is_available() {
        assert!(batch(1, None).is_available(day("2025-01-01")));
        assert!(!batch(0, None).is_available(day("2025-01-01")));
        assert!(!batch(4, Some("2024-12-01")).is_available(day("2025-01-01")));
    }

    #[test]
    fn test_derived_stock_skips_expired_batches() {
        let batches = vec![
            batch(3, Some("2025-06-01")),
            batch(10, Some("2025-07-01")),
            batch(4, Some("2024-12-01")),
            batch(2, None),
        ];
        assert_eq!(derived_stock(&batches, day("2025-01-15")), 15);
        assert_eq!(derived_stock(&batches, day("2025-06-15")), 12);
    }

    #[test]
    fn test_movement_direction() {
        assert!(MovementKind::Sale.is_outbound());
        assert!(MovementKind::TransferOut.is_outbound());
        assert!(!MovementKind::Receipt.is_outbound());
        assert!(!MovementKind::TransferIn.is_outbound());

        assert_eq!(MovementKind::Sale.signed(3), -3);
        assert_eq!(MovementKind::TransferOut.signed(-2), -2);
        assert_eq!(MovementKind::Receipt.signed(5), 5);
        assert_eq!(MovementKind::TransferIn.signed(4), 4);
    }
}
