//! # FIFO Batch Allocation
//!
//! Read-only selection of batches for a product line.
//!
//! ## Consumption Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Drop batches with remaining = 0 and batches expired as of today     │
//! │  2. Sort by expiration date ascending (no expiration sorts last)        │
//! │  3. Tie-break by received_at ascending                                  │
//! │  4. Take min(remaining, still_needed) from each batch until satisfied   │
//! │                                                                         │
//! │  B1 exp 06-01 qty 3 ─┐                                                  │
//! │  B2 exp 07-01 qty 10 ┼─► request 5 ─► [B1 × 3, B2 × 2], shortfall 0     │
//! │                      │                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here mutates a batch. Committing an allocation is the job of the
//! sale finalize transaction in salon-db.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::StockError;
use crate::inventory::{Batch, BatchAllocation};

/// Result of a FIFO preview.
///
/// A non-zero `shortfall` comes with the partial allocation; the caller
/// decides whether that is fatal (finalize always treats it as fatal).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPreview {
    pub allocations: Vec<BatchAllocation>,
    pub shortfall: i64,
}

impl AllocationPreview {
    /// Units covered by the allocations.
    pub fn allocated(&self) -> i64 {
        self.allocations.iter().map(|a| a.quantity).sum()
    }

    pub fn is_satisfied(&self) -> bool {
        self.shortfall == 0
    }

    /// Converts a partial allocation into a [`StockError`].
    pub fn into_result(
        self,
        branch_id: &str,
        product_id: &str,
    ) -> Result<Vec<BatchAllocation>, StockError> {
        if self.is_satisfied() {
            return Ok(self.allocations);
        }
        let available = self.allocated();
        Err(StockError::InsufficientStock {
            branch_id: branch_id.to_string(),
            product_id: product_id.to_string(),
            available,
            requested: available + self.shortfall,
        })
    }
}

/// FIFO comparison: soonest expiration first, undated last, then oldest
/// receipt first.
pub fn fifo_order(a: &Batch, b: &Batch) -> Ordering {
    let by_expiry = match (a.expiration_date, b.expiration_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry.then_with(|| a.received_at.cmp(&b.received_at))
}

/// Selects batches for `quantity` units in FIFO order.
///
/// `batches` may contain drained or expired batches and may be in any
/// order; they are filtered and sorted here. A non-positive `quantity`
/// yields an empty, satisfied preview.
///
/// ## Example
/// ```rust
/// use chrono::{NaiveDate, TimeZone, Utc};
/// use salon_core::allocation::preview_allocation;
/// use salon_core::inventory::Batch;
/// use salon_core::money::Money;
///
/// let batch = |id: &str, exp: &str, qty| Batch {
///     id: id.to_string(),
///     branch_id: "makati".to_string(),
///     product_id: "serum".to_string(),
///     batch_number: id.to_string(),
///     remaining_quantity: qty,
///     received_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
///     expiration_date: Some(exp.parse().unwrap()),
///     unit_cost: Money::from_cents(10_000),
/// };
/// let batches = vec![batch("B2", "2025-07-01", 10), batch("B1", "2025-06-01", 3)];
/// let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
///
/// let preview = preview_allocation(&batches, 5, today);
/// assert_eq!(preview.allocations[0].batch_id, "B1");
/// assert_eq!(preview.allocations[1].quantity, 2);
/// assert_eq!(preview.shortfall, 0);
/// ```
pub fn preview_allocation(batches: &[Batch], quantity: i64, as_of: NaiveDate) -> AllocationPreview {
    if quantity <= 0 {
        return AllocationPreview::default();
    }

    let mut candidates: Vec<&Batch> = batches.iter().filter(|b| b.is_available(as_of)).collect();
    candidates.sort_by(|a, b| fifo_order(a, b));

    let mut still_needed = quantity;
    let mut allocations = Vec::new();

    for batch in candidates {
        if still_needed == 0 {
            break;
        }
        let taken = batch.remaining_quantity.min(still_needed);
        allocations.push(BatchAllocation {
            batch_id: batch.id.clone(),
            batch_number: batch.batch_number.clone(),
            quantity: taken,
            expiration_date: batch.expiration_date,
        });
        still_needed -= taken;
    }

    AllocationPreview {
        allocations,
        shortfall: still_needed,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn batch(id: &str, exp: Option<&str>, qty: i64, received_day: i64) -> Batch {
        Batch {
            id: id.to_string(),
            branch_id: "makati".to_string(),
            product_id: "serum".to_string(),
            batch_number: format!("LOT-{id}"),
            remaining_quantity: qty,
            received_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
                + Duration::days(received_day),
            expiration_date: exp.map(|d| d.parse().unwrap()),
            unit_cost: Money::from_cents(12_000),
        }
    }

    fn picked(preview: &AllocationPreview) -> Vec<(&str, i64)> {
        preview
            .allocations
            .iter()
            .map(|a| (a.batch_id.as_str(), a.quantity))
            .collect()
    }

    #[test]
    fn test_fifo_takes_soonest_expiring_first() {
        let batches = vec![
            batch("batch2", Some("2025-02-01"), 10, 0),
            batch("batch1", Some("2025-01-01"), 5, 1),
        ];
        let preview = preview_allocation(&batches, 7, today());
        assert_eq!(picked(&preview), vec![("batch1", 5), ("batch2", 2)]);
        assert_eq!(preview.shortfall, 0);
    }

    #[test]
    fn test_soonest_expiry_consumed_first() {
        let batches = vec![
            batch("B1", Some("2025-06-01"), 3, 0),
            batch("B2", Some("2025-07-01"), 10, 0),
        ];
        let preview = preview_allocation(&batches, 5, today());
        assert_eq!(picked(&preview), vec![("B1", 3), ("B2", 2)]);
        assert!(preview.is_satisfied());
    }

    #[test]
    fn test_undated_batches_sort_last_and_ties_break_on_receipt() {
        let batches = vec![
            batch("undated", None, 5, 0),
            batch("late", Some("2025-03-01"), 2, 5),
            batch("early", Some("2025-03-01"), 2, 1),
        ];
        let preview = preview_allocation(&batches, 6, today());
        assert_eq!(
            picked(&preview),
            vec![("early", 2), ("late", 2), ("undated", 2)]
        );
    }

    #[test]
    fn test_drained_and_expired_batches_are_skipped() {
        let batches = vec![
            batch("expired", Some("2024-12-31"), 50, 0),
            batch("empty", Some("2025-01-10"), 0, 0),
            batch("good", Some("2025-05-01"), 4, 0),
        ];
        let preview = preview_allocation(&batches, 3, today());
        assert_eq!(picked(&preview), vec![("good", 3)]);
    }

    #[test]
    fn test_shortfall_returns_partial_allocation() {
        let batches = vec![
            batch("a", Some("2025-02-01"), 2, 0),
            batch("b", None, 1, 0),
        ];
        let preview = preview_allocation(&batches, 10, today());
        assert_eq!(preview.allocated(), 3);
        assert_eq!(preview.shortfall, 7);

        let err = preview.into_result("makati", "serum").unwrap_err();
        assert_eq!(err.shortfall(), 7);
    }

    #[test]
    fn test_zero_quantity_is_empty_and_satisfied() {
        let batches = vec![batch("a", None, 2, 0)];
        let preview = preview_allocation(&batches, 0, today());
        assert!(preview.allocations.is_empty());
        assert!(preview.is_satisfied());
    }

    proptest! {
        #[test]
        fn prop_shortfall_is_requested_minus_available(
            quantities in proptest::collection::vec(0i64..50, 0..8),
            requested in 1i64..400,
        ) {
            let batches: Vec<Batch> = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| batch(&i.to_string(), None, *q, i as i64))
                .collect();
            let available: i64 = quantities.iter().sum();

            let preview = preview_allocation(&batches, requested, today());

            prop_assert_eq!(preview.shortfall, (requested - available).max(0));
            prop_assert_eq!(preview.allocated(), requested.min(available));
            prop_assert!(preview.allocations.iter().all(|a| a.quantity > 0));
        }
    }
}
