//! # Commissions
//!
//! Product-sale commission for the staff member named as commissioner:
//! `unit_cost × quantity × percentage / 100`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Rate};
use crate::types::ProductLine;

/// Commission owed on one product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRecord {
    pub product_id: String,
    pub commissioner_id: String,
    pub unit_cost: Money,
    pub quantity: i64,
    pub percentage: Rate,
    pub amount: Money,
}

/// Commission amount, rounded to the centavo.
pub fn commission_amount(unit_cost: Money, quantity: i64, percentage: Rate) -> Money {
    Money::round_from(unit_cost.multiply_quantity(quantity).percentage(percentage))
}

/// Returns `None` when the line has no commissioner.
pub fn compute_commission(line: &ProductLine) -> Option<CommissionRecord> {
    let commissioner_id = line.commissioner_id.as_ref().filter(|id| !id.trim().is_empty())?;

    Some(CommissionRecord {
        product_id: line.product_id.clone(),
        commissioner_id: commissioner_id.clone(),
        unit_cost: line.unit_cost,
        quantity: line.quantity,
        percentage: line.commission_percentage,
        amount: commission_amount(line.unit_cost, line.quantity, line.commission_percentage),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(commissioner: Option<&str>, quantity: i64) -> ProductLine {
        ProductLine {
            product_id: "serum".to_string(),
            name: "Keratin Serum".to_string(),
            base_price: Money::from_cents(45_000),
            quantity,
            unit_cost: Money::from_cents(20_000),
            commission_percentage: Rate::from_bps(1000),
            commissioner_id: commissioner.map(str::to_string),
            batch_allocations: Vec::new(),
        }
    }

    #[test]
    fn test_no_commissioner_no_record() {
        assert!(compute_commission(&line(None, 2)).is_none());
        assert!(compute_commission(&line(Some("  "), 2)).is_none());
    }

    #[test]
    fn test_commission_uses_unit_cost() {
        let record = compute_commission(&line(Some("staff-9"), 3)).unwrap();
        // ₱200 × 3 × 10% = ₱60
        assert_eq!(record.amount.cents(), 6_000);
        assert_eq!(record.commissioner_id, "staff-9");
        assert_eq!(record.quantity, 3);
    }

    #[test]
    fn test_commission_rounds_to_centavo() {
        // 333 × 1 × 12.5% = 41.625 -> 42
        assert_eq!(
            commission_amount(Money::from_cents(333), 1, Rate::from_bps(1250)).cents(),
            42
        );
    }

    proptest! {
        #[test]
        fn prop_commission_is_linear_in_quantity(
            unit_pesos in 0i64..10_000,
            whole_pct in 0u32..100,
            q in 1i64..50,
        ) {
            // Whole-peso cost and whole-percent rate keep every product exact.
            let unit = Money::from_major(unit_pesos);
            let rate = Rate::from_bps(whole_pct * 100);
            let one = commission_amount(unit, 1, rate);
            prop_assert_eq!(commission_amount(unit, q, rate).cents(), q * one.cents());
        }
    }
}
