//! # Bill Totals
//!
//! The pure aggregator that turns a priced cart into a payable total.
//!
//! ## Pipeline (fixed order)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal       = Σ line.price                                          │
//! │  discount       = fixed | subtotal × pct        clamp [0, subtotal]     │
//! │  after_discount = max(0, subtotal − discount − promotion_discount)      │
//! │  service_charge = after_discount × service_charge_rate                  │
//! │  tax            = flat amount                                           │
//! │  total          = max(0, after + service_charge + tax − points × ₱1)    │
//! │                                                                         │
//! │  Intermediates: Decimal centavos, full precision                        │
//! │  Rounding:      once, on `total` (half away from zero)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The calculator never fails. Out-of-range inputs (negative discount,
//! negative points) are clamped.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Rate, CENTS_PER_UNIT};
use crate::types::LineItem;

// =============================================================================
// Manual Discount
// =============================================================================

/// Cashier-entered discount on the whole bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ManualDiscount {
    Fixed(Money),
    Percentage(Rate),
}

impl ManualDiscount {
    pub const NONE: ManualDiscount = ManualDiscount::Fixed(Money::zero());

    /// Raw discount amount for `subtotal`, before clamping.
    fn amount_for(&self, subtotal: Decimal) -> Decimal {
        match self {
            ManualDiscount::Fixed(amount) => amount.to_decimal(),
            ManualDiscount::Percentage(rate) => subtotal * rate.as_fraction(),
        }
    }
}

impl Default for ManualDiscount {
    fn default() -> Self {
        ManualDiscount::NONE
    }
}

// =============================================================================
// Input / Output
// =============================================================================

/// Everything the calculator needs. Built fresh for every recomputation.
#[derive(Debug, Clone)]
pub struct BillInput<'a> {
    pub items: &'a [LineItem],
    pub discount: ManualDiscount,
    pub promotion_discount: Decimal,
    pub service_charge_rate: Rate,
    pub tax: Money,
    pub loyalty_points_used: i64,
}

impl<'a> BillInput<'a> {
    /// A bill with no adjustments.
    pub fn new(items: &'a [LineItem]) -> Self {
        BillInput {
            items,
            discount: ManualDiscount::NONE,
            promotion_discount: Decimal::ZERO,
            service_charge_rate: Rate::zero(),
            tax: Money::zero(),
            loyalty_points_used: 0,
        }
    }

    pub fn with_discount(mut self, discount: ManualDiscount) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_promotion_discount(mut self, amount: Decimal) -> Self {
        self.promotion_discount = amount;
        self
    }

    pub fn with_service_charge(mut self, rate: Rate) -> Self {
        self.service_charge_rate = rate;
        self
    }

    pub fn with_tax(mut self, tax: Money) -> Self {
        self.tax = tax;
        self
    }

    pub fn with_loyalty_points(mut self, points: i64) -> Self {
        self.loyalty_points_used = points;
        self
    }
}

/// Computed bill. Decimal fields are exact centavos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillTotals {
    pub subtotal: Money,
    #[ts(as = "String")]
    pub discount: Decimal,
    #[ts(as = "String")]
    pub promotion_discount: Decimal,
    #[ts(as = "String")]
    pub after_discount: Decimal,
    #[ts(as = "String")]
    pub service_charge: Decimal,
    pub tax: Money,
    /// `after_discount + service_charge + tax`; the ceiling for redemption.
    #[ts(as = "String")]
    pub pre_redemption_total: Decimal,
    pub loyalty_points_used: i64,
    pub total: Money,
}

impl BillTotals {
    /// Rounded pre-redemption total.
    pub fn pre_redemption_money(&self) -> Money {
        Money::round_from(self.pre_redemption_total)
    }

    pub fn discount_money(&self) -> Money {
        Money::round_from(self.discount)
    }

    pub fn promotion_discount_money(&self) -> Money {
        Money::round_from(self.promotion_discount)
    }

    pub fn service_charge_money(&self) -> Money {
        Money::round_from(self.service_charge)
    }
}

/// Value of `points` loyalty points in centavos.
pub fn points_value(points: i64) -> Decimal {
    Decimal::from(points.max(0)) * Decimal::from(CENTS_PER_UNIT)
}

// =============================================================================
// Calculator
// =============================================================================

/// Computes bill totals.
///
/// ## Example
/// ```rust
/// use salon_core::billing::{compute_bill_totals, BillInput, ManualDiscount};
/// use salon_core::money::Money;
/// # use salon_core::types::{ClientType, LineItem, ServiceLine};
/// # let items = vec![LineItem::Service(ServiceLine {
/// #     service_id: "cut".into(), name: "Haircut".into(),
/// #     base_price: Money::from_major(500), stylist_id: "s1".into(),
/// #     client_type: ClientType::Regular, adjustment: Money::zero(),
/// #     adjustment_reason: None,
/// # })];
///
/// let totals = compute_bill_totals(
///     &BillInput::new(&items)
///         .with_discount(ManualDiscount::Fixed(Money::from_major(50)))
///         .with_tax(Money::from_major(20)),
/// );
/// assert_eq!(totals.total, Money::from_major(470));
/// ```
pub fn compute_bill_totals(input: &BillInput<'_>) -> BillTotals {
    let subtotal: Money = input.items.iter().map(LineItem::price).sum();
    let subtotal_dec = subtotal.to_decimal().max(Decimal::ZERO);

    let discount = input
        .discount
        .amount_for(subtotal_dec)
        .max(Decimal::ZERO)
        .min(subtotal_dec);

    let promotion_discount = input.promotion_discount.max(Decimal::ZERO);
    let after_discount = (subtotal_dec - discount - promotion_discount).max(Decimal::ZERO);

    let service_charge = after_discount * input.service_charge_rate.as_fraction();
    let tax = input.tax.non_negative();

    let pre_redemption_total = after_discount + service_charge + tax.to_decimal();
    let loyalty_points_used = input.loyalty_points_used.max(0);
    let total = (pre_redemption_total - points_value(loyalty_points_used)).max(Decimal::ZERO);

    BillTotals {
        subtotal,
        discount,
        promotion_discount,
        after_discount,
        service_charge,
        tax,
        pre_redemption_total,
        loyalty_points_used,
        total: Money::round_from(total),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientType, ProductLine, ServiceLine};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn service(cents: i64) -> LineItem {
        LineItem::Service(ServiceLine {
            service_id: "svc".to_string(),
            name: "Hair Color".to_string(),
            base_price: Money::from_cents(cents),
            stylist_id: "stylist-1".to_string(),
            client_type: ClientType::New,
            adjustment: Money::zero(),
            adjustment_reason: None,
        })
    }

    fn product(cents: i64, quantity: i64) -> LineItem {
        LineItem::Product(ProductLine {
            product_id: "shampoo".to_string(),
            name: "Shampoo".to_string(),
            base_price: Money::from_cents(cents),
            quantity,
            unit_cost: Money::from_cents(cents / 2),
            commission_percentage: Rate::zero(),
            commissioner_id: None,
            batch_allocations: Vec::new(),
        })
    }

    #[test]
    fn test_fixed_discount_and_flat_tax() {
        let items = vec![service(50_000)];
        let totals = compute_bill_totals(
            &BillInput::new(&items)
                .with_discount(ManualDiscount::Fixed(Money::from_cents(5_000)))
                .with_tax(Money::from_cents(2_000)),
        );
        assert_eq!(totals.subtotal.cents(), 50_000);
        assert_eq!(totals.discount_money().cents(), 5_000);
        assert_eq!(totals.tax.cents(), 2_000);
        assert_eq!(totals.total.cents(), 47_000);
    }

    #[test]
    fn test_percentage_discount_and_service_charge() {
        let items = vec![service(50_000), product(29_900, 2)];
        // subtotal 1098.00, 10% off = 988.20, +5% sc = 1037.61
        let totals = compute_bill_totals(
            &BillInput::new(&items)
                .with_discount(ManualDiscount::Percentage(Rate::from_bps(1000)))
                .with_service_charge(Rate::from_bps(500)),
        );
        assert_eq!(totals.subtotal.cents(), 109_800);
        assert_eq!(totals.discount, dec!(10980));
        assert_eq!(totals.after_discount, dec!(98820));
        assert_eq!(totals.service_charge, dec!(4941));
        assert_eq!(totals.total.cents(), 103_761);
    }

    #[test]
    fn test_only_total_is_rounded() {
        let items = vec![service(333)];
        // 15% of 333 = 49.95 off, 12.5% sc on 283.05 = 35.38125
        let totals = compute_bill_totals(
            &BillInput::new(&items)
                .with_discount(ManualDiscount::Percentage(Rate::from_bps(1500)))
                .with_service_charge(Rate::from_bps(1250)),
        );
        assert_eq!(totals.discount, dec!(49.95));
        assert_eq!(totals.service_charge, dec!(35.38125));
        // 283.05 + 35.38125 = 318.43125 -> 318
        assert_eq!(totals.total.cents(), 318);
    }

    #[test]
    fn test_discount_is_clamped_to_subtotal() {
        let items = vec![service(10_000)];
        let totals = compute_bill_totals(
            &BillInput::new(&items).with_discount(ManualDiscount::Fixed(Money::from_cents(99_999))),
        );
        assert_eq!(totals.discount, dec!(10000));
        assert_eq!(totals.total, Money::zero());

        let totals = compute_bill_totals(
            &BillInput::new(&items).with_discount(ManualDiscount::Percentage(Rate::from_bps(25_000))),
        );
        assert_eq!(totals.discount, dec!(10000));
    }

    #[test]
    fn test_promotion_and_discount_never_push_below_zero() {
        let items = vec![service(10_000)];
        let totals = compute_bill_totals(
            &BillInput::new(&items)
                .with_discount(ManualDiscount::Fixed(Money::from_cents(6_000)))
                .with_promotion_discount(dec!(6000))
                .with_tax(Money::from_cents(500)),
        );
        assert_eq!(totals.after_discount, Decimal::ZERO);
        assert_eq!(totals.total.cents(), 500);
    }

    #[test]
    fn test_loyalty_points_are_one_peso_each() {
        let items = vec![service(50_000)];
        let totals = compute_bill_totals(&BillInput::new(&items).with_loyalty_points(120));
        assert_eq!(totals.total.cents(), 50_000 - 12_000);
        assert_eq!(totals.pre_redemption_money().cents(), 50_000);

        let totals = compute_bill_totals(&BillInput::new(&items).with_loyalty_points(9_999));
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_negative_inputs_are_clamped() {
        let items = vec![service(10_000)];
        let totals = compute_bill_totals(
            &BillInput::new(&items)
                .with_discount(ManualDiscount::Fixed(Money::from_cents(-500)))
                .with_promotion_discount(dec!(-100))
                .with_tax(Money::from_cents(-300))
                .with_loyalty_points(-7),
        );
        assert_eq!(totals.discount, Decimal::ZERO);
        assert_eq!(totals.promotion_discount, Decimal::ZERO);
        assert_eq!(totals.tax, Money::zero());
        assert_eq!(totals.total.cents(), 10_000);
    }

    #[test]
    fn test_empty_cart() {
        let totals = compute_bill_totals(&BillInput::new(&[]).with_tax(Money::from_cents(100)));
        assert_eq!(totals.subtotal, Money::zero());
        assert_eq!(totals.total.cents(), 100);
    }

    #[test]
    fn test_manual_discount_serde_shape() {
        let json = serde_json::to_value(ManualDiscount::Percentage(Rate::from_bps(1000))).unwrap();
        assert_eq!(json["type"], "percentage");
        assert_eq!(json["value"], 1000);
    }

    fn arb_items() -> impl Strategy<Value = Vec<LineItem>> {
        let line = prop_oneof![
            (0i64..200_000).prop_map(service),
            ((0i64..50_000), (1i64..20)).prop_map(|(p, q)| product(p, q)),
        ];
        proptest::collection::vec(line, 0..10)
    }

    fn arb_discount() -> impl Strategy<Value = ManualDiscount> {
        prop_oneof![
            (0i64..5_000_000).prop_map(|c| ManualDiscount::Fixed(Money::from_cents(c))),
            (0u32..30_000).prop_map(|b| ManualDiscount::Percentage(Rate::from_bps(b))),
        ]
    }

    proptest! {
        #[test]
        fn prop_subtotal_is_exact_sum(items in arb_items()) {
            let totals = compute_bill_totals(&BillInput::new(&items));
            let expected: i64 = items.iter().map(|i| i.price().cents()).sum();
            prop_assert_eq!(totals.subtotal.cents(), expected);
        }

        #[test]
        fn prop_discount_within_subtotal(items in arb_items(), discount in arb_discount()) {
            let totals = compute_bill_totals(&BillInput::new(&items).with_discount(discount));
            prop_assert!(totals.discount >= Decimal::ZERO);
            prop_assert!(totals.discount <= totals.subtotal.to_decimal());
        }

        #[test]
        fn prop_total_never_negative(
            items in arb_items(),
            discount in arb_discount(),
            promo in 0i64..1_000_000,
            sc in 0u32..5_000,
            tax in 0i64..100_000,
            points in 0i64..100_000,
        ) {
            let totals = compute_bill_totals(
                &BillInput::new(&items)
                    .with_discount(discount)
                    .with_promotion_discount(Decimal::from(promo))
                    .with_service_charge(Rate::from_bps(sc))
                    .with_tax(Money::from_cents(tax))
                    .with_loyalty_points(points),
            );
            prop_assert!(!totals.total.is_negative());
        }

        #[test]
        fn prop_redemption_reduces_total_exactly(
            items in arb_items(),
            sc in 0u32..2_000,
            points in 0i64..500,
        ) {
            let base = compute_bill_totals(&BillInput::new(&items).with_service_charge(Rate::from_bps(sc)));
            prop_assume!(points_value(points) <= base.pre_redemption_total);

            let redeemed = compute_bill_totals(
                &BillInput::new(&items)
                    .with_service_charge(Rate::from_bps(sc))
                    .with_loyalty_points(points),
            );
            prop_assert_eq!(base.total.cents() - redeemed.total.cents(), points * 100);
        }
    }
}
