//! # Promotions
//!
//! Eligibility checks and discount math for promotion codes.
//!
//! ## Validation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  code found (case-insensitive)   ──✗──► NotFound          (repository) │
//! │  is_active                       ──✗──► Inactive                       │
//! │  today ≥ starts_on               ──✗──► NotYetValid                    │
//! │  today ≤ ends_on                 ──✗──► Expired                        │
//! │  branch ∈ eligible_branches      ──✗──► BranchIneligible               │
//! │  client ∈ eligible_clients       ──✗──► ClientIneligible               │
//! │  usage_count < usage_limit       ──✗──► UsageExceeded                  │
//! │  client usage < per-client limit ──✗──► ClientUsageExceeded            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first failing check wins. Eligibility lists that are `None` or empty
//! mean "unrestricted".

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::PromotionError;
use crate::money::{Money, Rate};
use crate::types::LineItem;

// =============================================================================
// Promotion Types
// =============================================================================

/// How the promotion's value is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PromotionKind {
    Percentage(Rate),
    Fixed(Money),
}

/// Which lines the promotion's base amount is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PromotionScope {
    #[default]
    All,
    ServicesOnly,
    ProductsOnly,
}

/// A discount rule keyed by a code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: String,
    /// Stored upper-case; see [`normalize_code`].
    pub code: String,
    pub kind: PromotionKind,
    pub scope: PromotionScope,
    pub max_discount: Option<Money>,
    pub eligible_branches: Option<Vec<String>>,
    pub eligible_clients: Option<Vec<String>>,
    #[ts(as = "String")]
    pub starts_on: NaiveDate,
    #[ts(as = "String")]
    pub ends_on: NaiveDate,
    pub usage_limit_global: Option<i64>,
    pub usage_limit_per_client: Option<i64>,
    pub usage_count: i64,
    pub is_active: bool,
}

/// Canonical form of a promotion code.
///
/// ```rust
/// use salon_core::promotion::normalize_code;
/// assert_eq!(normalize_code("  summer25 "), "SUMMER25");
/// ```
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn unrestricted_or_contains(list: &Option<Vec<String>>, id: &str) -> bool {
    match list {
        None => true,
        Some(ids) if ids.is_empty() => true,
        Some(ids) => ids.iter().any(|x| x == id),
    }
}

// =============================================================================
// Eligibility
// =============================================================================

/// Runs every check after "code exists" in order.
///
/// `client_usage` is how many times `client_id` has already used this
/// promotion. A walk-in (no client id) fails a client-restricted promotion
/// and skips the per-client limit.
pub fn check_eligibility(
    promotion: &Promotion,
    branch_id: &str,
    client_id: Option<&str>,
    client_usage: i64,
    today: NaiveDate,
) -> Result<(), PromotionError> {
    let code = || promotion.code.clone();

    if !promotion.is_active {
        return Err(PromotionError::Inactive { code: code() });
    }

    if today < promotion.starts_on {
        return Err(PromotionError::NotYetValid {
            code: code(),
            starts_on: promotion.starts_on.to_string(),
        });
    }

    if today > promotion.ends_on {
        return Err(PromotionError::Expired {
            code: code(),
            ended_on: promotion.ends_on.to_string(),
        });
    }

    if !unrestricted_or_contains(&promotion.eligible_branches, branch_id) {
        return Err(PromotionError::BranchIneligible {
            code: code(),
            branch_id: branch_id.to_string(),
        });
    }

    let restricted_to_clients =
        matches!(&promotion.eligible_clients, Some(ids) if !ids.is_empty());
    match client_id {
        Some(client) if !unrestricted_or_contains(&promotion.eligible_clients, client) => {
            return Err(PromotionError::ClientIneligible {
                code: code(),
                client_id: client.to_string(),
            });
        }
        None if restricted_to_clients => {
            return Err(PromotionError::ClientIneligible {
                code: code(),
                client_id: String::new(),
            });
        }
        _ => {}
    }

    if let Some(limit) = promotion.usage_limit_global {
        if promotion.usage_count >= limit {
            return Err(PromotionError::UsageExceeded { code: code(), limit });
        }
    }

    if let (Some(limit), Some(client)) = (promotion.usage_limit_per_client, client_id) {
        if client_usage >= limit {
            return Err(PromotionError::ClientUsageExceeded {
                code: code(),
                client_id: client.to_string(),
                limit,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Discount
// =============================================================================

/// Sum of the prices the promotion applies to.
pub fn scoped_base(scope: PromotionScope, items: &[LineItem]) -> Money {
    items
        .iter()
        .filter(|item| match scope {
            PromotionScope::All => true,
            PromotionScope::ServicesOnly => item.as_service().is_some(),
            PromotionScope::ProductsOnly => item.as_product().is_some(),
        })
        .map(LineItem::price)
        .sum()
}

/// Promotion discount in exact centavos, clamped to
/// `[0, min(subtotal, max_discount)]`.
///
/// ## Example
/// ```rust
/// use salon_core::money::{Money, Rate};
/// use salon_core::promotion::{calculate_promotion_discount, PromotionKind, PromotionScope};
/// use rust_decimal::Decimal;
///
/// // 20% off a ₱1,000 bill, capped at ₱150
/// let d = calculate_promotion_discount(
///     PromotionKind::Percentage(Rate::from_bps(2000)),
///     PromotionScope::All,
///     Some(Money::from_major(150)),
///     Money::from_major(1000),
///     &[],
/// );
/// assert_eq!(d, Decimal::from(15_000));
/// ```
///
/// With `PromotionScope::All` the base is `subtotal`; otherwise it is the
/// sum of the matching lines in `items`.
pub fn calculate_promotion_discount(
    kind: PromotionKind,
    scope: PromotionScope,
    max_discount: Option<Money>,
    subtotal: Money,
    items: &[LineItem],
) -> Decimal {
    let base = match scope {
        PromotionScope::All => subtotal,
        _ => scoped_base(scope, items),
    }
    .to_decimal()
    .max(Decimal::ZERO);

    let raw = match kind {
        PromotionKind::Percentage(rate) => base * rate.as_fraction(),
        PromotionKind::Fixed(amount) => amount.to_decimal(),
    };

    let mut ceiling = subtotal.to_decimal().max(Decimal::ZERO);
    if let Some(cap) = max_discount {
        ceiling = ceiling.min(cap.to_decimal().max(Decimal::ZERO));
    }

    raw.max(Decimal::ZERO).min(ceiling)
}

impl Promotion {
    /// Discount this promotion yields for a cart.
    pub fn discount_for(&self, subtotal: Money, items: &[LineItem]) -> Decimal {
        calculate_promotion_discount(self.kind, self.scope, self.max_discount, subtotal, items)
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

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn promo() -> Promotion {
        Promotion {
            id: "p1".to_string(),
            code: "SUMMER25".to_string(),
            kind: PromotionKind::Percentage(Rate::from_bps(2500)),
            scope: PromotionScope::All,
            max_discount: None,
            eligible_branches: None,
            eligible_clients: None,
            starts_on: day("2025-06-01"),
            ends_on: day("2025-08-31"),
            usage_limit_global: None,
            usage_limit_per_client: None,
            usage_count: 0,
            is_active: true,
        }
    }

    fn service(cents: i64) -> LineItem {
        LineItem::Service(ServiceLine {
            service_id: "svc".to_string(),
            name: "Rebond".to_string(),
            base_price: Money::from_cents(cents),
            stylist_id: "stylist-1".to_string(),
            client_type: ClientType::Regular,
            adjustment: Money::zero(),
            adjustment_reason: None,
        })
    }

    fn product(cents: i64) -> LineItem {
        LineItem::Product(ProductLine {
            product_id: "wax".to_string(),
            name: "Styling Wax".to_string(),
            base_price: Money::from_cents(cents),
            quantity: 1,
            unit_cost: Money::from_cents(cents / 2),
            commission_percentage: Rate::zero(),
            commissioner_id: None,
            batch_allocations: Vec::new(),
        })
    }

    const MID: &str = "2025-07-01";

    #[test]
    fn test_eligible_promotion_passes() {
        assert!(check_eligibility(&promo(), "makati", Some("c1"), 0, day(MID)).is_ok());
        assert!(check_eligibility(&promo(), "makati", None, 0, day(MID)).is_ok());
    }

    #[test]
    fn test_inactive_wins_over_expired() {
        let mut p = promo();
        p.is_active = false;
        let err = check_eligibility(&p, "makati", None, 0, day("2026-01-01")).unwrap_err();
        assert!(matches!(err, PromotionError::Inactive { .. }));
    }

    #[test]
    fn test_date_window_is_inclusive() {
        let p = promo();
        assert!(check_eligibility(&p, "b", None, 0, day("2025-06-01")).is_ok());
        assert!(check_eligibility(&p, "b", None, 0, day("2025-08-31")).is_ok());
        assert!(matches!(
            check_eligibility(&p, "b", None, 0, day("2025-05-31")),
            Err(PromotionError::NotYetValid { .. })
        ));
        assert!(matches!(
            check_eligibility(&p, "b", None, 0, day("2025-09-01")),
            Err(PromotionError::Expired { .. })
        ));
    }

    #[test]
    fn test_branch_and_client_restrictions() {
        let mut p = promo();
        p.eligible_branches = Some(vec!["makati".to_string()]);
        p.eligible_clients = Some(vec!["vip-1".to_string()]);

        assert!(matches!(
            check_eligibility(&p, "bgc", Some("vip-1"), 0, day(MID)),
            Err(PromotionError::BranchIneligible { .. })
        ));
        assert!(matches!(
            check_eligibility(&p, "makati", Some("walk-in"), 0, day(MID)),
            Err(PromotionError::ClientIneligible { .. })
        ));
        assert!(matches!(
            check_eligibility(&p, "makati", None, 0, day(MID)),
            Err(PromotionError::ClientIneligible { .. })
        ));
        assert!(check_eligibility(&p, "makati", Some("vip-1"), 0, day(MID)).is_ok());
    }

    #[test]
    fn test_empty_eligibility_list_is_unrestricted() {
        let mut p = promo();
        p.eligible_branches = Some(Vec::new());
        assert!(check_eligibility(&p, "anywhere", None, 0, day(MID)).is_ok());
    }

    #[test]
    fn test_usage_limits() {
        let mut p = promo();
        p.usage_limit_global = Some(10);
        p.usage_count = 10;
        assert!(matches!(
            check_eligibility(&p, "b", Some("c1"), 0, day(MID)),
            Err(PromotionError::UsageExceeded { limit: 10, .. })
        ));

        p.usage_count = 9;
        p.usage_limit_per_client = Some(1);
        assert!(matches!(
            check_eligibility(&p, "b", Some("c1"), 1, day(MID)),
            Err(PromotionError::ClientUsageExceeded { limit: 1, .. })
        ));
        assert!(check_eligibility(&p, "b", Some("c1"), 0, day(MID)).is_ok());
    }

    #[test]
    fn test_percentage_discount_capped_by_max() {
        let mut p = promo();
        p.max_discount = Some(Money::from_cents(10_000));
        let items = vec![service(100_000)];
        assert_eq!(p.discount_for(Money::from_cents(100_000), &items), dec!(10000));
    }

    #[test]
    fn test_fixed_discount_capped_by_subtotal() {
        let mut p = promo();
        p.kind = PromotionKind::Fixed(Money::from_cents(50_000));
        let items = vec![service(30_000)];
        assert_eq!(p.discount_for(Money::from_cents(30_000), &items), dec!(30000));
    }

    #[test]
    fn test_scoped_percentage_uses_matching_lines() {
        let items = vec![service(40_000), product(10_000)];
        let subtotal = Money::from_cents(50_000);

        let services = calculate_promotion_discount(
            PromotionKind::Percentage(Rate::from_bps(1000)),
            PromotionScope::ServicesOnly,
            None,
            subtotal,
            &items,
        );
        assert_eq!(services, dec!(4000));

        let products = calculate_promotion_discount(
            PromotionKind::Percentage(Rate::from_bps(1000)),
            PromotionScope::ProductsOnly,
            None,
            subtotal,
            &items,
        );
        assert_eq!(products, dec!(1000));
    }

    #[test]
    fn test_code_normalization() {
        assert_eq!(normalize_code("summer25"), "SUMMER25");
        assert_eq!(normalize_code(" Vip "), "VIP");
    }

    proptest! {
        #[test]
        fn prop_discount_within_subtotal_and_cap(
            subtotal in 0i64..1_000_000,
            bps in 0u32..20_000,
            fixed in 0i64..2_000_000,
            cap in proptest::option::of(0i64..500_000),
            use_fixed in any::<bool>(),
        ) {
            let kind = if use_fixed {
                PromotionKind::Fixed(Money::from_cents(fixed))
            } else {
                PromotionKind::Percentage(Rate::from_bps(bps))
            };
            let d = calculate_promotion_discount(
                kind,
                PromotionScope::All,
                cap.map(Money::from_cents),
                Money::from_cents(subtotal),
                &[],
            );
            prop_assert!(d >= Decimal::ZERO);
            prop_assert!(d <= Decimal::from(subtotal));
            if let Some(c) = cap {
                prop_assert!(d <= Decimal::from(c));
            }
        }
    }
}
