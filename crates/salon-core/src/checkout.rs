//! # Checkout Request
//!
//! The immutable request object a cart becomes on every recomputation and
//! on submit. Nothing here holds state between calls.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cart UI state ──► CheckoutRequest (snapshot)                           │
//! │                        │                                                │
//! │          ┌─────────────┴──────────────┐                                 │
//! │          ▼                            ▼                                 │
//! │   quote (read-only)            finalize (transaction)                   │
//! │   validate_request             validate_request                         │
//! │   price_request                price_request                            │
//! │   preview allocations          commit allocations                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::allocation::AllocationPreview;
use crate::billing::{compute_bill_totals, BillInput, BillTotals, ManualDiscount};
use crate::error::{LoyaltyError, PromotionError, ValidationError};
use crate::money::{Money, Rate};
use crate::types::{LineItem, PaymentMethod};
use crate::validation::{
    validate_client_name, validate_id, validate_items, validate_non_negative,
    validate_receipt_number, ValidationResult,
};

// =============================================================================
// Policy
// =============================================================================

/// Branch-independent billing settings, loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutPolicy {
    /// Applied when a request does not carry its own rate.
    #[serde(rename = "service_charge_bps")]
    pub service_charge_rate: Rate,
    /// Points per peso of qualifying spend.
    #[serde(rename = "loyalty_accrual_bps")]
    pub loyalty_accrual_rate: Rate,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        CheckoutPolicy {
            service_charge_rate: Rate::zero(),
            // 1 point per ₱100
            loyalty_accrual_rate: Rate::from_bps(100),
        }
    }
}

// =============================================================================
// Request
// =============================================================================

/// Snapshot of a cart at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub branch_id: String,
    /// `None` for walk-ins; loyalty and client promotions need a client.
    pub client_id: Option<String>,
    pub client_name: String,
    pub receipt_number: String,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub discount: ManualDiscount,
    pub promotion_code: Option<String>,
    /// Overrides the policy's service-charge rate.
    pub service_charge_rate: Option<Rate>,
    #[serde(default)]
    pub tax: Money,
    #[serde(default)]
    pub loyalty_points_used: i64,
    pub payment_method: PaymentMethod,
    pub amount_tendered: Option<Money>,
}

impl CheckoutRequest {
    pub fn service_charge_rate(&self, policy: &CheckoutPolicy) -> Rate {
        self.service_charge_rate.unwrap_or(policy.service_charge_rate)
    }
}

/// Field-level validation. Cash sufficiency needs the total and is checked
/// separately.
pub fn validate_request(request: &CheckoutRequest) -> ValidationResult<()> {
    validate_id("branch id", &request.branch_id)?;
    validate_client_name(&request.client_name)?;
    validate_receipt_number(&request.receipt_number)?;
    validate_items(&request.items)?;
    validate_non_negative("tax", request.tax)?;

    if request.loyalty_points_used < 0 {
        return Err(ValidationError::OutOfRange {
            field: "loyalty points".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if request.loyalty_points_used > 0 && request.client_id.is_none() {
        return Err(ValidationError::Required {
            field: "client id".to_string(),
        });
    }

    if let ManualDiscount::Fixed(amount) = request.discount {
        validate_non_negative("discount", amount)?;
    }

    Ok(())
}

/// Prices a request given an already-resolved promotion discount.
pub fn price_request(
    request: &CheckoutRequest,
    promotion_discount: Decimal,
    policy: &CheckoutPolicy,
) -> BillTotals {
    compute_bill_totals(
        &BillInput::new(&request.items)
            .with_discount(request.discount)
            .with_promotion_discount(promotion_discount)
            .with_service_charge(request.service_charge_rate(policy))
            .with_tax(request.tax)
            .with_loyalty_points(request.loyalty_points_used),
    )
}

// =============================================================================
// Quote
// =============================================================================

/// Allocation preview for one product line of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LinePreview {
    pub line: usize,
    pub product_id: String,
    pub preview: AllocationPreview,
}

/// Read-only preview of what finalize would produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub totals: BillTotals,
    /// Set when a code was given and it does not apply.
    pub promotion_rejection: Option<PromotionError>,
    /// Set when the requested redemption would be refused.
    pub loyalty_error: Option<LoyaltyError>,
    pub loyalty_balance: Option<i64>,
    pub allocations: Vec<LinePreview>,
}

impl Quote {
    /// Whether every product line can be covered from stock.
    pub fn stock_satisfied(&self) -> bool {
        self.allocations.iter().all(|l| l.preview.is_satisfied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientType, ServiceLine};

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            branch_id: "makati".to_string(),
            client_id: Some("client-1".to_string()),
            client_name: "Maria Santos".to_string(),
            receipt_number: "MKT-0001".to_string(),
            items: vec![LineItem::Service(ServiceLine {
                service_id: "cut".to_string(),
                name: "Haircut".to_string(),
                base_price: Money::from_cents(50_000),
                stylist_id: "stylist-1".to_string(),
                client_type: ClientType::Regular,
                adjustment: Money::zero(),
                adjustment_reason: None,
            })],
            discount: ManualDiscount::Fixed(Money::from_cents(5_000)),
            promotion_code: None,
            service_charge_rate: None,
            tax: Money::from_cents(2_000),
            loyalty_points_used: 0,
            payment_method: PaymentMethod::Cash,
            amount_tendered: Some(Money::from_cents(50_000)),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(validate_request(&request()).is_ok());
    }

    #[test]
    fn test_missing_client_name_and_receipt() {
        let mut r = request();
        r.client_name = " ".to_string();
        assert!(matches!(
            validate_request(&r),
            Err(ValidationError::Required { field }) if field == "client name"
        ));

        let mut r = request();
        r.receipt_number = String::new();
        assert!(matches!(
            validate_request(&r),
            Err(ValidationError::Required { field }) if field == "receipt number"
        ));
    }

    #[test]
    fn test_redemption_requires_client() {
        let mut r = request();
        r.client_id = None;
        r.loyalty_points_used = 10;
        assert!(validate_request(&r).is_err());
    }

    #[test]
    fn test_price_request_uses_policy_service_charge() {
        let policy = CheckoutPolicy {
            service_charge_rate: Rate::from_bps(1000),
            ..CheckoutPolicy::default()
        };
        let totals = price_request(&request(), Decimal::ZERO, &policy);
        // (500 - 50) × 1.10 + 20 = 515
        assert_eq!(totals.total.cents(), 51_500);

        let mut r = request();
        r.service_charge_rate = Some(Rate::zero());
        assert_eq!(price_request(&r, Decimal::ZERO, &policy).total.cents(), 47_000);
    }

    #[test]
    fn test_policy_deserializes_from_bps() {
        let policy: CheckoutPolicy =
            serde_json::from_str(r#"{"service_charge_bps": 500}"#).unwrap();
        assert_eq!(policy.service_charge_rate, Rate::from_bps(500));
        assert_eq!(policy.loyalty_accrual_rate, Rate::from_bps(100));
    }
}
