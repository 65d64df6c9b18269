//! # Loyalty Points
//!
//! Branch-scoped point balances. One point is worth one peso.
//!
//! Redemption is checked against the balance and the pre-redemption total
//! and only committed by finalize. Accrual happens after a successful
//! finalize: `floor(qualifying_spend_pesos × accrual_rate)`.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::billing::points_value;
use crate::error::LoyaltyError;
use crate::money::{Money, Rate, CENTS_PER_UNIT};

/// A client's balance at one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyAccount {
    pub client_id: String,
    pub branch_id: String,
    pub points_balance: i64,
}

/// What changed a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyEntryKind {
    Redeem,
    Accrue,
    /// Manual credit or opening balance.
    Adjust,
}

/// One row of a client's point history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyEntry {
    pub id: String,
    pub client_id: String,
    pub branch_id: String,
    pub kind: LoyaltyEntryKind,
    /// Signed: negative for redemptions.
    pub points: i64,
    pub balance_after: i64,
    pub sale_id: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Checks a redemption request.
///
/// `pre_redemption_total` is the exact bill total before points are
/// applied (see [`crate::billing::BillTotals::pre_redemption_total`]).
/// Points are compared against that total rounded to the centavo, the
/// amount the cashier sees: a ₱49.995 bill shows ₱50.00 and accepts 50
/// points.
pub fn check_redemption(
    balance: i64,
    requested: i64,
    pre_redemption_total: Decimal,
) -> Result<(), LoyaltyError> {
    if requested <= 0 {
        return Ok(());
    }

    if requested > balance {
        return Err(LoyaltyError::InsufficientPoints { balance, requested });
    }

    let shown_total = Money::round_from(pre_redemption_total);
    if points_value(requested) > shown_total.to_decimal() {
        return Err(LoyaltyError::RedemptionExceedsTotal {
            requested,
            total_cents: shown_total.cents(),
        });
    }

    Ok(())
}

/// Points earned on `qualifying_spend`, rounded down.
///
/// ```rust
/// use salon_core::loyalty::points_to_accrue;
/// use salon_core::money::{Money, Rate};
///
/// // 1 point per ₱100 spent
/// assert_eq!(points_to_accrue(Money::from_cents(47_050), Rate::from_bps(100)), 4);
/// ```
pub fn points_to_accrue(qualifying_spend: Money, accrual_rate: Rate) -> i64 {
    if !qualifying_spend.is_positive() || accrual_rate.is_zero() {
        return 0;
    }
    let pesos = qualifying_spend.to_decimal() / Decimal::from(CENTS_PER_UNIT);
    (pesos * accrual_rate.as_fraction())
        .floor()
        .to_i64()
        .unwrap_or(0)
}
