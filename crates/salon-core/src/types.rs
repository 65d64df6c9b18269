//! # Domain Types
//!
//! Cart lines and sale records shared by the billing engine and the
//! persistence layer.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────────────────┐       ┌─────────────────────────────┐   │
//! │  │  LineItem (tagged union)  │       │           Sale              │   │
//! │  │  ───────────────────────  │       │  ─────────────────────────  │   │
//! │  │  Service(ServiceLine)     │──────►│  items: Vec<LineItem>       │   │
//! │  │   base + adjustment       │       │  subtotal / discount / tax  │   │
//! │  │  Product(ProductLine)     │       │  total / receipt_number     │   │
//! │  │   base × quantity         │       │  (immutable once written)   │   │
//! │  │   batch_allocations[]     │       └─────────────────────────────┘   │
//! │  └───────────────────────────┘                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Price Invariant
//! `price` is never stored on a line. It is derived:
//! - service: `base_price + adjustment`
//! - product: `base_price × quantity`
//!
//! so the invariant cannot be violated by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::inventory::BatchAllocation;
use crate::money::{Money, Rate};

// =============================================================================
// Client Type
// =============================================================================

/// How the client came to the stylist who rendered a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// First visit.
    New,
    /// Returning client of this stylist.
    #[default]
    Regular,
    /// Client transferred from another stylist.
    Transfer,
}

// =============================================================================
// Line Items
// =============================================================================

/// A service rendered by a stylist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLine {
    /// Catalog service ID (owned by the external catalog).
    pub service_id: String,
    /// Display name at time of sale (frozen).
    pub name: String,
    /// Catalog price.
    pub base_price: Money,
    /// Stylist who rendered the service.
    pub stylist_id: String,
    pub client_type: ClientType,
    /// Manual price change; may be negative.
    pub adjustment: Money,
    pub adjustment_reason: Option<String>,
}

impl ServiceLine {
    /// Final price: `base_price + adjustment`.
    #[inline]
    pub fn price(&self) -> Money {
        self.base_price + self.adjustment
    }
}

/// A retail product sold from branch stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    pub product_id: String,
    /// Display name at time of sale (frozen).
    pub name: String,
    /// Unit selling price.
    pub base_price: Money,
    pub quantity: i64,
    /// Unit cost used as the commission base.
    pub unit_cost: Money,
    pub commission_percentage: Rate,
    /// Staff credited with commission, independent of any stylist.
    pub commissioner_id: Option<String>,
    /// Batch reservations from the last preview. Empty means "resolve
    /// FIFO at finalize".
    #[serde(default)]
    pub batch_allocations: Vec<BatchAllocation>,
}

impl ProductLine {
    /// Final price: `base_price × quantity`.
    #[inline]
    pub fn price(&self) -> Money {
        self.base_price.multiply_quantity(self.quantity)
    }

    /// Total units covered by `batch_allocations`.
    pub fn allocated_quantity(&self) -> i64 {
        self.batch_allocations.iter().map(|a| a.quantity).sum()
    }
}

/// One line of a cart or sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineItem {
    Service(ServiceLine),
    Product(ProductLine),
}

impl LineItem {
    /// Final line price.
    pub fn price(&self) -> Money {
        match self {
            LineItem::Service(s) => s.price(),
            LineItem::Product(p) => p.price(),
        }
    }

    /// Catalog price before adjustment/quantity.
    pub fn base_price(&self) -> Money {
        match self {
            LineItem::Service(s) => s.base_price,
            LineItem::Product(p) => p.base_price,
        }
    }

    /// Units on the line; services are always 1.
    pub fn quantity(&self) -> i64 {
        match self {
            LineItem::Service(_) => 1,
            LineItem::Product(p) => p.quantity,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LineItem::Service(s) => &s.name,
            LineItem::Product(p) => &p.name,
        }
    }

    pub fn as_service(&self) -> Option<&ServiceLine> {
        match self {
            LineItem::Service(s) => Some(s),
            LineItem::Product(_) => None,
        }
    }

    pub fn as_product(&self) -> Option<&ProductLine> {
        match self {
            LineItem::Product(p) => Some(p),
            LineItem::Service(_) => None,
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment. Requires `amount_tendered >= total`.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// GCash / Maya and similar wallets.
    EWallet,
}

// =============================================================================
// Sale
// =============================================================================

/// A finalized sale. Append-only: never updated after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub branch_id: String,
    pub client_id: Option<String>,
    pub client_name: String,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    /// Manual discount, rounded for display.
    pub discount: Money,
    pub promotion_code: Option<String>,
    /// Promotion discount, rounded for display.
    pub promotion_discount: Money,
    /// Service charge, rounded for display.
    pub service_charge: Money,
    pub tax: Money,
    pub loyalty_points_used: i64,
    pub loyalty_points_earned: i64,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub amount_tendered: Option<Money>,
    pub change_due: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Batch allocations per line index (product lines only).
    pub fn batch_allocations_by_line(&self) -> Vec<(usize, &[BatchAllocation])> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.as_product().map(|p| (i, p.batch_allocations.as_slice())))
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
