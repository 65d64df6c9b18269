//! # salon-core: Pure Billing & Inventory Logic for the Salon POS
//!
//! This crate is the **heart** of the salon POS. It contains the billing
//! and batch-allocation engine as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Salon POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │      Checkout UI / appointment screens (external collaborator) │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CheckoutRequest                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ salon-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌───────────┐ ┌───────────┐ ┌────────────────┐  │   │
//! │  │   │ billing  │ │allocation │ │ promotion │ │ loyalty        │  │   │
//! │  │   │ totals   │ │ FIFO      │ │ checks    │ │ commission     │  │   │
//! │  │   └──────────┘ └───────────┘ └───────────┘ └────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 salon-db (Database Layer)                       │   │
//! │  │        batches, stock ledger, atomic sale finalize              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money and Rate types (integer centavos, basis points)
//! - [`types`] - Cart lines (tagged Service/Product union) and Sale
//! - [`inventory`] - Batches, allocations, stock records and movements
//! - [`allocation`] - FIFO batch preview
//! - [`billing`] - Bill totals calculator
//! - [`promotion`] - Promotion eligibility and discount
//! - [`loyalty`] - Point redemption checks and accrual
//! - [`commission`] - Product commission
//! - [`checkout`] - Checkout request, policy and quote
//! - [`validation`] - Request validation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output; "today" is a parameter
//! 2. **Integer Money**: stored amounts are centavos (i64)
//! 3. **Exact Intermediates**: percentages are `Decimal`, rounded once
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use salon_core::billing::{compute_bill_totals, BillInput};
//! use salon_core::money::{Money, Rate};
//! use salon_core::types::{ClientType, LineItem, ServiceLine};
//!
//! let items = vec![LineItem::Service(ServiceLine {
//!     service_id: "color".to_string(),
//!     name: "Hair Color".to_string(),
//!     base_price: Money::from_major(1_500),
//!     stylist_id: "stylist-1".to_string(),
//!     client_type: ClientType::New,
//!     adjustment: Money::from_major(-100),
//!     adjustment_reason: Some("short hair".to_string()),
//! })];
//!
//! // 10% service charge on ₱1,400
//! let totals = compute_bill_totals(
//!     &BillInput::new(&items).with_service_charge(Rate::from_bps(1000)),
//! );
//! assert_eq!(totals.total, Money::from_major(1_540));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod billing;
pub mod checkout;
pub mod commission;
pub mod error;
pub mod inventory;
pub mod loyalty;
pub mod money;
pub mod promotion;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use salon_core::Money` instead of
// `use salon_core::money::Money`

pub use allocation::{preview_allocation, AllocationPreview};
pub use billing::{compute_bill_totals, BillInput, BillTotals, ManualDiscount};
pub use checkout::{CheckoutPolicy, CheckoutRequest, Quote};
pub use commission::{compute_commission, CommissionRecord};
pub use error::{LoyaltyError, PromotionError, StockError, ValidationError};
pub use inventory::{Batch, BatchAllocation, MovementKind, NewBatch, StockMovement, StockRecord};
pub use loyalty::{LoyaltyAccount, LoyaltyEntry, LoyaltyEntryKind};
pub use money::{Money, Rate};
pub use promotion::{Promotion, PromotionKind, PromotionScope};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single product line.
///
/// ## Business Reason
/// Catches typos (1000 instead of 10) before they reach stock.
pub const MAX_ITEM_QUANTITY: i64 = 999;
