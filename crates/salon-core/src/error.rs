//! # Error Types
//!
//! Domain-specific error types for salon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  salon-core errors (this file)                                         │
//! │  ├── ValidationError  - Bad request data, finalize never attempted     │
//! │  ├── StockError       - FIFO shortfall for one line                    │
//! │  ├── PromotionError   - Code not applicable (non-fatal)                │
//! │  └── LoyaltyError     - Redemption must be corrected                   │
//! │                                                                         │
//! │  salon-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── FinalizeError    - What a checkout submit can return              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, product, amounts)
//! 3. Errors are enum variants, never String

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when the checkout request doesn't meet requirements.
/// They are recovered locally by the caller; finalize is never attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate receipt number).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// Cash received does not cover the bill.
    #[error("Insufficient cash received: total {total_cents}, received {received_cents}")]
    InsufficientPayment {
        total_cents: i64,
        received_cents: i64,
    },

    /// A cart line is inconsistent (e.g., allocations don't cover its quantity).
    #[error("Line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },
}

// =============================================================================
// Stock Error
// =============================================================================

/// Stock shortfall reported by the FIFO allocator.
///
/// ## User Workflow
/// ```text
/// Cart line: Keratin Serum × 5
///      │
///      ▼
/// preview_allocation(): batches hold 3
///      │
///      ▼
/// InsufficientStock { requested: 5, available: 3 }
///      │
///      ▼
/// Cashier reduces the quantity or removes the line
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("Insufficient stock for {product_id} at {branch_id}: available {available}, requested {requested}")]
    InsufficientStock {
        branch_id: String,
        product_id: String,
        available: i64,
        requested: i64,
    },
}

impl StockError {
    /// Units missing to satisfy the request.
    pub fn shortfall(&self) -> i64 {
        match self {
            StockError::InsufficientStock {
                available,
                requested,
                ..
            } => requested - available,
        }
    }
}

// =============================================================================
// Promotion Error
// =============================================================================

/// Why a promotion code cannot be applied.
///
/// Non-fatal: the sale proceeds without the promotion's discount.
/// Checks run in a fixed order; the first failing check wins.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PromotionError {
    #[error("Promotion code not found: {code}")]
    NotFound { code: String },

    #[error("Promotion {code} is inactive")]
    Inactive { code: String },

    #[error("Promotion {code} is not valid until {starts_on}")]
    NotYetValid { code: String, starts_on: String },

    #[error("Promotion {code} expired on {ended_on}")]
    Expired { code: String, ended_on: String },

    #[error("Promotion {code} is not valid at branch {branch_id}")]
    BranchIneligible { code: String, branch_id: String },

    #[error("Promotion {code} is not valid for client {client_id}")]
    ClientIneligible { code: String, client_id: String },

    #[error("Promotion {code} has reached its usage limit of {limit}")]
    UsageExceeded { code: String, limit: i64 },

    #[error("Client {client_id} has used promotion {code} the maximum {limit} times")]
    ClientUsageExceeded {
        code: String,
        client_id: String,
        limit: i64,
    },
}

// =============================================================================
// Loyalty Error
// =============================================================================

/// Loyalty redemption failures. These block finalize until corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum LoyaltyError {
    #[error("Insufficient loyalty points: balance {balance}, requested {requested}")]
    InsufficientPoints { balance: i64, requested: i64 },

    #[error("Redeeming {requested} points exceeds the bill total of {total_cents} centavos")]
    RedemptionExceedsTotal { requested: i64, total_cents: i64 },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StockError::InsufficientStock {
            branch_id: "makati".to_string(),
            product_id: "serum-50ml".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for serum-50ml at makati: available 3, requested 5"
        );
        assert_eq!(err.shortfall(), 2);
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "client name".to_string(),
        };
        assert_eq!(err.to_string(), "client name is required");

        let err = ValidationError::InsufficientPayment {
            total_cents: 47_000,
            received_cents: 40_000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient cash received: total 47000, received 40000"
        );
    }
}
