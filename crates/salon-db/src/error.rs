//! # Database Error Types
//!
//! Error types for database operations and for the finalize transaction.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  FinalizeError ← What a checkout submit reports                        │
//! │       │          (validation / stock / loyalty / conflict / fatal)     │
//! │       ▼                                                                 │
//! │  Checkout UI decides: fix input, retry, or give up                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use salon_core::{LoyaltyError, StockError, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate receipt number
    /// - Duplicate promotion code
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// SQLite reported the database as locked by another writer.
    #[error("Database is busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored data could not be decoded (bad JSON column, unknown enum).
    #[error("Corrupt {entity} row: {reason}")]
    Corrupt { entity: String, reason: String },

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn corrupt(entity: impl Into<String>, reason: impl ToString) -> Self {
        DbError::Corrupt {
            entity: entity.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the same operation may succeed if simply tried again.
    ///
    /// Finalize and ledger writes report these as a retryable conflict.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }
}

/// SQLite primary result code for SQLITE_BUSY (extended codes share the low byte).
const SQLITE_BUSY: i64 = 5;

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → code 5 / "locked" → Busy,
///                               "UNIQUE constraint failed" → UniqueViolation,
///                               otherwise QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let busy = db_err
                    .code()
                    .and_then(|c| c.parse::<i64>().ok())
                    .is_some_and(|c| c & 0xff == SQLITE_BUSY);

                if busy || msg.contains("database is locked") {
                    DbError::Busy(msg.to_string())
                } else if msg.contains("UNIQUE constraint failed") {
                    // "UNIQUE constraint failed: <table>.<column>"
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Finalize Error
// =============================================================================

/// Why a sale could not be finalized.
///
/// Every variant means nothing was written: the transaction is rolled back
/// before the error is returned.
///
/// ## Caller Handling
/// ```text
/// Validation          → fix the form (client name, receipt, cash)
/// InsufficientStock   → reduce quantity or remove the line
/// Loyalty             → correct the redemption amount
/// ConcurrencyConflict → re-quote and submit again (retryable)
/// Persistence         → report; nothing was applied
/// ```
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Line {line}: insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        line: usize,
        product_id: String,
        requested: i64,
        available: i64,
    },

    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),

    /// Another sale changed the same stock, points or promotion first.
    #[error("Concurrent update conflict on {resource}; please retry")]
    ConcurrencyConflict { resource: String },

    #[error("Persistence failure: {0}")]
    Persistence(DbError),
}

impl FinalizeError {
    /// Whether re-running the checkout may succeed without user changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FinalizeError::ConcurrencyConflict { .. })
    }

    pub fn conflict(resource: impl Into<String>) -> Self {
        FinalizeError::ConcurrencyConflict {
            resource: resource.into(),
        }
    }

    pub(crate) fn from_stock(line: usize, err: StockError) -> Self {
        match err {
            StockError::InsufficientStock {
                product_id,
                available,
                requested,
                ..
            } => FinalizeError::InsufficientStock {
                line,
                product_id,
                requested,
                available,
            },
        }
    }
}

/// Transient failures (lock contention, pool timeout) are a conflict;
/// everything else is fatal.
impl From<DbError> for FinalizeError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            FinalizeError::ConcurrencyConflict {
                resource: err.to_string(),
            }
        } else {
            FinalizeError::Persistence(err)
        }
    }
}

impl From<sqlx::Error> for FinalizeError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

pub type FinalizeResult<T> = Result<T, FinalizeError>;

// =============================================================================
// Ledger Error
// =============================================================================

/// Why a ledger write outside of a sale was refused: a delivery receipt,
/// an inter-branch transfer or a manual point credit.
///
/// As with [`FinalizeError`], nothing is written when this is returned.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("Concurrent update conflict on {resource}; please retry")]
    ConcurrencyConflict { resource: String },

    #[error("Persistence failure: {0}")]
    Persistence(DbError),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict { .. })
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            LedgerError::ConcurrencyConflict {
                resource: err.to_string(),
            }
        } else {
            LedgerError::Persistence(err)
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_maps_to_retryable_conflict() {
        let err: FinalizeError = DbError::Busy("database is locked".to_string()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_persistence_errors_are_not_retryable() {
        let err: FinalizeError = DbError::QueryFailed("syntax".to_string()).into();
        assert!(matches!(err, FinalizeError::Persistence(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_ledger_busy_is_retryable() {
        let err: LedgerError = DbError::Busy("database is locked".to_string()).into();
        assert!(err.is_retryable());
        let err: LedgerError = DbError::corrupt("batch", "bad date").into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transient_errors_convert_consistently() {
        for err in [DbError::Busy("database is locked".to_string()), DbError::PoolExhausted] {
            assert!(err.is_transient());
            let finalize: FinalizeError = err.into();
            assert!(finalize.is_retryable(), "{finalize}");
        }

        let ledger: LedgerError = DbError::PoolExhausted.into();
        assert!(matches!(ledger, LedgerError::ConcurrencyConflict { .. }));

        let fatal = DbError::UniqueViolation {
            field: "sales.receipt_number".to_string(),
            value: "unknown".to_string(),
        };
        assert!(!fatal.is_transient());
        assert!(!FinalizeError::from(fatal).is_retryable());
    }

    #[test]
    fn test_stock_error_keeps_line() {
        let err = FinalizeError::from_stock(
            2,
            StockError::InsufficientStock {
                branch_id: "makati".to_string(),
                product_id: "serum".to_string(),
                available: 1,
                requested: 3,
            },
        );
        assert_eq!(
            err.to_string(),
            "Line 2: insufficient stock for serum: requested 3, available 1"
        );
    }
}
