//! # salon-db: Database Layer for the Salon POS
//!
//! Persistence for batches, stock, promotions, loyalty points and sales.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Salon POS Data Flow                              │
//! │                                                                         │
//! │  Checkout screen (CheckoutRequest)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     salon-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ BatchRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ StockLedger   │    │ 001_initial_ │  │   │
//! │  │   │ CheckoutPolicy│    │ PromotionRepo │    │ schema.sql   │  │   │
//! │  │   │               │    │ LoyaltyRepo   │    │              │  │   │
//! │  │   │               │    │ SaleRepo      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │          ▲                                                      │   │
//! │  │          │ config.rs: salon.toml + SALON_* env                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - TOML configuration with environment overrides
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database, finalize and ledger error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use salon_db::{Database, SalonConfig};
//!
//! let config = SalonConfig::load("salon.toml")?;
//! let db = Database::from_config(&config).await?;
//!
//! // While the cart changes
//! let quote = db.sales().quote(&request).await?;
//!
//! // On submit
//! match db.sales().finalize_sale(&request).await {
//!     Ok(outcome) => print_receipt(&outcome.sale),
//!     Err(e) if e.is_retryable() => requote_and_retry(),
//!     Err(e) => show_error(e),
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, SalonConfig};
pub use error::{DbError, DbResult, FinalizeError, FinalizeResult, LedgerError};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::batch::BatchRepository;
pub use repository::loyalty::LoyaltyRepository;
pub use repository::promotion::PromotionRepository;
pub use repository::sale::{FinalizeOutcome, SaleRepository};
pub use repository::stock::{StockLedger, TransferOutcome, TransferRequest};
