//! # Repository Module
//!
//! Database repository implementations for the salon POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Checkout screen                                                       │
//! │       │                                                                 │
//! │       │  db.sales().quote(&request)                                    │
//! │       │  db.sales().finalize_sale(&request)                            │
//! │       ▼                                                                 │
//! │  SaleRepository ─────┬──► batch      (FIFO reads, guarded decrement)   │
//! │                      ├──► stock      (counters, movement log)          │
//! │                      ├──► promotion  (eligibility, usage counters)     │
//! │                      └──► loyalty    (guarded redeem, accrual)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each module exposes a pool-backed repository plus `pub(crate)` helpers
//! taking a `&mut SqliteConnection`, so the same SQL runs either standalone
//! or inside the finalize transaction (`&mut *tx`).
//!
//! ## Available Repositories
//!
//! - [`BatchRepository`] - Batch lookups, FIFO preview, expiry reports
//! - [`StockLedger`] - Stock counters, receipts, transfers, movement log
//! - [`PromotionRepository`] - Promotion codes and usage tracking
//! - [`LoyaltyRepository`] - Branch-scoped point balances
//! - [`SaleRepository`] - Quote and atomic finalize

pub mod batch;
pub mod loyalty;
pub mod promotion;
pub mod sale;
pub mod stock;

pub use batch::BatchRepository;
pub use loyalty::LoyaltyRepository;
pub use promotion::PromotionRepository;
pub use sale::{FinalizeOutcome, SaleRepository};
pub use stock::{StockLedger, TransferOutcome, TransferRequest};

/// Opaque row identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the repository tests.

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use salon_core::{Money, NewBatch};
    use tempfile::TempDir;

    use crate::pool::{Database, DbConfig};

    pub async fn database() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// On-disk database with a real multi-connection pool.
    pub async fn file_database(dir: &TempDir) -> Database {
        Database::new(DbConfig::new(dir.path().join("salon.db")).max_connections(5))
            .await
            .unwrap()
    }

    pub fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    pub fn new_batch(branch: &str, product: &str, number: &str, qty: i64, exp: Option<&str>) -> NewBatch {
        NewBatch {
            branch_id: branch.to_string(),
            product_id: product.to_string(),
            batch_number: number.to_string(),
            quantity: qty,
            expiration_date: exp.map(day),
            unit_cost: Money::from_cents(15_000),
        }
    }
}
