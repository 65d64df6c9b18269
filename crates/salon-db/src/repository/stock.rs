//! # Stock Ledger
//!
//! Sole writer of `stock_records.real_time_stock`.
//!
//! ## Mutation Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Stock Mutations (one transaction each)              │
//! │                                                                         │
//! │  receive()        + new batch          ──► movement  receipt     (+n)   │
//! │  finalize_sale()  − guarded decrement  ──► movement  sale        (−n)   │
//! │  transfer()       − source batches     ──► movement  transfer_out(−n)   │
//! │                   + destination batches──► movement  transfer_in (+n)   │
//! │                                                                         │
//! │  After every batch change:                                              │
//! │    real_time_stock = Σ remaining over non-expired batches of the key    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The counter is re-derived from batches instead of being adjusted in
//! place, so a missed update can always be repaired with [`StockLedger::recompute`].

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use salon_core::allocation::preview_allocation;
use salon_core::inventory::derived_stock;
use salon_core::validation::validate_id;
use salon_core::{
    Batch, BatchAllocation, MovementKind, NewBatch, StockMovement, StockRecord, ValidationError,
};

use crate::error::{DbResult, LedgerError};
use crate::repository::batch;
use crate::repository::new_id;

#[derive(Debug, FromRow)]
struct StockRecordRow {
    branch_id: String,
    product_id: String,
    real_time_stock: i64,
    updated_at: DateTime<Utc>,
}

impl From<StockRecordRow> for StockRecord {
    fn from(row: StockRecordRow) -> Self {
        StockRecord {
            branch_id: row.branch_id,
            product_id: row.product_id,
            real_time_stock: row.real_time_stock,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: String,
    branch_id: String,
    product_id: String,
    batch_id: String,
    kind: MovementKind,
    quantity: i64,
    resulting_stock: i64,
    reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        StockMovement {
            id: row.id,
            branch_id: row.branch_id,
            product_id: row.product_id,
            batch_id: row.batch_id,
            kind: row.kind,
            quantity: row.quantity,
            resulting_stock: row.resulting_stock,
            reference: row.reference,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Connection-level helpers (shared with the finalize transaction)
// =============================================================================

/// Re-derives and stores `real_time_stock` for one key. Returns the new value.
pub(crate) async fn recompute_in(
    conn: &mut SqliteConnection,
    branch_id: &str,
    product_id: &str,
    as_of: NaiveDate,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    let batches = batch::fetch_for_product(conn, branch_id, product_id).await?;
    let stock = derived_stock(&batches, as_of);

    sqlx::query(
        r#"
        INSERT INTO stock_records (branch_id, product_id, real_time_stock, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (branch_id, product_id) DO UPDATE
        SET real_time_stock = excluded.real_time_stock,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(branch_id)
    .bind(product_id)
    .bind(stock)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(stock)
}

pub(crate) async fn record_movement(conn: &mut SqliteConnection, movement: &StockMovement) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, branch_id, product_id, batch_id, kind,
            quantity, resulting_stock, reference, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.branch_id)
    .bind(&movement.product_id)
    .bind(&movement.batch_id)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(movement.resulting_stock)
    .bind(&movement.reference)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Where a stock change came from and when.
pub(crate) struct MovementContext<'a> {
    pub branch_id: &'a str,
    pub product_id: &'a str,
    pub kind: MovementKind,
    pub reference: &'a str,
    pub now: DateTime<Utc>,
}

impl MovementContext<'_> {
    fn as_of(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

/// Guarded decrement of one batch, followed by the counter refresh and
/// the movement row.
///
/// Returns `None` if the guard rejected the decrement (another writer got
/// there first, or the batch expired); nothing was written in that case.
pub(crate) async fn draw_from_batch(
    conn: &mut SqliteConnection,
    ctx: &MovementContext<'_>,
    allocation: &BatchAllocation,
) -> DbResult<Option<i64>> {
    let applied = batch::decrement(
        conn,
        &allocation.batch_id,
        ctx.branch_id,
        ctx.product_id,
        allocation.quantity,
        ctx.as_of(),
    )
    .await?;

    if !applied {
        warn!(
            batch_id = %allocation.batch_id,
            requested = allocation.quantity,
            "Guarded batch decrement rejected"
        );
        return Ok(None);
    }

    let resulting_stock = recompute_in(conn, ctx.branch_id, ctx.product_id, ctx.as_of(), ctx.now).await?;

    record_movement(
        conn,
        &StockMovement {
            id: new_id(),
            branch_id: ctx.branch_id.to_string(),
            product_id: ctx.product_id.to_string(),
            batch_id: allocation.batch_id.clone(),
            kind: ctx.kind,
            quantity: ctx.kind.signed(allocation.quantity),
            resulting_stock,
            reference: Some(ctx.reference.to_string()),
            created_at: ctx.now,
        },
    )
    .await?;

    Ok(Some(resulting_stock))
}

/// Inserts a batch and logs the inbound movement. Returns the new stock.
async fn add_batch(
    conn: &mut SqliteConnection,
    batch: &Batch,
    kind: MovementKind,
    reference: Option<String>,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    batch::insert_batch(conn, batch).await?;

    let resulting_stock =
        recompute_in(conn, &batch.branch_id, &batch.product_id, now.date_naive(), now).await?;

    record_movement(
        conn,
        &StockMovement {
            id: new_id(),
            branch_id: batch.branch_id.clone(),
            product_id: batch.product_id.clone(),
            batch_id: batch.id.clone(),
            kind,
            quantity: kind.signed(batch.remaining_quantity),
            resulting_stock,
            reference,
            created_at: now,
        },
    )
    .await?;

    Ok(resulting_stock)
}

// =============================================================================
// Transfer
// =============================================================================

/// Units of one product moving between branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_branch_id: String,
    pub to_branch_id: String,
    pub product_id: String,
    pub quantity: i64,
}

/// What a committed transfer did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub transfer_id: String,
    /// Source batches drawn from, FIFO.
    pub allocations: Vec<BatchAllocation>,
    /// One destination batch per source allocation.
    pub destination_batches: Vec<Batch>,
    pub source_stock: i64,
    pub destination_stock: i64,
}

fn validate_transfer(request: &TransferRequest) -> Result<(), ValidationError> {
    validate_id("source branch id", &request.from_branch_id)?;
    validate_id("destination branch id", &request.to_branch_id)?;
    validate_id("product id", &request.product_id)?;

    if request.quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "transfer quantity".to_string(),
        });
    }
    if request.from_branch_id == request.to_branch_id {
        return Err(ValidationError::InvalidFormat {
            field: "destination branch id".to_string(),
            reason: "must differ from the source branch".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Ledger
// =============================================================================

/// Stock counters and the mutations that are not part of a sale.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    pub async fn get(&self, branch_id: &str, product_id: &str) -> DbResult<Option<StockRecord>> {
        let row: Option<StockRecordRow> = sqlx::query_as(
            r#"
            SELECT branch_id, product_id, real_time_stock, updated_at
            FROM stock_records
            WHERE branch_id = ?1 AND product_id = ?2
            "#,
        )
        .bind(branch_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StockRecord::from))
    }

    /// `real_time_stock`, zero for a key that never received stock.
    pub async fn real_time_stock(&self, branch_id: &str, product_id: &str) -> DbResult<i64> {
        Ok(self
            .get(branch_id, product_id)
            .await?
            .map_or(0, |r| r.real_time_stock))
    }

    /// Movement log for a key, oldest first.
    pub async fn movements(&self, branch_id: &str, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(
            r#"
            SELECT id, branch_id, product_id, batch_id, kind,
                   quantity, resulting_stock, reference, created_at
            FROM stock_movements
            WHERE branch_id = ?1 AND product_id = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(branch_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Records a delivery as a new batch.
    pub async fn receive(&self, delivery: &NewBatch, received_at: DateTime<Utc>) -> Result<Batch, LedgerError> {
        validate_id("branch id", &delivery.branch_id)?;
        validate_id("product id", &delivery.product_id)?;
        validate_id("batch number", &delivery.batch_number)?;
        if delivery.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        if delivery.unit_cost.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: "unit cost".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        let batch = Batch {
            id: new_id(),
            branch_id: delivery.branch_id.clone(),
            product_id: delivery.product_id.clone(),
            batch_number: delivery.batch_number.clone(),
            remaining_quantity: delivery.quantity,
            received_at,
            expiration_date: delivery.expiration_date,
            unit_cost: delivery.unit_cost,
        };

        let mut tx = self.pool.begin().await?;
        let stock = add_batch(&mut tx, &batch, MovementKind::Receipt, None, received_at).await?;
        tx.commit().await?;

        info!(
            branch_id = %batch.branch_id,
            product_id = %batch.product_id,
            batch_number = %batch.batch_number,
            quantity = batch.remaining_quantity,
            real_time_stock = stock,
            "Batch received"
        );

        Ok(batch)
    }

    /// Moves units FIFO from one branch to another in one transaction.
    ///
    /// Each source batch drawn from becomes a destination batch with the
    /// same batch number, expiration date and unit cost.
    pub async fn transfer(
        &self,
        request: &TransferRequest,
        now: DateTime<Utc>,
    ) -> Result<TransferOutcome, LedgerError> {
        validate_transfer(request)?;

        let as_of = now.date_naive();
        let transfer_id = new_id();
        let mut tx = self.pool.begin().await?;

        let sources = batch::fetch_available(&mut tx, &request.from_branch_id, &request.product_id, as_of).await?;
        let allocations = preview_allocation(&sources, request.quantity, as_of)
            .into_result(&request.from_branch_id, &request.product_id)?;
        let by_id: HashMap<&str, &Batch> = sources.iter().map(|b| (b.id.as_str(), b)).collect();

        let out = MovementContext {
            branch_id: &request.from_branch_id,
            product_id: &request.product_id,
            kind: MovementKind::TransferOut,
            reference: &transfer_id,
            now,
        };

        let mut source_stock = 0;
        let mut destination_stock = 0;
        let mut destination_batches = Vec::with_capacity(allocations.len());

        for allocation in &allocations {
            source_stock = draw_from_batch(&mut tx, &out, allocation)
                .await?
                .ok_or_else(|| LedgerError::ConcurrencyConflict {
                    resource: format!("batch {}", allocation.batch_number),
                })?;

            let unit_cost = by_id
                .get(allocation.batch_id.as_str())
                .map(|b| b.unit_cost)
                .unwrap_or_default();

            let arrived = Batch {
                id: new_id(),
                branch_id: request.to_branch_id.clone(),
                product_id: request.product_id.clone(),
                batch_number: allocation.batch_number.clone(),
                remaining_quantity: allocation.quantity,
                received_at: now,
                expiration_date: allocation.expiration_date,
                unit_cost,
            };
            destination_stock =
                add_batch(&mut tx, &arrived, MovementKind::TransferIn, Some(transfer_id.clone()), now).await?;
            destination_batches.push(arrived);
        }

        tx.commit().await?;

        info!(
            transfer_id = %transfer_id,
            from = %request.from_branch_id,
            to = %request.to_branch_id,
            product_id = %request.product_id,
            quantity = request.quantity,
            "Stock transferred"
        );

        Ok(TransferOutcome {
            transfer_id,
            allocations,
            destination_batches,
            source_stock,
            destination_stock,
        })
    }

    /// Re-derives `real_time_stock` for one key as of `today`.
    pub async fn recompute(&self, branch_id: &str, product_id: &str, today: NaiveDate) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        let stock = recompute_in(&mut conn, branch_id, product_id, today, Utc::now()).await?;
        debug!(branch_id, product_id, stock, "Stock recomputed");
        Ok(stock)
    }

    /// Re-derives every key of a branch, e.g. after batches expired overnight.
    pub async fn recompute_branch(&self, branch_id: &str, today: NaiveDate) -> DbResult<usize> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let products: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT product_id FROM batches WHERE branch_id = ?1")
                .bind(branch_id)
                .fetch_all(&mut *tx)
                .await?;

        for product_id in &products {
            recompute_in(&mut tx, branch_id, product_id, today, now).await?;
        }
        tx.commit().await?;

        info!(branch_id, keys = products.len(), "Branch stock recomputed");
        Ok(products.len())
    }
}
