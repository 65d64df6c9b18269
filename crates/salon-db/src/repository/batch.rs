//! # Batch Repository
//!
//! Reads over the `batches` table and the guarded decrement used by
//! finalize and transfers.
//!
//! ## Batch Rows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  batches                                                                │
//! │  ├── (branch_id, product_id)   stock key                                │
//! │  ├── remaining_quantity        CHECK >= 0, only ever decremented        │
//! │  ├── expiration_date           NULL = never expires                     │
//! │  └── received_at               FIFO tie-break                           │
//! │                                                                         │
//! │  Rows are never deleted; a drained batch stays at remaining 0.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use salon_core::allocation::{preview_allocation, AllocationPreview};
use salon_core::{Batch, Money};

use crate::error::DbResult;

const BATCH_COLUMNS: &str = "id, branch_id, product_id, batch_number, remaining_quantity, \
                             received_at, expiration_date, unit_cost_cents";

/// Row shape of `batches`.
#[derive(Debug, FromRow)]
pub(crate) struct BatchRow {
    id: String,
    branch_id: String,
    product_id: String,
    batch_number: String,
    remaining_quantity: i64,
    received_at: DateTime<Utc>,
    expiration_date: Option<NaiveDate>,
    unit_cost_cents: i64,
}

impl From<BatchRow> for Batch {
    fn from(row: BatchRow) -> Self {
        Batch {
            id: row.id,
            branch_id: row.branch_id,
            product_id: row.product_id,
            batch_number: row.batch_number,
            remaining_quantity: row.remaining_quantity,
            received_at: row.received_at,
            expiration_date: row.expiration_date,
            unit_cost: Money::from_cents(row.unit_cost_cents),
        }
    }
}

// =============================================================================
// Connection-level helpers (shared with the finalize transaction)
// =============================================================================

pub(crate) async fn fetch_batch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Batch>> {
    let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = ?1");
    let row: Option<BatchRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.map(Batch::from))
}

/// Every batch for a key, oldest receipt first.
pub(crate) async fn fetch_for_product(
    conn: &mut SqliteConnection,
    branch_id: &str,
    product_id: &str,
) -> DbResult<Vec<Batch>> {
    let sql = format!(
        "SELECT {BATCH_COLUMNS} FROM batches
         WHERE branch_id = ?1 AND product_id = ?2
         ORDER BY received_at"
    );
    let rows: Vec<BatchRow> = sqlx::query_as(&sql)
        .bind(branch_id)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(Batch::from).collect())
}

/// Batches FIFO may draw from, already in FIFO order.
pub(crate) async fn fetch_available(
    conn: &mut SqliteConnection,
    branch_id: &str,
    product_id: &str,
    as_of: NaiveDate,
) -> DbResult<Vec<Batch>> {
    let sql = format!(
        "SELECT {BATCH_COLUMNS} FROM batches
         WHERE branch_id = ?1 AND product_id = ?2
           AND remaining_quantity > 0
           AND (expiration_date IS NULL OR expiration_date >= ?3)
         ORDER BY expiration_date IS NULL, expiration_date, received_at"
    );
    let rows: Vec<BatchRow> = sqlx::query_as(&sql)
        .bind(branch_id)
        .bind(product_id)
        .bind(as_of)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(Batch::from).collect())
}

pub(crate) async fn insert_batch(conn: &mut SqliteConnection, batch: &Batch) -> DbResult<()> {
    debug!(id = %batch.id, batch_number = %batch.batch_number, qty = batch.remaining_quantity, "Inserting batch");

    sqlx::query(
        r#"
        INSERT INTO batches (
            id, branch_id, product_id, batch_number, remaining_quantity,
            received_at, expiration_date, unit_cost_cents
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&batch.id)
    .bind(&batch.branch_id)
    .bind(&batch.product_id)
    .bind(&batch.batch_number)
    .bind(batch.remaining_quantity)
    .bind(batch.received_at)
    .bind(batch.expiration_date)
    .bind(batch.unit_cost.cents())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Takes `quantity` units out of a batch.
///
/// Succeeds only if the batch belongs to the key, is not expired as of
/// `as_of` and still holds at least `quantity`. Returns `false` when the
/// guard rejected the update; nothing was changed in that case.
pub(crate) async fn decrement(
    conn: &mut SqliteConnection,
    batch_id: &str,
    branch_id: &str,
    product_id: &str,
    quantity: i64,
    as_of: NaiveDate,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE batches
        SET remaining_quantity = remaining_quantity - ?1
        WHERE id = ?2
          AND branch_id = ?3
          AND product_id = ?4
          AND remaining_quantity >= ?1
          AND (expiration_date IS NULL OR expiration_date >= ?5)
        "#,
    )
    .bind(quantity)
    .bind(batch_id)
    .bind(branch_id)
    .bind(product_id)
    .bind(as_of)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for batch reads.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Batch>> {
        let mut conn = self.pool.acquire().await?;
        fetch_batch(&mut conn, id).await
    }

    /// Every batch for a key, drained and expired included, oldest first.
    pub async fn list_for_product(&self, branch_id: &str, product_id: &str) -> DbResult<Vec<Batch>> {
        let mut conn = self.pool.acquire().await?;
        fetch_for_product(&mut conn, branch_id, product_id).await
    }

    /// Non-expired batches with stock, in FIFO order.
    pub async fn available(
        &self,
        branch_id: &str,
        product_id: &str,
        as_of: NaiveDate,
    ) -> DbResult<Vec<Batch>> {
        let mut conn = self.pool.acquire().await?;
        fetch_available(&mut conn, branch_id, product_id, as_of).await
    }

    /// FIFO preview for `quantity` units. Read-only.
    pub async fn preview_allocation(
        &self,
        branch_id: &str,
        product_id: &str,
        quantity: i64,
        as_of: NaiveDate,
    ) -> DbResult<AllocationPreview> {
        let batches = self.available(branch_id, product_id, as_of).await?;
        let preview = preview_allocation(&batches, quantity, as_of);

        debug!(
            branch_id,
            product_id,
            quantity,
            shortfall = preview.shortfall,
            "Allocation preview"
        );

        Ok(preview)
    }

    /// Batches with stock that expire within `days` of `today` (inclusive).
    pub async fn expiring_within(
        &self,
        branch_id: &str,
        days: i64,
        today: NaiveDate,
    ) -> DbResult<Vec<Batch>> {
        let until = today + Duration::days(days.max(0));
        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM batches
             WHERE branch_id = ?1
               AND remaining_quantity > 0
               AND expiration_date IS NOT NULL
               AND expiration_date >= ?2 AND expiration_date <= ?3
             ORDER BY expiration_date, received_at"
        );
        let rows: Vec<BatchRow> = sqlx::query_as(&sql)
            .bind(branch_id)
            .bind(today)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Batch::from).collect())
    }

    /// Expired batches that still hold units (write-off candidates).
    pub async fn expired_with_stock(&self, branch_id: &str, today: NaiveDate) -> DbResult<Vec<Batch>> {
        let sql = format!(
            "SELECT {BATCH_COLUMNS} FROM batches
             WHERE branch_id = ?1
               AND remaining_quantity > 0
               AND expiration_date < ?2
             ORDER BY expiration_date"
        );
        let rows: Vec<BatchRow> = sqlx::query_as(&sql)
            .bind(branch_id)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Batch::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::{at, database, day, new_batch};

    #[tokio::test]
    async fn test_preview_follows_fifo_and_skips_expired() {
        let db = database().await;
        let stock = db.stock();
        stock
            .receive(&new_batch("makati", "serum", "OLD", 4, Some("2099-01-01")), at(2098, 1, 1))
            .await
            .unwrap();
        stock
            .receive(&new_batch("makati", "serum", "B2", 10, Some("2099-07-01")), at(2098, 1, 2))
            .await
            .unwrap();
        stock
            .receive(&new_batch("makati", "serum", "B1", 3, Some("2099-06-01")), at(2098, 1, 3))
            .await
            .unwrap();

        let preview = db
            .batches()
            .preview_allocation("makati", "serum", 5, day("2099-02-01"))
            .await
            .unwrap();

        let numbers: Vec<_> = preview.allocations.iter().map(|a| a.batch_number.as_str()).collect();
        assert_eq!(numbers, vec!["B1", "B2"]);
        assert_eq!(preview.allocations[0].quantity, 3);
        assert_eq!(preview.allocations[1].quantity, 2);
        assert_eq!(preview.shortfall, 0);

        // Nothing was reserved
        let all = db.batches().list_for_product("makati", "serum").await.unwrap();
        assert_eq!(all.iter().map(|b| b.remaining_quantity).sum::<i64>(), 17);
    }

    #[tokio::test]
    async fn test_preview_reports_shortfall() {
        let db = database().await;
        db.stock()
            .receive(&new_batch("makati", "serum", "B1", 2, None), at(2098, 1, 1))
            .await
            .unwrap();

        let preview = db
            .batches()
            .preview_allocation("makati", "serum", 5, day("2098-06-01"))
            .await
            .unwrap();
        assert_eq!(preview.allocated(), 2);
        assert_eq!(preview.shortfall, 3);
    }

    #[tokio::test]
    async fn test_expiry_reports() {
        let db = database().await;
        let stock = db.stock();
        stock
            .receive(&new_batch("makati", "serum", "SOON", 2, Some("2099-01-10")), at(2098, 1, 1))
            .await
            .unwrap();
        stock
            .receive(&new_batch("makati", "serum", "LATER", 2, Some("2099-06-01")), at(2098, 1, 1))
            .await
            .unwrap();
        stock
            .receive(&new_batch("makati", "serum", "GONE", 2, Some("2098-12-31")), at(2098, 1, 1))
            .await
            .unwrap();

        let today = day("2099-01-01");
        let expiring = db.batches().expiring_within("makati", 30, today).await.unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].batch_number, "SOON");

        let expired = db.batches().expired_with_stock("makati", today).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].batch_number, "GONE");
    }

    #[tokio::test]
    async fn test_get_by_id_round_trips_columns() {
        let db = database().await;
        let batch = db
            .stock()
            .receive(&new_batch("makati", "serum", "B1", 6, Some("2099-03-15")), at(2098, 5, 1))
            .await
            .unwrap();

        let loaded = db.batches().get_by_id(&batch.id).await.unwrap().unwrap();
        assert_eq!(loaded, batch);
        assert!(db.batches().get_by_id("missing").await.unwrap().is_none());
    }
}
