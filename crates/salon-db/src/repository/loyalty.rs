//! # Loyalty Repository
//!
//! Branch-scoped point balances and their history.
//!
//! A balance only changes through a guarded UPDATE or an additive upsert,
//! and every change appends a `loyalty_transactions` row carrying the
//! balance it produced.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use salon_core::validation::validate_id;
use salon_core::{LoyaltyAccount, LoyaltyEntry, LoyaltyEntryKind, ValidationError};

use crate::error::{DbResult, LedgerError};
use crate::repository::new_id;

#[derive(Debug, FromRow)]
struct EntryRow {
    id: String,
    client_id: String,
    branch_id: String,
    kind: LoyaltyEntryKind,
    points: i64,
    balance_after: i64,
    sale_id: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for LoyaltyEntry {
    fn from(row: EntryRow) -> Self {
        LoyaltyEntry {
            id: row.id,
            client_id: row.client_id,
            branch_id: row.branch_id,
            kind: row.kind,
            points: row.points,
            balance_after: row.balance_after,
            sale_id: row.sale_id,
            note: row.note,
            created_at: row.created_at,
        }
    }
}

/// A balance change about to be applied.
pub(crate) struct PointsChange<'a> {
    pub client_id: &'a str,
    pub branch_id: &'a str,
    pub points: i64,
    pub sale_id: Option<&'a str>,
    pub note: Option<&'a str>,
    pub now: DateTime<Utc>,
}

// =============================================================================
// Connection-level helpers (shared with the finalize transaction)
// =============================================================================

pub(crate) async fn fetch_balance(
    conn: &mut SqliteConnection,
    client_id: &str,
    branch_id: &str,
) -> DbResult<i64> {
    let balance: Option<i64> = sqlx::query_scalar(
        "SELECT points_balance FROM loyalty_accounts WHERE client_id = ?1 AND branch_id = ?2",
    )
    .bind(client_id)
    .bind(branch_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(balance.unwrap_or(0))
}

async fn record_entry(
    conn: &mut SqliteConnection,
    change: &PointsChange<'_>,
    kind: LoyaltyEntryKind,
    signed_points: i64,
    balance_after: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO loyalty_transactions (
            id, client_id, branch_id, kind, points, balance_after, sale_id, note, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(new_id())
    .bind(change.client_id)
    .bind(change.branch_id)
    .bind(kind)
    .bind(signed_points)
    .bind(balance_after)
    .bind(change.sale_id)
    .bind(change.note)
    .bind(change.now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Takes points out of a balance.
///
/// Returns `None` when the balance no longer covers the redemption (it
/// changed since it was read); nothing was written in that case.
pub(crate) async fn redeem_in(conn: &mut SqliteConnection, change: &PointsChange<'_>) -> DbResult<Option<i64>> {
    let result = sqlx::query(
        r#"
        UPDATE loyalty_accounts
        SET points_balance = points_balance - ?1,
            updated_at = ?2
        WHERE client_id = ?3 AND branch_id = ?4
          AND points_balance >= ?1
        "#,
    )
    .bind(change.points)
    .bind(change.now)
    .bind(change.client_id)
    .bind(change.branch_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let balance = fetch_balance(conn, change.client_id, change.branch_id).await?;
    record_entry(conn, change, LoyaltyEntryKind::Redeem, -change.points, balance).await?;
    Ok(Some(balance))
}

/// Adds points, opening the account if needed. Returns the new balance.
pub(crate) async fn add_in(
    conn: &mut SqliteConnection,
    change: &PointsChange<'_>,
    kind: LoyaltyEntryKind,
) -> DbResult<i64> {
    sqlx::query(
        r#"
        INSERT INTO loyalty_accounts (client_id, branch_id, points_balance, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (client_id, branch_id) DO UPDATE
        SET points_balance = loyalty_accounts.points_balance + excluded.points_balance,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(change.client_id)
    .bind(change.branch_id)
    .bind(change.points)
    .bind(change.now)
    .execute(&mut *conn)
    .await?;

    let balance = fetch_balance(conn, change.client_id, change.branch_id).await?;
    record_entry(conn, change, kind, change.points, balance).await?;
    Ok(balance)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for loyalty balances.
#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    /// Current balance; zero for a client with no account at the branch.
    pub async fn balance(&self, client_id: &str, branch_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        let balance = fetch_balance(&mut conn, client_id, branch_id).await?;
        debug!(client_id, branch_id, balance, "Loyalty balance");
        Ok(balance)
    }

    pub async fn account(&self, client_id: &str, branch_id: &str) -> DbResult<Option<LoyaltyAccount>> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT client_id, branch_id, points_balance FROM loyalty_accounts
             WHERE client_id = ?1 AND branch_id = ?2",
        )
        .bind(client_id)
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(client_id, branch_id, points_balance)| LoyaltyAccount {
            client_id,
            branch_id,
            points_balance,
        }))
    }

    /// Manual credit (opening balance, goodwill). Returns the new balance.
    pub async fn credit(
        &self,
        client_id: &str,
        branch_id: &str,
        points: i64,
        note: Option<&str>,
    ) -> Result<i64, LedgerError> {
        validate_id("client id", client_id)?;
        validate_id("branch id", branch_id)?;
        if points <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "points".to_string(),
            }
            .into());
        }

        let change = PointsChange {
            client_id,
            branch_id,
            points,
            sale_id: None,
            note,
            now: Utc::now(),
        };

        let mut tx = self.pool.begin().await?;
        let balance = add_in(&mut tx, &change, LoyaltyEntryKind::Adjust).await?;
        tx.commit().await?;

        info!(client_id, branch_id, points, balance, "Loyalty points credited");
        Ok(balance)
    }

    /// Every balance change for the client at the branch, oldest first.
    pub async fn history(&self, client_id: &str, branch_id: &str) -> DbResult<Vec<LoyaltyEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, client_id, branch_id, kind, points, balance_after, sale_id, note, created_at
            FROM loyalty_transactions
            WHERE client_id = ?1 AND branch_id = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(client_id)
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LoyaltyEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::database;

    #[tokio::test]
    async fn test_balances_are_branch_scoped() {
        let db = database().await;
        let loyalty = db.loyalty();

        assert_eq!(loyalty.balance("client-1", "makati").await.unwrap(), 0);
        assert!(loyalty.account("client-1", "makati").await.unwrap().is_none());

        assert_eq!(loyalty.credit("client-1", "makati", 100, Some("opening")).await.unwrap(), 100);
        assert_eq!(loyalty.credit("client-1", "makati", 50, None).await.unwrap(), 150);

        assert_eq!(loyalty.balance("client-1", "makati").await.unwrap(), 150);
        assert_eq!(loyalty.balance("client-1", "bgc").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_credit_rejects_non_positive_points() {
        let db = database().await;
        let err = db.loyalty().credit("client-1", "makati", 0, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_guarded_redeem() {
        let db = database().await;
        db.loyalty().credit("client-1", "makati", 100, None).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let change = |points| PointsChange {
            client_id: "client-1",
            branch_id: "makati",
            points,
            sale_id: Some("sale-1"),
            note: None,
            now: Utc::now(),
        };

        assert_eq!(redeem_in(&mut conn, &change(150)).await.unwrap(), None);
        assert_eq!(redeem_in(&mut conn, &change(40)).await.unwrap(), Some(60));
        drop(conn);

        let history = db.loyalty().history("client-1", "makati").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, LoyaltyEntryKind::Adjust);
        assert_eq!(history[1].kind, LoyaltyEntryKind::Redeem);
        assert_eq!(history[1].points, -40);
        assert_eq!(history[1].balance_after, 60);
        assert_eq!(history[1].sale_id.as_deref(), Some("sale-1"));
    }
}
