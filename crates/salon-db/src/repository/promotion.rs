//! # Promotion Repository
//!
//! Promotion codes, eligibility lookups and usage counters.
//!
//! ## Validation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  code ──► normalize ──► exists? ──► active? ──► in date window?          │
//! │                                          │                              │
//! │            branch eligible? ◄────────────┘                              │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │            client eligible? ──► global limit? ──► per-client limit?     │
//! │                                                                         │
//! │  First failing check wins and is reported as a PromotionError.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Eligible branch/client lists are stored as JSON arrays; NULL or an empty
//! array means unrestricted.

use chrono::{NaiveDate, Utc};
use sqlx::{Connection, FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use salon_core::promotion::{check_eligibility, normalize_code};
use salon_core::{Money, Promotion, PromotionError, PromotionKind, PromotionScope, Rate};

use crate::error::{DbError, DbResult};

const PROMOTION_COLUMNS: &str = "id, code, kind, value, scope, max_discount_cents, \
                                 eligible_branches, eligible_clients, starts_on, ends_on, \
                                 usage_limit_global, usage_limit_per_client, usage_count, is_active";

#[derive(Debug, FromRow)]
struct PromotionRow {
    id: String,
    code: String,
    kind: String,
    value: i64,
    scope: PromotionScope,
    max_discount_cents: Option<i64>,
    eligible_branches: Option<String>,
    eligible_clients: Option<String>,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
    usage_limit_global: Option<i64>,
    usage_limit_per_client: Option<i64>,
    usage_count: i64,
    is_active: bool,
}

fn parse_id_list(column: &str, raw: Option<String>) -> DbResult<Option<Vec<String>>> {
    raw.map(|json| {
        serde_json::from_str(&json).map_err(|e| DbError::corrupt("promotion", format!("{column}: {e}")))
    })
    .transpose()
}

fn encode_id_list(list: &Option<Vec<String>>) -> DbResult<Option<String>> {
    list.as_ref()
        .map(|ids| serde_json::to_string(ids).map_err(|e| DbError::Internal(e.to_string())))
        .transpose()
}

fn encode_kind(kind: PromotionKind) -> (&'static str, i64) {
    match kind {
        PromotionKind::Percentage(rate) => ("percentage", i64::from(rate.bps())),
        PromotionKind::Fixed(amount) => ("fixed", amount.cents()),
    }
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = DbError;

    fn try_from(row: PromotionRow) -> DbResult<Self> {
        let kind = match row.kind.as_str() {
            "percentage" => {
                let bps = u32::try_from(row.value)
                    .map_err(|_| DbError::corrupt("promotion", format!("percentage {}", row.value)))?;
                PromotionKind::Percentage(Rate::from_bps(bps))
            }
            "fixed" => PromotionKind::Fixed(Money::from_cents(row.value)),
            other => return Err(DbError::corrupt("promotion", format!("unknown kind '{other}'"))),
        };

        Ok(Promotion {
            id: row.id,
            code: row.code,
            kind,
            scope: row.scope,
            max_discount: row.max_discount_cents.map(Money::from_cents),
            eligible_branches: parse_id_list("eligible_branches", row.eligible_branches)?,
            eligible_clients: parse_id_list("eligible_clients", row.eligible_clients)?,
            starts_on: row.starts_on,
            ends_on: row.ends_on,
            usage_limit_global: row.usage_limit_global,
            usage_limit_per_client: row.usage_limit_per_client,
            usage_count: row.usage_count,
            is_active: row.is_active,
        })
    }
}

// =============================================================================
// Connection-level helpers (shared with the finalize transaction)
// =============================================================================

pub(crate) async fn fetch_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Promotion>> {
    let sql = format!("SELECT {PROMOTION_COLUMNS} FROM promotions WHERE code = ?1");
    let row: Option<PromotionRow> = sqlx::query_as(&sql)
        .bind(normalize_code(code))
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Promotion::try_from).transpose()
}

pub(crate) async fn fetch_client_usage(
    conn: &mut SqliteConnection,
    promotion_id: &str,
    client_id: &str,
) -> DbResult<i64> {
    let usage: Option<i64> = sqlx::query_scalar(
        "SELECT usage_count FROM promotion_usages WHERE promotion_id = ?1 AND client_id = ?2",
    )
    .bind(promotion_id)
    .bind(client_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(usage.unwrap_or(0))
}

/// Looks up `code` and runs every eligibility check.
///
/// The outer `Result` is a database failure; the inner one is the
/// business answer.
pub(crate) async fn validate_in(
    conn: &mut SqliteConnection,
    code: &str,
    branch_id: &str,
    client_id: Option<&str>,
    today: NaiveDate,
) -> DbResult<Result<Promotion, PromotionError>> {
    let Some(promotion) = fetch_by_code(conn, code).await? else {
        return Ok(Err(PromotionError::NotFound {
            code: normalize_code(code),
        }));
    };

    let client_usage = match client_id {
        Some(client) => fetch_client_usage(conn, &promotion.id, client).await?,
        None => 0,
    };

    Ok(check_eligibility(&promotion, branch_id, client_id, client_usage, today).map(|()| promotion))
}

/// Consumes one use of a promotion, globally and for the client.
///
/// Both counters are guarded by their limits; if either guard rejects,
/// neither counter moves and the matching [`PromotionError`] is returned.
pub(crate) async fn claim_usage(
    conn: &mut SqliteConnection,
    promotion: &Promotion,
    client_id: Option<&str>,
) -> DbResult<Result<(), PromotionError>> {
    let mut savepoint = conn.begin().await?;

    let global = sqlx::query(
        r#"
        UPDATE promotions
        SET usage_count = usage_count + 1
        WHERE id = ?1
          AND (usage_limit_global IS NULL OR usage_count < usage_limit_global)
        "#,
    )
    .bind(&promotion.id)
    .execute(&mut *savepoint)
    .await?;

    if global.rows_affected() == 0 {
        savepoint.rollback().await?;
        return Ok(Err(PromotionError::UsageExceeded {
            code: promotion.code.clone(),
            limit: promotion.usage_limit_global.unwrap_or(0),
        }));
    }

    if let Some(client) = client_id {
        let limit = promotion.usage_limit_per_client.unwrap_or(i64::MAX);
        let per_client = sqlx::query(
            r#"
            INSERT INTO promotion_usages (promotion_id, client_id, usage_count)
            VALUES (?1, ?2, 1)
            ON CONFLICT (promotion_id, client_id) DO UPDATE
            SET usage_count = promotion_usages.usage_count + 1
            WHERE promotion_usages.usage_count < ?3
            "#,
        )
        .bind(&promotion.id)
        .bind(client)
        .bind(limit)
        .execute(&mut *savepoint)
        .await?;

        if per_client.rows_affected() == 0 {
            savepoint.rollback().await?;
            return Ok(Err(PromotionError::ClientUsageExceeded {
                code: promotion.code.clone(),
                client_id: client.to_string(),
                limit,
            }));
        }
    }

    savepoint.commit().await?;
    Ok(Ok(()))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for promotion codes.
#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Stores a new promotion. The code is normalized before it is written.
    pub async fn insert(&self, promotion: &Promotion) -> DbResult<Promotion> {
        let mut stored = promotion.clone();
        stored.code = normalize_code(&promotion.code);

        let (kind, value) = encode_kind(stored.kind);
        let eligible_branches = encode_id_list(&stored.eligible_branches)?;
        let eligible_clients = encode_id_list(&stored.eligible_clients)?;

        debug!(code = %stored.code, kind, "Inserting promotion");

        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, code, kind, value, scope, max_discount_cents,
                eligible_branches, eligible_clients, starts_on, ends_on,
                usage_limit_global, usage_limit_per_client, usage_count, is_active,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.code)
        .bind(kind)
        .bind(value)
        .bind(stored.scope)
        .bind(stored.max_discount.map(|m| m.cents()))
        .bind(eligible_branches)
        .bind(eligible_clients)
        .bind(stored.starts_on)
        .bind(stored.ends_on)
        .bind(stored.usage_limit_global)
        .bind(stored.usage_limit_per_client)
        .bind(stored.usage_count)
        .bind(stored.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.contains("code") => {
                DbError::duplicate("promotion code", stored.code.clone())
            }
            other => other,
        })?;

        info!(code = %stored.code, "Promotion created");
        Ok(stored)
    }

    /// Case-insensitive lookup.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Promotion>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_code(&mut conn, code).await
    }

    /// How many times `client_id` has used the promotion.
    pub async fn client_usage(&self, promotion_id: &str, client_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        fetch_client_usage(&mut conn, promotion_id, client_id).await
    }

    /// Checks whether `code` applies to this branch and client today.
    pub async fn validate_code(
        &self,
        code: &str,
        branch_id: &str,
        client_id: Option<&str>,
        today: NaiveDate,
    ) -> DbResult<Result<Promotion, PromotionError>> {
        let mut conn = self.pool.acquire().await?;
        let verdict = validate_in(&mut conn, code, branch_id, client_id, today).await?;

        if let Err(reason) = &verdict {
            debug!(code, branch_id, %reason, "Promotion rejected");
        }
        Ok(verdict)
    }

    /// Records one use outside of a sale (e.g. a manually honoured voucher).
    pub async fn track_usage(
        &self,
        promotion: &Promotion,
        client_id: Option<&str>,
    ) -> DbResult<Result<(), PromotionError>> {
        let mut conn = self.pool.acquire().await?;
        let claimed = claim_usage(&mut conn, promotion, client_id).await?;

        match &claimed {
            Ok(()) => info!(code = %promotion.code, "Promotion usage recorded"),
            Err(reason) => warn!(code = %promotion.code, %reason, "Promotion usage refused"),
        }
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{database, day};

    fn promotion(code: &str) -> Promotion {
        Promotion {
            id: crate::repository::new_id(),
            code: code.to_string(),
            kind: PromotionKind::Percentage(Rate::from_bps(2000)),
            scope: PromotionScope::All,
            max_discount: Some(Money::from_major(500)),
            eligible_branches: Some(vec!["makati".to_string()]),
            eligible_clients: None,
            starts_on: day("2099-01-01"),
            ends_on: day("2099-12-31"),
            usage_limit_global: Some(2),
            usage_limit_per_client: Some(1),
            usage_count: 0,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_insert_normalizes_and_round_trips() {
        let db = database().await;
        let repo = db.promotions();
        let stored = repo.insert(&promotion(" summer20 ")).await.unwrap();
        assert_eq!(stored.code, "SUMMER20");

        let loaded = repo.get_by_code("Summer20").await.unwrap().unwrap();
        assert_eq!(loaded, stored);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = database().await;
        let repo = db.promotions();
        repo.insert(&promotion("SUMMER20")).await.unwrap();

        let err = repo.insert(&promotion("summer20")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { value, .. } if value == "SUMMER20"));
    }

    #[tokio::test]
    async fn test_validate_code_reasons() {
        let db = database().await;
        let repo = db.promotions();
        repo.insert(&promotion("SUMMER20")).await.unwrap();
        let today = day("2099-06-01");

        assert!(repo
            .validate_code("summer20", "makati", Some("client-1"), today)
            .await
            .unwrap()
            .is_ok());

        assert!(matches!(
            repo.validate_code("NOPE", "makati", None, today).await.unwrap(),
            Err(PromotionError::NotFound { code }) if code == "NOPE"
        ));
        assert!(matches!(
            repo.validate_code("SUMMER20", "bgc", None, today).await.unwrap(),
            Err(PromotionError::BranchIneligible { .. })
        ));
        assert!(matches!(
            repo.validate_code("SUMMER20", "makati", None, day("2100-01-01")).await.unwrap(),
            Err(PromotionError::Expired { .. })
        ));
    }

    #[tokio::test]
    async fn test_usage_limits_are_enforced() {
        let db = database().await;
        let repo = db.promotions();
        let promo = repo.insert(&promotion("SUMMER20")).await.unwrap();
        let today = day("2099-06-01");

        assert!(repo.track_usage(&promo, Some("client-1")).await.unwrap().is_ok());
        assert_eq!(repo.client_usage(&promo.id, "client-1").await.unwrap(), 1);

        // Same client again: per-client limit of 1, global counter untouched
        assert!(matches!(
            repo.track_usage(&promo, Some("client-1")).await.unwrap(),
            Err(PromotionError::ClientUsageExceeded { limit: 1, .. })
        ));
        assert_eq!(repo.get_by_code("SUMMER20").await.unwrap().unwrap().usage_count, 1);
        assert!(matches!(
            repo.validate_code("SUMMER20", "makati", Some("client-1"), today).await.unwrap(),
            Err(PromotionError::ClientUsageExceeded { .. })
        ));

        assert!(repo.track_usage(&promo, Some("client-2")).await.unwrap().is_ok());
        assert!(matches!(
            repo.track_usage(&promo, Some("client-3")).await.unwrap(),
            Err(PromotionError::UsageExceeded { limit: 2, .. })
        ));
        assert!(matches!(
            repo.validate_code("SUMMER20", "makati", Some("client-3"), today).await.unwrap(),
            Err(PromotionError::UsageExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_list_is_reported() {
        let db = database().await;
        let promo = db.promotions().insert(&promotion("SUMMER20")).await.unwrap();
        sqlx::query("UPDATE promotions SET eligible_clients = 'not json' WHERE id = ?1")
            .bind(&promo.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.promotions().get_by_code("SUMMER20").await.unwrap_err();
        assert!(matches!(err, DbError::Corrupt { .. }));
    }
}
