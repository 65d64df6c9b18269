//! # Sale Repository
//!
//! Checkout quote and the atomic sale finalize.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. QUOTE (any number of times while the cart changes)                 │
//! │     └── quote() → Quote { totals, promotion verdict, FIFO previews }   │
//! │         read-only, nothing reserved                                    │
//! │                                                                         │
//! │  2. FINALIZE (once, on submit)                                         │
//! │     └── finalize_sale() → FinalizeOutcome { sale, commissions }        │
//! │         BEGIN                                                          │
//! │           claim promotion use      (dropped if no longer eligible)     │
//! │           price, check points, check cash                              │
//! │           guarded batch decrements + stock movements                   │
//! │           guarded point redemption, accrual                            │
//! │           sale, items, batch allocations, commissions                  │
//! │         COMMIT  (any failure: ROLLBACK, nothing visible)               │
//! │                                                                         │
//! │  A finalized sale is never updated or deleted.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use salon_core::allocation::preview_allocation;
use salon_core::checkout::{price_request, validate_request, LinePreview};
use salon_core::commission::compute_commission;
use salon_core::loyalty::{check_redemption, points_to_accrue};
use salon_core::validation::validate_cash_tendered;
use salon_core::{
    BatchAllocation, CheckoutPolicy, CheckoutRequest, ClientType, CommissionRecord, LineItem,
    LoyaltyEntryKind, Money, MovementKind, PaymentMethod, ProductLine, Promotion,
    PromotionError, Quote, Rate, Sale, ServiceLine, ValidationError,
};

use crate::error::{DbError, DbResult, FinalizeError, FinalizeResult};
use crate::repository::loyalty::{self, PointsChange};
use crate::repository::stock::{draw_from_batch, MovementContext};
use crate::repository::{batch, new_id, promotion};

/// What a committed finalize produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOutcome {
    pub sale: Sale,
    pub commissions: Vec<CommissionRecord>,
    /// The requested code was dropped for this reason; the sale went
    /// through without its discount.
    pub promotion_rejection: Option<PromotionError>,
}

/// Repository for sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    policy: CheckoutPolicy,
}

// =============================================================================
// Shared pricing steps
// =============================================================================

/// Looks up the requested code, if any. A rejected code is not an error.
async fn resolve_promotion(
    conn: &mut SqliteConnection,
    request: &CheckoutRequest,
    today: NaiveDate,
) -> DbResult<(Option<Promotion>, Option<PromotionError>)> {
    let Some(code) = request
        .promotion_code
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    else {
        return Ok((None, None));
    };

    let verdict = promotion::validate_in(
        conn,
        code,
        &request.branch_id,
        request.client_id.as_deref(),
        today,
    )
    .await?;

    Ok(match verdict {
        Ok(promotion) => (Some(promotion), None),
        Err(reason) => (None, Some(reason)),
    })
}

fn promotion_discount(promotion: Option<&Promotion>, items: &[LineItem]) -> Decimal {
    let subtotal: Money = items.iter().map(LineItem::price).sum();
    promotion.map_or(Decimal::ZERO, |p| p.discount_for(subtotal, items))
}

impl SaleRepository {
    pub fn new(pool: SqlitePool, policy: CheckoutPolicy) -> Self {
        SaleRepository { pool, policy }
    }

    // =========================================================================
    // Quote
    // =========================================================================

    /// Read-only preview of a checkout as of today.
    pub async fn quote(&self, request: &CheckoutRequest) -> DbResult<Quote> {
        self.quote_at(request, Utc::now().date_naive()).await
    }

    /// Read-only preview of a checkout as of `today`.
    ///
    /// Runs the same pricing as finalize but reports problems instead of
    /// failing on them, so a half-filled cart can still be priced.
    pub async fn quote_at(&self, request: &CheckoutRequest, today: NaiveDate) -> DbResult<Quote> {
        let mut conn = self.pool.acquire().await?;

        let (promotion, promotion_rejection) = resolve_promotion(&mut conn, request, today).await?;
        let totals = price_request(
            request,
            promotion_discount(promotion.as_ref(), &request.items),
            &self.policy,
        );

        let loyalty_balance = match request.client_id.as_deref() {
            Some(client) => Some(loyalty::fetch_balance(&mut conn, client, &request.branch_id).await?),
            None => None,
        };
        let loyalty_error = if request.loyalty_points_used > 0 {
            check_redemption(
                loyalty_balance.unwrap_or(0),
                request.loyalty_points_used,
                totals.pre_redemption_total,
            )
            .err()
        } else {
            None
        };

        let mut allocations = Vec::new();
        for (line, product) in request
            .items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.as_product().map(|p| (i, p)))
        {
            let batches =
                batch::fetch_available(&mut conn, &request.branch_id, &product.product_id, today).await?;
            allocations.push(LinePreview {
                line,
                product_id: product.product_id.clone(),
                preview: preview_allocation(&batches, product.quantity, today),
            });
        }

        debug!(
            branch_id = %request.branch_id,
            total = %totals.total,
            lines = request.items.len(),
            "Checkout quoted"
        );

        Ok(Quote {
            totals,
            promotion_rejection,
            loyalty_error,
            loyalty_balance,
            allocations,
        })
    }

    // =========================================================================
    // Finalize
    // =========================================================================

    /// Commits a checkout as a sale.
    pub async fn finalize_sale(&self, request: &CheckoutRequest) -> FinalizeResult<FinalizeOutcome> {
        self.finalize_sale_at(request, Utc::now()).await
    }

    /// Commits a checkout as a sale at `now`.
    ///
    /// Everything happens in one transaction. Product lines that carry
    /// batch allocations from a quote are committed against exactly those
    /// batches; if any of them changed in the meantime the finalize fails
    /// with [`FinalizeError::ConcurrencyConflict`]. Lines without
    /// allocations are allocated FIFO inside the transaction.
    pub async fn finalize_sale_at(
        &self,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> FinalizeResult<FinalizeOutcome> {
        validate_request(request)?;

        let today = now.date_naive();
        let sale_id = new_id();
        let branch_id = request.branch_id.as_str();
        let client_id = request.client_id.as_deref();

        debug!(sale_id = %sale_id, receipt_number = %request.receipt_number, "Finalizing sale");

        let mut tx = self.pool.begin().await?;

        // Promotion: claim one use now, or drop the code
        let (promotion, promotion_rejection) = match resolve_promotion(&mut tx, request, today).await? {
            (Some(promo), _) => match promotion::claim_usage(&mut tx, &promo, client_id).await? {
                Ok(()) => (Some(promo), None),
                Err(reason) => (None, Some(reason)),
            },
            unapplied => unapplied,
        };
        if let Some(reason) = &promotion_rejection {
            warn!(sale_id = %sale_id, %reason, "Promotion dropped from sale");
        }

        let totals = price_request(
            request,
            promotion_discount(promotion.as_ref(), &request.items),
            &self.policy,
        );

        if request.loyalty_points_used > 0 {
            let client = client_id.ok_or_else(|| ValidationError::Required {
                field: "client id".to_string(),
            })?;
            let balance = loyalty::fetch_balance(&mut tx, client, branch_id).await?;
            check_redemption(balance, request.loyalty_points_used, totals.pre_redemption_total)?;
        }

        validate_cash_tendered(request.payment_method, request.amount_tendered, totals.total)?;

        // Stock
        let mut items = request.items.clone();
        for (line, item) in items.iter_mut().enumerate() {
            let LineItem::Product(product) = item else {
                continue;
            };

            if product.batch_allocations.is_empty() {
                let batches = batch::fetch_available(&mut tx, branch_id, &product.product_id, today).await?;
                product.batch_allocations = preview_allocation(&batches, product.quantity, today)
                    .into_result(branch_id, &product.product_id)
                    .map_err(|e| {
                        warn!(sale_id = %sale_id, line, product_id = %product.product_id, "Insufficient stock");
                        FinalizeError::from_stock(line, e)
                    })?;
            }

            let ctx = MovementContext {
                branch_id,
                product_id: &product.product_id,
                kind: MovementKind::Sale,
                reference: &sale_id,
                now,
            };
            for allocation in &product.batch_allocations {
                if draw_from_batch(&mut tx, &ctx, allocation).await?.is_none() {
                    return Err(rejected_draw(&mut tx, line, &ctx, allocation).await);
                }
            }
        }

        // Loyalty
        let mut points_earned = 0;
        if let Some(client) = client_id {
            let mut change = PointsChange {
                client_id: client,
                branch_id,
                points: request.loyalty_points_used,
                sale_id: Some(&sale_id),
                note: None,
                now,
            };

            if change.points > 0 && loyalty::redeem_in(&mut tx, &change).await?.is_none() {
                warn!(sale_id = %sale_id, client_id = client, "Loyalty balance changed during finalize");
                return Err(FinalizeError::conflict(format!("loyalty balance of {client}")));
            }

            points_earned = points_to_accrue(totals.total, self.policy.loyalty_accrual_rate);
            if points_earned > 0 {
                change.points = points_earned;
                loyalty::add_in(&mut tx, &change, LoyaltyEntryKind::Accrue).await?;
            }
        }

        let change_due = match (request.payment_method, request.amount_tendered) {
            (PaymentMethod::Cash, Some(tendered)) => tendered - totals.total,
            _ => Money::zero(),
        };

        let sale = Sale {
            id: sale_id.clone(),
            receipt_number: request.receipt_number.trim().to_string(),
            branch_id: branch_id.to_string(),
            client_id: request.client_id.clone(),
            client_name: request.client_name.trim().to_string(),
            items,
            subtotal: totals.subtotal,
            discount: totals.discount_money(),
            promotion_code: promotion.as_ref().map(|p| p.code.clone()),
            promotion_discount: totals.promotion_discount_money(),
            service_charge: totals.service_charge_money(),
            tax: totals.tax,
            loyalty_points_used: request.loyalty_points_used,
            loyalty_points_earned: points_earned,
            total: totals.total,
            payment_method: request.payment_method,
            amount_tendered: request.amount_tendered,
            change_due,
            created_at: now,
        };

        insert_sale(&mut tx, &sale, promotion.as_ref().map(|p| p.id.as_str()))
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { field, .. } if field.contains("receipt_number") => {
                    ValidationError::Duplicate {
                        field: "receipt number".to_string(),
                        value: sale.receipt_number.clone(),
                    }
                    .into()
                }
                other => FinalizeError::from(other),
            })?;

        let mut commissions = Vec::new();
        for (line_no, item) in sale.items.iter().enumerate() {
            let sale_item_id = insert_item(&mut tx, &sale.id, line_no, item).await?;

            if let LineItem::Product(product) = item {
                for allocation in &product.batch_allocations {
                    insert_item_batch(&mut tx, &sale_item_id, allocation).await?;
                }
                if let Some(record) = compute_commission(product) {
                    insert_commission(&mut tx, &sale.id, &sale_item_id, &record, now).await?;
                    commissions.push(record);
                }
            }
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            receipt_number = %sale.receipt_number,
            total = %sale.total,
            points_used = sale.loyalty_points_used,
            points_earned = sale.loyalty_points_earned,
            "Sale finalized"
        );

        Ok(FinalizeOutcome {
            sale,
            commissions,
            promotion_rejection,
        })
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let row: Option<SaleRow> = sqlx::query_as(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_sale(row).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_by_receipt(&self, receipt_number: &str) -> DbResult<Option<Sale>> {
        let row: Option<SaleRow> =
            sqlx::query_as(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE receipt_number = ?1"))
                .bind(receipt_number.trim())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(self.load_sale(row).await?)),
            None => Ok(None),
        }
    }

    /// Commission records written by a sale, in line order.
    pub async fn commissions_for_sale(&self, sale_id: &str) -> DbResult<Vec<CommissionRecord>> {
        let rows: Vec<CommissionRow> = sqlx::query_as(
            r#"
            SELECT c.product_id, c.commissioner_id, c.unit_cost_cents,
                   c.quantity, c.percentage_bps, c.amount_cents
            FROM commissions c
            JOIN sale_items si ON si.id = c.sale_item_id
            WHERE c.sale_id = ?1
            ORDER BY si.line_no
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CommissionRecord::try_from).collect()
    }

    async fn load_sale(&self, row: SaleRow) -> DbResult<Sale> {
        let item_rows: Vec<SaleItemRow> = sqlx::query_as(
            r#"
            SELECT id, kind, item_id, name, base_price_cents, quantity,
                   stylist_id, client_type, adjustment_cents, adjustment_reason,
                   unit_cost_cents, commission_bps, commissioner_id
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let allocation_rows: Vec<AllocationRow> = sqlx::query_as(
            r#"
            SELECT sib.sale_item_id, sib.batch_id, sib.batch_number, sib.quantity, sib.expiration_date
            FROM sale_item_batches sib
            JOIN sale_items si ON si.id = sib.sale_item_id
            WHERE si.sale_id = ?1
            ORDER BY si.line_no, sib.rowid
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let mut allocations: HashMap<String, Vec<BatchAllocation>> = HashMap::new();
        for a in allocation_rows {
            allocations.entry(a.sale_item_id).or_default().push(BatchAllocation {
                batch_id: a.batch_id,
                batch_number: a.batch_number,
                quantity: a.quantity,
                expiration_date: a.expiration_date,
            });
        }

        let items = item_rows
            .into_iter()
            .map(|item| {
                let batches = allocations.remove(&item.id).unwrap_or_default();
                item.into_line(batches)
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(row.into_sale(items))
    }
}

/// Explains why a guarded decrement was refused.
async fn rejected_draw(
    conn: &mut SqliteConnection,
    line: usize,
    ctx: &MovementContext<'_>,
    allocation: &BatchAllocation,
) -> FinalizeError {
    let today = ctx.now.date_naive();
    match batch::fetch_batch(conn, &allocation.batch_id).await {
        // Waiting will not make an expired batch sellable again
        Ok(Some(b)) if b.is_expired(today) => ValidationError::InvalidLine {
            line,
            reason: format!(
                "batch {} expired on {}",
                allocation.batch_number,
                b.expiration_date.map(|d| d.to_string()).unwrap_or_default()
            ),
        }
        .into(),
        Ok(Some(b)) if b.branch_id == ctx.branch_id && b.product_id == ctx.product_id => {
            FinalizeError::conflict(format!("batch {}", allocation.batch_number))
        }
        Ok(_) => ValidationError::InvalidLine {
            line,
            reason: format!(
                "batch {} does not hold {} at this branch",
                allocation.batch_number, ctx.product_id
            ),
        }
        .into(),
        Err(e) => e.into(),
    }
}

// =============================================================================
// Writes
// =============================================================================

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale, promotion_id: Option<&str>) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, receipt_number, branch_id, client_id, client_name,
            subtotal_cents, discount_cents, promotion_id, promotion_code,
            promotion_discount_cents, service_charge_cents, tax_cents,
            loyalty_points_used, loyalty_points_earned, total_cents,
            payment_method, amount_tendered_cents, change_due_cents, created_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12,
            ?13, ?14, ?15,
            ?16, ?17, ?18, ?19
        )
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.receipt_number)
    .bind(&sale.branch_id)
    .bind(&sale.client_id)
    .bind(&sale.client_name)
    .bind(sale.subtotal.cents())
    .bind(sale.discount.cents())
    .bind(promotion_id)
    .bind(&sale.promotion_code)
    .bind(sale.promotion_discount.cents())
    .bind(sale.service_charge.cents())
    .bind(sale.tax.cents())
    .bind(sale.loyalty_points_used)
    .bind(sale.loyalty_points_earned)
    .bind(sale.total.cents())
    .bind(sale.payment_method)
    .bind(sale.amount_tendered.map(|m| m.cents()))
    .bind(sale.change_due.cents())
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Snapshot of one line; returns the new sale item id.
async fn insert_item(
    conn: &mut SqliteConnection,
    sale_id: &str,
    line_no: usize,
    item: &LineItem,
) -> DbResult<String> {
    let id = new_id();

    let (kind, item_id) = match item {
        LineItem::Service(s) => ("service", s.service_id.as_str()),
        LineItem::Product(p) => ("product", p.product_id.as_str()),
    };
    let service = item.as_service();
    let product = item.as_product();

    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, line_no, kind, item_id, name,
            base_price_cents, price_cents, quantity,
            stylist_id, client_type, adjustment_cents, adjustment_reason,
            unit_cost_cents, commission_bps, commissioner_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
    )
    .bind(&id)
    .bind(sale_id)
    .bind(line_no as i64)
    .bind(kind)
    .bind(item_id)
    .bind(item.name())
    .bind(item.base_price().cents())
    .bind(item.price().cents())
    .bind(item.quantity())
    .bind(service.map(|s| s.stylist_id.as_str()))
    .bind(service.map(|s| s.client_type))
    .bind(service.map_or(0, |s| s.adjustment.cents()))
    .bind(service.and_then(|s| s.adjustment_reason.as_deref()))
    .bind(product.map(|p| p.unit_cost.cents()))
    .bind(product.map(|p| i64::from(p.commission_percentage.bps())))
    .bind(product.and_then(|p| p.commissioner_id.as_deref()))
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

async fn insert_item_batch(
    conn: &mut SqliteConnection,
    sale_item_id: &str,
    allocation: &BatchAllocation,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_item_batches (sale_item_id, batch_id, batch_number, quantity, expiration_date)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(sale_item_id)
    .bind(&allocation.batch_id)
    .bind(&allocation.batch_number)
    .bind(allocation.quantity)
    .bind(allocation.expiration_date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_commission(
    conn: &mut SqliteConnection,
    sale_id: &str,
    sale_item_id: &str,
    record: &CommissionRecord,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO commissions (
            id, sale_id, sale_item_id, product_id, commissioner_id,
            unit_cost_cents, quantity, percentage_bps, amount_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(new_id())
    .bind(sale_id)
    .bind(sale_item_id)
    .bind(&record.product_id)
    .bind(&record.commissioner_id)
    .bind(record.unit_cost.cents())
    .bind(record.quantity)
    .bind(i64::from(record.percentage.bps()))
    .bind(record.amount.cents())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Rows
// =============================================================================

const SALE_COLUMNS: &str = "id, receipt_number, branch_id, client_id, client_name, \
                            subtotal_cents, discount_cents, promotion_code, promotion_discount_cents, \
                            service_charge_cents, tax_cents, loyalty_points_used, loyalty_points_earned, \
                            total_cents, payment_method, amount_tendered_cents, change_due_cents, created_at";

#[derive(Debug, FromRow)]
struct SaleRow {
    id: String,
    receipt_number: String,
    branch_id: String,
    client_id: Option<String>,
    client_name: String,
    subtotal_cents: i64,
    discount_cents: i64,
    promotion_code: Option<String>,
    promotion_discount_cents: i64,
    service_charge_cents: i64,
    tax_cents: i64,
    loyalty_points_used: i64,
    loyalty_points_earned: i64,
    total_cents: i64,
    payment_method: PaymentMethod,
    amount_tendered_cents: Option<i64>,
    change_due_cents: i64,
    created_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<LineItem>) -> Sale {
        Sale {
            id: self.id,
            receipt_number: self.receipt_number,
            branch_id: self.branch_id,
            client_id: self.client_id,
            client_name: self.client_name,
            items,
            subtotal: Money::from_cents(self.subtotal_cents),
            discount: Money::from_cents(self.discount_cents),
            promotion_code: self.promotion_code,
            promotion_discount: Money::from_cents(self.promotion_discount_cents),
            service_charge: Money::from_cents(self.service_charge_cents),
            tax: Money::from_cents(self.tax_cents),
            loyalty_points_used: self.loyalty_points_used,
            loyalty_points_earned: self.loyalty_points_earned,
            total: Money::from_cents(self.total_cents),
            payment_method: self.payment_method,
            amount_tendered: self.amount_tendered_cents.map(Money::from_cents),
            change_due: Money::from_cents(self.change_due_cents),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleItemRow {
    id: String,
    kind: String,
    item_id: String,
    name: String,
    base_price_cents: i64,
    quantity: i64,
    stylist_id: Option<String>,
    client_type: Option<ClientType>,
    adjustment_cents: i64,
    adjustment_reason: Option<String>,
    unit_cost_cents: Option<i64>,
    commission_bps: Option<i64>,
    commissioner_id: Option<String>,
}

fn decode_bps(entity: &str, bps: i64) -> DbResult<Rate> {
    u32::try_from(bps)
        .map(Rate::from_bps)
        .map_err(|_| DbError::corrupt(entity, format!("rate {bps} bps")))
}

impl SaleItemRow {
    fn into_line(self, batch_allocations: Vec<BatchAllocation>) -> DbResult<LineItem> {
        match self.kind.as_str() {
            "service" => Ok(LineItem::Service(ServiceLine {
                service_id: self.item_id,
                name: self.name,
                base_price: Money::from_cents(self.base_price_cents),
                stylist_id: self
                    .stylist_id
                    .ok_or_else(|| DbError::corrupt("sale item", format!("{} has no stylist", self.id)))?,
                client_type: self.client_type.unwrap_or_default(),
                adjustment: Money::from_cents(self.adjustment_cents),
                adjustment_reason: self.adjustment_reason,
            })),
            "product" => Ok(LineItem::Product(ProductLine {
                product_id: self.item_id,
                name: self.name,
                base_price: Money::from_cents(self.base_price_cents),
                quantity: self.quantity,
                unit_cost: Money::from_cents(self.unit_cost_cents.unwrap_or(0)),
                commission_percentage: decode_bps("sale item", self.commission_bps.unwrap_or(0))?,
                commissioner_id: self.commissioner_id,
                batch_allocations,
            })),
            other => Err(DbError::corrupt("sale item", format!("unknown kind '{other}'"))),
        }
    }
}

#[derive(Debug, FromRow)]
struct AllocationRow {
    sale_item_id: String,
    batch_id: String,
    batch_number: String,
    quantity: i64,
    expiration_date: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
struct CommissionRow {
    product_id: String,
    commissioner_id: String,
    unit_cost_cents: i64,
    quantity: i64,
    percentage_bps: i64,
    amount_cents: i64,
}

impl TryFrom<CommissionRow> for CommissionRecord {
    type Error = DbError;

    fn try_from(row: CommissionRow) -> DbResult<Self> {
        Ok(CommissionRecord {
            product_id: row.product_id,
            commissioner_id: row.commissioner_id,
            unit_cost: Money::from_cents(row.unit_cost_cents),
            quantity: row.quantity,
            percentage: decode_bps("commission", row.percentage_bps)?,
            amount: Money::from_cents(row.amount_cents),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
