//! # Checkout Repository
//!
//! The till: open-order queue, finalization and checkout state changes.
//!
//! ## Finalize
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    order by code ............................... missing  → NotFound  │
//! │    order.is_open() ............................. closed   → 409       │
//! │    no checkout for order ...................... exists   → 409       │
//! │    CheckoutTotals::compute ..................... desconto → 400       │
//! │    INSERT checkouts (aprovado, processed_by, processed_at)            │
//! │    order → entregue (delivered_at if unset)                           │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use crate::repository::order::write_status;
use comandas_core::calendar::UtcRange;
use comandas_core::checkout::{sort_open_orders, validate_customer, CheckoutTotals};
use comandas_core::report::Tally;
use comandas_core::types::{CheckoutStatus, OrderStatus, PaymentMethod};
use comandas_core::validation::normalize_optional;
use comandas_core::{CheckoutRecord, CoreError, Money, OpenOrder, Order};

/// Columns of a checkout joined with its order.
const RECORD_SELECT: &str = r#"
    SELECT c.*, o.code AS order_code, o.name AS order_name
    FROM checkouts c
    INNER JOIN orders o ON o.id = c.order_id
"#;

/// What the operator submits when closing an order.
#[derive(Debug, Clone)]
pub struct FinalizeCheckout {
    pub payment_method: PaymentMethod,
    pub desconto: Money,
    pub taxa_servico: Money,
    pub customer_name: Option<String>,
    pub customer_document: Option<String>,
    pub notes: Option<String>,
}

impl FinalizeCheckout {
    /// A plain payment with no discount or service fee.
    pub fn new(payment_method: PaymentMethod) -> Self {
        FinalizeCheckout {
            payment_method,
            desconto: Money::zero(),
            taxa_servico: Money::zero(),
            customer_name: None,
            customer_document: None,
            notes: None,
        }
    }
}

/// Repository for checkout database operations.
#[derive(Debug, Clone)]
pub struct CheckoutRepository {
    pool: SqlitePool,
}

impl CheckoutRepository {
    /// Creates a new CheckoutRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutRepository { pool }
    }

    /// Orders that are neither entregue nor cancelada, pronta first.
    pub async fn open_orders(&self) -> DbResult<Vec<OpenOrder>> {
        let mut orders = sqlx::query_as::<_, OpenOrder>(
            r#"
            SELECT o.*, COALESCE(SUM(i.quantity), 0) AS total_items
            FROM orders o
            LEFT JOIN order_items i ON i.order_id = o.id
            WHERE o.status NOT IN ('entregue', 'cancelada')
            GROUP BY o.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        sort_open_orders(&mut orders);
        Ok(orders)
    }

    /// Closes an order with an aprovado checkout.
    ///
    /// ## Arguments
    /// * `code` - Order code
    /// * `input` - Payment method, adjustments and customer data
    /// * `user_id` - Operator, stored as processed_by
    ///
    /// ## Returns
    /// * `Ok(CheckoutRecord)` - The new checkout
    /// * `Err(DbError::NotFound)` - Unknown order
    /// * `Err(DbError::Rule(InvalidOrderStatus | CheckoutExists))` - 409
    /// * `Err(DbError::Rule(Validation))` - Bad amounts or customer data
    pub async fn finalize(
        &self,
        code: &str,
        input: FinalizeCheckout,
        user_id: Option<&str>,
    ) -> DbResult<CheckoutRecord> {
        validate_customer(input.customer_name.as_deref(), input.customer_document.as_deref())?;

        let mut tx = self.pool.begin().await?;

        let mut order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE code = ?1")
            .bind(code.trim())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Order", code))?;

        if !order.is_open() {
            return Err(CoreError::InvalidOrderStatus {
                code: order.code,
                current: order.status.to_string(),
            }
            .into());
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checkouts WHERE order_id = ?1")
            .bind(&order.id)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(CoreError::CheckoutExists { code: order.code }.into());
        }

        let totals = CheckoutTotals::compute(order.total(), input.desconto, input.taxa_servico)?;
        let id = generate_id();
        let now = Utc::now();

        debug!(code = %order.code, method = %input.payment_method, total = %totals.total, "Finalizing checkout");

        sqlx::query(
            r#"
            INSERT INTO checkouts (
                id, order_id, subtotal_cents, desconto_cents, taxa_servico_cents, total_cents,
                payment_method, status, customer_name, customer_document,
                processed_by, processed_at, notes,
                created_at, updated_at, created_by, updated_by, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'aprovado', ?8, ?9, ?10, ?11, ?12, ?11, ?11, ?10, ?10, 1)
            "#,
        )
        .bind(&id)
        .bind(&order.id)
        .bind(totals.subtotal.cents())
        .bind(totals.desconto.cents())
        .bind(totals.taxa_servico.cents())
        .bind(totals.total.cents())
        .bind(input.payment_method)
        .bind(normalize_optional(input.customer_name.as_deref()))
        .bind(normalize_optional(input.customer_document.as_deref()))
        .bind(user_id)
        .bind(now)
        .bind(normalize_optional(input.notes.as_deref()))
        .execute(&mut *tx)
        .await?;

        order.apply_status(OrderStatus::Entregue, now);
        order.updated_by = user_id.map(str::to_string);
        write_status(&mut tx, &order).await?;

        tx.commit().await?;

        info!(checkout_id = %id, code = %order.code, total = %totals.total, "Checkout finalized");
        self.require(&id).await
    }

    /// Gets a checkout with its order code and name.
    pub async fn get(&self, id: &str) -> DbResult<Option<CheckoutRecord>> {
        let sql = format!("{} WHERE c.id = ?1", RECORD_SELECT);
        let record = sqlx::query_as::<_, CheckoutRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Gets a checkout or fails with NotFound.
    pub async fn require(&self, id: &str) -> DbResult<CheckoutRecord> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Checkout", id))
    }

    /// Checkouts created inside `range`, newest first, any status.
    pub async fn list_between(&self, range: UtcRange) -> DbResult<Vec<CheckoutRecord>> {
        let sql = format!(
            "{} WHERE c.created_at >= ?1 AND c.created_at < ?2 ORDER BY c.created_at DESC",
            RECORD_SELECT
        );
        let records = sqlx::query_as::<_, CheckoutRecord>(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Aprovado checkouts created inside `range`, newest first.
    pub async fn approved_between(&self, range: UtcRange) -> DbResult<Vec<CheckoutRecord>> {
        let sql = format!(
            "{} WHERE c.status = 'aprovado' AND c.created_at >= ?1 AND c.created_at < ?2 ORDER BY c.created_at DESC",
            RECORD_SELECT
        );
        let records = sqlx::query_as::<_, CheckoutRecord>(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Σ total and count of aprovado checkouts, optionally for one method.
    pub async fn approved_totals(&self, range: UtcRange, method: Option<PaymentMethod>) -> DbResult<Tally> {
        let (total, count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_cents), 0), COUNT(*) FROM checkouts
            WHERE status = 'aprovado'
              AND created_at >= ?1 AND created_at < ?2
              AND (?3 IS NULL OR payment_method = ?3)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(method)
        .fetch_one(&self.pool)
        .await?;

        Ok(Tally {
            total: Money::from_cents(total),
            count,
        })
    }

    /// pendente → cancelado.
    pub async fn cancel(&self, id: &str, user_id: Option<&str>) -> DbResult<CheckoutRecord> {
        let record = self.require(id).await?;
        record.checkout.ensure_cancellable()?;
        self.transition(id, CheckoutStatus::Cancelado, user_id, Utc::now()).await
    }

    /// aprovado → estornado.
    pub async fn refund(&self, id: &str, user_id: Option<&str>) -> DbResult<CheckoutRecord> {
        let record = self.require(id).await?;
        record.checkout.ensure_refundable()?;
        self.transition(id, CheckoutStatus::Estornado, user_id, Utc::now()).await
    }

    async fn transition(
        &self,
        id: &str,
        status: CheckoutStatus,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<CheckoutRecord> {
        info!(checkout_id = %id, to = %status, "Checkout status changed");

        sqlx::query("UPDATE checkouts SET status = ?2, updated_at = ?3, updated_by = ?4 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        self.require(id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
