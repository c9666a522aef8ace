//! # Order Repository
//!
//! Comandas, their items and the status lifecycle.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(name, items)                                                   │
//! │     │                                                                   │
//! │     ├── validate_order_name / validate_order_items      (400)          │
//! │     ├── no OPEN order with the same name                (409)          │
//! │     ├── every product exists and is active              (400)          │
//! │     ├── unit_price defaults to the product price                       │
//! │     ├── generate_code over the codes in use                            │
//! │     │                                                                   │
//! │     └── BEGIN                                                           │
//! │           INSERT orders (total = Σ qty × unit_price)                   │
//! │           INSERT order_items …                                         │
//! │         COMMIT                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, like_pattern, range_bounds};
use comandas_core::calendar::UtcRange;
use comandas_core::order::{generate_code, order_total, validate_order_items, OrderItemInput, StatusCounts};
use comandas_core::report::Tally;
use comandas_core::validation::{normalize_optional, validate_order_name};
use comandas_core::{CoreError, Money, Order, OrderDetail, OrderLine, OrderStatus};

/// SQL fragment matching open statuses.
const OPEN_STATUSES: &str = "('aguardando', 'preparando', 'pronta')";

/// A new comanda.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub name: String,
    pub observations: Option<String>,
    pub items: Vec<OrderItemInput>,
}

/// Listing filters.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Substring of code or name.
    pub search: Option<String>,
    /// Created inside this range.
    pub created: Option<UtcRange>,
}

/// Delivered orders with their count and revenue.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClosedOrders {
    pub orders: Vec<Order>,
    pub count: i64,
    pub revenue: Money,
}

/// Codes of the closed orders delivered just before and after one order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ClosedNeighbours {
    pub previous: Option<String>,
    pub next: Option<String>,
}

/// A priced line ready to insert.
struct PricedLine {
    product_id: String,
    quantity: i64,
    unit_price_cents: i64,
    observations: Option<String>,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order by its four-digit code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE code = ?1")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    /// Gets an order by code or fails with NotFound.
    pub async fn require(&self, code: &str) -> DbResult<Order> {
        self.get_by_code(code)
            .await?
            .ok_or_else(|| DbError::not_found("Order", code))
    }

    /// Lines of an order joined with their products.
    pub async fn lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT
                oi.id, oi.order_id, oi.product_id,
                p.name AS product_name,
                p.category AS product_category,
                p.price_cents AS product_price_cents,
                oi.quantity, oi.unit_price_cents, oi.observations
            FROM order_items oi
            INNER JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = ?1
            ORDER BY oi.created_at, oi.id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    /// An order with its lines and derived times.
    pub async fn detail(&self, code: &str) -> DbResult<OrderDetail> {
        let order = self.require(code).await?;
        let items = self.lines(&order.id).await?;
        Ok(OrderDetail::new(order, items))
    }

    /// Lists orders newest first.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let search = like_pattern(filter.search.as_deref());
        let (start, end) = range_bounds(filter.created);

        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR code LIKE ?2 OR lower(name) LIKE ?2)
              AND (?3 IS NULL OR created_at >= ?3)
              AND (?4 IS NULL OR created_at < ?4)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.status)
        .bind(search)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// Open orders. The dashboard wants the oldest first with a limit.
    pub async fn active(&self, oldest_first: bool, limit: Option<i64>) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT * FROM orders WHERE status IN {} ORDER BY created_at {} LIMIT ?1",
            OPEN_STATUSES,
            if oldest_first { "ASC" } else { "DESC" }
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(limit.unwrap_or(-1))
            .fetch_all(&self.pool)
            .await?;
        Ok(orders)
    }

    /// Delivered orders, most recently delivered first.
    pub async fn closed(&self) -> DbResult<ClosedOrders> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE status = 'entregue' ORDER BY delivered_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ClosedOrders {
            count: orders.len() as i64,
            revenue: orders.iter().map(Order::total).sum(),
            orders,
        })
    }

    /// Codes of the delivered orders around `order` by delivered_at.
    pub async fn closed_neighbours(&self, order: &Order) -> DbResult<ClosedNeighbours> {
        let Some(delivered_at) = order.delivered_at else {
            return Ok(ClosedNeighbours::default());
        };

        let previous: Option<String> = sqlx::query_scalar(
            r#"
            SELECT code FROM orders
            WHERE status = 'entregue' AND delivered_at < ?1
            ORDER BY delivered_at DESC LIMIT 1
            "#,
        )
        .bind(delivered_at)
        .fetch_optional(&self.pool)
        .await?;

        let next: Option<String> = sqlx::query_scalar(
            r#"
            SELECT code FROM orders
            WHERE status = 'entregue' AND delivered_at > ?1
            ORDER BY delivered_at ASC LIMIT 1
            "#,
        )
        .bind(delivered_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ClosedNeighbours { previous, next })
    }

    /// Orders per status created inside `range`.
    pub async fn status_counts(&self, range: UtcRange) -> DbResult<StatusCounts> {
        let rows = sqlx::query_as::<_, (OrderStatus, i64)>(
            r#"
            SELECT status, COUNT(*) FROM orders
            WHERE created_at >= ?1 AND created_at < ?2
            GROUP BY status
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(StatusCounts::from_rows(rows))
    }

    /// Σ total_amount and count of entregue orders created inside `range`.
    pub async fn delivered_totals(&self, range: UtcRange) -> DbResult<Tally> {
        let (total, count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_amount_cents), 0), COUNT(*) FROM orders
            WHERE status = 'entregue' AND created_at >= ?1 AND created_at < ?2
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(Tally {
            total: Money::from_cents(total),
            count,
        })
    }

    /// Codes currently in use.
    pub async fn taken_codes(&self) -> DbResult<HashSet<String>> {
        let codes: Vec<String> = sqlx::query_scalar("SELECT code FROM orders")
            .fetch_all(&self.pool)
            .await?;
        Ok(codes.into_iter().collect())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates an order and its items in one transaction.
    ///
    /// ## Returns
    /// * `Ok(OrderDetail)` - Stored order with lines
    /// * `Err(DbError::Rule(DuplicateOpenOrder))` - Name used by an open order
    /// * `Err(DbError::Rule(ProductNotFound))` - Unknown product
    pub async fn create(&self, new: NewOrder, user_id: Option<&str>) -> DbResult<OrderDetail> {
        let name = validate_order_name(&new.name)?;
        validate_order_items(&new.items)?;
        self.ensure_name_free(&name, None).await?;

        let lines = self.price_lines(&new.items).await?;
        let total = order_total(lines.iter().map(|l| (l.quantity, Money::from_cents(l.unit_price_cents))))?;

        let taken = self.taken_codes().await?;
        let code = generate_code(&taken, &mut rand::thread_rng());

        let id = generate_id();
        let now = Utc::now();

        debug!(code = %code, name = %name, items = lines.len(), "Creating order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, code, name, observations, status, total_amount_cents,
                created_at, updated_at, created_by, updated_by, is_active
            ) VALUES (?1, ?2, ?3, ?4, 'aguardando', ?5, ?6, ?6, ?7, ?7, 1)
            "#,
        )
        .bind(&id)
        .bind(&code)
        .bind(&name)
        .bind(normalize_optional(new.observations.as_deref()))
        .bind(total.cents())
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        insert_lines(&mut tx, &id, &lines, now).await?;
        tx.commit().await?;

        info!(code = %code, total = %total, "Order created");
        self.detail(&code).await
    }

    /// Changes name and/or observations.
    pub async fn update(
        &self,
        code: &str,
        name: Option<&str>,
        observations: Option<&str>,
        user_id: Option<&str>,
    ) -> DbResult<OrderDetail> {
        let mut order = self.require(code).await?;

        if let Some(name) = name {
            let name = validate_order_name(name)?;
            if name != order.name {
                self.ensure_name_free(&name, Some(&order.id)).await?;
            }
            order.name = name;
        }
        if let Some(observations) = observations {
            order.observations = normalize_optional(Some(observations));
        }

        sqlx::query(
            "UPDATE orders SET name = ?2, observations = ?3, updated_at = ?4, updated_by = ?5 WHERE id = ?1",
        )
        .bind(&order.id)
        .bind(&order.name)
        .bind(&order.observations)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        self.detail(code).await
    }

    /// Hard-deletes an order and its items.
    ///
    /// ## Errors
    /// `CoreError::CheckoutExists` once a checkout references it.
    pub async fn delete(&self, code: &str) -> DbResult<()> {
        let order = self.require(code).await?;

        let checkouts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checkouts WHERE order_id = ?1")
            .bind(&order.id)
            .fetch_one(&self.pool)
            .await?;
        if checkouts > 0 {
            return Err(CoreError::CheckoutExists { code: order.code }.into());
        }

        info!(code = %order.code, "Deleting order");

        sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(&order.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replaces every item and recomputes the total in one transaction.
    pub async fn replace_items(
        &self,
        code: &str,
        items: &[OrderItemInput],
        user_id: Option<&str>,
    ) -> DbResult<OrderDetail> {
        let order = self.require(code).await?;
        validate_order_items(items)?;

        let lines = self.price_lines(items).await?;
        let total = order_total(lines.iter().map(|l| (l.quantity, Money::from_cents(l.unit_price_cents))))?;
        let now = Utc::now();

        debug!(code = %code, items = lines.len(), "Replacing order items");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
            .bind(&order.id)
            .execute(&mut *tx)
            .await?;

        insert_lines(&mut tx, &order.id, &lines, now).await?;

        sqlx::query(
            "UPDATE orders SET total_amount_cents = ?2, updated_at = ?3, updated_by = ?4 WHERE id = ?1",
        )
        .bind(&order.id)
        .bind(total.cents())
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.detail(code).await
    }

    /// Moves an order to `status`, stamping timestamps that are still unset.
    pub async fn set_status(&self, code: &str, status: OrderStatus, user_id: Option<&str>) -> DbResult<Order> {
        let mut order = self.require(code).await?;
        let from = order.status;

        order.apply_status(status, Utc::now());
        order.updated_by = user_id.map(str::to_string);

        let mut conn = self.pool.acquire().await?;
        write_status(&mut conn, &order).await?;

        info!(code = %code, from = %from, to = %status, "Order status changed");
        Ok(order)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Fails with DuplicateOpenOrder when an open order (other than
    /// `except_id`) already uses `name`.
    async fn ensure_name_free(&self, name: &str, except_id: Option<&str>) -> DbResult<()> {
        let sql = format!(
            "SELECT code FROM orders WHERE name = ?1 AND status IN {} AND (?2 IS NULL OR id <> ?2) LIMIT 1",
            OPEN_STATUSES
        );
        let existing: Option<String> = sqlx::query_scalar(&sql)
            .bind(name)
            .bind(except_id)
            .fetch_optional(&self.pool)
            .await?;

        match existing {
            Some(code) => Err(CoreError::DuplicateOpenOrder {
                name: name.to_string(),
                code,
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Resolves each product and its effective unit price.
    async fn price_lines(&self, items: &[OrderItemInput]) -> DbResult<Vec<PricedLine>> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let price: i64 = sqlx::query_scalar("SELECT price_cents FROM products WHERE id = ?1 AND is_active = 1")
                .bind(&item.product_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

            lines.push(PricedLine {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents.unwrap_or(price),
                observations: normalize_optional(item.observations.as_deref()),
            });
        }
        Ok(lines)
    }
}

async fn insert_lines(
    conn: &mut SqliteConnection,
    order_id: &str,
    lines: &[PricedLine],
    now: DateTime<Utc>,
) -> DbResult<()> {
    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, unit_price_cents, observations, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(generate_id())
        .bind(order_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(&line.observations)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Persists status and lifecycle timestamps of `order`.
pub(crate) async fn write_status(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = ?2,
            started_at = ?3,
            finished_at = ?4,
            delivered_at = ?5,
            updated_at = ?6,
            updated_by = ?7
        WHERE id = ?1
        "#,
    )
    .bind(&order.id)
    .bind(order.status)
    .bind(order.started_at)
    .bind(order.finished_at)
    .bind(order.delivered_at)
    .bind(order.updated_at)
    .bind(&order.updated_by)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order", &order.code));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::checkout::FinalizeCheckout;
    use crate::repository::test_support;
    use crate::Database;
    use comandas_core::{BusinessCalendar, PaymentMethod};

    fn item(product_id: &str, quantity: i64) -> OrderItemInput {
        OrderItemInput {
            product_id: product_id.to_string(),
            quantity,
            unit_price_cents: None,
            observations: None,
        }
    }

    async fn order(db: &Database, name: &str, product_id: &str) -> OrderDetail {
        db.orders()
            .create(
                NewOrder {
                    name: name.to_string(),
                    observations: None,
                    items: vec![item(product_id, 2)],
                },
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_prices_lines_and_total() {
        let db = test_support::db().await;
        let cafe = test_support::product(&db, "Café", 600).await;
        let pao = test_support::product(&db, "Pão", 450).await;

        let mut discounted = item(&pao.id, 1);
        discounted.unit_price_cents = Some(400);

        let detail = db
            .orders()
            .create(
                NewOrder {
                    name: "12".to_string(),
                    observations: Some("sem açúcar".to_string()),
                    items: vec![item(&cafe.id, 2), discounted],
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(detail.order.code.len(), 4);
        assert_eq!(detail.order.status, OrderStatus::Aguardando);
        assert_eq!(detail.order.total_amount_cents, 1_600);
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].total().cents(), 1_200);
        assert_eq!(detail.preparation_time, None);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let db = test_support::db().await;
        let cafe = test_support::product(&db, "Café", 600).await;
        let repo = db.orders();

        let bad_name = repo
            .create(NewOrder { name: "mesa".into(), observations: None, items: vec![item(&cafe.id, 1)] }, None)
            .await;
        assert!(matches!(bad_name, Err(DbError::Rule(CoreError::Validation(_)))));

        let no_items = repo
            .create(NewOrder { name: "3".into(), observations: None, items: vec![] }, None)
            .await;
        assert!(no_items.is_err());

        let unknown = repo
            .create(NewOrder { name: "3".into(), observations: None, items: vec![item("ghost", 1)] }, None)
            .await;
        assert!(matches!(unknown, Err(DbError::Rule(CoreError::ProductNotFound(_)))));
    }

    #[tokio::test]
    async fn test_duplicate_open_name_until_closed() {
        let db = test_support::db().await;
        let cafe = test_support::product(&db, "Café", 600).await;

        let first = order(&db, "7", &cafe.id).await;
        let dup = db
            .orders()
            .create(NewOrder { name: "7".into(), observations: None, items: vec![item(&cafe.id, 1)] }, None)
            .await;
        assert!(matches!(dup, Err(DbError::Rule(CoreError::DuplicateOpenOrder { .. }))));

        db.orders().set_status(&first.order.code, OrderStatus::Entregue, None).await.unwrap();
        order(&db, "7", &cafe.id).await;
    }

    #[tokio::test]
    async fn test_status_timestamps_persist() {
        let db = test_support::db().await;
        let cafe = test_support::product(&db, "Café", 600).await;
        let code = order(&db, "1", &cafe.id).await.order.code;
        let repo = db.orders();

        let started = repo.set_status(&code, OrderStatus::Preparando, None).await.unwrap();
        let started_at = started.started_at.unwrap();

        repo.set_status(&code, OrderStatus::Aguardando, None).await.unwrap();
        repo.set_status(&code, OrderStatus::Preparando, None).await.unwrap();
        repo.set_status(&code, OrderStatus::Pronta, None).await.unwrap();

        let stored = repo.require(&code).await.unwrap();
        assert_eq!(stored.started_at, Some(started_at));
        assert!(stored.finished_at.is_some());
        assert!(stored.delivered_at.is_none());
        assert_eq!(stored.preparation_time(), Some(0));
    }

    #[tokio::test]
    async fn test_replace_items_recomputes_total() {
        let db = test_support::db().await;
        let cafe = test_support::product(&db, "Café", 600).await;
        let pao = test_support::product(&db, "Pão", 450).await;
        let code = order(&db, "1", &cafe.id).await.order.code;

        let detail = db
            .orders()
            .replace_items(&code, &[item(&pao.id, 3)], None)
            .await
            .unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.order.total_amount_cents, 1_350);

        let unknown = db.orders().replace_items(&code, &[item("ghost", 1)], None).await;
        assert!(unknown.is_err());
        // Failed replacement leaves the previous lines in place
        assert_eq!(db.orders().lines(&detail.order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = test_support::db().await;
        let cafe = test_support::product(&db, "Café", 600).await;
        let code = order(&db, "1", &cafe.id).await.order.code;
        order(&db, "2", &cafe.id).await;

        let clash = db.orders().update(&code, Some("2"), None, None).await;
        assert!(matches!(clash, Err(DbError::Rule(CoreError::DuplicateOpenOrder { .. }))));

        let updated = db.orders().update(&code, Some("9"), Some("viagem"), None).await.unwrap();
        assert_eq!(updated.order.name, "9");
        assert_eq!(updated.order.observations.as_deref(), Some("viagem"));

        db.orders().delete(&code).await.unwrap();
        assert!(db.orders().get_by_code(&code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_refused_once_checked_out() {
        let db = test_support::db().await;
        let cafe = test_support::product(&db, "Café", 600).await;
        let code = order(&db, "1", &cafe.id).await.order.code;

        db.checkouts()
            .finalize(&code, FinalizeCheckout::new(PaymentMethod::Dinheiro), None)
            .await
            .unwrap();

        let refused = db.orders().delete(&code).await;
        assert!(matches!(refused, Err(DbError::Rule(CoreError::CheckoutExists { .. }))));
        assert!(db.orders().get_by_code(&code).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_huge_unit_price_is_a_validation_error() {
        let db = test_support::db().await;
        let cafe = test_support::product(&db, "Café", 600).await;

        let mut line = item(&cafe.id, 3);
        line.unit_price_cents = Some(4_000_000_000_000_000_000);
        let result = db
            .orders()
            .create(NewOrder { name: "5".into(), observations: None, items: vec![line] }, None)
            .await;
        assert!(matches!(result, Err(DbError::Rule(CoreError::Validation(_)))));
    }

    #[tokio::test]
    async fn test_lists_and_dashboard_figures() {
        let db = test_support::db().await;
        let cafe = test_support::product(&db, "Café", 600).await;
        let a = order(&db, "1", &cafe.id).await.order.code;
        let b = order(&db, "2", &cafe.id).await.order.code;
        order(&db, "3", &cafe.id).await;

        db.orders().set_status(&a, OrderStatus::Entregue, None).await.unwrap();
        db.orders().set_status(&b, OrderStatus::Cancelada, None).await.unwrap();

        let repo = db.orders();
        assert_eq!(repo.active(true, Some(10)).await.unwrap().len(), 1);

        let filter = OrderFilter {
            status: Some(OrderStatus::Entregue),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);

        let search = OrderFilter {
            search: Some(a.clone()),
            ..Default::default()
        };
        assert!(repo.list(&search).await.unwrap().iter().any(|o| o.code == a));

        let today = BusinessCalendar::default().day(BusinessCalendar::default().today());
        let counts = repo.status_counts(today).await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.entregue, 1);
        assert_eq!(counts.cancelada, 1);

        let sales = repo.delivered_totals(today).await.unwrap();
        assert_eq!(sales.count, 1);
        assert_eq!(sales.total.cents(), 1_200);

        let closed = repo.closed().await.unwrap();
        assert_eq!(closed.count, 1);
        assert_eq!(closed.revenue.cents(), 1_200);
    }

    #[tokio::test]
    async fn test_closed_neighbours() {
        let db = test_support::db().await;
        let cafe = test_support::product(&db, "Café", 600).await;
        let mut codes = Vec::new();
        for name in ["1", "2", "3"] {
            let code = order(&db, name, &cafe.id).await.order.code;
            db.orders().set_status(&code, OrderStatus::Entregue, None).await.unwrap();
            codes.push(code);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let middle = db.orders().require(&codes[1]).await.unwrap();
        let around = db.orders().closed_neighbours(&middle).await.unwrap();
        assert_eq!(around.previous.as_deref(), Some(codes[0].as_str()));
        assert_eq!(around.next.as_deref(), Some(codes[2].as_str()));
    }
}
