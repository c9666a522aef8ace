//! # Report Repository
//!
//! Read-only aggregates for the dashboards. Each method gathers rows
//! through the other repositories' queries and hands them to the pure
//! calculations in `comandas_core::report`.
//!
//! ```text
//! financial_dashboard(period, today, yesterday)
//!   ├── checkouts.approved_between(period) ─┐
//!   ├── sangrias.between(period) ───────────┼──► FinancialSummary::compute
//!   ├── checkouts.approved_totals(today)     │
//!   └── checkouts.approved_totals(yesterday) │
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::checkout::CheckoutRepository;
use crate::repository::order::OrderRepository;
use crate::repository::sangria::SangriaRepository;
use comandas_core::calendar::{inclusive_days, UtcRange};
use comandas_core::cash::available_cash;
use comandas_core::order::StatusCounts;
use comandas_core::report::{average_minutes, DailyReport, FinancialSummary, Tally};
use comandas_core::types::PaymentMethod;
use comandas_core::{Money, Order, DASHBOARD_ACTIVE_LIMIT};

/// The financial dashboard for a period.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialDashboard {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(flatten)]
    pub summary: FinancialSummary,
    pub today: Tally,
    pub yesterday: Tally,
    pub date_range_days: i64,
}

/// The order-side dashboard for today.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDashboard {
    pub counts: StatusCounts,
    pub active: Vec<Order>,
    pub sales: Tally,
}

/// Local dates and their UTC ranges for one dashboard request.
#[derive(Debug, Clone, Copy)]
pub struct Period {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub range: UtcRange,
}

/// Repository for dashboard aggregates.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    orders: OrderRepository,
    checkouts: CheckoutRepository,
    sangrias: SangriaRepository,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository {
            orders: OrderRepository::new(pool.clone()),
            checkouts: CheckoutRepository::new(pool.clone()),
            sangrias: SangriaRepository::new(pool),
        }
    }

    /// Aprovado checkouts and sangrias of `period`, with today/yesterday
    /// totals.
    pub async fn financial_dashboard(
        &self,
        period: Period,
        today: UtcRange,
        yesterday: UtcRange,
        initial_cash: Money,
    ) -> DbResult<FinancialDashboard> {
        debug!(start = %period.start_date, end = %period.end_date, "Building financial dashboard");

        let checkouts = self.checkouts.approved_between(period.range).await?;
        let sangrias = self.sangrias.between(period.range).await?;

        Ok(FinancialDashboard {
            start_date: period.start_date,
            end_date: period.end_date,
            summary: FinancialSummary::compute(&checkouts, &sangrias, initial_cash),
            today: self.checkouts.approved_totals(today, None).await?,
            yesterday: self.checkouts.approved_totals(yesterday, None).await?,
            date_range_days: inclusive_days(period.start_date, period.end_date),
        })
    }

    /// Cash in the drawer: float + cash sales − sangrias, over `today`.
    pub async fn available_cash(&self, today: UtcRange, initial_cash: Money) -> DbResult<Money> {
        let cash_sales = self
            .checkouts
            .approved_totals(today, Some(PaymentMethod::Dinheiro))
            .await?;
        let withdrawals = self.sangrias.total_between(today).await?;
        Ok(available_cash(initial_cash, cash_sales.total, withdrawals))
    }

    /// Today's counts, the oldest active orders and delivered sales.
    pub async fn order_dashboard(&self, today: UtcRange) -> DbResult<OrderDashboard> {
        Ok(OrderDashboard {
            counts: self.orders.status_counts(today).await?,
            active: self.orders.active(true, Some(DASHBOARD_ACTIVE_LIMIT)).await?,
            sales: self.orders.delivered_totals(today).await?,
        })
    }

    /// Order figures for one local day.
    pub async fn daily_report(&self, date: NaiveDate, day: UtcRange) -> DbResult<DailyReport> {
        let counts = self.orders.status_counts(day).await?;
        let revenue = self.orders.delivered_totals(day).await?.total;

        let filter = crate::repository::order::OrderFilter {
            created: Some(day),
            ..Default::default()
        };
        let minutes: Vec<i64> = self
            .orders
            .list(&filter)
            .await?
            .iter()
            .filter_map(Order::preparation_time)
            .collect();

        Ok(DailyReport {
            date,
            counts,
            revenue,
            avg_preparation_minutes: average_minutes(&minutes),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::checkout::FinalizeCheckout;
    use crate::repository::order::NewOrder;
    use crate::repository::test_support;
    use crate::Database;
    use comandas_core::order::OrderItemInput;
    use comandas_core::{BusinessCalendar, OrderStatus, INITIAL_CASH};

    async fn sell(db: &Database, name: &str, price: i64, method: PaymentMethod) {
        let product = test_support::product(db, &format!("Item {}", name), price).await;
        let code = db
            .orders()
            .create(
                NewOrder {
                    name: name.to_string(),
                    observations: None,
                    items: vec![OrderItemInput {
                        product_id: product.id,
                        quantity: 1,
                        unit_price_cents: None,
                        observations: None,
                    }],
                },
                None,
            )
            .await
            .unwrap()
            .order
            .code;
        db.checkouts().finalize(&code, FinalizeCheckout::new(method), None).await.unwrap();
    }

    fn today(calendar: &BusinessCalendar) -> Period {
        let date = calendar.today();
        Period {
            start_date: date,
            end_date: date,
            range: calendar.day(date),
        }
    }

    #[tokio::test]
    async fn test_financial_dashboard() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "caixa").await;
        sell(&db, "1", 2_000, PaymentMethod::Dinheiro).await;
        sell(&db, "2", 3_000, PaymentMethod::Pix).await;
        db.sangrias().create(Money::from_cents(500), None, &user.id).await.unwrap();

        let calendar = BusinessCalendar::default();
        let period = today(&calendar);
        let yesterday = calendar.day(period.start_date.pred_opt().unwrap());

        let dashboard = db
            .reports()
            .financial_dashboard(period, period.range, yesterday, INITIAL_CASH)
            .await
            .unwrap();

        assert_eq!(dashboard.summary.total_comandas, 2);
        assert_eq!(dashboard.summary.payment_stats.dinheiro.total.cents(), 2_000);
        assert_eq!(dashboard.summary.payment_stats.sangria.count, 1);
        // 2000 + 3000 + 5000 − 500
        assert_eq!(dashboard.summary.total_receita.cents(), 9_500);
        assert_eq!(dashboard.summary.feed.len(), 3);
        assert_eq!(dashboard.today.count, 2);
        assert_eq!(dashboard.yesterday.count, 0);
        assert_eq!(dashboard.date_range_days, 1);

        let cash = db.reports().available_cash(period.range, INITIAL_CASH).await.unwrap();
        assert_eq!(cash.cents(), 6_500);
    }

    #[tokio::test]
    async fn test_order_dashboard_and_daily_report() {
        let db = test_support::db().await;
        sell(&db, "1", 1_000, PaymentMethod::Voucher).await;

        let product = test_support::product(&db, "Pão", 450).await;
        let open = db
            .orders()
            .create(
                NewOrder {
                    name: "2".to_string(),
                    observations: None,
                    items: vec![OrderItemInput {
                        product_id: product.id,
                        quantity: 1,
                        unit_price_cents: None,
                        observations: None,
                    }],
                },
                None,
            )
            .await
            .unwrap();
        db.orders().set_status(&open.order.code, OrderStatus::Preparando, None).await.unwrap();
        db.orders().set_status(&open.order.code, OrderStatus::Pronta, None).await.unwrap();

        let calendar = BusinessCalendar::default();
        let period = today(&calendar);

        let dashboard = db.reports().order_dashboard(period.range).await.unwrap();
        assert_eq!(dashboard.counts.total, 2);
        assert_eq!(dashboard.active.len(), 1);
        assert_eq!(dashboard.sales.total.cents(), 1_000);

        let report = db.reports().daily_report(period.start_date, period.range).await.unwrap();
        assert_eq!(report.counts.pronta, 1);
        assert_eq!(report.revenue.cents(), 1_000);
        assert_eq!(report.avg_preparation_minutes, Some(0));
    }
}
