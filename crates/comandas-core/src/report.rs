//! # Reports
//!
//! Aggregation behind the financial dashboard and the daily order report.
//!
//! ## Financial Dashboard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  aprovado checkouts in range ──┐                                       │
//! │                                ├──► payment_stats per method           │
//! │  sangrias in range ────────────┤                                       │
//! │                                ├──► total_receita =                    │
//! │  valor_inicial (once) ─────────┘      Σ checkouts + inicial − sangrias │
//! │                                                                         │
//! │  feed = checkouts ∪ sangrias, newest first, FINANCIAL_FEED_LIMIT       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cash::SangriaRecord;
use crate::checkout::CheckoutRecord;
use crate::money::Money;
use crate::order::StatusCounts;
use crate::types::PaymentMethod;
use crate::FINANCIAL_FEED_LIMIT;

// =============================================================================
// Payment Stats
// =============================================================================

/// Total and count of one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tally {
    pub total: Money,
    pub count: i64,
}

impl Tally {
    fn add(&mut self, amount: Money) {
        self.total += amount;
        self.count += 1;
    }
}

/// Dashboard buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentStats {
    pub sangria: Tally,
    pub valor_inicial: Tally,
    pub dinheiro: Tally,
    pub cartao_credito: Tally,
    pub cartao_debito: Tally,
    pub pix: Tally,
    pub voucher: Tally,
}

impl PaymentStats {
    fn bucket_mut(&mut self, method: PaymentMethod) -> &mut Tally {
        match method {
            PaymentMethod::Dinheiro => &mut self.dinheiro,
            PaymentMethod::CartaoCredito => &mut self.cartao_credito,
            PaymentMethod::CartaoDebito => &mut self.cartao_debito,
            PaymentMethod::Pix => &mut self.pix,
            PaymentMethod::Voucher => &mut self.voucher,
        }
    }
}

// =============================================================================
// Feed
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Checkout,
    Sangria,
}

/// One row of the combined financial feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FeedEntry {
    pub kind: FeedKind,
    pub id: String,
    /// Order code, or `SGR-…` for sangrias.
    pub code: String,
    /// Order name, or the user who took the cash.
    pub client: String,
    /// Payment method label, or `SANGRIA`.
    pub payment: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl From<&CheckoutRecord> for FeedEntry {
    fn from(record: &CheckoutRecord) -> Self {
        FeedEntry {
            kind: FeedKind::Checkout,
            id: record.checkout.id.clone(),
            code: record.order_code.clone(),
            client: record.order_name.clone(),
            payment: record.checkout.payment_method.label().to_string(),
            amount: record.checkout.total(),
            created_at: record.checkout.created_at,
        }
    }
}

impl From<&SangriaRecord> for FeedEntry {
    fn from(record: &SangriaRecord) -> Self {
        FeedEntry {
            kind: FeedKind::Sangria,
            id: record.sangria.id.clone(),
            code: record.sangria.short_code(),
            client: record.user_display_name(),
            payment: "SANGRIA".to_string(),
            amount: record.sangria.valor(),
            created_at: record.sangria.created_at,
        }
    }
}

// =============================================================================
// Financial Summary
// =============================================================================

/// Everything the dashboard derives from the period's rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinancialSummary {
    pub payment_stats: PaymentStats,
    pub total_receita: Money,
    pub total_comandas: i64,
    pub feed: Vec<FeedEntry>,
}

impl FinancialSummary {
    /// Aggregates aprovado checkouts and sangrias already filtered to the
    /// period.
    pub fn compute(checkouts: &[CheckoutRecord], sangrias: &[SangriaRecord], initial_cash: Money) -> Self {
        let mut stats = PaymentStats {
            valor_inicial: Tally {
                total: initial_cash,
                count: 1,
            },
            ..PaymentStats::default()
        };

        for record in checkouts {
            stats
                .bucket_mut(record.checkout.payment_method)
                .add(record.checkout.total());
        }
        for record in sangrias {
            stats.sangria.add(record.sangria.valor());
        }

        let checkout_total: Money = checkouts.iter().map(|c| c.checkout.total()).sum();

        let mut feed: Vec<FeedEntry> = checkouts
            .iter()
            .map(FeedEntry::from)
            .chain(sangrias.iter().map(FeedEntry::from))
            .collect();
        feed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        feed.truncate(FINANCIAL_FEED_LIMIT);

        FinancialSummary {
            payment_stats: stats,
            total_receita: checkout_total + initial_cash - stats.sangria.total,
            total_comandas: checkouts.len() as i64,
            feed,
        }
    }
}

// =============================================================================
// Daily Order Report
// =============================================================================

/// Order figures for one local day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyReport {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub counts: StatusCounts,
    /// Σ total_amount of delivered orders.
    pub revenue: Money,
    /// Mean preparation time, over orders that have one.
    pub avg_preparation_minutes: Option<i64>,
}

/// Mean of whole-minute durations, rounded half up.
pub fn average_minutes(minutes: &[i64]) -> Option<i64> {
    if minutes.is_empty() {
        return None;
    }
    let sum: i64 = minutes.iter().sum();
    let n = minutes.len() as i64;
    Some((sum * 2 + n) / (n * 2))
}

// =============================================================================
// Unit Tests
// =============================================================================
