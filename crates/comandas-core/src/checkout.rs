//! # Checkouts
//!
//! Payment records for orders and the open-order queue shown at the till.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open order ──► finalize ──► Checkout(aprovado) + Order(entregue)      │
//! │                                                                         │
//! │  total = subtotal + taxa_servico − desconto                            │
//! │                                                                         │
//! │  pendente ──cancel──► cancelado                                        │
//! │  aprovado ──refund──► estornado                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::order::Order;
use crate::types::{CheckoutStatus, PaymentMethod};
use crate::validation::{validate_amount_cents, MAX_AMOUNT_CENTS};

/// customer_name limit.
pub const MAX_CUSTOMER_NAME: usize = 100;

/// customer_document limit.
pub const MAX_CUSTOMER_DOCUMENT: usize = 20;

// =============================================================================
// Checkout
// =============================================================================

/// Payment record of one order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Checkout {
    pub id: String,

    /// One checkout per order.
    pub order_id: String,

    pub subtotal_cents: i64,
    pub desconto_cents: i64,
    pub taxa_servico_cents: i64,
    pub total_cents: i64,

    pub payment_method: PaymentMethod,
    pub status: CheckoutStatus,

    pub customer_name: Option<String>,
    pub customer_document: Option<String>,

    /// User id of the operator.
    pub processed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,

    pub notes: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub is_active: bool,
}

impl Checkout {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Only a pendente checkout can be cancelled.
    pub fn ensure_cancellable(&self) -> CoreResult<()> {
        self.ensure_status(CheckoutStatus::Pendente)
    }

    /// Only an aprovado checkout can be refunded.
    pub fn ensure_refundable(&self) -> CoreResult<()> {
        self.ensure_status(CheckoutStatus::Aprovado)
    }

    fn ensure_status(&self, expected: CheckoutStatus) -> CoreResult<()> {
        if self.status != expected {
            return Err(CoreError::InvalidCheckoutStatus {
                id: self.id.clone(),
                current: self.status.to_string(),
                expected: expected.to_string(),
            });
        }
        Ok(())
    }
}

/// A checkout joined with its order's code and name.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CheckoutRecord {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub checkout: Checkout,
    pub order_code: String,
    pub order_name: String,
}

// =============================================================================
// Totals
// =============================================================================

/// The money side of a finalize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutTotals {
    pub subtotal: Money,
    pub desconto: Money,
    pub taxa_servico: Money,
    pub total: Money,
}

impl CheckoutTotals {
    /// Computes `subtotal + taxa_servico − desconto`.
    ///
    /// ## Errors
    /// - desconto or taxa_servico outside `0..=MAX_AMOUNT_CENTS`
    /// - desconto greater than subtotal + taxa_servico
    ///
    /// ## Example
    /// ```rust
    /// use comandas_core::checkout::CheckoutTotals;
    /// use comandas_core::money::Money;
    ///
    /// let totals = CheckoutTotals::compute(
    ///     Money::from_cents(5_000),
    ///     Money::from_cents(500),
    ///     Money::from_cents(250),
    /// ).unwrap();
    /// assert_eq!(totals.total.cents(), 4_750);
    /// ```
    pub fn compute(subtotal: Money, desconto: Money, taxa_servico: Money) -> Result<Self, ValidationError> {
        validate_amount_cents("desconto", desconto.cents())?;
        validate_amount_cents("taxa_servico", taxa_servico.cents())?;

        let gross = subtotal.checked_add(taxa_servico).ok_or(ValidationError::OutOfRange {
            field: "taxa_servico".to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        })?;
        if desconto > gross {
            return Err(ValidationError::Rule(format!(
                "Desconto {} exceeds subtotal plus service fee {}",
                desconto, gross
            )));
        }
        Ok(CheckoutTotals {
            subtotal,
            desconto,
            taxa_servico,
            total: gross - desconto,
        })
    }
}

/// Checks customer_name and customer_document lengths.
pub fn validate_customer(name: Option<&str>, document: Option<&str>) -> Result<(), ValidationError> {
    if name.map(|n| n.chars().count()).unwrap_or(0) > MAX_CUSTOMER_NAME {
        return Err(ValidationError::TooLong {
            field: "customer_name".to_string(),
            max: MAX_CUSTOMER_NAME,
        });
    }
    if document.map(|d| d.chars().count()).unwrap_or(0) > MAX_CUSTOMER_DOCUMENT {
        return Err(ValidationError::TooLong {
            field: "customer_document".to_string(),
            max: MAX_CUSTOMER_DOCUMENT,
        });
    }
    Ok(())
}

// =============================================================================
// Open Orders
// =============================================================================

/// An order waiting at the till, with its item count.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OpenOrder {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub order: Order,
    /// Σ item quantities.
    pub total_items: i64,
}

/// Sorts ready orders first, then oldest first.
pub fn sort_open_orders(orders: &mut [OpenOrder]) {
    orders.sort_by(|a, b| {
        a.order
            .status
            .checkout_priority()
            .cmp(&b.order.status.checkout_priority())
            .then(a.order.created_at.cmp(&b.order.created_at))
    });
}

/// Header figures for the open-order queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OpenOrderStats {
    pub total_orders: i64,
    pub total_value: Money,
    pub avg_ticket: Money,
}

impl OpenOrderStats {
    pub fn compute(orders: &[OpenOrder]) -> Self {
        let total_orders = orders.len() as i64;
        let total_value: Money = orders.iter().map(|o| o.order.total()).sum();
        OpenOrderStats {
            total_orders,
            total_value,
            avg_ticket: Money::average(total_value, total_orders),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderStatus;
    use chrono::{Duration, TimeZone};

    fn open(code: &str, status: OrderStatus, minutes: i64, total: i64) -> OpenOrder {
        let t0 = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap() + Duration::minutes(minutes);
        OpenOrder {
            order: Order {
                id: format!("id-{}", code),
                code: code.to_string(),
                name: "1".to_string(),
                observations: None,
                status,
                total_amount_cents: total,
                started_at: None,
                finished_at: None,
                delivered_at: None,
                created_at: t0,
                updated_at: t0,
                created_by: None,
                updated_by: None,
                is_active: true,
            },
            total_items: 1,
        }
    }

    fn checkout(status: CheckoutStatus) -> Checkout {
        let now = Utc::now();
        Checkout {
            id: "c1".to_string(),
            order_id: "o1".to_string(),
            subtotal_cents: 1_000,
            desconto_cents: 0,
            taxa_servico_cents: 0,
            total_cents: 1_000,
            payment_method: PaymentMethod::Pix,
            status,
            customer_name: None,
            customer_document: None,
            processed_by: None,
            processed_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
            is_active: true,
        }
    }

    #[test]
    fn test_totals_reject_discount_over_gross() {
        let err = CheckoutTotals::compute(
            Money::from_cents(1_000),
            Money::from_cents(1_201),
            Money::from_cents(200),
        );
        assert!(err.is_err());

        let ok = CheckoutTotals::compute(
            Money::from_cents(1_000),
            Money::from_cents(1_200),
            Money::from_cents(200),
        )
        .unwrap();
        assert!(ok.total.is_zero());
    }

    #[test]
    fn test_totals_reject_negative_parts() {
        assert!(CheckoutTotals::compute(Money::from_cents(100), Money::from_cents(-1), Money::zero()).is_err());
        assert!(CheckoutTotals::compute(Money::from_cents(100), Money::zero(), Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_totals_reject_huge_service_fee() {
        let err = CheckoutTotals::compute(Money::from_cents(1_700), Money::zero(), Money::from_cents(i64::MAX));
        assert!(matches!(err, Err(ValidationError::OutOfRange { ref field, .. }) if field == "taxa_servico"));

        let err = CheckoutTotals::compute(Money::from_cents(i64::MAX), Money::zero(), Money::from_cents(1));
        assert!(err.is_err());
    }

    #[test]
    fn test_cancel_and_refund_guards() {
        assert!(checkout(CheckoutStatus::Pendente).ensure_cancellable().is_ok());
        assert!(checkout(CheckoutStatus::Aprovado).ensure_cancellable().is_err());
        assert!(checkout(CheckoutStatus::Aprovado).ensure_refundable().is_ok());
        assert!(matches!(
            checkout(CheckoutStatus::Estornado).ensure_refundable(),
            Err(CoreError::InvalidCheckoutStatus { .. })
        ));
    }

    #[test]
    fn test_open_orders_sorted_by_priority_then_age() {
        let mut orders = vec![
            open("1111", OrderStatus::Aguardando, 0, 100),
            open("2222", OrderStatus::Pronta, 10, 100),
            open("3333", OrderStatus::Preparando, 5, 100),
            open("4444", OrderStatus::Pronta, 2, 100),
        ];
        sort_open_orders(&mut orders);
        let codes: Vec<&str> = orders.iter().map(|o| o.order.code.as_str()).collect();
        assert_eq!(codes, vec!["4444", "2222", "3333", "1111"]);
    }

    #[test]
    fn test_open_order_stats() {
        let orders = vec![
            open("1111", OrderStatus::Aguardando, 0, 1_000),
            open("2222", OrderStatus::Pronta, 0, 2_001),
        ];
        let stats = OpenOrderStats::compute(&orders);
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.total_value.cents(), 3_001);
        assert_eq!(stats.avg_ticket.cents(), 1_501);

        assert_eq!(OpenOrderStats::compute(&[]).avg_ticket, Money::zero());
    }

    #[test]
    fn test_customer_limits() {
        assert!(validate_customer(Some("Ana"), Some("123")).is_ok());
        let long = "x".repeat(101);
        assert!(validate_customer(Some(&long), None).is_err());
    }
}
