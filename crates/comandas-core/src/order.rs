//! # Orders
//!
//! Comandas, their line items, code generation and the status lifecycle.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  aguardando ──► preparando ──► pronta ──► entregue                     │
//! │      │          started_at     finished_at  delivered_at               │
//! │      │                                                                  │
//! │      └──────────────► cancelada  (from any status)                     │
//! │                                                                         │
//! │  Any status may be set directly. Entering a status stamps its          │
//! │  timestamp only if it is still unset; timestamps never move.           │
//! │                                                                         │
//! │  preparation_time = finished_at − started_at   (minutes)               │
//! │  total_time       = delivered_at − created_at  (minutes)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{OrderStatus, ProductCategory};
use crate::validation::{validate_price_cents, MAX_AMOUNT_CENTS};
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS};

/// Lowest order code.
pub const MIN_ORDER_CODE: u32 = 1000;

/// Highest order code.
pub const MAX_ORDER_CODE: u32 = 9999;

/// Random draws before falling back to max + 1.
pub const CODE_ATTEMPTS: usize = 1000;

// =============================================================================
// Order
// =============================================================================

/// A comanda.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Four-digit code printed on the ticket.
    pub code: String,

    /// Table or customer tag, digits only.
    pub name: String,

    pub observations: Option<String>,

    pub status: OrderStatus,

    /// Σ item totals, in centavos.
    pub total_amount_cents: i64,

    #[ts(as = "Option<String>")]
    pub started_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub finished_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub is_active: bool,
}

impl Order {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    /// True for aguardando, preparando and pronta.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Moves the order to `status`, stamping the matching timestamp if unset.
    ///
    /// ## Example
    /// ```rust,ignore
    /// order.apply_status(OrderStatus::Preparando, now);
    /// assert_eq!(order.started_at, Some(now));
    ///
    /// // entering again later keeps the first stamp
    /// order.apply_status(OrderStatus::Preparando, later);
    /// assert_eq!(order.started_at, Some(now));
    /// ```
    pub fn apply_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        let slot = match status {
            OrderStatus::Preparando => Some(&mut self.started_at),
            OrderStatus::Pronta => Some(&mut self.finished_at),
            OrderStatus::Entregue => Some(&mut self.delivered_at),
            OrderStatus::Aguardando | OrderStatus::Cancelada => None,
        };
        if let Some(slot) = slot {
            slot.get_or_insert(now);
        }
        self.updated_at = now;
    }

    /// Whole minutes from start to finish of preparation.
    pub fn preparation_time(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(finish)) => Some((finish - start).num_minutes()),
            _ => None,
        }
    }

    /// Whole minutes from creation to delivery.
    pub fn total_time(&self) -> Option<i64> {
        self.delivered_at
            .map(|delivered| (delivered - self.created_at).num_minutes())
    }
}

// =============================================================================
// Order Items
// =============================================================================

/// A stored order line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Price per unit at the time the line was added.
    pub unit_price_cents: i64,
    pub observations: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// quantity × unit_price.
    pub fn total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// An order line joined with its product snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_category: ProductCategory,
    pub product_price_cents: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub observations: Option<String>,
}

impl OrderLine {
    /// quantity × unit_price.
    pub fn total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// An order with its lines and derived times.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
    pub preparation_time: Option<i64>,
    pub total_time: Option<i64>,
}

impl OrderDetail {
    pub fn new(order: Order, items: Vec<OrderLine>) -> Self {
        OrderDetail {
            preparation_time: order.preparation_time(),
            total_time: order.total_time(),
            order,
            items,
        }
    }
}

/// A line as submitted when creating an order or replacing its items.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItemInput {
    pub product_id: String,
    pub quantity: i64,
    /// Defaults to the product's current price.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
    #[serde(default)]
    pub observations: Option<String>,
}

/// Σ quantity × unit_price over priced lines.
///
/// ## Errors
/// `OutOfRange` on "total" when the sum leaves `0..=MAX_AMOUNT_CENTS`.
pub fn order_total<I>(lines: I) -> Result<Money, ValidationError>
where
    I: IntoIterator<Item = (i64, Money)>,
{
    let too_large = || ValidationError::OutOfRange {
        field: "total".to_string(),
        min: 0,
        max: MAX_AMOUNT_CENTS,
    };

    let mut total = Money::zero();
    for (quantity, unit_price) in lines {
        let line = unit_price.checked_multiply_quantity(quantity).ok_or_else(too_large)?;
        total = total.checked_add(line).ok_or_else(too_large)?;
    }
    if total.cents() > MAX_AMOUNT_CENTS {
        return Err(too_large());
    }
    Ok(total)
}

/// Checks submitted lines before any product lookup.
///
/// ## Rules
/// - 1 to MAX_ORDER_ITEMS lines
/// - quantity in 1..=MAX_ITEM_QUANTITY
/// - an explicit unit price is between R$ 0,01 and MAX_AMOUNT_CENTS
pub fn validate_order_items(items: &[OrderItemInput]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::required("items"));
    }
    if items.len() > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }
    for item in items {
        if item.product_id.trim().is_empty() {
            return Err(ValidationError::required("product_id"));
        }
        if !(1..=MAX_ITEM_QUANTITY).contains(&item.quantity) {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_ITEM_QUANTITY,
            });
        }
        if let Some(price) = item.unit_price_cents {
            validate_price_cents("unit_price", price)?;
        }
    }
    Ok(())
}

// =============================================================================
// Code Generation
// =============================================================================

/// Picks a free four-digit code.
///
/// ## Algorithm
/// ```text
/// 1. up to CODE_ATTEMPTS random draws in 1000..=9999, first free wins
/// 2. otherwise max(taken) + 1, wrapping past 9999 to 1000
/// 3. nothing taken at all → "1000"
/// ```
pub fn generate_code<R: Rng + ?Sized>(taken: &HashSet<String>, rng: &mut R) -> String {
    for _ in 0..CODE_ATTEMPTS {
        let code = rng.gen_range(MIN_ORDER_CODE..=MAX_ORDER_CODE).to_string();
        if !taken.contains(&code) {
            return code;
        }
    }
    let highest = taken.iter().filter_map(|c| c.parse::<u32>().ok()).max();
    next_sequential(highest)
}

/// The code after `highest`, wrapping to the bottom of the range.
pub fn next_sequential(highest: Option<u32>) -> String {
    match highest {
        Some(code) if code < MAX_ORDER_CODE => (code + 1).max(MIN_ORDER_CODE).to_string(),
        _ => MIN_ORDER_CODE.to_string(),
    }
}

// =============================================================================
// Status Counts
// =============================================================================

/// Number of orders per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusCounts {
    pub aguardando: i64,
    pub preparando: i64,
    pub pronta: i64,
    pub entregue: i64,
    pub cancelada: i64,
    pub total: i64,
}

impl StatusCounts {
    /// Folds `(status, count)` rows from a GROUP BY.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (OrderStatus, i64)>,
    {
        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match status {
                OrderStatus::Aguardando => counts.aguardando += count,
                OrderStatus::Preparando => counts.preparando += count,
                OrderStatus::Pronta => counts.pronta += count,
                OrderStatus::Entregue => counts.entregue += count,
                OrderStatus::Cancelada => counts.cancelada += count,
            }
            counts.total += count;
        }
        counts
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
