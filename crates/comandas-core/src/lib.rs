//! # comandas-core: Pure Business Logic for Comandas
//!
//! This crate holds the café's business rules as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Comandas Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    /orders  /checkouts  /financials  /pinpads  /users          │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐  ┌────────────▼───────────────────┐   │
//! │  │   comandas-db (SQLite)      │  │  comandas-pinpad (HTTP)        │   │
//! │  └──────────────┬──────────────┘  └────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────────────────▼───────────────────┐   │
//! │  │               ★ comandas-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐  │   │
//! │  │   │  money  │ │  order  │ │ catalog  │ │ checkout│ │ pinpad │  │   │
//! │  │   │  Money  │ │ Order   │ │ Product  │ │ Checkout│ │ fees   │  │   │
//! │  │   │  Rate   │ │ codes   │ │ Combo    │ │ stats   │ │        │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘ └────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type in centavos with BRL formatting and parsing
//! - [`types`] - Shared enums (statuses, payment methods, providers) and [`Rate`]
//! - [`account`] - Users and the permission catalog
//! - [`catalog`] - Products, combos and combo pricing
//! - [`order`] - Comandas, line items, code generation and lifecycle
//! - [`checkout`] - Checkout records and open-order statistics
//! - [`cash`] - Sangrias and available cash
//! - [`pinpad`] - Terminal configuration and fee math
//! - [`report`] - Financial dashboard aggregation
//! - [`calendar`] - Business-day boundaries in the café's time zone
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use comandas_core::money::Money;
//!
//! let price = Money::from_cents(123456);
//! assert_eq!(price.to_string(), "R$ 1.234,56");
//!
//! let parsed = Money::parse_brl("R$ 1.234,56").unwrap();
//! assert_eq!(parsed, price);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod account;
pub mod calendar;
pub mod cash;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod money;
pub mod order;
pub mod pinpad;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use account::{Permission, PermissionSet, User};
pub use calendar::BusinessCalendar;
pub use cash::{Sangria, SangriaRecord};
pub use catalog::{Combo, ComboDetail, ComboItem, ComboLine, ComboPricing, Product};
pub use checkout::{Checkout, CheckoutRecord, OpenOrder, OpenOrderStats};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order::{Order, OrderDetail, OrderItem, OrderLine};
pub use pinpad::Pinpad;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Opening cash float of the till (R$ 50,00).
///
/// Counted once per day on the financial dashboard and in the cash
/// available for a sangria.
pub const INITIAL_CASH: Money = Money::from_cents(5_000);

/// Maximum quantity of a single order line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum number of lines in a single order.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Active orders shown on the order dashboard.
pub const DASHBOARD_ACTIVE_LIMIT: i64 = 10;

/// Rows returned by the sangria listing.
pub const SANGRIA_LIST_LIMIT: i64 = 100;

/// Entries in the combined financial feed.
pub const FINANCIAL_FEED_LIMIT: usize = 50;
