//! # Repository Module
//!
//! One repository per aggregate.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  axum handler                                                          │
//! │       │                                                                 │
//! │       │  state.db.orders().create(new_order, Some(&user.id))           │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── validates with comandas-core                                      │
//! │  ├── checks cross-row rules (duplicate open names, product existence)  │
//! │  └── writes inside a transaction when more than one row changes        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`user::UserRepository`] - Accounts and permission grants
//! - [`product::ProductRepository`] - Product CRUD and filtering
//! - [`combo::ComboRepository`] - Combos and their lines
//! - [`order::OrderRepository`] - Comandas, items and status lifecycle
//! - [`checkout::CheckoutRepository`] - Finalization, cancel and refund
//! - [`sangria::SangriaRepository`] - Cash withdrawals
//! - [`pinpad::PinpadRepository`] - Terminal configuration
//! - [`report::ReportRepository`] - Dashboards and daily reports

pub mod checkout;
pub mod combo;
pub mod order;
pub mod pinpad;
pub mod product;
pub mod report;
pub mod sangria;
pub mod user;

use comandas_core::calendar::UtcRange;
use uuid::Uuid;

/// Generates a new entity id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// `%term%` for a case-insensitive LIKE, or `None` for a blank search.
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()))
}

/// Splits an optional range into nullable bind parameters.
pub(crate) fn range_bounds(
    range: Option<UtcRange>,
) -> (Option<chrono::DateTime<chrono::Utc>>, Option<chrono::DateTime<chrono::Utc>>) {
    match range {
        Some(r) => (Some(r.start), Some(r.end)),
        None => (None, None),
    }
}
