//! # comandas-db: Database Layer for Comandas
//!
//! SQLite persistence for the café back office, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Comandas Data Flow                               │
//! │                                                                         │
//! │  axum handler (POST /api/orders)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   comandas-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (order.rs)   │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepo     │    │ 001_initial  │  │   │
//! │  │   │ WAL + FKs     │    │ CheckoutRepo  │    │ _schema.sql  │  │   │
//! │  │   │               │    │ PinpadRepo …  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │                     ./comandas.db (configurable)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use comandas_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("comandas.db")).await?;
//!
//! let open = db.checkouts().open_orders().await?;
//! let order = db.orders().detail("4821").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::checkout::{CheckoutRepository, FinalizeCheckout};
pub use repository::combo::{ComboFilter, ComboRepository, NewCombo};
pub use repository::order::{ClosedNeighbours, ClosedOrders, NewOrder, OrderFilter, OrderRepository};
pub use repository::pinpad::{PinpadFilter, PinpadRepository};
pub use repository::product::{NewProduct, ProductFilter, ProductRepository};
pub use repository::report::{FinancialDashboard, OrderDashboard, Period, ReportRepository};
pub use repository::sangria::SangriaRepository;
pub use repository::user::{NewUser, UserRepository, UserUpdate};
