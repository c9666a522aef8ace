//! # Database Migrations
//!
//! Embedded SQL migrations.
//!
//! ```text
//! migrations/sqlite/
//! └── 001_initial_schema.sql   users, catalog, orders, checkouts,
//!                              sangrias, pinpads
//! ```
//!
//! New migrations get the next sequence number; applied files are never
//! edited.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations embedded at compile time by `sqlx::migrate!`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every pending migration, in filename order.
///
/// Applied versions are tracked in `_sqlx_migrations`, so repeated calls
/// are no-ops.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!(count = MIGRATOR.migrations.len(), "All migrations applied");
    Ok(())
}

/// Returns (embedded, applied) migration counts for the health endpoint.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
