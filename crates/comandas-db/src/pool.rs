//! # Pool
//!
//! Opens the café database and hands out repositories.
//!
//! ```text
//! comandas.db ◄── SqlitePool (WAL, foreign keys on) ◄── Database
//!                                                          │
//!     users() products() combos() orders() checkouts() ◄───┘
//!     sangrias() pinpads() reports()
//! ```
//!
//! Every repository is a cheap wrapper around a clone of the same pool, so
//! handlers ask for one per request.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::checkout::CheckoutRepository;
use crate::repository::combo::ComboRepository;
use crate::repository::order::OrderRepository;
use crate::repository::pinpad::PinpadRepository;
use crate::repository::product::ProductRepository;
use crate::repository::report::ReportRepository;
use crate::repository::sangria::SangriaRepository;
use crate::repository::user::UserRepository;

/// Where the database lives and how many connections it may hold.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
}

impl DbConfig {
    /// A file-backed database, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// A private in-memory database.
    ///
    /// Limited to one connection: each SQLite `:memory:` connection would
    /// otherwise see its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle shared through `AppState`.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and applies pending migrations.
    ///
    /// ## Errors
    /// * `ConnectionFailed` - bad path or SQLite refused to open
    /// * `MigrationFailed` - the embedded schema could not be applied
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.database_path.display()))
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        migrations::run_migrations(&pool).await?;
        info!(max_connections = config.max_connections, "Database ready");

        Ok(Database { pool })
    }

    /// Raw pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn combos(&self) -> ComboRepository {
        ComboRepository::new(self.pool.clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    pub fn checkouts(&self) -> CheckoutRepository {
        CheckoutRepository::new(self.pool.clone())
    }

    pub fn sangrias(&self) -> SangriaRepository {
        SangriaRepository::new(self.pool.clone())
    }

    pub fn pinpads(&self) -> PinpadRepository {
        PinpadRepository::new(self.pool.clone())
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Closes every connection; later queries fail.
    pub async fn close(&self) {
        info!("Closing database");
        self.pool.close().await;
    }

    /// `SELECT 1` succeeded.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_answers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        db.close().await;
        assert!(!db.health_check().await);
    }

    #[tokio::test]
    async fn test_migrations_create_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        for table in ["checkouts", "combo_items", "combos", "order_items", "orders", "pinpads", "products", "sangrias", "user_permissions", "users"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let result = sqlx::query("INSERT INTO user_permissions (user_id, codename) VALUES ('ghost', 'orders.view_order')")
            .execute(db.pool())
            .await;
        assert!(matches!(result.map_err(DbError::from), Err(DbError::ForeignKeyViolation { .. })));
    }

    #[test]
    fn test_file_and_memory_configs() {
        let file = DbConfig::new("/tmp/comandas-test.db");
        assert_eq!(file.max_connections, 5);
        assert_eq!(file.database_path, PathBuf::from("/tmp/comandas-test.db"));

        let memory = DbConfig::in_memory();
        assert_eq!(memory.max_connections, 1);
        assert_eq!(memory.database_path, PathBuf::from(":memory:"));
    }
}
