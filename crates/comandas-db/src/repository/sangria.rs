//! # Sangria Repository
//!
//! Cash withdrawals from the till, always read joined with the user who
//! took the cash.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, range_bounds};
use comandas_core::calendar::UtcRange;
use comandas_core::validation::{normalize_optional, validate_price_cents};
use comandas_core::{Money, SangriaRecord};

const RECORD_SELECT: &str = r#"
    SELECT s.*, u.username, u.first_name, u.last_name
    FROM sangrias s
    INNER JOIN users u ON u.id = s.usuario_id
"#;

/// Repository for sangria database operations.
#[derive(Debug, Clone)]
pub struct SangriaRepository {
    pool: SqlitePool,
}

impl SangriaRepository {
    /// Creates a new SangriaRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SangriaRepository { pool }
    }

    /// Records a withdrawal of `valor` by `user_id`.
    pub async fn create(&self, valor: Money, observacao: Option<&str>, user_id: &str) -> DbResult<SangriaRecord> {
        validate_price_cents("valor", valor.cents())?;

        let id = generate_id();

        sqlx::query(
            "INSERT INTO sangrias (id, valor_cents, observacao, usuario_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(valor.cents())
        .bind(normalize_optional(observacao))
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(sangria_id = %id, valor = %valor, user_id = %user_id, "Sangria recorded");
        self.require(&id).await
    }

    /// Gets a sangria by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<SangriaRecord>> {
        let sql = format!("{} WHERE s.id = ?1", RECORD_SELECT);
        let record = sqlx::query_as::<_, SangriaRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Gets a sangria or fails with NotFound.
    pub async fn require(&self, id: &str) -> DbResult<SangriaRecord> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sangria", id))
    }

    /// Newest first, optionally inside `range`, at most `limit` rows.
    pub async fn list(&self, range: Option<UtcRange>, limit: i64) -> DbResult<Vec<SangriaRecord>> {
        let (start, end) = range_bounds(range);
        let sql = format!(
            r#"{}
            WHERE (?1 IS NULL OR s.created_at >= ?1)
              AND (?2 IS NULL OR s.created_at < ?2)
            ORDER BY s.created_at DESC
            LIMIT ?3"#,
            RECORD_SELECT
        );
        let records = sqlx::query_as::<_, SangriaRecord>(&sql)
            .bind(start)
            .bind(end)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Every sangria inside `range`, newest first.
    pub async fn between(&self, range: UtcRange) -> DbResult<Vec<SangriaRecord>> {
        self.list(Some(range), -1).await
    }

    /// Σ valor inside `range`.
    pub async fn total_between(&self, range: UtcRange) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(valor_cents), 0) FROM sangrias WHERE created_at >= ?1 AND created_at < ?2",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_cents(total))
    }

    /// Removes a sangria and returns what was deleted.
    pub async fn delete(&self, id: &str) -> DbResult<SangriaRecord> {
        let record = self.require(id).await?;

        sqlx::query("DELETE FROM sangrias WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(sangria_id = %id, valor = %record.sangria.valor(), "Sangria deleted");
        Ok(record)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
