//! # Pinpad Repository
//!
//! Card terminal configuration.
//!
//! ## Default Terminal
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  set_default(B)            A.is_default = 1                            │
//! │     │                                                                   │
//! │     └── BEGIN                                                           │
//! │           UPDATE pinpads SET is_default = 0 WHERE id <> B              │
//! │           UPDATE pinpads SET is_default = 1 WHERE id = B               │
//! │         COMMIT                     B.is_default = 1, A cleared         │
//! │                                                                         │
//! │  idx_pinpads_single_default keeps it to one row even under races.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, like_pattern};
use comandas_core::pinpad::PinpadDraft;
use comandas_core::types::{PinpadProvider, PinpadStatus};
use comandas_core::validation::normalize_optional;
use comandas_core::{CoreError, Pinpad};

/// Listing filters.
#[derive(Debug, Clone, Default)]
pub struct PinpadFilter {
    /// Substring of name, description, merchant or terminal id.
    pub search: Option<String>,
    pub provider: Option<PinpadProvider>,
    pub status: Option<PinpadStatus>,
    pub active: Option<bool>,
}

/// Repository for pinpad database operations.
#[derive(Debug, Clone)]
pub struct PinpadRepository {
    pool: SqlitePool,
}

impl PinpadRepository {
    /// Creates a new PinpadRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PinpadRepository { pool }
    }

    /// Lists pinpads: default first, then active, then by name.
    pub async fn list(&self, filter: &PinpadFilter) -> DbResult<Vec<Pinpad>> {
        let search = like_pattern(filter.search.as_deref());

        let pinpads = sqlx::query_as::<_, Pinpad>(
            r#"
            SELECT * FROM pinpads
            WHERE (?1 IS NULL
                   OR lower(name) LIKE ?1
                   OR lower(COALESCE(description, '')) LIKE ?1
                   OR lower(COALESCE(merchant_id, '')) LIKE ?1
                   OR lower(COALESCE(terminal_id, '')) LIKE ?1)
              AND (?2 IS NULL OR provider = ?2)
              AND (?3 IS NULL OR status = ?3)
              AND (?4 IS NULL OR is_active = ?4)
            ORDER BY is_default DESC, is_active DESC, name
            "#,
        )
        .bind(search)
        .bind(filter.provider)
        .bind(filter.status)
        .bind(filter.active)
        .fetch_all(&self.pool)
        .await?;
        Ok(pinpads)
    }

    /// Every pinpad, for statistics.
    pub async fn all(&self) -> DbResult<Vec<Pinpad>> {
        self.list(&PinpadFilter::default()).await
    }

    /// Gets a pinpad by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<Pinpad>> {
        let pinpad = sqlx::query_as::<_, Pinpad>("SELECT * FROM pinpads WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(pinpad)
    }

    /// Gets a pinpad or fails with NotFound.
    pub async fn require(&self, id: &str) -> DbResult<Pinpad> {
        self.get(id).await?.ok_or_else(|| DbError::not_found("Pinpad", id))
    }

    /// Gets an active pinpad. Inactive terminals read as missing.
    pub async fn get_active(&self, id: &str) -> DbResult<Pinpad> {
        match self.get(id).await? {
            Some(pinpad) if pinpad.is_active => Ok(pinpad),
            _ => Err(DbError::not_found("Pinpad", id)),
        }
    }

    /// The current default terminal, if any.
    pub async fn default_pinpad(&self) -> DbResult<Option<Pinpad>> {
        let pinpad = sqlx::query_as::<_, Pinpad>("SELECT * FROM pinpads WHERE is_default = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(pinpad)
    }

    /// Inserts a pinpad. A default draft takes the flag from the others.
    pub async fn create(&self, draft: &PinpadDraft, user_id: Option<&str>) -> DbResult<Pinpad> {
        draft.validate()?;
        let id = generate_id();
        let now = Utc::now();

        debug!(name = %draft.name, provider = %draft.provider, "Creating pinpad");

        let mut tx = self.pool.begin().await?;
        if draft.is_default {
            clear_defaults(&mut tx, &id).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO pinpads (
                id, name, description, provider, status,
                api_url, api_key, api_secret, merchant_id, terminal_id, pix_key, webhook_url,
                supports_credit, supports_debit, supports_contactless, supports_pix,
                credit_fee_bps, debit_fee_bps, pix_fee_bps, credit_fixed_fee_cents, debit_fixed_fee_cents,
                timeout_seconds, max_amount_cents, is_default, is_active,
                last_test_at, last_test_success, created_at, updated_at, created_by, updated_by
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?21,
                ?22, ?23, ?24, 1,
                NULL, 0, ?25, ?25, ?26, ?26
            )
            "#,
        )
        .bind(&id)
        .bind(draft.name.trim())
        .bind(normalize_optional(draft.description.as_deref()))
        .bind(draft.provider)
        .bind(draft.status)
        .bind(normalize_optional(draft.api_url.as_deref()))
        .bind(normalize_optional(draft.api_key.as_deref()))
        .bind(normalize_optional(draft.api_secret.as_deref()))
        .bind(normalize_optional(draft.merchant_id.as_deref()))
        .bind(normalize_optional(draft.terminal_id.as_deref()))
        .bind(normalize_optional(draft.pix_key.as_deref()))
        .bind(normalize_optional(draft.webhook_url.as_deref()))
        .bind(draft.supports_credit)
        .bind(draft.supports_debit)
        .bind(draft.supports_contactless)
        .bind(draft.supports_pix)
        .bind(draft.credit_fee_bps)
        .bind(draft.debit_fee_bps)
        .bind(draft.pix_fee_bps)
        .bind(draft.credit_fixed_fee_cents)
        .bind(draft.debit_fixed_fee_cents)
        .bind(draft.timeout_seconds)
        .bind(draft.max_amount_cents)
        .bind(draft.is_default)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(pinpad_id = %id, name = %draft.name, "Pinpad created");
        self.require(&id).await
    }

    /// Replaces every editable field. A blank api_secret keeps the stored one.
    pub async fn update(&self, id: &str, draft: &PinpadDraft, user_id: Option<&str>) -> DbResult<Pinpad> {
        draft.validate()?;
        let current = self.require(id).await?;

        if draft.is_default && !current.is_default && !current.is_active {
            return Err(CoreError::InactivePinpad(current.name).into());
        }

        let api_secret = normalize_optional(draft.api_secret.as_deref()).or(current.api_secret);

        let mut tx = self.pool.begin().await?;
        if draft.is_default {
            clear_defaults(&mut tx, id).await?;
        }

        sqlx::query(
            r#"
            UPDATE pinpads SET
                name = ?2, description = ?3, provider = ?4, status = ?5,
                api_url = ?6, api_key = ?7, api_secret = ?8, merchant_id = ?9,
                terminal_id = ?10, pix_key = ?11, webhook_url = ?12,
                supports_credit = ?13, supports_debit = ?14,
                supports_contactless = ?15, supports_pix = ?16,
                credit_fee_bps = ?17, debit_fee_bps = ?18, pix_fee_bps = ?19,
                credit_fixed_fee_cents = ?20, debit_fixed_fee_cents = ?21,
                timeout_seconds = ?22, max_amount_cents = ?23, is_default = ?24,
                updated_at = ?25, updated_by = ?26
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(draft.name.trim())
        .bind(normalize_optional(draft.description.as_deref()))
        .bind(draft.provider)
        .bind(draft.status)
        .bind(normalize_optional(draft.api_url.as_deref()))
        .bind(normalize_optional(draft.api_key.as_deref()))
        .bind(api_secret)
        .bind(normalize_optional(draft.merchant_id.as_deref()))
        .bind(normalize_optional(draft.terminal_id.as_deref()))
        .bind(normalize_optional(draft.pix_key.as_deref()))
        .bind(normalize_optional(draft.webhook_url.as_deref()))
        .bind(draft.supports_credit)
        .bind(draft.supports_debit)
        .bind(draft.supports_contactless)
        .bind(draft.supports_pix)
        .bind(draft.credit_fee_bps)
        .bind(draft.debit_fee_bps)
        .bind(draft.pix_fee_bps)
        .bind(draft.credit_fixed_fee_cents)
        .bind(draft.debit_fixed_fee_cents)
        .bind(draft.timeout_seconds)
        .bind(draft.max_amount_cents)
        .bind(draft.is_default)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.require(id).await
    }

    /// Deletes a pinpad that is not the default.
    pub async fn delete(&self, id: &str) -> DbResult<Pinpad> {
        let pinpad = self.require(id).await?;
        if pinpad.is_default {
            return Err(CoreError::DefaultPinpadLocked(pinpad.name).into());
        }

        sqlx::query("DELETE FROM pinpads WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(pinpad_id = %id, name = %pinpad.name, "Pinpad deleted");
        Ok(pinpad)
    }

    /// Makes an active pinpad the only default.
    pub async fn set_default(&self, id: &str, user_id: Option<&str>) -> DbResult<Pinpad> {
        let pinpad = self.require(id).await?;
        if !pinpad.is_active {
            return Err(CoreError::InactivePinpad(pinpad.name).into());
        }

        let mut tx = self.pool.begin().await?;
        clear_defaults(&mut tx, id).await?;
        sqlx::query("UPDATE pinpads SET is_default = 1, updated_at = ?2, updated_by = ?3 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(pinpad_id = %id, name = %pinpad.name, "Default pinpad changed");
        self.require(id).await
    }

    /// Flips is_active. A deactivated default loses the flag.
    pub async fn toggle_status(&self, id: &str, user_id: Option<&str>) -> DbResult<Pinpad> {
        let pinpad = self.require(id).await?;
        let active = !pinpad.is_active;

        sqlx::query(
            r#"
            UPDATE pinpads SET
                is_active = ?2,
                is_default = CASE WHEN ?2 THEN is_default ELSE 0 END,
                updated_at = ?3,
                updated_by = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        info!(pinpad_id = %id, active, "Pinpad toggled");
        self.require(id).await
    }

    /// Stores the outcome of a connection test.
    pub async fn record_test(&self, id: &str, success: bool, at: DateTime<Utc>) -> DbResult<Pinpad> {
        if !success {
            warn!(pinpad_id = %id, "Pinpad connection test failed");
        }

        let result = sqlx::query("UPDATE pinpads SET last_test_at = ?2, last_test_success = ?3 WHERE id = ?1")
            .bind(id)
            .bind(at)
            .bind(success)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Pinpad", id));
        }
        self.require(id).await
    }
}

async fn clear_defaults(conn: &mut SqliteConnection, except_id: &str) -> DbResult<()> {
    sqlx::query("UPDATE pinpads SET is_default = 0 WHERE is_default = 1 AND id <> ?1")
        .bind(except_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
