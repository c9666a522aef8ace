//! # Combo Repository
//!
//! Combos and their lines. Creating or editing a combo rewrites all of its
//! lines inside one transaction.
//!
//! ```text
//! save(combo, items)
//!   ├── validate_combo_items (non-empty, unique products, qty ≥ 1, price ≥ 0,01)
//!   ├── each product must exist and be active
//!   ├── combo_price ≤ product.price × qty × 2
//!   └── BEGIN; upsert combo; DELETE lines; INSERT lines; COMMIT
//! ```

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, like_pattern};
use comandas_core::catalog::{validate_combo_items, validate_combo_price_cap, ComboDetail, ComboItemInput};
use comandas_core::validation::{normalize_optional, validate_name};
use comandas_core::{Combo, ComboLine, CoreError, Money};

/// Combo name limit.
pub const MAX_COMBO_NAME: usize = 100;

/// Listing filters.
#[derive(Debug, Clone, Default)]
pub struct ComboFilter {
    pub search: Option<String>,
    pub show_in_menu: Option<bool>,
}

/// A combo as submitted on create and update.
#[derive(Debug, Clone)]
pub struct NewCombo {
    pub name: String,
    pub description: Option<String>,
    pub show_in_menu: bool,
    pub items: Vec<ComboItemInput>,
}

/// Repository for combo database operations.
#[derive(Debug, Clone)]
pub struct ComboRepository {
    pool: SqlitePool,
}

impl ComboRepository {
    /// Creates a new ComboRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ComboRepository { pool }
    }

    /// Lists active combos by name.
    pub async fn list(&self, filter: &ComboFilter) -> DbResult<Vec<Combo>> {
        let search = like_pattern(filter.search.as_deref());

        let combos = sqlx::query_as::<_, Combo>(
            r#"
            SELECT * FROM combos
            WHERE is_active = 1
              AND (?1 IS NULL OR lower(name) LIKE ?1 OR lower(COALESCE(description, '')) LIKE ?1)
              AND (?2 IS NULL OR show_in_menu = ?2)
            ORDER BY name
            "#,
        )
        .bind(search)
        .bind(filter.show_in_menu)
        .fetch_all(&self.pool)
        .await?;
        Ok(combos)
    }

    /// Lists active combos with lines and pricing.
    pub async fn list_details(&self, filter: &ComboFilter) -> DbResult<Vec<ComboDetail>> {
        let combos = self.list(filter).await?;
        let mut details = Vec::with_capacity(combos.len());
        for combo in combos {
            let items = self.lines(&combo.id).await?;
            details.push(ComboDetail::new(combo, items));
        }
        Ok(details)
    }

    /// Gets an active combo.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Combo>> {
        let combo = sqlx::query_as::<_, Combo>("SELECT * FROM combos WHERE id = ?1 AND is_active = 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(combo)
    }

    /// An active combo with lines and pricing.
    pub async fn detail(&self, id: &str) -> DbResult<ComboDetail> {
        let combo = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Combo", id))?;
        let items = self.lines(id).await?;
        Ok(ComboDetail::new(combo, items))
    }

    /// Lines of a combo joined with their products.
    pub async fn lines(&self, combo_id: &str) -> DbResult<Vec<ComboLine>> {
        let lines = sqlx::query_as::<_, ComboLine>(
            r#"
            SELECT
                ci.id, ci.combo_id, ci.product_id,
                p.name AS product_name,
                p.category AS product_category,
                p.price_cents AS product_price_cents,
                ci.quantity, ci.combo_price_cents
            FROM combo_items ci
            INNER JOIN products p ON p.id = ci.product_id
            WHERE ci.combo_id = ?1
            ORDER BY p.name
            "#,
        )
        .bind(combo_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    /// Creates a combo and its lines.
    pub async fn create(&self, new: NewCombo, user_id: Option<&str>) -> DbResult<ComboDetail> {
        let (name, description) = self.validate(&new).await?;
        let id = generate_id();
        let now = Utc::now();

        debug!(name = %name, items = new.items.len(), "Creating combo");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO combos (
                id, name, description, show_in_menu, is_active,
                created_at, updated_at, created_by, updated_by
            ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(&name)
        .bind(&description)
        .bind(new.show_in_menu)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        insert_lines(&mut tx, &id, &new.items).await?;
        tx.commit().await?;

        info!(combo_id = %id, name = %name, "Combo created");
        self.detail(&id).await
    }

    /// Updates a combo and replaces all of its lines.
    pub async fn update(&self, id: &str, update: NewCombo, user_id: Option<&str>) -> DbResult<ComboDetail> {
        let (name, description) = self.validate(&update).await?;

        debug!(combo_id = %id, items = update.items.len(), "Updating combo");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE combos SET
                name = ?2, description = ?3, show_in_menu = ?4,
                updated_at = ?5, updated_by = ?6
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(&description)
        .bind(update.show_in_menu)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Combo", id));
        }

        sqlx::query("DELETE FROM combo_items WHERE combo_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        insert_lines(&mut tx, id, &update.items).await?;
        tx.commit().await?;

        self.detail(id).await
    }

    /// Soft-deletes a combo.
    pub async fn soft_delete(&self, id: &str, user_id: Option<&str>) -> DbResult<()> {
        debug!(combo_id = %id, "Soft-deleting combo");

        let result = sqlx::query(
            "UPDATE combos SET is_active = 0, updated_at = ?2, updated_by = ?3 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Combo", id));
        }
        Ok(())
    }

    /// Field rules plus the product checks that need the database.
    async fn validate(&self, combo: &NewCombo) -> DbResult<(String, Option<String>)> {
        let name = validate_name("name", &combo.name, MAX_COMBO_NAME)?;
        validate_combo_items(&combo.items)?;

        for item in &combo.items {
            let product = sqlx::query_as::<_, (String, i64)>(
                "SELECT name, price_cents FROM products WHERE id = ?1 AND is_active = 1",
            )
            .bind(&item.product_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

            validate_combo_price_cap(
                &product.0,
                Money::from_cents(product.1),
                item.quantity,
                Money::from_cents(item.combo_price_cents),
            )?;
        }

        Ok((name, normalize_optional(combo.description.as_deref())))
    }
}

async fn insert_lines(
    tx: &mut Transaction<'_, Sqlite>,
    combo_id: &str,
    items: &[ComboItemInput],
) -> DbResult<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO combo_items (id, combo_id, product_id, quantity, combo_price_cents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(generate_id())
        .bind(combo_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.combo_price_cents)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
