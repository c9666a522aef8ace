//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Filtered listing (search, category, menu flag)
//! - CRUD operations
//! - Soft delete guarded by active combos
//!
//! ## Filtering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WHERE is_active = 1                                                   │
//! │    AND (?search   IS NULL OR lower(name) LIKE ?search                  │
//! │                           OR lower(description) LIKE ?search)          │
//! │    AND (?category IS NULL OR category = ?category)                     │
//! │    AND (?menu     IS NULL OR show_in_menu = ?menu)                     │
//! │  ORDER BY category, name                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{generate_id, like_pattern};
use comandas_core::types::ProductCategory;
use comandas_core::validation::{normalize_optional, validate_name, validate_price_cents};
use comandas_core::{CoreError, Product};

/// Product name limit.
pub const MAX_PRODUCT_NAME: usize = 100;

/// Listing filters. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<ProductCategory>,
    pub show_in_menu: Option<bool>,
}

impl ProductFilter {
    /// Products listed on the public menu.
    pub fn menu() -> Self {
        ProductFilter {
            show_in_menu: Some(true),
            ..Default::default()
        }
    }
}

/// Fields of a product as submitted on create and update.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: ProductCategory,
    pub price_cents: i64,
    pub show_in_menu: bool,
}

impl NewProduct {
    fn validated(&self) -> DbResult<NewProduct> {
        let name = validate_name("name", &self.name, MAX_PRODUCT_NAME)?;
        validate_price_cents("price", self.price_cents)?;
        Ok(NewProduct {
            name,
            description: normalize_optional(self.description.as_deref()),
            ..self.clone()
        })
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let drinks = repo.list(&ProductFilter { category: Some(ProductCategory::Bebidas), ..Default::default() }).await?;
/// let product = repo.get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists active products matching the filter, by category then name.
    pub async fn list(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let search = like_pattern(filter.search.as_deref());

        debug!(search = ?search, category = ?filter.category, "Listing products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active = 1
              AND (?1 IS NULL OR lower(name) LIKE ?1 OR lower(COALESCE(description, '')) LIKE ?1)
              AND (?2 IS NULL OR category = ?2)
              AND (?3 IS NULL OR show_in_menu = ?3)
            ORDER BY category, name
            "#,
        )
        .bind(search)
        .bind(filter.category)
        .bind(filter.show_in_menu)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Products listed");
        Ok(products)
    }

    /// Gets a product by its ID, active or not.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Gets an active product or fails with NotFound.
    pub async fn require_active(&self, id: &str) -> DbResult<Product> {
        match self.get_by_id(id).await? {
            Some(product) if product.is_active => Ok(product),
            _ => Err(DbError::not_found("Product", id)),
        }
    }

    /// Inserts a new product.
    pub async fn create(&self, new: NewProduct, user_id: Option<&str>) -> DbResult<Product> {
        let new = new.validated()?;
        let id = generate_id();
        let now = Utc::now();

        debug!(name = %new.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, category, price_cents, show_in_menu,
                is_active, created_at, updated_at, created_by, updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7, ?8, ?8)
            "#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.category)
        .bind(new.price_cents)
        .bind(new.show_in_menu)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        info!(product_id = %id, name = %new.name, "Product created");
        self.require_active(&id).await
    }

    /// Updates an active product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Updated row
    /// * `Err(DbError::NotFound)` - Product doesn't exist or was deleted
    pub async fn update(&self, id: &str, update: NewProduct, user_id: Option<&str>) -> DbResult<Product> {
        let update = update.validated()?;

        debug!(id = %id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                category = ?4,
                price_cents = ?5,
                show_in_menu = ?6,
                updated_at = ?7,
                updated_by = ?8
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.category)
        .bind(update.price_cents)
        .bind(update.show_in_menu)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.require_active(id).await
    }

    /// Names of active combos containing the product.
    pub async fn active_combos_using(&self, product_id: &str) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT c.name FROM combos c
            INNER JOIN combo_items ci ON ci.combo_id = c.id
            WHERE ci.product_id = ?1 AND c.is_active = 1
            ORDER BY c.name
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// ## Errors
    /// `CoreError::ProductInActiveCombos` while an active combo lists it.
    pub async fn soft_delete(&self, id: &str, user_id: Option<&str>) -> DbResult<()> {
        let product = self.require_active(id).await?;

        let combos = self.active_combos_using(id).await?;
        if !combos.is_empty() {
            return Err(CoreError::ProductInActiveCombos {
                product: product.name,
                combos,
            }
            .into());
        }

        debug!(id = %id, "Soft-deleting product");

        sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2, updated_by = ?3 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Counts active products (for diagnostics and the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
