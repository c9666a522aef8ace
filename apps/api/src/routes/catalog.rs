//! Products, combos and the menu.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::AppState;
use comandas_core::catalog::ComboItemInput;
use comandas_core::types::ProductCategory;
use comandas_core::{ComboDetail, Permission, Product};
use comandas_db::{ComboFilter, NewCombo, NewProduct, ProductFilter};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/combos", get(list_combos).post(create_combo))
        .route("/combos/{id}", get(get_combo).put(update_combo).delete(delete_combo))
        .route("/menu", get(menu))
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub show_in_menu: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ComboQuery {
    pub search: Option<String>,
    pub show_in_menu: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: ProductCategory,
    pub price_cents: i64,
    #[serde(default = "default_true")]
    pub show_in_menu: bool,
}

impl From<ProductRequest> for NewProduct {
    fn from(req: ProductRequest) -> Self {
        NewProduct {
            name: req.name,
            description: req.description,
            category: req.category,
            price_cents: req.price_cents,
            show_in_menu: req.show_in_menu,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ComboRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub show_in_menu: bool,
    #[serde(default)]
    pub items: Vec<ComboItemInput>,
}

impl From<ComboRequest> for NewCombo {
    fn from(req: ComboRequest) -> Self {
        NewCombo {
            name: req.name,
            description: req.description,
            show_in_menu: req.show_in_menu,
            items: req.items,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct Menu {
    pub products: Vec<Product>,
    pub combos: Vec<ComboDetail>,
}

// =============================================================================
// Products
// =============================================================================

async fn list_products(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    caller.require(Permission::ViewProduct)?;

    let category = match query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => Some(c.parse::<ProductCategory>()?),
        None => None,
    };
    let filter = ProductFilter {
        search: query.search,
        category,
        show_in_menu: query.show_in_menu,
    };
    Ok(Json(state.db.products().list(&filter).await?))
}

async fn create_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<ProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    caller.require(Permission::AddProduct)?;

    let product = state.db.products().create(req.into(), Some(caller.id())).await?;
    info!(product = %product.name, by = %caller.user.username, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    caller.require(Permission::ViewProduct)?;
    Ok(Json(state.db.products().require_active(&id).await?))
}

async fn update_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ProductRequest>,
) -> ApiResult<Json<Product>> {
    caller.require(Permission::ChangeProduct)?;
    Ok(Json(state.db.products().update(&id, req.into(), Some(caller.id())).await?))
}

async fn delete_product(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::DeleteProduct)?;

    state.db.products().soft_delete(&id, Some(caller.id())).await?;
    info!(product_id = %id, by = %caller.user.username, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Combos
// =============================================================================

async fn list_combos(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<ComboQuery>,
) -> ApiResult<Json<Vec<ComboDetail>>> {
    caller.require(Permission::ViewCombo)?;

    let filter = ComboFilter {
        search: query.search,
        show_in_menu: query.show_in_menu,
    };
    Ok(Json(state.db.combos().list_details(&filter).await?))
}

async fn create_combo(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<ComboRequest>,
) -> ApiResult<(StatusCode, Json<ComboDetail>)> {
    caller.require(Permission::AddCombo)?;

    let combo = state.db.combos().create(req.into(), Some(caller.id())).await?;
    info!(combo = %combo.combo.name, items = combo.items.len(), "Combo created");
    Ok((StatusCode::CREATED, Json(combo)))
}

async fn get_combo(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ComboDetail>> {
    caller.require(Permission::ViewCombo)?;
    Ok(Json(state.db.combos().detail(&id).await?))
}

async fn update_combo(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ComboRequest>,
) -> ApiResult<Json<ComboDetail>> {
    caller.require(Permission::ChangeCombo)?;
    Ok(Json(state.db.combos().update(&id, req.into(), Some(caller.id())).await?))
}

async fn delete_combo(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::DeleteCombo)?;

    state.db.combos().soft_delete(&id, Some(caller.id())).await?;
    info!(combo_id = %id, by = %caller.user.username, "Combo deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Menu
// =============================================================================

/// What the waiters pick from. Any signed-in user may read it.
async fn menu(State(state): State<AppState>, _caller: AuthUser) -> ApiResult<Json<Menu>> {
    let products = state.db.products().list(&ProductFilter::menu()).await?;
    let combos = state
        .db
        .combos()
        .list_details(&ComboFilter {
            show_in_menu: Some(true),
            ..Default::default()
        })
        .await?;

    Ok(Json(Menu { products, combos }))
}
