//! Comandas: CRUD, status actions, closed orders, dashboard and report.
//!
//! ```text
//! POST /orders ──► aguardando ──start──► preparando ──finish──► pronta
//!                      │                     │                    │
//!                      └──────cancel─────────┴───────────┐   deliver/finalize
//!                                                        ▼        ▼
//!                                                   cancelada  entregue
//! ```

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::date_or_today;
use crate::AppState;
use comandas_core::order::OrderItemInput;
use comandas_core::report::DailyReport;
use comandas_core::types::OrderStatus;
use comandas_core::validation::validate_order_code;
use comandas_core::{Order, OrderDetail, Permission};
use comandas_db::{ClosedOrders, NewOrder, OrderDashboard, OrderFilter};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/today", get(today_orders))
        .route("/orders/active", get(active_orders))
        .route("/orders/closed", get(closed_orders))
        .route("/orders/closed/{code}", get(closed_order_detail))
        .route("/orders/dashboard", get(dashboard))
        .route("/orders/report", get(daily_report))
        .route("/orders/scan/{code}", get(scan))
        .route("/orders/{code}", get(get_order).put(update_order).delete(delete_order))
        .route("/orders/{code}/items", put(replace_items))
        .route("/orders/{code}/status", post(set_status))
        .route("/orders/{code}/start", post(start))
        .route("/orders/{code}/finish", post(finish))
        .route("/orders/{code}/deliver", post(deliver))
        .route("/orders/{code}/cancel", post(cancel))
        .route("/orders/{code}/finalize", post(finalize))
}

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub name: String,
    #[serde(default)]
    pub observations: Option<String>,
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderRequest {
    pub name: Option<String>,
    pub observations: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemsRequest {
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub date: Option<String>,
}

/// A delivered order with its neighbours on the closed list.
#[derive(Debug, Serialize)]
pub struct ClosedOrderDetail {
    #[serde(flatten)]
    pub detail: OrderDetail,
    pub duration_minutes: Option<i64>,
    pub previous: Option<String>,
    pub next: Option<String>,
}

// =============================================================================
// Reads
// =============================================================================

async fn list_orders(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Json<Vec<Order>>> {
    caller.require(Permission::ViewOrder)?;

    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(s.parse::<OrderStatus>()?),
        None => None,
    };
    let filter = OrderFilter {
        status,
        search: query.search,
        created: None,
    };
    Ok(Json(state.db.orders().list(&filter).await?))
}

/// Orders created on the current local day.
async fn today_orders(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<Vec<Order>>> {
    caller.require(Permission::ViewOrder)?;

    let filter = OrderFilter {
        created: Some(state.today()),
        ..Default::default()
    };
    Ok(Json(state.db.orders().list(&filter).await?))
}

async fn active_orders(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<Vec<Order>>> {
    caller.require(Permission::ViewOrder)?;
    Ok(Json(state.db.orders().active(false, None).await?))
}

async fn closed_orders(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<ClosedOrders>> {
    caller.require(Permission::ViewOrder)?;
    Ok(Json(state.db.orders().closed().await?))
}

async fn closed_order_detail(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<Json<ClosedOrderDetail>> {
    caller.require(Permission::ViewOrder)?;

    let orders = state.db.orders();
    let detail = orders.detail(&code).await?;
    if detail.order.status != OrderStatus::Entregue {
        return Err(ApiError::not_found("Closed order", &code));
    }

    let neighbours = orders.closed_neighbours(&detail.order).await?;
    Ok(Json(ClosedOrderDetail {
        duration_minutes: detail.total_time,
        previous: neighbours.previous,
        next: neighbours.next,
        detail,
    }))
}

async fn dashboard(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<OrderDashboard>> {
    caller.require(Permission::ViewOrder)?;
    Ok(Json(state.db.reports().order_dashboard(state.today()).await?))
}

async fn daily_report(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<DailyReport>> {
    caller.require(Permission::ViewOrder)?;

    let date = date_or_today(&state.calendar, "date", query.date.as_deref())?;
    let report = state.db.reports().daily_report(date, state.calendar.day(date)).await?;
    Ok(Json(report))
}

/// Ticket scanner lookup.
async fn scan(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<Json<OrderDetail>> {
    caller.require(Permission::ViewOrder)?;
    let code = validate_order_code(&code)?;
    Ok(Json(state.db.orders().detail(&code).await?))
}

async fn get_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<Json<OrderDetail>> {
    caller.require(Permission::ViewOrder)?;
    Ok(Json(state.db.orders().detail(&code).await?))
}

// =============================================================================
// Writes
// =============================================================================

async fn create_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderDetail>)> {
    caller.require(Permission::AddOrder)?;

    let detail = state
        .db
        .orders()
        .create(
            NewOrder {
                name: req.name,
                observations: req.observations,
                items: req.items,
            },
            Some(caller.id()),
        )
        .await?;

    info!(
        code = %detail.order.code,
        name = %detail.order.name,
        total = %detail.order.total(),
        by = %caller.user.username,
        "Order created"
    );
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn update_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(code): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> ApiResult<Json<OrderDetail>> {
    caller.require(Permission::ChangeOrder)?;

    let detail = state
        .db
        .orders()
        .update(&code, req.name.as_deref(), req.observations.as_deref(), Some(caller.id()))
        .await?;
    Ok(Json(detail))
}

async fn delete_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::DeleteOrder)?;

    state.db.orders().delete(&code).await?;
    info!(code = %code, by = %caller.user.username, "Order deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn replace_items(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(code): Path<String>,
    Json(req): Json<ItemsRequest>,
) -> ApiResult<Json<OrderDetail>> {
    caller.require(Permission::ChangeOrder)?;

    let detail = state
        .db
        .orders()
        .replace_items(&code, &req.items, Some(caller.id()))
        .await?;
    Ok(Json(detail))
}

async fn set_status(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(code): Path<String>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Order>> {
    caller.require(Permission::ChangeOrder)?;
    let status: OrderStatus = req.status.parse()?;
    transition(&state, &caller, &code, status).await
}

async fn transition(state: &AppState, caller: &AuthUser, code: &str, status: OrderStatus) -> ApiResult<Json<Order>> {
    caller.require(Permission::ChangeOrder)?;
    Ok(Json(state.db.orders().set_status(code, status, Some(caller.id())).await?))
}

async fn start(State(state): State<AppState>, caller: AuthUser, Path(code): Path<String>) -> ApiResult<Json<Order>> {
    transition(&state, &caller, &code, OrderStatus::Preparando).await
}

async fn finish(State(state): State<AppState>, caller: AuthUser, Path(code): Path<String>) -> ApiResult<Json<Order>> {
    transition(&state, &caller, &code, OrderStatus::Pronta).await
}

async fn deliver(State(state): State<AppState>, caller: AuthUser, Path(code): Path<String>) -> ApiResult<Json<Order>> {
    transition(&state, &caller, &code, OrderStatus::Entregue).await
}

async fn cancel(State(state): State<AppState>, caller: AuthUser, Path(code): Path<String>) -> ApiResult<Json<Order>> {
    transition(&state, &caller, &code, OrderStatus::Cancelada).await
}

/// Hands the order over: entregue, with delivered_at stamped if unset.
async fn finalize(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<Json<OrderDetail>> {
    caller.require(Permission::ChangeOrder)?;
    state
        .db
        .orders()
        .set_status(&code, OrderStatus::Entregue, Some(caller.id()))
        .await?;
    info!(code = %code, by = %caller.user.username, "Order finalized");
    Ok(Json(state.db.orders().detail(&code).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::test_support::TestApp;
    use comandas_core::types::ProductCategory;
    use comandas_core::Permission;
    use comandas_db::NewProduct;

    const WAITER: &[Permission] = &[
        Permission::ViewOrder,
        Permission::AddOrder,
        Permission::ChangeOrder,
        Permission::DeleteOrder,
    ];

    async fn product(app: &TestApp, name: &str, price_cents: i64) -> String {
        app.state
            .db
            .products()
            .create(
                NewProduct {
                    name: name.to_string(),
                    description: None,
                    category: ProductCategory::Bebidas,
                    price_cents,
                    show_in_menu: true,
                },
                None,
            )
            .await
            .unwrap()
            .id
    }

    async fn open_order(app: &TestApp, token: &str, name: &str, product_id: &str) -> Value {
        let (status, body) = app
            .post(
                "/api/orders",
                token,
                json!({
                    "name": name,
                    "items": [{ "product_id": product_id, "quantity": 2, "observations": "sem açúcar" }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("garcom", WAITER).await;
        let cafe = product(&app, "Café", 600).await;

        let order = open_order(&app, &token, "12", &cafe).await;
        assert_eq!(order["status"], "aguardando");
        assert_eq!(order["total_amount_cents"], 1_200);
        let code = order["code"].as_str().unwrap();
        assert_eq!(code.len(), 4);

        let (status, detail) = app.get(&format!("/api/orders/{}", code), &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["items"][0]["product_name"], "Café");
        assert_eq!(detail["items"][0]["unit_price_cents"], 600);
        assert!(detail["preparation_time"].is_null());

        let (status, scanned) = app.get(&format!("/api/orders/scan/{}", code), &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(scanned["name"], "12");

        let (status, body) = app.get("/api/orders/scan/12a", &token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Código deve ter exatamente 4 dígitos.");
    }

    #[tokio::test]
    async fn test_create_rejections() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("garcom", WAITER).await;
        let cafe = product(&app, "Café", 600).await;
        open_order(&app, &token, "7", &cafe).await;

        // name already used by an open order
        let (status, _) = app
            .post(
                "/api/orders",
                &token,
                json!({ "name": "7", "items": [{ "product_id": cafe, "quantity": 1 }] }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .post(
                "/api/orders",
                &token,
                json!({ "name": "mesa", "items": [{ "product_id": cafe, "quantity": 1 }] }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post("/api/orders", &token, json!({ "name": "8", "items": [] }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post(
                "/api/orders",
                &token,
                json!({ "name": "9", "items": [{ "product_id": "nao-existe", "quantity": 1 }] }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post(
                "/api/orders",
                &token,
                json!({
                    "name": "10",
                    "items": [{ "product_id": cafe, "quantity": 3, "unit_price_cents": 4_000_000_000_000_000_000_i64 }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_actions_stamp_once() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("garcom", WAITER).await;
        let cafe = product(&app, "Café", 600).await;
        let order = open_order(&app, &token, "3", &cafe).await;
        let base = format!("/api/orders/{}", order["code"].as_str().unwrap());

        let (status, started) = app.post(&format!("{}/start", base), &token, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["status"], "preparando");
        let started_at = started["started_at"].clone();
        assert!(!started_at.is_null());

        let (_, ready) = app.post(&format!("{}/finish", base), &token, json!({})).await;
        assert_eq!(ready["status"], "pronta");

        // back to preparando keeps the first stamp
        let (_, again) = app
            .post(&format!("{}/status", base), &token, json!({ "status": "preparando" }))
            .await;
        assert_eq!(again["started_at"], started_at);

        let (status, _) = app
            .post(&format!("{}/status", base), &token, json!({ "status": "voando" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, done) = app.post(&format!("{}/finalize", base), &token, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["status"], "entregue");
        assert!(!done["delivered_at"].is_null());
        assert!(!done["total_time"].is_null());
    }

    #[tokio::test]
    async fn test_replace_items_recomputes_total() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("garcom", WAITER).await;
        let cafe = product(&app, "Café", 600).await;
        let bolo = product(&app, "Bolo", 1_000).await;
        let order = open_order(&app, &token, "5", &cafe).await;
        let uri = format!("/api/orders/{}/items", order["code"].as_str().unwrap());

        let (status, detail) = app
            .put(
                &uri,
                &token,
                json!({ "items": [
                    { "product_id": bolo, "quantity": 1 },
                    { "product_id": cafe, "quantity": 3, "unit_price_cents": 500 },
                ] }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["total_amount_cents"], 2_500);
        assert_eq!(detail["items"].as_array().unwrap().len(), 2);

        let (status, _) = app
            .put(&uri, &token, json!({ "items": [{ "product_id": "sumiu", "quantity": 1 }] }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("garcom", WAITER).await;
        let cafe = product(&app, "Café", 600).await;
        let order = open_order(&app, &token, "4", &cafe).await;
        let uri = format!("/api/orders/{}", order["code"].as_str().unwrap());

        let (status, updated) = app
            .put(&uri, &token, json!({ "name": "40", "observations": "varanda" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "40");
        assert_eq!(updated["observations"], "varanda");

        let (status, _) = app.delete(&uri, &token).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.get(&uri, &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_lists_and_closed_orders() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("garcom", WAITER).await;
        let cafe = product(&app, "Café", 600).await;

        let first = open_order(&app, &token, "1", &cafe).await;
        let second = open_order(&app, &token, "2", &cafe).await;
        let first_code = first["code"].as_str().unwrap();
        let second_code = second["code"].as_str().unwrap();

        app.post(&format!("/api/orders/{}/deliver", first_code), &token, json!({})).await;

        let (_, active) = app.get("/api/orders/active", &token).await;
        assert_eq!(active.as_array().unwrap().len(), 1);
        assert_eq!(active[0]["code"], second_code);

        let (_, today) = app.get("/api/orders/today", &token).await;
        assert_eq!(today.as_array().unwrap().len(), 2);

        let (_, delivered) = app.get("/api/orders?status=entregue", &token).await;
        assert_eq!(delivered.as_array().unwrap().len(), 1);

        let (status, _) = app.get("/api/orders?status=perdida", &token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, closed) = app.get("/api/orders/closed", &token).await;
        assert_eq!(closed["count"], 1);
        assert_eq!(closed["revenue"], 1_200);

        let (status, detail) = app.get(&format!("/api/orders/closed/{}", first_code), &token).await;
        assert_eq!(status, StatusCode::OK);
        assert!(detail["previous"].is_null());
        assert!(detail["next"].is_null());

        let (status, _) = app.get(&format!("/api/orders/closed/{}", second_code), &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dashboard_and_report() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("garcom", WAITER).await;
        let cafe = product(&app, "Café", 600).await;

        let order = open_order(&app, &token, "6", &cafe).await;
        open_order(&app, &token, "16", &cafe).await;
        app.post(&format!("/api/orders/{}/deliver", order["code"].as_str().unwrap()), &token, json!({}))
            .await;

        let (status, dash) = app.get("/api/orders/dashboard", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dash["counts"]["entregue"], 1);
        assert_eq!(dash["counts"]["aguardando"], 1);
        assert_eq!(dash["sales"]["total"], 1_200);
        assert_eq!(dash["active"].as_array().unwrap().len(), 1);

        let (status, report) = app.get("/api/orders/report", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["revenue"], 1_200);
        assert_eq!(report["counts"]["total"], 2);

        let (status, empty) = app.get("/api/orders/report?date=2020-01-01", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(empty["counts"]["total"], 0);

        let (status, _) = app.get("/api/orders/report?date=ontem", &token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_view_permission_required() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("visitante", &[]).await;
        let (status, _) = app.get("/api/orders", &token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_status_change_checks_permission_before_input() {
        let app = TestApp::new().await;
        let (_, waiter) = app.user_with("garcom", WAITER).await;
        let (_, viewer) = app.user_with("cozinha", &[Permission::ViewOrder]).await;
        let cafe = product(&app, "Café", 600).await;
        let order = open_order(&app, &waiter, "11", &cafe).await;
        let base = format!("/api/orders/{}", order["code"].as_str().unwrap());

        let (status, _) = app
            .post(&format!("{}/status", base), &viewer, json!({ "status": "voando" }))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.post(&format!("{}/finalize", base), &viewer, json!({})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delete_refused_after_checkout() {
        let app = TestApp::new().await;
        let (_, token) = app
            .user_with("gerente", &[Permission::ViewOrder, Permission::AddOrder, Permission::DeleteOrder, Permission::AddCheckout])
            .await;
        let cafe = product(&app, "Café", 600).await;
        let order = open_order(&app, &token, "14", &cafe).await;
        let code = order["code"].as_str().unwrap();

        let (status, _) = app
            .post(&format!("/api/orders/{}/checkout", code), &token, json!({ "payment_method": "pix" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app.delete(&format!("/api/orders/{}", code), &token).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let (status, _) = app.get(&format!("/api/orders/{}", code), &token).await;
        assert_eq!(status, StatusCode::OK);
    }
}
