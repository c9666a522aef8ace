//! The till: open-order queue, print view, finalize, cancel and refund.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::{date_or_today, Amount, DateRangeQuery};
use crate::AppState;
use comandas_core::types::PaymentMethod;
use comandas_core::{CheckoutRecord, Money, OpenOrder, OpenOrderStats, Order, OrderLine, Permission};
use comandas_db::FinalizeCheckout;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkouts", get(list_checkouts))
        .route("/checkouts/open", get(open_orders))
        .route("/checkouts/{id}", get(get_checkout))
        .route("/checkouts/{id}/cancel", post(cancel_checkout))
        .route("/checkouts/{id}/refund", post(refund_checkout))
        .route("/orders/{code}/print", get(print_order))
        .route("/orders/{code}/checkout", post(finalize_checkout))
}

#[derive(Debug, Serialize)]
pub struct OpenOrdersResponse {
    pub orders: Vec<OpenOrder>,
    pub stats: OpenOrderStats,
}

#[derive(Debug, Serialize)]
pub struct PrintLine {
    #[serde(flatten)]
    pub line: OrderLine,
    pub subtotal: Amount,
}

/// What the receipt printer renders.
#[derive(Debug, Serialize)]
pub struct PrintView {
    pub order: Order,
    pub items: Vec<PrintLine>,
    pub total: Amount,
    pub printed_at: DateTime<Utc>,
    /// Local time as shown on the ticket ("14/10/2026 09:30").
    pub printed_at_local: String,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    pub payment_method: String,
    #[serde(default)]
    pub desconto_cents: i64,
    #[serde(default)]
    pub taxa_servico_cents: i64,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_document: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

async fn open_orders(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<OpenOrdersResponse>> {
    caller.require(Permission::ViewCheckout)?;

    let orders = state.db.checkouts().open_orders().await?;
    let stats = OpenOrderStats::compute(&orders);
    Ok(Json(OpenOrdersResponse { orders, stats }))
}

async fn print_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<Json<PrintView>> {
    caller.require(Permission::ViewCheckout)?;

    let detail = state.db.orders().detail(&code).await?;
    let items = detail
        .items
        .into_iter()
        .map(|line| PrintLine {
            subtotal: line.total().into(),
            line,
        })
        .collect();

    let now = Utc::now();
    Ok(Json(PrintView {
        total: detail.order.total().into(),
        order: detail.order,
        items,
        printed_at: now,
        printed_at_local: state.calendar.format_short(now),
    }))
}

async fn finalize_checkout(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(code): Path<String>,
    Json(req): Json<FinalizeRequest>,
) -> ApiResult<(StatusCode, Json<CheckoutRecord>)> {
    caller.require(Permission::AddCheckout)?;

    let payment_method: PaymentMethod = req.payment_method.parse()?;
    let input = FinalizeCheckout {
        payment_method,
        desconto: Money::from_cents(req.desconto_cents),
        taxa_servico: Money::from_cents(req.taxa_servico_cents),
        customer_name: req.customer_name,
        customer_document: req.customer_document,
        notes: req.notes,
    };

    let record = state.db.checkouts().finalize(&code, input, Some(caller.id())).await?;
    info!(
        code = %record.order_code,
        method = %payment_method,
        total = %record.checkout.total(),
        by = %caller.user.username,
        "Checkout finalized"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

/// Checkouts created between two local dates, both defaulting to today.
async fn list_checkouts(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<Json<Vec<CheckoutRecord>>> {
    caller.require(Permission::ViewCheckout)?;

    let start = date_or_today(&state.calendar, "data_inicio", query.data_inicio.as_deref())?;
    let end = date_or_today(&state.calendar, "data_fim", query.data_fim.as_deref())?;
    if end < start {
        return Err(ApiError::validation("data_fim must not be before data_inicio"));
    }

    let records = state.db.checkouts().list_between(state.calendar.range(start, end)).await?;
    Ok(Json(records))
}

async fn get_checkout(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<CheckoutRecord>> {
    caller.require(Permission::ViewCheckout)?;
    Ok(Json(state.db.checkouts().require(&id).await?))
}

async fn cancel_checkout(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<CheckoutRecord>> {
    caller.require(Permission::ChangeCheckout)?;

    let record = state.db.checkouts().cancel(&id, Some(caller.id())).await?;
    info!(checkout_id = %id, by = %caller.user.username, "Checkout cancelled");
    Ok(Json(record))
}

async fn refund_checkout(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<CheckoutRecord>> {
    caller.require(Permission::ChangeCheckout)?;

    let record = state.db.checkouts().refund(&id, Some(caller.id())).await?;
    info!(checkout_id = %id, total = %record.checkout.total(), by = %caller.user.username, "Checkout refunded");
    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::TestApp;
    use comandas_core::order::OrderItemInput;
    use comandas_core::types::{OrderStatus, ProductCategory};
    use comandas_core::Permission;
    use comandas_db::{NewOrder, NewProduct};

    const CASHIER: &[Permission] = &[
        Permission::ViewCheckout,
        Permission::AddCheckout,
        Permission::ChangeCheckout,
    ];

    /// An open order of `quantity` × R$ 10,00; returns its code.
    async fn order(app: &TestApp, name: &str, quantity: i64) -> String {
        let product = app
            .state
            .db
            .products()
            .create(
                NewProduct {
                    name: format!("Prato {}", name),
                    description: None,
                    category: ProductCategory::Lanches,
                    price_cents: 1_000,
                    show_in_menu: true,
                },
                None,
            )
            .await
            .unwrap();
        app.state
            .db
            .orders()
            .create(
                NewOrder {
                    name: name.to_string(),
                    observations: None,
                    items: vec![OrderItemInput {
                        product_id: product.id,
                        quantity,
                        unit_price_cents: None,
                        observations: None,
                    }],
                },
                None,
            )
            .await
            .unwrap()
            .order
            .code
    }

    #[tokio::test]
    async fn test_open_queue_priority_and_stats() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("caixa", CASHIER).await;

        let waiting = order(&app, "1", 1).await;
        let ready = order(&app, "2", 3).await;
        let delivered = order(&app, "3", 1).await;
        app.state.db.orders().set_status(&ready, OrderStatus::Pronta, None).await.unwrap();
        app.state.db.orders().set_status(&delivered, OrderStatus::Entregue, None).await.unwrap();

        let (status, body) = app.get("/api/checkouts/open", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["orders"].as_array().unwrap().len(), 2);
        assert_eq!(body["orders"][0]["code"], ready.as_str());
        assert_eq!(body["orders"][0]["total_items"], 3);
        assert_eq!(body["orders"][1]["code"], waiting.as_str());
        assert_eq!(body["stats"]["total_orders"], 2);
        assert_eq!(body["stats"]["total_value"], 4_000);
        assert_eq!(body["stats"]["avg_ticket"], 2_000);
    }

    #[tokio::test]
    async fn test_print_view() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("caixa", CASHIER).await;
        let code = order(&app, "9", 2).await;

        let (status, view) = app.get(&format!("/api/orders/{}/print", code), &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["items"][0]["subtotal"]["cents"], 2_000);
        assert_eq!(view["total"]["formatted"], "R$ 20,00");
        assert!(view["printed_at_local"].is_string());

        let (status, _) = app.get("/api/orders/0000/print", &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_finalize_marks_order_delivered() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("caixa", CASHIER).await;
        let code = order(&app, "4", 2).await;
        let uri = format!("/api/orders/{}/checkout", code);

        let (status, record) = app
            .post(
                &uri,
                &token,
                json!({
                    "payment_method": "pix",
                    "desconto_cents": 500,
                    "taxa_servico_cents": 200,
                    "customer_name": "Maria",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", record);
        assert_eq!(record["status"], "aprovado");
        assert_eq!(record["subtotal_cents"], 2_000);
        assert_eq!(record["total_cents"], 1_700);
        assert_eq!(record["order_code"], code.as_str());

        let order = app.state.db.orders().require(&code).await.unwrap();
        assert_eq!(order.status, OrderStatus::Entregue);
        assert!(order.delivered_at.is_some());

        // closed now, so a second finalize conflicts
        let (status, _) = app.post(&uri, &token, json!({ "payment_method": "dinheiro" })).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // reopening doesn't allow a second checkout
        app.state
            .db
            .orders()
            .set_status(&code, OrderStatus::Aguardando, None)
            .await
            .unwrap();
        let (status, body) = app.post(&uri, &token, json!({ "payment_method": "pix" })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["message"].as_str().unwrap().contains("already has a checkout"), "{}", body);
    }

    #[tokio::test]
    async fn test_finalize_rejections() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("caixa", CASHIER).await;
        let code = order(&app, "5", 1).await;
        let uri = format!("/api/orders/{}/checkout", code);

        let (status, _) = app.post(&uri, &token, json!({ "payment_method": "cheque" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post(&uri, &token, json!({ "payment_method": "dinheiro", "desconto_cents": 1_001 }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post(&uri, &token, json!({ "payment_method": "dinheiro", "taxa_servico_cents": i64::MAX }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post("/api/orders/0000/checkout", &token, json!({ "payment_method": "dinheiro" }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, viewer) = app.user_with("olheiro", &[Permission::ViewCheckout]).await;
        let (status, _) = app.post(&uri, &viewer, json!({ "payment_method": "dinheiro" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_list_refund_and_cancel() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("caixa", CASHIER).await;
        let code = order(&app, "6", 1).await;

        let (_, record) = app
            .post(&format!("/api/orders/{}/checkout", code), &token, json!({ "payment_method": "cartao_debito" }))
            .await;
        let id = record["id"].as_str().unwrap().to_string();

        let (status, listed) = app.get("/api/checkouts", &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = app
            .get("/api/checkouts?data_inicio=2026-10-14&data_fim=2026-10-01", &token)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // approved checkouts are refunded, not cancelled
        let (status, _) = app.post(&format!("/api/checkouts/{}/cancel", id), &token, json!({})).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, refunded) = app.post(&format!("/api/checkouts/{}/refund", id), &token, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(refunded["status"], "estornado");

        let (status, _) = app.post(&format!("/api/checkouts/{}/refund", id), &token, json!({})).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, fetched) = app.get(&format!("/api/checkouts/{}", id), &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["payment_method"], "cartao_debito");
    }
}
