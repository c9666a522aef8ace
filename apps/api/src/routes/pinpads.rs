//! Card terminals: configuration, fees and the provider bridge.
//!
//! ```text
//! ┌──────────────┐      ┌──────────────────┐      ┌───────────────────────┐
//! │ /pinpads/... │ ───► │ ProviderRegistry │ ───► │ Mercado Pago / Rede   │
//! │  handlers    │      │ (client per pad) │      │ HTTP APIs             │
//! └──────────────┘      └──────────────────┘      └───────────────────────┘
//! ```

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use comandas_core::pinpad::{FeePreview, PinpadDraft, PinpadStats};
use comandas_core::types::{PaymentType, PinpadProvider, PinpadStatus};
use comandas_core::validation::validate_price_cents;
use comandas_core::{Money, Permission, Pinpad};
use comandas_db::PinpadFilter;
use comandas_pinpad::{
    CancelOutcome, Device, PaymentIntent, PaymentRequest, PaymentStatus, PixCharge, ProviderError, ProviderKind,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pinpads", get(list_pinpads).post(create_pinpad))
        .route("/pinpads/stats", get(stats))
        .route(
            "/pinpads/{id}",
            get(get_pinpad).put(update_pinpad).delete(delete_pinpad),
        )
        .route("/pinpads/{id}/test", post(test_connection))
        .route("/pinpads/{id}/default", post(set_default))
        .route("/pinpads/{id}/toggle", post(toggle_status))
        .route("/pinpads/{id}/fees", get(fee_preview))
        .route("/pinpads/{id}/devices", get(devices))
        .route("/pinpads/{id}/payments", post(create_payment))
        .route("/pinpads/{id}/payments/{intent_id}", get(payment_status))
        .route("/pinpads/{id}/payments/{intent_id}/cancel", post(cancel_payment))
        .route("/webhooks/mercadopago", post(mercado_pago_webhook))
}

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PinpadQuery {
    pub search: Option<String>,
    pub provider: Option<String>,
    pub status: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct FeeQuery {
    pub amount_cents: i64,
    #[serde(default)]
    pub payment_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
    pub last_test_at: Option<DateTime<Utc>>,
    pub last_test_success: bool,
}

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    #[serde(default)]
    pub device_id: Option<String>,
    pub amount_cents: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub payment_type: PaymentType,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PaymentResponse {
    Card(PaymentIntent),
    Pix(PixCharge),
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
}

fn parse_optional<T>(value: Option<&str>) -> ApiResult<Option<T>>
where
    T: std::str::FromStr<Err = comandas_core::ValidationError>,
{
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Ok(Some(v.parse()?)),
        None => Ok(None),
    }
}

// =============================================================================
// Configuration
// =============================================================================

async fn list_pinpads(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<PinpadQuery>,
) -> ApiResult<Json<Vec<Pinpad>>> {
    caller.require(Permission::ViewPinpad)?;

    let filter = PinpadFilter {
        search: query.search,
        provider: parse_optional::<PinpadProvider>(query.provider.as_deref())?,
        status: parse_optional::<PinpadStatus>(query.status.as_deref())?,
        active: query.active,
    };
    Ok(Json(state.db.pinpads().list(&filter).await?))
}

async fn stats(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<PinpadStats>> {
    caller.require(Permission::ViewPinpad)?;
    let pinpads = state.db.pinpads().all().await?;
    Ok(Json(PinpadStats::compute(&pinpads)))
}

async fn create_pinpad(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(draft): Json<PinpadDraft>,
) -> ApiResult<(StatusCode, Json<Pinpad>)> {
    caller.require(Permission::AddPinpad)?;

    let pinpad = state.db.pinpads().create(&draft, Some(caller.id())).await?;
    info!(pinpad = %pinpad.name, provider = %pinpad.provider, by = %caller.user.username, "Pinpad created");
    Ok((StatusCode::CREATED, Json(pinpad)))
}

async fn get_pinpad(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Pinpad>> {
    caller.require(Permission::ViewPinpad)?;
    Ok(Json(state.db.pinpads().require(&id).await?))
}

async fn update_pinpad(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(draft): Json<PinpadDraft>,
) -> ApiResult<Json<Pinpad>> {
    caller.require(Permission::ChangePinpad)?;

    let pinpad = state.db.pinpads().update(&id, &draft, Some(caller.id())).await?;
    state.providers.evict(&id).await;
    Ok(Json(pinpad))
}

async fn delete_pinpad(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::DeletePinpad)?;

    let pinpad = state.db.pinpads().delete(&id).await?;
    state.providers.evict(&id).await;
    info!(pinpad = %pinpad.name, by = %caller.user.username, "Pinpad deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Lists devices for providers with a client; other providers only get a
/// configuration check.
async fn test_connection(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ConnectionTest>> {
    caller.require(Permission::ChangePinpad)?;

    let pinpad = state.db.pinpads().require(&id).await?;
    let (success, message) = match ProviderKind::of(&pinpad) {
        Ok(_) => match state.providers.provider_for(&pinpad).await {
            Ok(provider) => match provider.devices().await {
                Ok(devices) => (true, format!("{} reachable, {} device(s)", provider.name(), devices.len())),
                Err(e) => (false, e.to_string()),
            },
            Err(e) => (false, e.to_string()),
        },
        Err(ProviderError::Unsupported(_)) => (true, "Configuration saved; no remote check for this provider".to_string()),
        Err(e) => (false, e.to_string()),
    };

    let pinpad = state.db.pinpads().record_test(&id, success, Utc::now()).await?;
    info!(pinpad = %pinpad.name, success, "Pinpad connection tested");

    Ok(Json(ConnectionTest {
        success,
        message,
        last_test_at: pinpad.last_test_at,
        last_test_success: pinpad.last_test_success,
    }))
}

async fn set_default(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Pinpad>> {
    caller.require(Permission::ChangePinpad)?;
    Ok(Json(state.db.pinpads().set_default(&id, Some(caller.id())).await?))
}

async fn toggle_status(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Pinpad>> {
    caller.require(Permission::ChangePinpad)?;

    let pinpad = state.db.pinpads().toggle_status(&id, Some(caller.id())).await?;
    state.providers.evict(&id).await;
    Ok(Json(pinpad))
}

async fn fee_preview(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<FeeQuery>,
) -> ApiResult<Json<FeePreview>> {
    caller.require(Permission::ViewPinpad)?;

    validate_price_cents("amount_cents", query.amount_cents)?;
    let payment_type = parse_optional::<PaymentType>(query.payment_type.as_deref())?.unwrap_or_default();

    let pinpad = state.db.pinpads().require(&id).await?;
    Ok(Json(pinpad.fee_preview(Money::from_cents(query.amount_cents), payment_type)))
}

// =============================================================================
// Provider Operations
// =============================================================================

async fn devices(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Device>>> {
    caller.require(Permission::ViewPinpad)?;

    let pinpad = state.db.pinpads().get_active(&id).await?;
    let provider = state.providers.provider_for(&pinpad).await?;
    Ok(Json(provider.devices().await?))
}

/// Card charges go to a terminal; PIX charges return a QR code.
async fn create_payment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<PaymentBody>,
) -> ApiResult<(StatusCode, Json<PaymentResponse>)> {
    caller.require(Permission::AddCheckout)?;

    validate_price_cents("amount_cents", body.amount_cents)?;
    let amount = Money::from_cents(body.amount_cents);
    let description = body
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("Venda")
        .to_string();

    let pinpad = state.db.pinpads().get_active(&id).await?;
    pinpad.ensure_amount_allowed(amount)?;
    let provider = state.providers.provider_for(&pinpad).await?;

    let response = match body.payment_type {
        PaymentType::Pix => PaymentResponse::Pix(provider.create_pix(amount, &description).await?),
        payment_type => {
            let device_id = body
                .device_id
                .filter(|d| !d.trim().is_empty())
                .ok_or_else(|| ApiError::validation("device_id is required for card payments"))?;
            let request = PaymentRequest {
                device_id,
                amount,
                description,
                payment_type,
            };
            PaymentResponse::Card(provider.create_payment(&request).await?)
        }
    };

    info!(
        pinpad = %pinpad.name,
        amount = %amount,
        payment_type = %body.payment_type,
        by = %caller.user.username,
        "Payment requested"
    );
    Ok((StatusCode::CREATED, Json(response)))
}

async fn payment_status(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, intent_id)): Path<(String, String)>,
) -> ApiResult<Json<PaymentStatus>> {
    caller.require(Permission::AddCheckout)?;

    let pinpad = state.db.pinpads().get_active(&id).await?;
    let provider = state.providers.provider_for(&pinpad).await?;
    Ok(Json(provider.payment_status(&intent_id).await?))
}

async fn cancel_payment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((id, intent_id)): Path<(String, String)>,
    body: Option<Json<CancelBody>>,
) -> ApiResult<Json<CancelOutcome>> {
    caller.require(Permission::AddCheckout)?;
    let Json(body) = body.unwrap_or_default();
    if let Some(cents) = body.amount_cents {
        validate_price_cents("amount_cents", cents)?;
    }

    let pinpad = state.db.pinpads().get_active(&id).await?;
    let provider = state.providers.provider_for(&pinpad).await?;
    let outcome = provider
        .cancel(
            &intent_id,
            body.device_id.as_deref(),
            body.amount_cents.map(Money::from_cents),
        )
        .await?;

    info!(pinpad = %pinpad.name, intent = %intent_id, by = %caller.user.username, "Payment cancelled");
    Ok(Json(outcome))
}

/// Mercado Pago notifications. Unauthenticated; the body is only logged.
async fn mercado_pago_webhook(body: Bytes) -> ApiResult<Json<Value>> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Invalid Mercado Pago webhook body");
        ApiError::validation("Invalid JSON body")
    })?;

    let kind = payload.get("type").and_then(serde_json::Value::as_str).unwrap_or("unknown");
    info!(
        kind,
        payload = %payload,
        "Mercado Pago webhook received"
    );
    Ok(Json(json!({ "status": "ok" })))
}
