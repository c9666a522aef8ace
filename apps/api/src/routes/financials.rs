//! Sangrias (cash withdrawals) and the financial dashboard.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::{date_or_today, lenient_date, Amount, DateRangeQuery};
use crate::AppState;
use comandas_core::calendar::UtcRange;
use comandas_core::validation::{normalize_optional, parse_brl_amount};
use comandas_core::{Money, Permission, SangriaRecord, SANGRIA_LIST_LIMIT};
use comandas_db::{FinancialDashboard, Period};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sangrias", get(list_sangrias).post(create_sangria))
        .route("/sangrias/page", get(sangria_page))
        .route("/sangrias/{id}", delete(delete_sangria))
        .route("/financials/dashboard", get(dashboard))
}

/// Lower bound for a listing with no start date.
fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SangriaRequest {
    /// BRL text as typed: "R$ 1.234,56", "50", "12,5".
    pub valor: String,
    #[serde(default)]
    pub observacao: Option<String>,
}

/// A sangria as the till shows it.
#[derive(Debug, Serialize)]
pub struct SangriaView {
    pub id: String,
    pub code: String,
    pub valor: Amount,
    pub observacao: Option<String>,
    pub usuario_id: String,
    pub usuario: String,
    pub created_at: DateTime<Utc>,
}

impl From<SangriaRecord> for SangriaView {
    fn from(record: SangriaRecord) -> Self {
        SangriaView {
            code: record.sangria.short_code(),
            valor: record.sangria.valor().into(),
            usuario: record.user_display_name(),
            id: record.sangria.id,
            observacao: record.sangria.observacao,
            usuario_id: record.sangria.usuario_id,
            created_at: record.sangria.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SangriaList {
    pub sangrias: Vec<SangriaView>,
    pub total: Amount,
    pub count: usize,
}

impl SangriaList {
    fn new(records: Vec<SangriaRecord>) -> Self {
        let total: Money = records.iter().map(|r| r.sangria.valor()).sum();
        SangriaList {
            count: records.len(),
            total: total.into(),
            sangrias: records.into_iter().map(SangriaView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SangriaPage {
    pub data_inicio: NaiveDate,
    pub data_fim: NaiveDate,
    #[serde(flatten)]
    pub list: SangriaList,
    pub valor_inicial: Amount,
    pub dinheiro_disponivel: Amount,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

// =============================================================================
// Sangrias
// =============================================================================

async fn create_sangria(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<SangriaRequest>,
) -> ApiResult<(StatusCode, Json<SangriaView>)> {
    caller.require(Permission::AddSangria)?;

    let valor = parse_brl_amount("valor", &req.valor)?;
    let observacao = normalize_optional(req.observacao.as_deref());

    let record = state
        .db
        .sangrias()
        .create(valor, observacao.as_deref(), caller.id())
        .await?;

    info!(valor = %valor, by = %caller.user.username, "Sangria registered");
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Newest first, capped; dates that don't parse are ignored.
async fn list_sangrias(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<Json<SangriaList>> {
    caller.require(Permission::ViewSangria)?;

    let start = lenient_date(query.data_inicio.as_deref());
    let end = lenient_date(query.data_fim.as_deref());
    let range: Option<UtcRange> = match (start, end) {
        (None, None) => None,
        (start, end) => Some(
            state
                .calendar
                .range(start.unwrap_or_else(epoch), end.unwrap_or_else(|| state.calendar.today())),
        ),
    };

    let records = state.db.sangrias().list(range, SANGRIA_LIST_LIMIT).await?;
    Ok(Json(SangriaList::new(records)))
}

/// The withdrawal screen: the period's sangrias and the cash on hand today.
async fn sangria_page(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<Json<SangriaPage>> {
    caller.require(Permission::AddSangria)?;

    let today = state.calendar.today();
    let start = lenient_date(query.data_inicio.as_deref()).unwrap_or(today);
    let end = lenient_date(query.data_fim.as_deref()).unwrap_or(today);

    let records = state
        .db
        .sangrias()
        .list(Some(state.calendar.range(start, end)), SANGRIA_LIST_LIMIT)
        .await?;
    let available = state
        .db
        .reports()
        .available_cash(state.today(), state.initial_cash())
        .await?;

    Ok(Json(SangriaPage {
        data_inicio: start,
        data_fim: end,
        list: SangriaList::new(records),
        valor_inicial: state.initial_cash().into(),
        dinheiro_disponivel: available.into(),
    }))
}

async fn delete_sangria(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require_superuser()?;

    let record = state.db.sangrias().delete(&id).await?;
    let valor = record.sangria.valor();

    info!(sangria_id = %id, valor = %valor, by = %caller.user.username, "Sangria deleted");
    Ok(Json(serde_json::json!({
        "message": format!("Sangria de {} excluída com sucesso", valor),
        "id": record.sangria.id,
    })))
}

// =============================================================================
// Dashboard
// =============================================================================

async fn dashboard(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<FinancialDashboard>> {
    caller.require(Permission::ViewCheckout)?;

    let calendar = &state.calendar;
    let start_date = date_or_today(calendar, "start_date", query.start_date.as_deref())?;
    let end_date = date_or_today(calendar, "end_date", query.end_date.as_deref())?;
    if end_date < start_date {
        return Err(ApiError::validation("end_date must not be before start_date"));
    }

    let today = calendar.today();
    let yesterday = today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| ApiError::internal("Calendar underflow"))?;

    let period = Period {
        start_date,
        end_date,
        range: calendar.range(start_date, end_date),
    };
    let dashboard = state
        .db
        .reports()
        .financial_dashboard(period, calendar.day(today), calendar.day(yesterday), state.initial_cash())
        .await?;
    Ok(Json(dashboard))
}
