//! # Comandas API
//!
//! JSON back office for the café: orders, catalog, checkout, sangrias and
//! pinpads.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         API Routes (/api)                               │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  auth / users  │  │  catalog       │  │  orders                    ││
//! │  │ • login        │  │ • products     │  │ • CRUD + status actions    ││
//! │  │ • refresh      │  │ • combos       │  │ • closed / dashboard       ││
//! │  │ • permissions  │  │ • menu         │  │ • daily report / scan      ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  checkouts     │  │  financials    │  │  pinpads                   ││
//! │  │ • open orders  │  │ • sangrias     │  │ • CRUD / default / toggle  ││
//! │  │ • finalize     │  │ • dashboard    │  │ • devices / payments       ││
//! │  │ • cancel/refund│  │                │  │ • Mercado Pago webhook     ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  GET /health (outside /api)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]: defaults, then `comandas.toml`, then `COMANDAS_*`.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use comandas_core::calendar::UtcRange;
use comandas_core::validation::{validate_email, validate_new_password, validate_username};
use comandas_core::{BusinessCalendar, Money, User};
use comandas_db::{Database, NewUser};
use comandas_pinpad::ProviderRegistry;

// Re-exports
pub use auth::{AuthUser, JwtManager};
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorCode};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ApiConfig>,
    pub jwt: Arc<JwtManager>,
    pub calendar: BusinessCalendar,
    pub providers: Arc<ProviderRegistry>,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let jwt = JwtManager::new(
            &config.auth.jwt_secret,
            config.auth.access_lifetime_secs,
            config.auth.refresh_lifetime_secs,
        );

        Ok(AppState {
            db,
            calendar: config.calendar()?,
            providers: Arc::new(ProviderRegistry::new(config.provider_settings())),
            jwt: Arc::new(jwt),
            config: Arc::new(config),
        })
    }

    /// Opening cash float.
    pub fn initial_cash(&self) -> Money {
        self.config.initial_cash()
    }

    /// The current local day, as UTC bounds.
    pub fn today(&self) -> UtcRange {
        self.calendar.day(self.calendar.today())
    }
}

/// Builds the full router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::auth::routes())
        .merge(routes::users::routes())
        .merge(routes::catalog::routes())
        .merge(routes::orders::routes())
        .merge(routes::checkouts::routes())
        .merge(routes::financials::routes())
        .merge(routes::pinpads::routes());

    Router::new()
        .merge(routes::health::routes())
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Creates the configured superuser when there are no users yet.
///
/// ## Returns
/// * `Ok(Some(user))` - The admin was created
/// * `Ok(None)` - Users exist, or no admin is configured
pub async fn bootstrap_admin(state: &AppState) -> ApiResult<Option<User>> {
    let bootstrap = &state.config.bootstrap;
    let (Some(username), Some(password)) = (&bootstrap.admin_username, &bootstrap.admin_password) else {
        return Ok(None);
    };

    let users = state.db.users();
    if users.count().await? > 0 {
        return Ok(None);
    }

    let username = validate_username(username)?;
    validate_new_password(password, password)?;

    let user = users
        .create(
            NewUser {
                username,
                email: validate_email(bootstrap.admin_email.as_deref())?,
                first_name: String::new(),
                last_name: String::new(),
                password_hash: auth::hash_password(password)?,
                is_staff: true,
                is_superuser: true,
            },
            &BTreeSet::new(),
        )
        .await?;

    info!(username = %user.username, "Bootstrap superuser created");
    Ok(Some(user))
}


#[cfg(test)]
mod tests {
    use super::*;
    use comandas_db::DbConfig;

    #[tokio::test]
    async fn test_bootstrap_admin_only_when_empty() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut config = ApiConfig::default();
        config.bootstrap.admin_username = Some("admin".to_string());
        config.bootstrap.admin_password = Some("admin-password".to_string());
        let state = AppState::new(db, config).unwrap();

        let admin = bootstrap_admin(&state).await.unwrap().unwrap();
        assert!(admin.is_superuser);
        assert!(auth::verify_password("admin-password", &admin.password_hash));

        assert!(bootstrap_admin(&state).await.unwrap().is_none());
        assert_eq!(state.db.users().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_skipped_without_config() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db, ApiConfig::default()).unwrap();
        assert!(bootstrap_admin(&state).await.unwrap().is_none());
    }
}
