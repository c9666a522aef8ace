//! Login, token refresh, logout, registration and the current user.

use std::collections::BTreeSet;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{hash_password, load_user, verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use comandas_core::validation::{validate_email, validate_new_password, validate_username};
use comandas_core::{PermissionSet, User};
use comandas_db::NewUser;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
        .route("/auth/password", post(change_password))
}

/// A user with the effective permission codenames.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub full_name: String,
    pub permissions: Vec<String>,
}

impl UserProfile {
    pub fn new(user: User, permissions: &PermissionSet) -> Self {
        UserProfile {
            full_name: user.full_name_or_username(),
            permissions: permissions.codenames(),
            user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

/// Issues both tokens for a user who just proved who they are.
async fn issue_tokens(state: &AppState, mut user: User) -> ApiResult<TokenResponse> {
    let now = Utc::now();
    state.db.users().touch_last_login(&user.id, now).await?;
    user.last_login = Some(now);

    let permissions = state.db.users().permission_set(&user).await?;
    Ok(TokenResponse {
        access_token: state.jwt.generate_access_token(&user)?,
        refresh_token: state.jwt.generate_refresh_token(&user)?,
        token_type: "Bearer",
        expires_in: state.jwt.access_lifetime_secs(),
        user: UserProfile::new(user, &permissions),
    })
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .db
        .users()
        .get_by_username(req.username.trim())
        .await?
        .filter(|u| u.is_active && verify_password(&req.password, &u.password_hash));

    let Some(user) = user else {
        warn!(username = %req.username, "Login failed");
        return Err(ApiError::unauthorized("Invalid username or password"));
    };

    info!(username = %user.username, "User logged in");
    Ok(Json(issue_tokens(&state, user).await?))
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let claims = state.jwt.validate_refresh_token(&req.refresh_token)?;
    let caller = load_user(&state, &claims).await?;

    Ok(Json(serde_json::json!({
        "access_token": state.jwt.generate_access_token(&caller.user)?,
        "token_type": "Bearer",
        "expires_in": state.jwt.access_lifetime_secs(),
    })))
}

async fn logout(State(state): State<AppState>, caller: AuthUser) -> ApiResult<StatusCode> {
    state.db.users().bump_token_version(caller.id()).await?;
    info!(username = %caller.user.username, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let username = validate_username(&req.username)?;
    let email = validate_email(req.email.as_deref())?;
    validate_new_password(&req.password1, &req.password2)?;

    let user = state
        .db
        .users()
        .create(
            NewUser {
                username,
                email,
                first_name: String::new(),
                last_name: String::new(),
                password_hash: hash_password(&req.password1)?,
                is_staff: false,
                is_superuser: false,
            },
            &BTreeSet::new(),
        )
        .await?;

    info!(username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user).await?)))
}

async fn me(caller: AuthUser) -> Json<UserProfile> {
    Json(UserProfile::new(caller.user, &caller.permissions))
}

/// Changes the caller's password. Every outstanding token is revoked.
async fn change_password(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<PasswordChangeRequest>,
) -> ApiResult<StatusCode> {
    if !verify_password(&req.current_password, &caller.user.password_hash) {
        return Err(ApiError::validation("Current password is incorrect"));
    }
    validate_new_password(&req.new_password1, &req.new_password2)?;

    state
        .db
        .users()
        .set_password(caller.id(), &hash_password(&req.new_password1)?)
        .await?;

    info!(username = %caller.user.username, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
