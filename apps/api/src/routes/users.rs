//! Account administration. Every route requires `accounts.manage_users`.

use std::collections::{BTreeMap, BTreeSet};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::auth::{hash_password, AuthUser};
use crate::error::ApiResult;
use crate::routes::auth::UserProfile;
use crate::AppState;
use comandas_core::account::{parse_permission_form, permission_catalog, PermissionInfo};
use comandas_core::validation::{validate_email, validate_new_password, validate_username};
use comandas_core::{CoreError, Permission};
use comandas_db::{NewUser, UserUpdate};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/users/{id}/permissions", axum::routing::put(set_permissions))
        .route("/permissions", get(catalog))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password1: String,
    pub password2: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    /// `{codename: checked}`
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

/// Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
    pub password1: Option<String>,
    pub password2: Option<String>,
}

async fn list_users(State(state): State<AppState>, caller: AuthUser) -> ApiResult<Json<Vec<UserProfile>>> {
    caller.require(Permission::ManageUsers)?;

    let users = state.db.users();
    let mut profiles = Vec::new();
    for user in users.list().await? {
        let permissions = users.permission_set(&user).await?;
        profiles.push(UserProfile::new(user, &permissions));
    }
    Ok(Json(profiles))
}

async fn create_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    caller.require(Permission::ManageUsers)?;

    let username = validate_username(&req.username)?;
    let email = validate_email(req.email.as_deref())?;
    validate_new_password(&req.password1, &req.password2)?;
    let grants = parse_permission_form(&req.permissions)?;

    let users = state.db.users();
    let user = users
        .create(
            NewUser {
                username,
                email,
                first_name: req.first_name.trim().to_string(),
                last_name: req.last_name.trim().to_string(),
                password_hash: hash_password(&req.password1)?,
                is_staff: req.is_staff,
                is_superuser: req.is_superuser,
            },
            &grants,
        )
        .await?;

    info!(username = %user.username, by = %caller.user.username, "User created");
    let permissions = users.permission_set(&user).await?;
    Ok((StatusCode::CREATED, Json(UserProfile::new(user, &permissions))))
}

async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<UserProfile>> {
    caller.require(Permission::ManageUsers)?;

    let users = state.db.users();
    let user = users.require(&id).await?;
    let permissions = users.permission_set(&user).await?;
    Ok(Json(UserProfile::new(user, &permissions)))
}

async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    caller.require(Permission::ManageUsers)?;

    let users = state.db.users();
    let current = users.require(&id).await?;

    let email = match req.email.as_deref() {
        Some(email) => validate_email(Some(email))?,
        None => current.email.clone(),
    };
    let update = UserUpdate {
        email,
        first_name: req.first_name.map_or(current.first_name, |s| s.trim().to_string()),
        last_name: req.last_name.map_or(current.last_name, |s| s.trim().to_string()),
        is_active: req.is_active.unwrap_or(current.is_active),
        is_staff: req.is_staff.unwrap_or(current.is_staff),
        is_superuser: req.is_superuser.unwrap_or(current.is_superuser),
    };

    // A blank password pair means "leave it alone".
    let password = req.password1.as_deref().filter(|p| !p.is_empty());
    if let Some(password1) = password {
        validate_new_password(password1, req.password2.as_deref().unwrap_or_default())?;
    }

    let mut user = users.update(&id, &update).await?;
    if let Some(password1) = password {
        users.set_password(&id, &hash_password(password1)?).await?;
        user = users.require(&id).await?;
    }

    info!(username = %user.username, by = %caller.user.username, "User updated");
    let permissions = users.permission_set(&user).await?;
    Ok(Json(UserProfile::new(user, &permissions)))
}

async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require(Permission::ManageUsers)?;
    if id == caller.id() {
        return Err(CoreError::SelfDeletion.into());
    }

    let user = state.db.users().require(&id).await?;
    state.db.users().delete(&id).await?;

    info!(username = %user.username, by = %caller.user.username, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the user's grants with the checked boxes of the form.
async fn set_permissions(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(form): Json<BTreeMap<String, bool>>,
) -> ApiResult<Json<UserProfile>> {
    caller.require(Permission::ManageUsers)?;

    let grants: BTreeSet<Permission> = parse_permission_form(&form)?;
    let users = state.db.users();
    let user = users.require(&id).await?;
    users.set_permissions(&id, &grants).await?;

    info!(username = %user.username, count = grants.len(), "Permissions replaced");
    let permissions = users.permission_set(&user).await?;
    Ok(Json(UserProfile::new(user, &permissions)))
}

async fn catalog(caller: AuthUser) -> ApiResult<Json<Vec<PermissionInfo>>> {
    caller.require(Permission::ManageUsers)?;
    Ok(Json(permission_catalog()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::TestApp;
    use comandas_core::Permission;

    #[tokio::test]
    async fn test_requires_manage_users() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("garcom", &[Permission::ViewOrder]).await;

        let (status, body) = app.get("/api/users", &token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_create_with_permission_form() {
        let app = TestApp::new().await;
        let (_, token) = app.user_with("gerente", &[Permission::ManageUsers]).await;

        let (status, created) = app
            .post(
                "/api/users",
                &token,
                json!({
                    "username": "caixa",
                    "first_name": "Ana",
                    "last_name": "Souza",
                    "password1": "senha-do-caixa",
                    "password2": "senha-do-caixa",
                    "permissions": {
                        "checkouts.add_checkout": true,
                        "checkouts.view_checkout": true,
                        "orders.delete_order": false,
                    },
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["full_name"], "Ana Souza");
        assert_eq!(
            created["permissions"],
            json!(["checkouts.view_checkout", "checkouts.add_checkout"])
        );

        let (status, _) = app
            .post(
                "/api/users",
                &token,
                json!({
                    "username": "outro",
                    "password1": "senha-do-caixa",
                    "password2": "senha-do-caixa",
                    "permissions": { "orders.fly_away": true },
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_merges_fields_and_password() {
        let app = TestApp::new().await;
        let (_, token) = app.superuser("admin").await;
        let (target, _) = app.user_with("garcom", &[]).await;
        let uri = format!("/api/users/{}", target.id);

        let (status, updated) = app
            .put(&uri, &token, json!({ "first_name": "Bruno", "is_active": false }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["first_name"], "Bruno");
        assert_eq!(updated["is_active"], false);
        assert_eq!(updated["email"], "garcom@cafe.local");

        let (status, _) = app
            .put(&uri, &token, json!({ "password1": "nova-senha-1", "password2": "outra-coisa" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_set_permissions_replaces_grants() {
        let app = TestApp::new().await;
        let (_, token) = app.superuser("admin").await;
        let (target, _) = app.user_with("garcom", &[Permission::ViewOrder, Permission::AddOrder]).await;

        let (status, body) = app
            .put(
                &format!("/api/users/{}/permissions", target.id),
                &token,
                json!({ "pinpads.view_pinpad": true, "orders.view_order": false }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["permissions"], json!(["pinpads.view_pinpad"]));
    }

    #[tokio::test]
    async fn test_delete_self_is_forbidden() {
        let app = TestApp::new().await;
        let (admin, token) = app.superuser("admin").await;
        let (target, _) = app.user_with("garcom", &[]).await;

        let (status, _) = app.delete(&format!("/api/users/{}", admin.id), &token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.delete(&format!("/api/users/{}", target.id), &token).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app.get(&format!("/api/users/{}", target.id), &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_permission_catalog() {
        let app = TestApp::new().await;
        let (_, token) = app.superuser("admin").await;

        let (status, body) = app.get("/api/permissions", &token).await;
        assert_eq!(status, StatusCode::OK);
        let codenames: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["codename"].as_str().unwrap())
            .collect();
        assert!(codenames.contains(&"accounts.manage_users"));
        assert!(codenames.contains(&"financials.can_add_sangria"));
    }
}
