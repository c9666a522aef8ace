//! JWT authentication module.
//!
//! Token issuing and validation, password hashing, and the [`AuthUser`]
//! extractor every protected handler takes.
//!
//! ## Revocation
//! ```text
//! token.ver == users.token_version   → accepted
//! logout / password change           → token_version + 1 → every older token fails
//! ```

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use comandas_core::{Permission, PermissionSet, User};

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub username: String,

    /// users.token_version at issue time
    pub ver: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,

    /// Token type ("access" or "refresh")
    pub token_type: String,
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_lifetime_secs: i64,
    refresh_lifetime_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: &str, access_lifetime_secs: i64, refresh_lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_lifetime_secs,
            refresh_lifetime_secs,
        }
    }

    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime_secs
    }

    /// Generate an access token.
    pub fn generate_access_token(&self, user: &User) -> ApiResult<String> {
        self.generate(user, ACCESS, self.access_lifetime_secs)
    }

    /// Generate a refresh token.
    pub fn generate_refresh_token(&self, user: &User) -> ApiResult<String> {
        self.generate(user, REFRESH, self.refresh_lifetime_secs)
    }

    fn generate(&self, user: &User, token_type: &str, lifetime_secs: i64) -> ApiResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            ver: user.token_version,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(lifetime_secs)).timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> ApiResult<Claims> {
        let token_data: TokenData<Claims> = decode(token, &self.decoding, &Validation::default())
            .map_err(|e| ApiError::unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Validate that a token is an access token.
    pub fn validate_access_token(&self, token: &str) -> ApiResult<Claims> {
        let claims = self.validate_token(token)?;
        if claims.token_type != ACCESS {
            return Err(ApiError::unauthorized("Expected access token"));
        }
        Ok(claims)
    }

    /// Validate that a token is a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> ApiResult<Claims> {
        let claims = self.validate_token(token)?;
        if claims.token_type != REFRESH {
            return Err(ApiError::unauthorized("Expected refresh token"));
        }
        Ok(claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Passwords
// =============================================================================

/// Hashes a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against its stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// Extractor
// =============================================================================

/// The authenticated caller and their effective permissions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub permissions: PermissionSet,
}

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// 403 unless the caller holds `permission` (superusers hold all).
    pub fn require(&self, permission: Permission) -> ApiResult<()> {
        if self.permissions.has(permission) {
            Ok(())
        } else {
            debug!(user = %self.user.username, permission = permission.codename(), "Permission denied");
            Err(ApiError::forbidden("You do not have permission to perform this action"))
        }
    }

    /// 403 unless the caller is a superuser.
    pub fn require_superuser(&self) -> ApiResult<()> {
        if self.user.is_superuser {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only superusers can perform this action"))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided"))?;

        let claims = state.jwt.validate_access_token(token)?;
        load_user(state, &claims).await
    }
}

/// Resolves token claims to an active user whose token version still matches.
pub(crate) async fn load_user(state: &AppState, claims: &Claims) -> ApiResult<AuthUser> {
    let users = state.db.users();

    let user = users
        .get_by_id(&claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("User not found or inactive"))?;

    if user.token_version != claims.ver {
        return Err(ApiError::unauthorized("Token has been revoked"));
    }

    let permissions = users.permission_set(&user).await?;
    Ok(AuthUser { user, permissions })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "u-1".to_string(),
            username: "ana".to_string(),
            email: String::new(),
            first_name: "Ana".to_string(),
            last_name: String::new(),
            password_hash: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: Utc::now(),
            last_login: None,
            token_version: 3,
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret", 3600, 86400);

        let access_token = manager.generate_access_token(&user()).unwrap();
        let claims = manager.validate_access_token(&access_token).unwrap();

        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.username, "ana");
        assert_eq!(claims.ver, 3);
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_wrong_token_type() {
        let manager = JwtManager::new("test-secret", 3600, 86400);

        let access_token = manager.generate_access_token(&user()).unwrap();
        assert!(manager.validate_refresh_token(&access_token).is_err());

        let refresh_token = manager.generate_refresh_token(&user()).unwrap();
        assert!(manager.validate_access_token(&refresh_token).is_err());
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = JwtManager::new("one", 3600, 86400).generate_access_token(&user()).unwrap();
        assert!(JwtManager::new("two", 3600, 86400).validate_token(&token).is_err());
    }

    #[test]
    fn test_password_hash_verify() {
        let hash = hash_password("cafe-com-leite").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("cafe-com-leite", &hash));
        assert!(!verify_password("cafe-sem-leite", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
