//! # API Error Type
//!
//! What every handler returns on failure.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Handler  Result<Json<T>, ApiError>                                     │
//! │     │                                                                   │
//! │     ├── DbError::NotFound ──────────────────────────────► 404           │
//! │     ├── DbError::UniqueViolation / ForeignKeyViolation ─► 409           │
//! │     ├── DbError::Rule(CoreError) ─┐                                     │
//! │     ├── CoreError ────────────────┴─► 400 / 403 / 409                   │
//! │     ├── ProviderError ──────────────► 400 (config) / 502 (provider)     │
//! │     └── anything else ──────────────► 500, logged, generic message      │
//! │                                                                         │
//! │  Body: { "code": "NOT_FOUND", "message": "Order not found: 1234" }      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use comandas_core::{CoreError, ValidationError};
use comandas_db::DbError;
use comandas_pinpad::ProviderError;

/// API error returned from handlers.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,

    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Missing or invalid credentials (401)
    Unauthorized,

    /// Authenticated but not allowed (403)
    Forbidden,

    /// State conflict or duplicate (409)
    Conflict,

    /// Database operation failed (500)
    DatabaseError,

    /// Payment provider failed (502)
    ProviderError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// Default status for the code.
    pub const fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ProviderError => StatusCode::BAD_GATEWAY,
        }
    }
}

impl ApiError {
    /// Creates a new API error with the code's default status.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status: code.status(),
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Conflict, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => {
                ApiError::conflict(format!("{} '{}' already exists", field, value))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::warn!("Foreign key violation: {}", message);
                ApiError::conflict("Record is still referenced by other records")
            }
            DbError::Rule(e) => e.into(),
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted"),
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(e) => e.into(),
            CoreError::ProductNotFound(_)
            | CoreError::InactivePinpad(_)
            | CoreError::AmountExceedsLimit { .. } => ApiError::validation(message),
            CoreError::InvalidOrderStatus { .. }
            | CoreError::InvalidCheckoutStatus { .. }
            | CoreError::CheckoutExists { .. }
            | CoreError::DuplicateOpenOrder { .. }
            | CoreError::ProductInActiveCombos { .. }
            | CoreError::DefaultPinpadLocked(_) => ApiError::conflict(message),
            CoreError::SelfDeletion => ApiError::forbidden(message),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts provider errors to API errors.
impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        if err.is_client_error() {
            return ApiError::validation(err.to_string());
        }
        tracing::warn!(error = %err, "Payment provider call failed");
        ApiError::new(ErrorCode::ProviderError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_errors_map_to_statuses() {
        let err: ApiError = DbError::not_found("Order", "1234").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Order not found: 1234");

        let err: ApiError = DbError::duplicate("username", "ana").into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: ApiError = DbError::QueryFailed("near \"SELEC\": syntax error".to_string()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn test_rules_map_through_core() {
        let err: ApiError = DbError::Rule(CoreError::CheckoutExists { code: "1234".to_string() }).into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: ApiError = CoreError::ProductNotFound("p1".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = CoreError::SelfDeletion.into();
        assert_eq!(err.code, ErrorCode::Forbidden);

        let err: ApiError = DbError::from(ValidationError::required("name")).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "name is required");
    }

    #[test]
    fn test_provider_errors() {
        let err: ApiError = ProviderError::Unsupported("stone".to_string()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = ProviderError::Api {
            provider: "Mercado Pago",
            status: 401,
            message: "invalid token".to_string(),
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert!(err.message.contains("invalid token"));
    }

    #[test]
    fn test_serializes_code_and_message_only() {
        let json = serde_json::to_value(ApiError::not_found("Pinpad", "x")).unwrap();
        assert_eq!(json, serde_json::json!({ "code": "NOT_FOUND", "message": "Pinpad not found: x" }));
    }
}
