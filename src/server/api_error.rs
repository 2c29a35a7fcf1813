//! Standardized API error responses.
//!
//! Every endpoint reports failures with the same JSON shape:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "ALREADY_FILLED",
//!     "message": "request 5f0c... already has a substitute",
//!     "details": null
//!   }
//! }
//! ```
//!
//! The `details` field is optional and may carry the offending field or the
//! id of a clashing record.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::StaffroomError;
use crate::server::auth::AuthError;
use crate::server::validation::ValidationError;

/// Machine-readable error codes for API responses.
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // === Validation Errors (400) ===
    /// Request payload is invalid or malformed
    InvalidRequest,
    /// A required field is missing
    MissingField,
    /// A field value is invalid
    InvalidField,
    /// Authorization header is malformed
    InvalidHeader,

    // === Authentication Errors (401) ===
    /// No bearer token provided
    MissingToken,
    /// Bearer token is invalid
    InvalidToken,
    /// Bearer token has expired
    TokenExpired,

    // === Permission Errors (403) ===
    /// Caller may not act on this resource
    Forbidden,
    /// Caller's role does not allow the operation
    InsufficientRole,

    // === Resource Errors (404/409) ===
    /// Requested resource was not found
    NotFound,
    /// Operation conflicts with existing data
    Conflict,
    /// Workflow state does not allow the operation
    InvalidTransition,
    /// Another candidate already accepted the cover request
    AlreadyFilled,

    // === Server Errors (5xx) ===
    /// Database operation failed
    DatabaseError,
    /// Server configuration error
    ConfigError,
    /// Unexpected internal server error
    InternalError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest
            | ErrorCode::MissingField
            | ErrorCode::InvalidField
            | ErrorCode::InvalidHeader => StatusCode::BAD_REQUEST,

            ErrorCode::MissingToken | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::Forbidden | ErrorCode::InsufficientRole => StatusCode::FORBIDDEN,

            ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::Conflict | ErrorCode::InvalidTransition | ErrorCode::AlreadyFilled => {
                StatusCode::CONFLICT
            }

            ErrorCode::DatabaseError | ErrorCode::ConfigError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Request payload is invalid",
            ErrorCode::MissingField => "A required field is missing",
            ErrorCode::InvalidField => "A field value is invalid",
            ErrorCode::InvalidHeader => "Authorization header is malformed",
            ErrorCode::MissingToken => "Authentication token is required",
            ErrorCode::InvalidToken => "Authentication token is invalid",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::Forbidden => "You may not act on this resource",
            ErrorCode::InsufficientRole => "Your role does not allow this operation",
            ErrorCode::NotFound => "The requested resource was not found",
            ErrorCode::Conflict => "Operation conflicts with existing data",
            ErrorCode::InvalidTransition => "Operation is not allowed in the current state",
            ErrorCode::AlreadyFilled => "The request has already been filled",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ConfigError => "Server configuration error",
            ErrorCode::InternalError => "An unexpected error occurred",
        }
    }
}

/// The inner error object containing code, message, and optional details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Standardized API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorBody,
}

impl ApiError {
    /// Creates a new API error with the default message for `code`.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: code.default_message().to_string(),
                details: None,
            },
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.error.code.status_code()
    }

    // === Convenience constructors for common errors ===

    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self::with_details(
            ErrorCode::InvalidField,
            format!("Invalid value for '{}': {}", field, reason),
            serde_json::json!({ "field": field }),
        )
    }

    pub fn missing_field(field: &str) -> Self {
        Self::with_details(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
            serde_json::json!({ "field": field }),
        )
    }

    /// Resource not found, e.g. `not_found("department")`.
    pub fn not_found(resource: &str) -> Self {
        Self::with_message(ErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Conflict, message)
    }

    /// The caller's role cannot perform `action` at all.
    pub fn insufficient_role(action: &str) -> Self {
        Self::with_message(
            ErrorCode::InsufficientRole,
            format!("Your role does not allow you to {action}"),
        )
    }

    /// The caller's role is fine but this record is not theirs.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Forbidden, message)
    }

    pub fn internal_error() -> Self {
        Self::new(ErrorCode::InternalError)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.error.code.default_message(),
            self.error.message
        )
    }
}

impl std::error::Error for ApiError {}

// === Conversions from crate error types ===

impl From<StaffroomError> for ApiError {
    fn from(err: StaffroomError) -> Self {
        match err {
            StaffroomError::NotFound(what) => ApiError::not_found(&what),
            StaffroomError::InvalidInput(msg) => {
                ApiError::with_message(ErrorCode::InvalidRequest, msg)
            }
            StaffroomError::Conflict(msg) => ApiError::with_message(ErrorCode::Conflict, msg),
            StaffroomError::Forbidden(msg) => ApiError::with_message(ErrorCode::Forbidden, msg),
            StaffroomError::InvalidTransition(msg) => {
                ApiError::with_message(ErrorCode::InvalidTransition, msg)
            }
            StaffroomError::AlreadyFilled(msg) => {
                ApiError::with_message(ErrorCode::AlreadyFilled, msg)
            }
            // Internal details stay in the log.
            StaffroomError::DatabaseError(msg) => {
                error!("Database error: {msg}");
                ApiError::new(ErrorCode::DatabaseError)
            }
            StaffroomError::ConfigError(msg) => {
                error!("Configuration error: {msg}");
                ApiError::new(ErrorCode::ConfigError)
            }
            StaffroomError::ServerError(msg) => {
                error!("Internal error: {msg}");
                ApiError::internal_error()
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::invalid_field(&err.field, &err.message)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = match &err {
            AuthError::MissingToken => ErrorCode::MissingToken,
            AuthError::InvalidHeader => ErrorCode::InvalidHeader,
            AuthError::InvalidToken(_) => ErrorCode::InvalidToken,
            AuthError::TokenExpired => ErrorCode::TokenExpired,
            AuthError::UnknownRole(_) => ErrorCode::InvalidToken,
        };
        ApiError::with_message(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_status_mapping() {
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::InvalidRequest.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::MissingToken.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorCode::InsufficientRole.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ErrorCode::AlreadyFilled.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::InvalidTransition.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::DatabaseError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn api_error_serialization() {
        let err = ApiError::new(ErrorCode::AlreadyFilled);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("ALREADY_FILLED"));
        assert!(json.contains("message"));
        assert!(!json.contains("details"));
    }

    #[test]
    fn api_error_with_details() {
        let err = ApiError::invalid_field("email", "must be a valid email address");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("INVALID_FIELD"));
        assert!(json.contains("email"));
    }

    #[test]
    fn staffroom_error_conversion() {
        let api_err: ApiError = StaffroomError::AlreadyFilled("request x".to_string()).into();
        assert_eq!(api_err.error.code, ErrorCode::AlreadyFilled);

        let api_err: ApiError = StaffroomError::NotFound("department".to_string()).into();
        assert_eq!(api_err.error.code, ErrorCode::NotFound);
        assert_eq!(api_err.error.message, "department not found");
    }

    #[test]
    fn database_errors_hide_details() {
        let api_err: ApiError =
            StaffroomError::DatabaseError("disk I/O error at page 7".to_string()).into();
        assert_eq!(api_err.error.code, ErrorCode::DatabaseError);
        assert!(!api_err.error.message.contains("page 7"));
    }
}
