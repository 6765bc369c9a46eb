/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>` which automatically converts
/// to the appropriate HTTP status code with a structured JSON body.
///
/// Two deliberate collapses happen here:
///
/// - Every verification-code failure (not found, expired, already used)
///   becomes the same "invalid or expired code" message, so a caller
///   cannot probe which sub-case occurred.
/// - Internal and storage errors are logged with detail but reported to
///   clients as a generic message; no stack traces or internal identifiers
///   leak.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use pointgate_shared::auth::jwt::JwtError;
use pointgate_shared::auth::password::PasswordError;
use pointgate_shared::codes::IssueError;
use pointgate_shared::ledger::LedgerError;
use pointgate_shared::models::verification_code::CodeError;
use pointgate_shared::notify::NotifyError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email or phone
    Conflict(String),

    /// Invalid or expired verification code (400)
    ///
    /// Deliberately carries no detail about which sub-case occurred.
    CodeInvalid,

    /// Points balance does not cover the requested action (400)
    InsufficientBalance,

    /// Unprocessable entity (422) - request validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// A dependency (notification gateway) failed (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "code_invalid")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::CodeInvalid => write!(f, "Invalid or expired code"),
            ApiError::InsufficientBalance => write!(f, "Insufficient points balance"),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::CodeInvalid => (
                StatusCode::BAD_REQUEST,
                "code_invalid",
                "invalid or expired code".to_string(),
                None,
            ),
            ApiError::InsufficientBalance => (
                StatusCode::BAD_REQUEST,
                "insufficient_balance",
                "insufficient points balance".to_string(),
                None,
            ),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // Unique constraint violations are the backstop for
                // concurrent registrations of the same identity
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("email") {
                        return ApiError::Conflict("email already registered".to_string());
                    }
                    if constraint.contains("phone") {
                        return ApiError::Conflict("phone already registered".to_string());
                    }
                    return ApiError::Conflict(format!("Constraint violation: {}", constraint));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert request validation errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(errors)
    }
}

/// Convert verification-code errors to API errors
///
/// All user-facing sub-cases collapse into `CodeInvalid`.
impl From<CodeError> for ApiError {
    fn from(err: CodeError) -> Self {
        match err {
            CodeError::NotFound | CodeError::Expired | CodeError::AlreadyUsed => {
                ApiError::CodeInvalid
            }
            CodeError::Database(e) => e.into(),
        }
    }
}

/// Convert ledger errors to API errors
impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::RuleNotFound => {
                ApiError::BadRequest("unsupported consumption action".to_string())
            }
            LedgerError::InsufficientBalance { .. } => ApiError::InsufficientBalance,
            LedgerError::PlanNotFound(_) => {
                ApiError::BadRequest("invalid recharge plan".to_string())
            }
            LedgerError::OrderNotFound(id) => {
                ApiError::NotFound(format!("payment order {} not found", id))
            }
            LedgerError::AccountNotFound(_) => ApiError::NotFound("account not found".to_string()),
            LedgerError::Database(e) => e.into(),
        }
    }
}

/// Convert code-issuance errors to API errors
///
/// Delivery failure is reported separately from storage failure.
impl From<IssueError> for ApiError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::Storage(e) => e.into(),
            IssueError::Delivery(e) => e.into(),
        }
    }
}

/// Convert notification errors to API errors
impl From<NotifyError> for ApiError {
    fn from(err: NotifyError) -> Self {
        ApiError::ServiceUnavailable(format!("notification delivery failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            _ => ApiError::Unauthorized("Invalid token".to_string()),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}
