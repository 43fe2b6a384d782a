use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::event::EventError;
use crate::identity::IdentityError;
use crate::mapper::MapperError;
use crate::token::AuthError;
use crate::tracker::LoginError;

/// Stable, machine-readable error codes.
///
/// Clients match on `code` from `{"code": "NOT_FOUND", "message": "..."}`.
pub mod error_code {
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const UPSTREAM_FAILED: &str = "UPSTREAM_FAILED";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Unknown or expired token. Not a registered status, so built from its code.
const TOKEN_EXPIRED_STATUS: u16 = 498;

/// Every failure a request can end in.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid input. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Unique value already taken. HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Missing or malformed credential, or a failed login. HTTP 401.
    #[error("{0}")]
    Unauthenticated(String),

    /// Unknown or expired token. HTTP 498.
    #[error("{0}")]
    TokenExpired(String),

    /// Access level too low. HTTP 403.
    #[error("{0}")]
    Forbidden(String),

    /// The identity provider could not be consulted. HTTP 502.
    #[error("{0}")]
    Upstream(String),

    /// HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => error_code::VALIDATION_FAILED,
            ApiError::Conflict(_) => error_code::ALREADY_EXISTS,
            ApiError::NotFound(_) => error_code::NOT_FOUND,
            ApiError::Unauthenticated(_) => error_code::UNAUTHENTICATED,
            ApiError::TokenExpired(_) => error_code::TOKEN_EXPIRED,
            ApiError::Forbidden(_) => error_code::PERMISSION_DENIED,
            ApiError::Upstream(_) => error_code::UPSTREAM_FAILED,
            ApiError::Internal(_) => error_code::INTERNAL,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::TokenExpired(_) => StatusCode::from_u16(TOKEN_EXPIRED_STATUS)
                .unwrap_or(StatusCode::UNAUTHORIZED),
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "internal server error".to_string()
            }
            ApiError::Upstream(detail) => {
                tracing::warn!(error = %detail, "identity provider unavailable");
                self.to_string()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": message,
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<MapperError> for ApiError {
    fn from(err: MapperError) -> Self {
        match err {
            MapperError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            MapperError::DuplicateValue(_) => ApiError::Conflict(err.to_string()),
            MapperError::MissingRequiredField(_)
            | MapperError::AlreadyPersisted
            | MapperError::UnknownField { .. }
            | MapperError::InvalidValue { .. }
            | MapperError::InvalidPattern(_) => ApiError::Validation(err.to_string()),
            MapperError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<EventError> for ApiError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::Mapper(e) => e.into(),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential | AuthError::MalformedCredential => {
                ApiError::Unauthenticated(err.to_string())
            }
            AuthError::InvalidToken => ApiError::TokenExpired(err.to_string()),
            AuthError::Forbidden { .. } => ApiError::Forbidden(err.to_string()),
            // token bookkeeping failures are never the caller's fault
            AuthError::Mapper(e) => ApiError::Internal(e.to_string()),
            AuthError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Unverified => ApiError::Unauthenticated(err.to_string()),
            IdentityError::Transport(_) | IdentityError::Rejected { .. } => {
                ApiError::Upstream(err.to_string())
            }
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::Identity(e) => e.into(),
            LoginError::EmailMismatch | LoginError::UnknownUser(_) => {
                ApiError::Unauthenticated(err.to_string())
            }
            LoginError::Auth(e) => e.into(),
            LoginError::Mapper(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}
