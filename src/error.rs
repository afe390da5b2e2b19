//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for every authoritative
//! operation. Each variant maps to an [`ErrorKind`], a numeric code and an
//! HTTP status. Cache and broker failures have their own error types and are
//! never converted into a `GatewayError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: quantity_committed must be at least 1",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Broad failure category so callers can decide between retrying,
/// re-authenticating, or giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input or a violated business rule.
    Validation,
    /// The caller is not allowed to perform the operation.
    Authorization,
    /// A referenced resource does not exist.
    NotFound,
    /// The authoritative store failed.
    Infrastructure,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category       | HTTP Status               |
/// |-----------|----------------|---------------------------|
/// | 1000–1999 | Validation     | 400 Bad Request           |
/// | 2000–2999 | Not Found      | 404 Not Found             |
/// | 3000–3999 | Infrastructure | 500 Internal Server Error |
/// | 4000–4999 | Authorization  | 401 / 403                 |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation or a business rule failed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No derangement was found within the shuffle budget. Retrying the
    /// same request may succeed.
    #[error("could not produce a valid draw after {attempts} attempts; try again")]
    DrawExhausted {
        /// Number of shuffles attempted.
        attempts: u32,
    },

    /// The caller is identified but not permitted to act on the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request carries no usable caller identity.
    #[error("missing or malformed caller identity")]
    Unauthenticated,

    /// A referenced resource was not found.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource kind (e.g. `"event"`, `"supply"`).
        resource: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },

    /// Persistence layer failure on the authoritative path.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Shorthand for a [`GatewayError::NotFound`] with a displayable id.
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Returns the failure category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::DrawExhausted { .. } => ErrorKind::Validation,
            Self::Forbidden(_) | Self::Unauthenticated => ErrorKind::Authorization,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Persistence(_) | Self::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// Returns `true` if repeating the identical request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DrawExhausted { .. } | Self::Persistence(_))
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::DrawExhausted { .. } => 1002,
            Self::NotFound { .. } => 2001,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Unauthenticated => 4001,
            Self::Forbidden(_) => 4003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DrawExhausted { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.kind() == ErrorKind::Infrastructure {
            tracing::error!(error = %self, "request failed on the authoritative path");
        }
        let details = self
            .is_retryable()
            .then(|| "retryable".to_string());
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_exhaustion_is_retryable_validation() {
        let err = GatewayError::DrawExhausted { attempts: 100 };
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn authorization_and_validation_are_distinct() {
        let forbidden = GatewayError::Forbidden("only the owner may draw".to_string());
        let invalid = GatewayError::Validation("odd participant count".to_string());
        assert_ne!(forbidden.kind(), invalid.kind());
        assert!(!forbidden.is_retryable());
        assert!(!invalid.is_retryable());
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_message_names_resource() {
        let err = GatewayError::not_found("supply", "abc");
        assert_eq!(err.to_string(), "supply not found: abc");
        assert_eq!(err.error_code(), 2001);
    }

    #[test]
    fn response_carries_status() {
        let response = GatewayError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
