//! API error taxonomy.
//!
//! Every failure a route can produce is one [`ApiError`] variant. The variant
//! fixes the HTTP status; the Display text is what reaches the client, except
//! for [`ApiError::Internal`] whose cause only ever reaches the logs.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::envelope;

/// Client-facing message for every unclassified failure.
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Fixed body of a rate-limited response.
pub const TOO_MANY_REQUESTS: &str = "Too many requests";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed input or params.
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// Rejected credentials; carries the identity provider's message.
    #[error("{0}")]
    AuthFailed(String),

    /// Path or ownership mismatch.
    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    /// Resource already consumed.
    #[error("{0}")]
    Conflict(String),

    /// Resource expired.
    #[error("{0}")]
    Gone(String),

    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    /// A collaborator (storage, AI, billing) refused the call. The message is
    /// already safe to show.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    NotImplemented(String),

    /// Anything unexpected. The message is logged, never returned.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Upstream(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures whose real cause must stay out of the response.
    pub fn is_internal(&self) -> bool {
        matches!(self, ApiError::Internal(_))
    }

    /// True for the admission controller's rejection signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::RateLimited { retry_after_secs } => {
                let mut response = envelope::fail(status, TOO_MANY_REQUESTS);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            ApiError::Internal(_) => envelope::fail(status, INTERNAL_SERVER_ERROR),
            other => envelope::fail(status, other.to_string()),
        }
    }
}
