//! Session identity contract.
//!
//! # Responsibilities
//! - Resolve the signed-in user from request headers
//! - Password sign-in/sign-up, sign-out, OAuth start and code exchange
//!
//! # Design Decisions
//! - Routes never inspect tokens themselves; `None` from the provider is
//!   the only justification for a 401
//! - Provider failures while resolving a session also yield 401

pub mod memory;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::Serialize;

use crate::http::ApiError;

pub use memory::MemoryIdentity;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

/// A freshly issued session.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub access_token: String,
    /// Unix seconds.
    pub expires_at: u64,
}

/// External identity providers users can sign in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("User already registered")]
    AlreadyRegistered,

    #[error("Invalid or expired code")]
    InvalidCode,

    #[error("{0}")]
    Provider(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The user owning the request's session, if any.
    async fn current_user(&self, headers: &HeaderMap) -> Result<Option<User>, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str)
        -> Result<(User, AuthSession), IdentityError>;

    async fn sign_up(&self, email: &str, password: &str)
        -> Result<(User, AuthSession), IdentityError>;

    /// End the request's session. Signing out without a session succeeds.
    async fn sign_out(&self, headers: &HeaderMap) -> Result<(), IdentityError>;

    /// URL to send the browser to. The provider later returns to
    /// `redirect_to` with a one-time code.
    async fn start_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<String, IdentityError>;

    async fn exchange_code(&self, code: &str) -> Result<(User, AuthSession), IdentityError>;
}

/// Resolve the caller or fail with 401.
pub async fn require_user(
    identity: &dyn IdentityProvider,
    headers: &HeaderMap,
) -> Result<User, ApiError> {
    match identity.current_user(headers).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiError::Unauthorized),
        Err(e) => {
            tracing::warn!(error = %e, "Session lookup failed");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Session token from `Authorization: Bearer …` or the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value for a new session.
pub fn session_cookie(session: &AuthSession, max_age_secs: u64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session.access_token, max_age_secs
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=tok-1; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok-1"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_token(&headers), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_strings() {
        let session = AuthSession {
            access_token: "t".into(),
            expires_at: 0,
        };
        assert_eq!(
            session_cookie(&session, 60),
            "session=t; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
        );
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
