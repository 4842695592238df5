//! In-process identity provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::auth::{
    session_token, AuthSession, IdentityError, IdentityProvider, OAuthProvider, User,
};
use crate::clock::Clock;

/// Lifetime of issued sessions.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

struct Account {
    user: User,
    salt: String,
    password_digest: String,
}

struct SessionRecord {
    user: User,
    expires_at: u64,
}

/// Accounts, sessions, and one-time OAuth codes held in memory.
pub struct MemoryIdentity {
    accounts: DashMap<String, Account>,
    sessions: DashMap<String, SessionRecord>,
    codes: DashMap<String, User>,
    oauth_authorize_url: Option<String>,
    clock: Arc<dyn Clock>,
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

impl MemoryIdentity {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: DashMap::new(),
            sessions: DashMap::new(),
            codes: DashMap::new(),
            oauth_authorize_url: None,
            clock,
        }
    }

    /// Enable OAuth sign-in through the endpoint at `url`.
    pub fn with_oauth_authorize_url(mut self, url: Option<String>) -> Self {
        self.oauth_authorize_url = url;
        self
    }

    /// Create a session for `user` directly, bypassing credentials.
    pub fn issue_session(&self, user: &User) -> AuthSession {
        let session = AuthSession {
            access_token: uuid::Uuid::new_v4().to_string(),
            expires_at: self.clock.now_secs() + SESSION_TTL.as_secs(),
        };
        self.sessions.insert(
            session.access_token.clone(),
            SessionRecord {
                user: user.clone(),
                expires_at: session.expires_at,
            },
        );
        session
    }

    /// Mint a one-time OAuth code for `user`.
    pub fn issue_code(&self, user: &User) -> String {
        let code = uuid::Uuid::new_v4().simple().to_string();
        self.codes.insert(code.clone(), user.clone());
        code
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn current_user(&self, headers: &HeaderMap) -> Result<Option<User>, IdentityError> {
        let Some(token) = session_token(headers) else {
            return Ok(None);
        };
        let now = self.clock.now_secs();
        Ok(self
            .sessions
            .get(&token)
            .filter(|s| s.expires_at > now)
            .map(|s| s.user.clone()))
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, AuthSession), IdentityError> {
        let key = email.to_lowercase();
        let user = {
            let account = self
                .accounts
                .get(&key)
                .ok_or(IdentityError::InvalidCredentials)?;
            if digest(&account.salt, password) != account.password_digest {
                return Err(IdentityError::InvalidCredentials);
            }
            account.user.clone()
        };
        let session = self.issue_session(&user);
        Ok((user, session))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, AuthSession), IdentityError> {
        let key = email.to_lowercase();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(key.clone()),
        };
        let salt = uuid::Uuid::new_v4().simple().to_string();

        match self.accounts.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(IdentityError::AlreadyRegistered)
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Account {
                    user: user.clone(),
                    password_digest: digest(&salt, password),
                    salt,
                });
            }
        }

        let session = self.issue_session(&user);
        tracing::info!(user_id = %user.id, "Account created");
        Ok((user, session))
    }

    async fn sign_out(&self, headers: &HeaderMap) -> Result<(), IdentityError> {
        if let Some(token) = session_token(headers) {
            self.sessions.remove(&token);
        }
        Ok(())
    }

    async fn start_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<String, IdentityError> {
        let Some(base) = self.oauth_authorize_url.as_deref() else {
            return Err(IdentityError::Provider(
                "Unsupported provider: provider is not enabled".to_string(),
            ));
        };
        let url = url::Url::parse_with_params(
            base,
            &[("provider", provider.as_str()), ("redirect_to", redirect_to)],
        )
        .map_err(|e| IdentityError::Provider(e.to_string()))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<(User, AuthSession), IdentityError> {
        let (_, user) = self.codes.remove(code).ok_or(IdentityError::InvalidCode)?;
        let session = self.issue_session(&user);
        Ok((user, session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use axum::http::{header, HeaderValue};

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let identity = MemoryIdentity::new(Arc::new(ManualClock::new(0)));
        let (user, _) = identity.sign_up("Ann@Example.com", "password1").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("ann@example.com"));

        let (again, session) = identity.sign_in("ann@example.com", "password1").await.unwrap();
        assert_eq!(again, user);
        assert_eq!(
            identity.current_user(&bearer(&session.access_token)).await.unwrap(),
            Some(user)
        );

        assert_eq!(
            identity.sign_in("ann@example.com", "wrong").await.unwrap_err(),
            IdentityError::InvalidCredentials
        );
        assert_eq!(
            identity.sign_up("ann@example.com", "password2").await.unwrap_err(),
            IdentityError::AlreadyRegistered
        );
    }

    #[tokio::test]
    async fn test_sessions_expire_and_sign_out() {
        let clock = Arc::new(ManualClock::new(0));
        let identity = MemoryIdentity::new(clock.clone());
        let user = User {
            id: "u1".into(),
            email: None,
        };

        let session = identity.issue_session(&user);
        let headers = bearer(&session.access_token);
        assert!(identity.current_user(&headers).await.unwrap().is_some());

        clock.advance(SESSION_TTL);
        assert!(identity.current_user(&headers).await.unwrap().is_none());

        let session = identity.issue_session(&user);
        let headers = bearer(&session.access_token);
        identity.sign_out(&headers).await.unwrap();
        assert!(identity.current_user(&headers).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_codes_are_single_use() {
        let identity = MemoryIdentity::new(Arc::new(ManualClock::new(0)));
        let user = User {
            id: "u1".into(),
            email: None,
        };
        let code = identity.issue_code(&user);

        assert_eq!(identity.exchange_code(&code).await.unwrap().0, user);
        assert_eq!(
            identity.exchange_code(&code).await.unwrap_err(),
            IdentityError::InvalidCode
        );
    }

    #[tokio::test]
    async fn test_start_oauth_builds_authorize_url() {
        let identity = MemoryIdentity::new(Arc::new(ManualClock::new(0)))
            .with_oauth_authorize_url(Some("https://id.example/authorize".into()));

        let url = identity
            .start_oauth(OAuthProvider::Google, "https://outfit.test/api/auth/callback")
            .await
            .unwrap();
        assert_eq!(
            url,
            "https://id.example/authorize?provider=google&redirect_to=https%3A%2F%2Foutfit.test%2Fapi%2Fauth%2Fcallback"
        );
    }

    #[tokio::test]
    async fn test_start_oauth_without_endpoint_fails() {
        let identity = MemoryIdentity::new(Arc::new(ManualClock::new(0)));
        let err = identity
            .start_oauth(OAuthProvider::Google, "https://outfit.test/api/auth/callback")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Provider(ref m) if m.contains("not enabled")));
    }
}
