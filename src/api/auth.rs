//! Password sign-in/sign-up, sign-out, OAuth start, and the OAuth callback.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{clear_session_cookie, session_cookie, AuthSession, OAuthProvider, User};
use crate::http::body::parse_json;
use crate::http::{envelope, wrap, ApiError, AppState};
use crate::security::access::safe_next_path;

#[derive(Debug, Deserialize, Validate)]
pub struct SignInBody {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpBody {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Serialize)]
struct SignedIn {
    user: User,
    session: AuthSession,
}

fn with_session(user: User, session: AuthSession, state: &AppState) -> Response {
    let max_age = session.expires_at.saturating_sub(state.clock.now_secs());
    let cookie = session_cookie(&session, max_age);
    let mut response = envelope::ok(SignedIn { user, session });
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

pub async fn sign_in(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    wrap("auth.sign-in.post", async move {
        state
            .limiter
            .admit("auth:sign-in", &state.config.rate_limit.auth_sign_in, &headers)?;
        let body: SignInBody = parse_json(&body)?;

        let (user, session) = state
            .identity
            .sign_in(&body.email, &body.password)
            .await
            .map_err(|e| ApiError::AuthFailed(e.to_string()))?;

        Ok(with_session(user, session, &state))
    })
    .await
}

pub async fn sign_up(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    wrap("auth.sign-up.post", async move {
        state
            .limiter
            .admit("auth:sign-up", &state.config.rate_limit.auth_sign_up, &headers)?;
        let body: SignUpBody = parse_json(&body)?;

        let (user, session) = state
            .identity
            .sign_up(&body.email, &body.password)
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        Ok(with_session(user, session, &state))
    })
    .await
}

pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Response {
    wrap("auth.sign-out.post", async move {
        state
            .identity
            .sign_out(&headers)
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        let mut response = envelope::ok(serde_json::json!({ "signedOut": true }));
        if let Ok(value) = HeaderValue::from_str(&clear_session_cookie()) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Ok(response)
    })
    .await
}

pub async fn oauth_google_get(state: State<AppState>, headers: HeaderMap) -> Response {
    oauth_google("auth.oauth.google.get", state, headers).await
}

pub async fn oauth_google_post(state: State<AppState>, headers: HeaderMap) -> Response {
    oauth_google("auth.oauth.google.post", state, headers).await
}

/// Send the browser to Google, returning through `/api/auth/callback`.
async fn oauth_google(
    name: &'static str,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    wrap(name, async move {
        state.limiter.admit(
            "auth:oauth:google",
            &state.config.rate_limit.auth_oauth_google,
            &headers,
        )?;
        let site_url = state
            .config
            .site
            .url
            .as_deref()
            .ok_or_else(|| ApiError::internal("Missing site.url"))?;
        let redirect_to = format!("{}/api/auth/callback", site_url.trim_end_matches('/'));

        let url = state
            .identity
            .start_oauth(OAuthProvider::Google, &redirect_to)
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(Redirect::temporary(&url).into_response())
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub next: Option<String>,
}

/// Append `error=oauth` to a same-site path, keeping any existing query.
fn with_oauth_error(path: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}error=oauth", path, separator)
}

/// OAuth redirect target. Always answers with a redirect to a same-site
/// path; a failed exchange adds `?error=oauth`.
pub async fn callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Response {
    wrap("auth.callback.get", async move {
        let fallback = format!("/{}", state.config.site.default_locale);
        let next = safe_next_path(query.next.as_deref(), &fallback).to_string();

        let Some(code) = query.code.filter(|c| !c.is_empty()) else {
            return Ok(Redirect::temporary(&next).into_response());
        };

        match state.identity.exchange_code(&code).await {
            Ok((_, session)) => {
                let max_age = session.expires_at.saturating_sub(state.clock.now_secs());
                let mut response = Redirect::temporary(&next).into_response();
                if let Ok(value) = HeaderValue::from_str(&session_cookie(&session, max_age)) {
                    response.headers_mut().insert(header::SET_COOKIE, value);
                }
                Ok(response)
            }
            Err(e) => {
                tracing::info!(error = %e, "OAuth code exchange failed");
                Ok(Redirect::temporary(&with_oauth_error(&next)).into_response())
            }
        }
    })
    .await
}
