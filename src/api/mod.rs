//! API routes.
//!
//! Every handler body runs inside [`crate::http::wrap`] and reports failures
//! as [`crate::http::ApiError`]. Order inside a handler is fixed: rate limit,
//! then session, then body, then ownership checks, then collaborators. The
//! checkout route parses its body before resolving the session.

pub mod auth;
pub mod billing;
pub mod clothes;
pub mod gallery;
pub mod health;
pub mod uploads;

use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;

use crate::http::{envelope, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health::get))
        .route("/api/auth/sign-in", post(auth::sign_in))
        .route("/api/auth/sign-up", post(auth::sign_up))
        .route("/api/auth/sign-out", post(auth::sign_out))
        .route("/api/auth/callback", get(auth::callback))
        .route(
            "/api/auth/oauth/google",
            get(auth::oauth_google_get).post(auth::oauth_google_post),
        )
        .route("/api/uploads/outfits", post(uploads::upload_form))
        .route("/api/uploads/outfits/sign", post(uploads::sign))
        .route(
            "/api/uploads/outfits/upload/{session_id}",
            axum::routing::put(uploads::upload_put).post(uploads::upload_post),
        )
        .route("/api/uploads/outfits/complete", post(uploads::complete))
        .route("/api/uploads/outfits/signed-url", post(uploads::signed_url))
        .route("/api/clothes/list", get(clothes::list))
        .route("/api/clothes/upload", post(clothes::upload))
        .route("/api/clothes/wear", post(clothes::wear))
        .route("/api/clothes/photoshoot", post(clothes::photoshoot))
        .route("/api/gallery/avatars", get(gallery::avatars))
        .route("/api/gallery/models", get(gallery::models))
        .route("/api/billing/entitlements", get(billing::entitlements))
        .route("/api/stripe/checkout", post(billing::checkout))
        .route("/api/stripe/webhook", post(billing::webhook))
        .fallback(not_found)
}

async fn not_found() -> Response {
    envelope::fail(StatusCode::NOT_FOUND, "Not found")
}
