//! Entitlements, checkout, and the payment processor webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::require_user;
use crate::billing::{
    entitlements_for, line_item_for, redirect_urls, CheckoutMode, CheckoutRequest,
};
use crate::http::body::parse_json;
use crate::http::{envelope, wrap, ApiError, AppState};

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub async fn entitlements(State(state): State<AppState>, headers: HeaderMap) -> Response {
    wrap("billing.entitlements.get", async move {
        let user = require_user(state.identity.as_ref(), &headers).await?;
        let entitlements = entitlements_for(
            state.entitlements.as_ref(),
            &user.id,
            state.config.billing.premium_discount_percent,
        )
        .await;
        Ok(envelope::ok(entitlements))
    })
    .await
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutBody {
    pub mode: CheckoutMode,
}

#[derive(Serialize)]
struct CheckoutUrl {
    url: Option<String>,
}

/// Start a hosted checkout for a subscription or a single promo generation.
pub async fn checkout(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    wrap("stripe.checkout.post", async move {
        state.limiter.admit(
            "stripe:checkout",
            &state.config.rate_limit.stripe_checkout,
            &headers,
        )?;
        let body: CheckoutBody = parse_json(&body)?;
        let user = require_user(state.identity.as_ref(), &headers).await?;

        let config = &state.config;
        let site_url = config
            .site
            .url
            .as_deref()
            .ok_or_else(|| ApiError::internal("Missing site.url"))?;
        let (success_url, cancel_url) =
            redirect_urls(&config.billing, site_url, &config.site.default_locale);

        let customer_id = state.customers.get_or_create(&user).await?;

        let is_premium = match body.mode {
            CheckoutMode::Subscription => false,
            CheckoutMode::Payment => {
                entitlements_for(
                    state.entitlements.as_ref(),
                    &user.id,
                    config.billing.premium_discount_percent,
                )
                .await
                .is_premium
            }
        };
        let (line_item, metadata) = line_item_for(&config.billing, body.mode, &user.id, is_premium)?;

        let session = state
            .checkout
            .create_session(CheckoutRequest {
                mode: body.mode,
                customer_id,
                line_item,
                success_url,
                cancel_url,
                metadata,
            })
            .await?;

        tracing::info!(user_id = %user.id, session_id = %session.id, mode = ?body.mode, "Checkout session created");
        Ok(envelope::ok(CheckoutUrl { url: session.url }))
    })
    .await
}

/// Verify against the raw body, then sync. Any failure is a 400 carrying
/// the verifier's message; success is an empty 202.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    wrap("stripe.webhook.post", async move {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing Stripe signature"))?;

        state.webhooks.process(&body, signature).await.map_err(|e| {
            tracing::warn!(error = %e, "Webhook rejected");
            ApiError::bad_request(e.to_string())
        })?;

        Ok(StatusCode::ACCEPTED.into_response())
    })
    .await
}
