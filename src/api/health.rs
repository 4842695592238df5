use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::http::{envelope, wrap, AppState};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvStatus {
    has_site_url: bool,
    site_url: Option<String>,
    has_ai_key: bool,
    has_webhook_secret: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitStatus {
    tracked_keys: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    version: &'static str,
    env: EnvStatus,
    rate_limit: RateLimitStatus,
}

/// Liveness plus which settings are present. Never reveals secret values.
pub async fn get(State(state): State<AppState>) -> Response {
    wrap("health.get", async move {
        let config = &state.config;
        Ok(envelope::ok(Health {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            env: EnvStatus {
                has_site_url: config.site.url.is_some(),
                site_url: config.site.url.clone(),
                has_ai_key: config.ai.api_key.is_some(),
                has_webhook_secret: config.billing.webhook_secret.is_some(),
            },
            rate_limit: RateLimitStatus {
                tracked_keys: state.limiter.store().len(),
            },
        }))
    })
    .await
}
