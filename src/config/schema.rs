//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-route rate limits.
    pub rate_limit: RateLimitConfig,

    /// Public site settings.
    pub site: SiteConfig,

    /// Identity provider settings.
    pub auth: AuthConfig,

    /// Object storage settings.
    pub storage: StorageConfig,

    /// Generative AI provider settings.
    pub ai: AiConfig,

    /// Payments and entitlements.
    pub billing: BillingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Identity provider settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Provider endpoint OAuth sign-ins start at. Unset disables OAuth.
    pub oauth_authorize_url: Option<String>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time for one request in seconds. AI calls can take minutes.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 300 }
    }
}

/// One fixed-window rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitRule {
    /// Requests admitted per window.
    pub limit: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl RateLimitRule {
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window_ms: 60_000,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Rate limiting configuration, one rule per limited route.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub auth_sign_in: RateLimitRule,
    pub auth_sign_up: RateLimitRule,
    pub auth_oauth_google: RateLimitRule,
    pub clothes_upload: RateLimitRule,
    pub stripe_checkout: RateLimitRule,
    pub uploads_sign: RateLimitRule,
    pub uploads_upload: RateLimitRule,
    pub uploads_complete: RateLimitRule,

    /// Seconds between sweeps of expired windows. 0 disables sweeping.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_sign_in: RateLimitRule::per_minute(20),
            auth_sign_up: RateLimitRule::per_minute(10),
            auth_oauth_google: RateLimitRule::per_minute(30),
            clothes_upload: RateLimitRule::per_minute(30),
            stripe_checkout: RateLimitRule::per_minute(60),
            uploads_sign: RateLimitRule::per_minute(60),
            uploads_upload: RateLimitRule::per_minute(120),
            uploads_complete: RateLimitRule::per_minute(120),
            sweep_interval_secs: 60,
        }
    }
}

impl RateLimitConfig {
    /// All rules with their config names, for validation.
    pub fn rules(&self) -> [(&'static str, &RateLimitRule); 8] {
        [
            ("auth_sign_in", &self.auth_sign_in),
            ("auth_sign_up", &self.auth_sign_up),
            ("auth_oauth_google", &self.auth_oauth_google),
            ("clothes_upload", &self.clothes_upload),
            ("stripe_checkout", &self.stripe_checkout),
            ("uploads_sign", &self.uploads_sign),
            ("uploads_upload", &self.uploads_upload),
            ("uploads_complete", &self.uploads_complete),
        ]
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Public site settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Public URL of the web app, used for checkout return URLs.
    pub url: Option<String>,

    /// Locale used in redirect fallbacks.
    pub default_locale: String,

    pub environment: Environment,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: None,
            default_locale: "en".to_string(),
            environment: Environment::Development,
        }
    }
}

impl SiteConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Object storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base URL signed object URLs are issued under.
    pub public_base_url: String,

    /// Lifetime of signed URLs handed to browsers and the AI provider.
    pub signed_url_ttl_secs: u64,

    /// Upper bound a client may request for a signed URL.
    pub max_signed_url_ttl_secs: u64,

    /// Default lifetime of a one-time upload session.
    pub upload_session_ttl_secs: u64,

    /// Upper bound a client may request for an upload session.
    pub max_upload_session_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            signed_url_ttl_secs: 600,
            max_signed_url_ttl_secs: 24 * 60 * 60,
            upload_session_ttl_secs: 600,
            max_upload_session_ttl_secs: 60 * 60,
        }
    }
}

/// Generative AI provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    /// Provider API key. Without it, AI routes answer 501.
    pub api_key: Option<String>,

    /// Provider base URL.
    pub base_url: String,

    /// Directory holding the YAML prompt files.
    pub prompts_dir: String,

    /// Largest clothing image accepted for classification.
    pub max_image_bytes: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://fal.run".to_string(),
            prompts_dir: "prompts".to_string(),
            max_image_bytes: 12 * 1024 * 1024,
        }
    }
}

/// Payments and entitlements.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Shared secret for webhook signatures.
    pub webhook_secret: Option<String>,

    /// Maximum age of a signed webhook timestamp.
    pub webhook_tolerance_secs: u64,

    /// Price for the recurring plan.
    pub subscription_price_id: Option<String>,

    /// Fixed price for a single generation when promo pricing is unset.
    pub one_time_price_id: Option<String>,

    /// Currency of the dynamic promo price.
    pub promo_currency: Option<String>,

    /// Promo price in minor units before discount.
    pub promo_unit_amount: Option<u64>,

    /// Discount premium users get on the promo price.
    pub premium_discount_percent: u8,

    pub success_url: Option<String>,
    pub cancel_url: Option<String>,

    /// Base URL of hosted checkout pages.
    pub checkout_base_url: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            webhook_tolerance_secs: 300,
            subscription_price_id: None,
            one_time_price_id: None,
            promo_currency: None,
            promo_unit_amount: None,
            premium_discount_percent: 30,
            success_url: None,
            cancel_url: None,
            checkout_base_url: "https://checkout.stripe.com/c/pay".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics server address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
