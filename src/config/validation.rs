//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and relationships.
//! All violations are collected, not just the first.

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// Longest accepted rate-limit window: one day.
pub const MAX_WINDOW_MS: u64 = 86_400_000;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("rate_limit.{0}: limit must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("rate_limit.{0}: window_ms must be greater than zero")]
    ZeroWindow(&'static str),

    #[error("rate_limit.{0}: window_ms must be at most {MAX_WINDOW_MS}")]
    WindowTooLong(&'static str),

    #[error("billing.premium_discount_percent must be at most 100, got {0}")]
    DiscountOutOfRange(u8),

    #[error("storage.{field} must be between 1 and {max}")]
    TtlOutOfRange { field: &'static str, max: u64 },

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    for (name, rule) in config.rate_limit.rules() {
        if rule.limit == 0 {
            errors.push(ValidationError::ZeroLimit(name));
        }
        if rule.window_ms == 0 {
            errors.push(ValidationError::ZeroWindow(name));
        } else if rule.window_ms > MAX_WINDOW_MS {
            errors.push(ValidationError::WindowTooLong(name));
        }
    }

    if config.billing.premium_discount_percent > 100 {
        errors.push(ValidationError::DiscountOutOfRange(
            config.billing.premium_discount_percent,
        ));
    }

    let storage = &config.storage;
    if storage.signed_url_ttl_secs == 0
        || storage.signed_url_ttl_secs > storage.max_signed_url_ttl_secs
    {
        errors.push(ValidationError::TtlOutOfRange {
            field: "signed_url_ttl_secs",
            max: storage.max_signed_url_ttl_secs,
        });
    }
    if storage.upload_session_ttl_secs == 0
        || storage.upload_session_ttl_secs > storage.max_upload_session_ttl_secs
    {
        errors.push(ValidationError::TtlOutOfRange {
            field: "upload_session_ttl_secs",
            max: storage.max_upload_session_ttl_secs,
        });
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
