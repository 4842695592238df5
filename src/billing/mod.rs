//! Billing: premium entitlements, hosted checkout, payment webhooks.
//!
//! # Responsibilities
//! - Answer "is this user premium" for pricing and the entitlements route
//! - Build checkout sessions for the subscription and the one-off promo
//! - Verify and apply payment-processor webhooks
//!
//! # Design Decisions
//! - An entitlement lookup that fails counts as "not premium"
//! - Webhooks are verified on the raw body before anything is applied

pub mod checkout;
pub mod memory;
pub mod schema;
pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;

use crate::http::ApiError;

pub use checkout::{
    line_item_for, redirect_urls, CheckoutMode, CheckoutProvider, CheckoutRequest,
    CheckoutSession, CustomerDirectory, LineItem,
};
pub use memory::MemoryBilling;
pub use webhook::{BillingSync, WebhookError, WebhookEvent, WebhookProcessor};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    #[error("Missing billing setting: {0}")]
    MissingConfig(&'static str),

    #[error("{0}")]
    Backend(String),
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::MissingConfig(_) => ApiError::internal(err.to_string()),
            BillingError::Backend(message) => ApiError::Upstream(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingEntitlements {
    pub is_premium: bool,
    pub promo_discount_percent: u8,
}

#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn is_premium(&self, user_id: &str) -> Result<bool, BillingError>;
}

/// Entitlements for `user_id`. A failed lookup is logged and reads as not
/// premium.
pub async fn entitlements_for(
    store: &dyn EntitlementStore,
    user_id: &str,
    promo_discount_percent: u8,
) -> BillingEntitlements {
    let is_premium = match store.is_premium(user_id).await {
        Ok(premium) => premium,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Entitlement lookup failed, treating as not premium");
            false
        }
    };

    BillingEntitlements {
        is_premium,
        promo_discount_percent,
    }
}

/// `max(0, round(base * (100 - percent) / 100))`, half away from zero.
pub fn discounted_amount(base: u64, percent: u8) -> u64 {
    let percent = u64::from(percent.min(100));
    (base * (100 - percent) + 50) / 100
}
