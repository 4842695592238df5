//! Hosted checkout sessions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::billing::{discounted_amount, BillingError};
use crate::config::BillingConfig;

/// Placeholder the processor replaces with the session id on redirect.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

pub const PROMO_PRODUCT_NAME: &str = "Outfit promo generation";

/// Metadata key linking processor objects back to our users.
pub const USER_ID_METADATA: &str = "supabase_user_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    Payment,
    Subscription,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LineItem {
    /// A price configured on the processor side.
    Price { price_id: String },
    /// A price computed here.
    Dynamic {
        currency: String,
        unit_amount: u64,
        product_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub mode: CheckoutMode,
    pub customer_id: String,
    pub line_item: LineItem,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_session(&self, request: CheckoutRequest)
        -> Result<CheckoutSession, BillingError>;
}

/// Processor-side customer records, keyed by our user id.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Newest customer tagged with `user.id`, created if there is none.
    async fn get_or_create(&self, user: &User) -> Result<String, BillingError>;
}

/// Redirect targets after checkout: configured URLs win, otherwise pages
/// under the site's default locale.
pub fn redirect_urls(config: &BillingConfig, site_url: &str, locale: &str) -> (String, String) {
    let site = site_url.trim_end_matches('/');
    let success = config.success_url.clone().unwrap_or_else(|| {
        format!(
            "{}/{}/billing/success?session_id={}",
            site, locale, SESSION_ID_PLACEHOLDER
        )
    });
    let cancel = config
        .cancel_url
        .clone()
        .unwrap_or_else(|| format!("{}/{}/billing/cancel", site, locale));
    (success, cancel)
}

/// Choose the line item and metadata for a checkout.
///
/// Subscriptions use the configured plan price. One-off payments use a
/// dynamic promo price (discounted for premium users) when currency and
/// amount are configured, otherwise the fixed one-time price.
pub fn line_item_for(
    config: &BillingConfig,
    mode: CheckoutMode,
    user_id: &str,
    is_premium: bool,
) -> Result<(LineItem, BTreeMap<String, String>), BillingError> {
    let mut metadata = BTreeMap::from([(USER_ID_METADATA.to_string(), user_id.to_string())]);

    let fixed_price = |price: &Option<String>, name: &'static str| {
        price
            .clone()
            .map(|price_id| LineItem::Price { price_id })
            .ok_or(BillingError::MissingConfig(name))
    };

    if mode == CheckoutMode::Subscription {
        let item = fixed_price(&config.subscription_price_id, "billing.subscription_price_id")?;
        return Ok((item, metadata));
    }

    let (Some(currency), Some(base)) = (config.promo_currency.as_ref(), config.promo_unit_amount)
    else {
        let item = fixed_price(&config.one_time_price_id, "billing.one_time_price_id")?;
        return Ok((item, metadata));
    };

    let percent = if is_premium {
        config.premium_discount_percent
    } else {
        0
    };
    let amount = discounted_amount(base, percent);

    metadata.insert("promo_base_unit_amount".into(), base.to_string());
    metadata.insert("promo_final_unit_amount".into(), amount.to_string());
    metadata.insert("premium_discount_percent".into(), percent.to_string());

    Ok((
        LineItem::Dynamic {
            currency: currency.clone(),
            unit_amount: amount,
            product_name: PROMO_PRODUCT_NAME.to_string(),
        },
        metadata,
    ))
}
