//! Shared state handed to every route.

use std::sync::Arc;
use std::time::Duration;

use crate::ai::{GenerativeModel, PromptLibrary};
use crate::auth::IdentityProvider;
use crate::billing::{CheckoutProvider, CustomerDirectory, EntitlementStore, WebhookProcessor};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::security::RateLimiter;
use crate::storage::ObjectStorage;
use crate::uploads::UploadRepository;

/// Configuration plus every collaborator, each behind its trait.
///
/// Cloning is cheap: all fields are reference counted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub limiter: Arc<RateLimiter>,
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub uploads: Arc<dyn UploadRepository>,
    pub ai: Arc<dyn GenerativeModel>,
    pub prompts: PromptLibrary,
    pub entitlements: Arc<dyn EntitlementStore>,
    pub customers: Arc<dyn CustomerDirectory>,
    pub checkout: Arc<dyn CheckoutProvider>,
    pub webhooks: Arc<WebhookProcessor>,
}

impl AppState {
    pub fn is_production(&self) -> bool {
        self.config.site.is_production()
    }

    /// Lifetime of signed URLs the service issues on its own behalf.
    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.config.storage.signed_url_ttl_secs)
    }
}
