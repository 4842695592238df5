//! In-process collaborators wired into an [`AppState`].
//!
//! Used by the binary when no external services are configured and by the
//! test suites, which keep the concrete handles to seed users, outfits,
//! gallery images and subscriptions.

use std::sync::Arc;

use crate::ai::{GenerativeModel, PromptLibrary};
use crate::auth::MemoryIdentity;
use crate::billing::{MemoryBilling, WebhookProcessor};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::http::AppState;
use crate::security::{RateLimitStore, RateLimiter};
use crate::storage::{MemoryStorage, GALLERY_BUCKET, USERS_BUCKET};
use crate::uploads::MemoryUploads;

pub struct MemoryBackends {
    pub identity: Arc<MemoryIdentity>,
    pub storage: Arc<MemoryStorage>,
    pub uploads: Arc<MemoryUploads>,
    pub billing: Arc<MemoryBilling>,
}

impl MemoryBackends {
    /// Fresh backends with the `users` and `gallery` buckets created.
    pub fn new(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let storage = MemoryStorage::new(config.storage.public_base_url.clone(), clock.clone());
        storage.create_bucket(USERS_BUCKET);
        storage.create_bucket(GALLERY_BUCKET);

        Self {
            identity: Arc::new(
                MemoryIdentity::new(clock.clone())
                    .with_oauth_authorize_url(config.auth.oauth_authorize_url.clone()),
            ),
            storage: Arc::new(storage),
            uploads: Arc::new(MemoryUploads::new(clock.clone())),
            billing: Arc::new(MemoryBilling::new(
                config.billing.checkout_base_url.clone(),
                clock,
            )),
        }
    }

    pub fn app_state(
        &self,
        config: Arc<AppConfig>,
        clock: Arc<dyn Clock>,
        ai: Arc<dyn GenerativeModel>,
    ) -> AppState {
        let limiter = RateLimiter::new(Arc::new(RateLimitStore::new()), clock.clone());
        let webhooks = WebhookProcessor::new(
            config.billing.webhook_secret.clone(),
            config.billing.webhook_tolerance_secs,
            clock.clone(),
            self.billing.clone(),
        );

        AppState {
            prompts: PromptLibrary::new(config.ai.prompts_dir.clone()),
            limiter: Arc::new(limiter),
            identity: self.identity.clone(),
            storage: self.storage.clone(),
            uploads: self.uploads.clone(),
            ai,
            entitlements: self.billing.clone(),
            customers: self.billing.clone(),
            checkout: self.billing.clone(),
            webhooks: Arc::new(webhooks),
            config,
            clock,
        }
    }
}
