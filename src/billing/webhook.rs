//! Payment webhook verification and dispatch.
//!
//! Signature header format: `t=<unix secs>,v1=<hex>[,v1=<hex>...]` where each
//! `v1` is `hex(hmac_sha256(secret, "<t>.<raw body>"))`. Any matching `v1`
//! within the tolerance window accepts the payload.

use std::sync::Arc;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::billing::BillingError;
use crate::clock::Clock;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook secret is not configured")]
    NotConfigured,

    #[error("Unable to extract timestamp and signatures from header")]
    MalformedHeader,

    #[error("No signatures found matching the expected signature for payload")]
    SignatureMismatch,

    #[error("Timestamp outside the tolerance zone")]
    OutsideTolerance,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    Sync(String),
}

impl From<BillingError> for WebhookError {
    fn from(err: BillingError) -> Self {
        WebhookError::Sync(err.to_string())
    }
}

fn mac(secret: &str, timestamp: u64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::NotConfigured)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Build a signature header for `payload`, as the processor would.
pub fn signature_header(
    secret: &str,
    timestamp: u64,
    payload: &[u8],
) -> Result<String, WebhookError> {
    let digest = mac(secret, timestamp, payload)?.finalize().into_bytes();
    Ok(format!("t={},v1={}", timestamp, hex::encode(digest)))
}

/// Check `header` against the raw `payload`.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now_secs: u64,
    tolerance_secs: u64,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<u64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    let expected = mac(secret, timestamp, payload)?;
    let matched = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|bytes| expected.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err(WebhookError::SignatureMismatch);
    }

    if tolerance_secs > 0 && now_secs.abs_diff(timestamp) > tolerance_secs {
        return Err(WebhookError::OutsideTolerance);
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Mirrors processor objects into local storage.
#[async_trait]
pub trait BillingSync: Send + Sync {
    async fn apply(&self, event: &WebhookEvent) -> Result<(), BillingError>;
}

pub struct WebhookProcessor {
    secret: Option<String>,
    tolerance_secs: u64,
    clock: Arc<dyn Clock>,
    sync: Arc<dyn BillingSync>,
}

impl WebhookProcessor {
    pub fn new(
        secret: Option<String>,
        tolerance_secs: u64,
        clock: Arc<dyn Clock>,
        sync: Arc<dyn BillingSync>,
    ) -> Self {
        Self {
            secret,
            tolerance_secs,
            clock,
            sync,
        }
    }

    /// Verify, decode and apply one delivery.
    pub async fn process(&self, raw: &[u8], signature: &str) -> Result<WebhookEvent, WebhookError> {
        let secret = self.secret.as_deref().ok_or(WebhookError::NotConfigured)?;
        verify_signature(
            secret,
            signature,
            raw,
            self.clock.now_secs(),
            self.tolerance_secs,
        )?;

        let event: WebhookEvent = serde_json::from_slice(raw)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
        self.sync.apply(&event).await?;

        tracing::info!(event_id = %event.id, kind = %event.kind, "Webhook applied");
        Ok(event)
    }
}
