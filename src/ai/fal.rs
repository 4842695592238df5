//! fal.ai client over HTTPS.

use async_trait::async_trait;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::ai::{AiError, Fetched, GenerativeModel};

/// Synchronous-run client: one POST per model call, result in the response.
#[derive(Clone)]
pub struct FalClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_output_bytes: usize,
}

/// Output cap used until [`FalClient::with_max_output_bytes`] overrides it.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 12 * 1024 * 1024;

impl FalClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Reject fetched outputs larger than `max` bytes.
    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/{}", self.base_url, model.trim_start_matches('/'))
    }
}

/// Inline `bytes` as a `data:` URI, which the provider accepts wherever it
/// takes an image URL.
pub fn data_uri(bytes: &[u8], content_type: &str) -> String {
    format!(
        "data:{};base64,{}",
        content_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[async_trait]
impl GenerativeModel for FalClient {
    async fn run(&self, model: &str, input: Value) -> Result<Value, AiError> {
        let response = self
            .http
            .post(self.model_url(model))
            .header(AUTHORIZATION, format!("Key {}", self.api_key))
            .json(&input)
            .send()
            .await
            .map_err(|e| AiError::Provider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(model, status = status.as_u16(), "AI provider returned an error");
            let snippet: String = body.chars().take(200).collect();
            return Err(AiError::Provider(format!("{} {}", status.as_u16(), snippet)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AiError::Provider(e.to_string()))
    }

    async fn upload(&self, bytes: Bytes, content_type: &str) -> Result<String, AiError> {
        Ok(data_uri(&bytes, content_type))
    }

    async fn fetch(&self, url: &str) -> Result<Fetched, AiError> {
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AiError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AiError::Fetch(response.status().to_string()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let too_large = || AiError::Fetch(format!("output exceeds {} bytes", self.max_output_bytes));
        if response
            .content_length()
            .is_some_and(|len| len > self.max_output_bytes as u64)
        {
            return Err(too_large());
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AiError::Fetch(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_output_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(Fetched {
            bytes: body.freeze(),
            content_type,
        })
    }
}
