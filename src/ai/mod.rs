//! Generative AI provider contract.
//!
//! # Responsibilities
//! - Run a hosted model with a JSON input and return its raw JSON result
//! - Make local bytes reachable by the provider
//! - Download generated outputs
//!
//! # Design Decisions
//! - Model output is untrusted: anything non-conforming is a 400
//!   "Invalid AI response", never a crash
//! - Provider messages reach the client outside production only

pub mod fal;
pub mod parse;
pub mod prompts;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::http::ApiError;

pub use fal::FalClient;
pub use prompts::{PromptConfig, PromptLibrary};

/// A downloaded model output.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AiError {
    #[error("AI provider is not configured")]
    NotConfigured,

    #[error("AI request failed: {0}")]
    Provider(String),

    #[error("Failed to fetch AI output")]
    Fetch(String),
}

impl AiError {
    /// Map to a client error, hiding provider detail in production.
    pub fn into_api_error(self, production: bool) -> ApiError {
        match self {
            AiError::NotConfigured => ApiError::NotImplemented(self.to_string()),
            AiError::Fetch(_) => ApiError::Upstream(self.to_string()),
            AiError::Provider(_) if production => ApiError::Upstream("AI request failed".to_string()),
            AiError::Provider(_) => ApiError::Upstream(self.to_string()),
        }
    }
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Run `model` to completion. May take minutes.
    async fn run(&self, model: &str, input: Value) -> Result<Value, AiError>;

    /// Make `bytes` available to the provider and return a URL for them.
    async fn upload(&self, bytes: Bytes, content_type: &str) -> Result<String, AiError>;

    /// Download a generated output.
    async fn fetch(&self, url: &str) -> Result<Fetched, AiError>;
}

/// Stand-in used when no provider key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl GenerativeModel for Unconfigured {
    async fn run(&self, _model: &str, _input: Value) -> Result<Value, AiError> {
        Err(AiError::NotConfigured)
    }

    async fn upload(&self, _bytes: Bytes, _content_type: &str) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }

    async fn fetch(&self, _url: &str) -> Result<Fetched, AiError> {
        Err(AiError::NotConfigured)
    }
}
