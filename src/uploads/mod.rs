//! One-time upload sessions and outfit assets.
//!
//! An upload session reserves one object path for one owner until it expires.
//! It can be consumed once; the route refuses reuse (409) and late use (410).

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http::ApiError;

pub use memory::MemoryUploads;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub id: Uuid,
    pub owner_id: String,
    pub bucket_id: String,
    pub object_path: String,
    pub content_type: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl UploadSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Fields a caller supplies to open a session.
#[derive(Debug, Clone)]
pub struct NewUploadSession {
    pub owner_id: String,
    pub bucket_id: String,
    pub object_path: String,
    pub content_type: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outfit {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    #[default]
    Image,
    Video,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutfitAsset {
    pub id: Uuid,
    pub outfit_id: Uuid,
    pub owner_id: String,
    pub storage_bucket: String,
    pub storage_path: String,
    pub kind: AssetKind,
    pub content_type: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOutfitAsset {
    pub outfit_id: Uuid,
    pub owner_id: String,
    pub storage_bucket: String,
    pub storage_path: String,
    pub kind: AssetKind,
    pub content_type: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Upload session not found")]
    SessionNotFound,

    #[error("Outfit not found")]
    OutfitNotFound,

    #[error("{0}")]
    Backend(String),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SessionNotFound | RepositoryError::OutfitNotFound => {
                ApiError::NotFound(err.to_string())
            }
            RepositoryError::Backend(message) => ApiError::Upstream(message),
        }
    }
}

/// Row-level access is always scoped by owner.
#[async_trait]
pub trait UploadRepository: Send + Sync {
    async fn create_session(
        &self,
        session: NewUploadSession,
    ) -> Result<UploadSession, RepositoryError>;

    async fn find_session(&self, id: Uuid, owner_id: &str)
        -> Result<UploadSession, RepositoryError>;

    async fn mark_used(
        &self,
        id: Uuid,
        owner_id: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn find_outfit(&self, id: Uuid, owner_id: &str) -> Result<Outfit, RepositoryError>;

    async fn insert_asset(&self, asset: NewOutfitAsset) -> Result<OutfitAsset, RepositoryError>;
}
