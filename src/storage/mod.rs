//! Object storage contract.
//!
//! # Responsibilities
//! - Name the buckets and the per-user path layout
//! - Define the async contract routes use to store, list, and sign objects
//!
//! # Design Decisions
//! - User objects live under `<userId>/<prefix>/…`; callers check ownership
//!   before calling in (see `security::access`)
//! - Uploads never overwrite; an existing path is an error

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::http::ApiError;

pub use memory::MemoryStorage;

/// Private per-user objects.
pub const USERS_BUCKET: &str = "users";

/// Shared gallery (model photos under `avatars/`).
pub const GALLERY_BUCKET: &str = "gallery";

/// Top-level folders inside a user's namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetPrefix {
    Outfits,
    Avatars,
    Outputs,
    Clothes,
}

impl AssetPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetPrefix::Outfits => "outfits",
            AssetPrefix::Avatars => "avatars",
            AssetPrefix::Outputs => "outputs",
            AssetPrefix::Clothes => "clothes",
        }
    }
}

/// `<user_id>/<prefix>/<filename>`
pub fn user_object_path(user_id: &str, prefix: AssetPrefix, filename: &str) -> String {
    format!("{}/{}/{}", user_id, prefix.as_str(), filename)
}

/// One entry returned by [`ObjectStorage::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Name relative to the listed prefix.
    pub name: String,
    /// Object id; `None` for folders.
    pub id: Option<String>,
    pub content_type: Option<String>,
}

impl ObjectEntry {
    pub fn is_folder(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("The resource already exists: {0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Backend(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path`. Returns the stored path.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// A time-limited URL granting read access to one object.
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    /// Immediate children of `prefix`, sorted by name.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_object_path() {
        assert_eq!(
            user_object_path("u1", AssetPrefix::Outfits, "a.png"),
            "u1/outfits/a.png"
        );
        assert_eq!(
            user_object_path("u1", AssetPrefix::Clothes, "hat/1.jpg"),
            "u1/clothes/hat/1.jpg"
        );
    }

    #[test]
    fn test_storage_error_maps_to_upstream() {
        let err: ApiError = StorageError::AlreadyExists("u1/a.png".into()).into();
        assert!(matches!(err, ApiError::Upstream(ref m) if m.contains("already exists")));
    }
}
