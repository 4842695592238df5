//! In-process object storage.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use rand::RngCore;

use crate::clock::Clock;
use crate::storage::{ObjectEntry, ObjectStorage, StorageError};

/// A stored object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub id: String,
    pub bytes: Bytes,
    pub content_type: String,
}

/// Buckets of objects held in memory.
pub struct MemoryStorage {
    buckets: DashMap<String, BTreeMap<String, StoredObject>>,
    public_base_url: String,
    clock: Arc<dyn Clock>,
}

impl MemoryStorage {
    pub fn new(public_base_url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            clock,
        }
    }

    /// Create an empty bucket if it does not exist yet.
    pub fn create_bucket(&self, bucket: &str) {
        self.buckets.entry(bucket.to_string()).or_default();
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.buckets
            .get(bucket)
            .and_then(|objects| objects.get(path).cloned())
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets.get(bucket).map(|b| b.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let mut objects = self
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;

        if objects.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        objects.insert(
            path.to_string(),
            StoredObject {
                id: uuid::Uuid::new_v4().to_string(),
                bytes,
                content_type: content_type.to_string(),
            },
        );
        tracing::debug!(bucket, path, "Object stored");
        Ok(path.to_string())
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let objects = self
            .buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        if !objects.contains_key(path) {
            return Err(StorageError::ObjectNotFound(path.to_string()));
        }

        let mut token = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut token);
        let expires = self.clock.now_secs() + ttl.as_secs();

        Ok(format!(
            "{}/storage/v1/object/sign/{}/{}?token={}&expires={}",
            self.public_base_url,
            bucket,
            path,
            hex::encode(token),
            expires
        ))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>, StorageError> {
        let objects = self
            .buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;

        let prefix = prefix.trim_end_matches('/');
        let scope = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };

        let mut folders = BTreeSet::new();
        let mut entries = Vec::new();
        for (key, object) in objects.range(scope.clone()..) {
            let Some(rest) = key.strip_prefix(&scope) else {
                break;
            };
            match rest.split_once('/') {
                Some((folder, _)) => {
                    folders.insert(folder.to_string());
                }
                None => entries.push(ObjectEntry {
                    name: rest.to_string(),
                    id: Some(object.id.clone()),
                    content_type: Some(object.content_type.clone()),
                }),
            }
        }

        entries.extend(folders.into_iter().map(|name| ObjectEntry {
            name,
            id: None,
            content_type: None,
        }));
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
