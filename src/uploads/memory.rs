//! In-process upload session and outfit tables.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::clock::Clock;
use crate::uploads::{
    NewOutfitAsset, NewUploadSession, Outfit, OutfitAsset, RepositoryError, UploadRepository,
    UploadSession,
};

pub struct MemoryUploads {
    sessions: DashMap<Uuid, UploadSession>,
    outfits: DashMap<Uuid, Outfit>,
    assets: DashMap<Uuid, OutfitAsset>,
    clock: Arc<dyn Clock>,
}

impl MemoryUploads {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            outfits: DashMap::new(),
            assets: DashMap::new(),
            clock,
        }
    }

    pub fn create_outfit(&self, owner_id: &str, name: &str) -> Outfit {
        let outfit = Outfit {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
        };
        self.outfits.insert(outfit.id, outfit.clone());
        outfit
    }

    pub fn assets_for(&self, outfit_id: Uuid) -> Vec<OutfitAsset> {
        self.assets
            .iter()
            .filter(|a| a.outfit_id == outfit_id)
            .map(|a| a.value().clone())
            .collect()
    }
}

#[async_trait]
impl UploadRepository for MemoryUploads {
    async fn create_session(
        &self,
        session: NewUploadSession,
    ) -> Result<UploadSession, RepositoryError> {
        let row = UploadSession {
            id: Uuid::new_v4(),
            owner_id: session.owner_id,
            bucket_id: session.bucket_id,
            object_path: session.object_path,
            content_type: session.content_type,
            expires_at: session.expires_at,
            used_at: None,
        };
        self.sessions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_session(
        &self,
        id: Uuid,
        owner_id: &str,
    ) -> Result<UploadSession, RepositoryError> {
        self.sessions
            .get(&id)
            .filter(|s| s.owner_id == owner_id)
            .map(|s| s.value().clone())
            .ok_or(RepositoryError::SessionNotFound)
    }

    async fn mark_used(
        &self,
        id: Uuid,
        owner_id: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .filter(|s| s.owner_id == owner_id)
            .ok_or(RepositoryError::SessionNotFound)?;
        session.used_at = Some(used_at);
        Ok(())
    }

    async fn find_outfit(&self, id: Uuid, owner_id: &str) -> Result<Outfit, RepositoryError> {
        self.outfits
            .get(&id)
            .filter(|o| o.owner_id == owner_id)
            .map(|o| o.value().clone())
            .ok_or(RepositoryError::OutfitNotFound)
    }

    async fn insert_asset(&self, asset: NewOutfitAsset) -> Result<OutfitAsset, RepositoryError> {
        let row = OutfitAsset {
            id: Uuid::new_v4(),
            outfit_id: asset.outfit_id,
            owner_id: asset.owner_id,
            storage_bucket: asset.storage_bucket,
            storage_path: asset.storage_path,
            kind: asset.kind,
            content_type: asset.content_type,
            metadata: asset.metadata,
            created_at: self.clock.now_utc(),
        };
        self.assets.insert(row.id, row.clone());
        Ok(row)
    }
}
