//! Shared model photos under `gallery/avatars/`.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use futures_util::future::join_all;
use serde::Serialize;

use crate::auth::require_user;
use crate::http::{envelope, wrap, AppState};
use crate::storage::{StorageError, GALLERY_BUCKET};

const FOLDER: &str = "avatars";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GalleryItem {
    name: String,
    path: String,
    signed_url: String,
}

#[derive(Serialize)]
struct Gallery {
    items: Vec<GalleryItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

/// Signed gallery avatars. A missing bucket is reported as a warning with
/// an empty list so a fresh deployment still renders.
pub async fn avatars(State(state): State<AppState>, headers: HeaderMap) -> Response {
    wrap("gallery.avatars.get", async move {
        require_user(state.identity.as_ref(), &headers).await?;

        let entries = match state.storage.list(GALLERY_BUCKET, FOLDER).await {
            Ok(entries) => entries,
            Err(StorageError::BucketNotFound(_)) => {
                tracing::warn!(bucket = GALLERY_BUCKET, "Gallery bucket missing");
                return Ok(envelope::ok(Gallery {
                    items: Vec::new(),
                    warning: Some(format!(
                        "Storage bucket \"{}\" not found. Create it and upload images under {}/.",
                        GALLERY_BUCKET, FOLDER
                    )),
                }));
            }
            Err(e) => return Err(e.into()),
        };

        let state = &state;
        let signed = join_all(entries.into_iter().filter(|e| !e.is_folder()).map(|entry| {
            let path = format!("{}/{}", FOLDER, entry.name);
            async move {
                match state
                    .storage
                    .create_signed_url(GALLERY_BUCKET, &path, state.signed_url_ttl())
                    .await
                {
                    Ok(signed_url) => Some(GalleryItem {
                        name: entry.name,
                        path,
                        signed_url,
                    }),
                    Err(e) => {
                        tracing::debug!(path = %path, error = %e, "Skipping unsignable avatar");
                        None
                    }
                }
            }
        }))
        .await;

        Ok(envelope::ok(Gallery {
            items: signed.into_iter().flatten().collect(),
            warning: None,
        }))
    })
    .await
}

/// Old name of the avatars listing.
pub async fn models() -> Response {
    wrap("gallery.models.get", async move {
        Ok(Redirect::temporary("/api/gallery/avatars").into_response())
    })
    .await
}
