//! Outfit uploads through one-time upload sessions, plus the older direct
//! multipart upload.
//!
//! ```text
//! POST /sign ──▶ session {id, path, expiresAt}
//! PUT  /upload/{id} ──▶ bytes stored, session marked used
//! POST /complete ──▶ outfit asset row
//! ```

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::require_user;
use crate::http::body::{file_field, parse_json, INVALID_BODY};
use crate::http::{envelope, wrap, ApiError, AppState};
use crate::security::access::require_owned_path;
use crate::storage::{user_object_path, AssetPrefix, USERS_BUCKET};
use crate::uploads::{AssetKind, NewOutfitAsset, NewUploadSession};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignBody {
    #[validate(length(min = 1, max = 300))]
    pub filename: String,
    #[validate(length(min = 1, max = 200))]
    pub content_type: Option<String>,
    #[validate(range(min = 1))]
    pub expires_in_seconds: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedUpload {
    upload_session_id: Uuid,
    path: String,
    expires_at: String,
    upload_url: String,
}

/// Extension after the last dot if it is 1..=10 lowercase alphanumerics,
/// otherwise `bin`.
pub fn safe_extension(filename: &str) -> String {
    let Some((_, ext)) = filename.rsplit_once('.') else {
        return "bin".to_string();
    };
    let ext = ext.to_lowercase();
    let valid = (1..=10).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if valid {
        ext
    } else {
        "bin".to_string()
    }
}

/// Session ids are hyphenated UUIDs.
fn parse_session_id(raw: &str) -> Option<Uuid> {
    if raw.len() != 36 {
        return None;
    }
    Uuid::parse_str(raw).ok()
}

pub async fn sign(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    wrap("uploads.outfits.sign.post", async move {
        state
            .limiter
            .admit("uploads:outfits:sign", &state.config.rate_limit.uploads_sign, &headers)?;
        let user = require_user(state.identity.as_ref(), &headers).await?;
        let body: SignBody = parse_json(&body)?;

        let storage = &state.config.storage;
        let ttl_secs = body
            .expires_in_seconds
            .unwrap_or(storage.upload_session_ttl_secs);
        if ttl_secs > storage.max_upload_session_ttl_secs {
            return Err(ApiError::bad_request(INVALID_BODY));
        }

        let filename = format!("{}.{}", Uuid::new_v4(), safe_extension(&body.filename));
        let object_path = user_object_path(&user.id, AssetPrefix::Outfits, &filename);
        let expires_at = state.clock.now_utc() + chrono::Duration::seconds(ttl_secs as i64);

        let session = state
            .uploads
            .create_session(NewUploadSession {
                owner_id: user.id.clone(),
                bucket_id: USERS_BUCKET.to_string(),
                object_path,
                content_type: body.content_type,
                expires_at,
            })
            .await?;

        Ok(envelope::ok(SignedUpload {
            upload_session_id: session.id,
            path: session.object_path,
            expires_at: session
                .expires_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            upload_url: format!("/api/uploads/outfits/upload/{}", session.id),
        }))
    })
    .await
}

pub async fn upload_put(
    state: State<AppState>,
    session_id: Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    upload("uploads.outfits.upload.put", state, session_id, headers, body).await
}

pub async fn upload_post(
    state: State<AppState>,
    session_id: Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    upload("uploads.outfits.upload.post", state, session_id, headers, body).await
}

/// Consume an upload session: store the raw body at the reserved path.
async fn upload(
    route: &'static str,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    wrap(route, async move {
        state.limiter.admit(
            "uploads:outfits:upload",
            &state.config.rate_limit.uploads_upload,
            &headers,
        )?;
        let id = parse_session_id(&session_id)
            .ok_or_else(|| ApiError::bad_request("Invalid upload session id"))?;
        let user = require_user(state.identity.as_ref(), &headers).await?;

        let session = state.uploads.find_session(id, &user.id).await?;
        if session.used_at.is_some() {
            return Err(ApiError::Conflict("Upload session already used".into()));
        }
        if session.is_expired(state.clock.now_utc()) {
            return Err(ApiError::Gone("Upload session expired".into()));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| session.content_type.clone())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        state
            .storage
            .upload(&session.bucket_id, &session.object_path, body, &content_type)
            .await?;
        state
            .uploads
            .mark_used(session.id, &user.id, state.clock.now_utc())
            .await?;

        Ok(envelope::ok(serde_json::json!({ "path": session.object_path })))
    })
    .await
}

/// Store a multipart `file` directly under `<uid>/outfits/`.
pub async fn upload_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Multipart, MultipartRejection>,
) -> Response {
    wrap("uploads.outfits.legacy.post", async move {
        let user = require_user(state.identity.as_ref(), &headers).await?;
        let file = file_field(form).await?;

        let filename = format!("{}.{}", Uuid::new_v4(), safe_extension(&file.filename));
        let object_path = user_object_path(&user.id, AssetPrefix::Outfits, &filename);
        let content_type = if file.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            file.content_type.as_str()
        };

        let path = state
            .storage
            .upload(USERS_BUCKET, &object_path, file.bytes, content_type)
            .await?;

        Ok(envelope::ok(serde_json::json!({ "path": path })))
    })
    .await
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteBody {
    pub outfit_id: Uuid,
    #[validate(length(min = 1))]
    pub path: String,
    #[serde(default)]
    pub kind: AssetKind,
    #[validate(length(min = 1))]
    pub content_type: Option<String>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Record an uploaded object as an asset of one of the caller's outfits.
pub async fn complete(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    wrap("uploads.outfits.complete.post", async move {
        state.limiter.admit(
            "uploads:outfits:complete",
            &state.config.rate_limit.uploads_complete,
            &headers,
        )?;
        let user = require_user(state.identity.as_ref(), &headers).await?;
        let body: CompleteBody = parse_json(&body)?;
        require_owned_path(&user.id, &body.path)?;

        state.uploads.find_outfit(body.outfit_id, &user.id).await?;

        let asset = state
            .uploads
            .insert_asset(NewOutfitAsset {
                outfit_id: body.outfit_id,
                owner_id: user.id.clone(),
                storage_bucket: USERS_BUCKET.to_string(),
                storage_path: body.path,
                kind: body.kind,
                content_type: body.content_type,
                metadata: body.metadata.unwrap_or_default(),
            })
            .await?;

        Ok(envelope::ok(serde_json::json!({ "asset": asset })))
    })
    .await
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlBody {
    #[validate(length(min = 1))]
    pub path: String,
    #[validate(range(min = 1))]
    pub expires_in: Option<u64>,
}

pub async fn signed_url(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    wrap("uploads.outfits.signed-url.post", async move {
        let user = require_user(state.identity.as_ref(), &headers).await?;
        let body: SignedUrlBody = parse_json(&body)?;

        let ttl_secs = body
            .expires_in
            .unwrap_or(state.config.storage.signed_url_ttl_secs);
        if ttl_secs > state.config.storage.max_signed_url_ttl_secs {
            return Err(ApiError::bad_request(INVALID_BODY));
        }
        require_owned_path(&user.id, &body.path)?;

        let signed_url = state
            .storage
            .create_signed_url(USERS_BUCKET, &body.path, Duration::from_secs(ttl_secs))
            .await?;

        Ok(envelope::ok(serde_json::json!({ "signedUrl": signed_url })))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_extension() {
        assert_eq!(safe_extension("look.PNG"), "png");
        assert_eq!(safe_extension("archive.tar.gz"), "gz");
        assert_eq!(safe_extension("noext"), "bin");
        assert_eq!(safe_extension("trailing."), "bin");
        assert_eq!(safe_extension("x.verylongext1"), "bin");
        assert_eq!(safe_extension("x.we!rd"), "bin");
        assert_eq!(safe_extension("x.ÉTÉ"), "bin");
    }

    #[test]
    fn test_parse_session_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_session_id(&id.to_string()), Some(id));
        assert_eq!(parse_session_id(&id.simple().to_string()), None);
        assert_eq!(parse_session_id("not-a-uuid"), None);
    }

    #[test]
    fn test_sign_body_validation() {
        let body: SignBody = serde_json::from_str(r#"{"filename": ""}"#).unwrap();
        assert!(body.validate().is_err());

        let body: SignBody =
            serde_json::from_str(r#"{"filename": "a.png", "expiresInSeconds": 0}"#).unwrap();
        assert!(body.validate().is_err());

        let body: SignBody = serde_json::from_str(
            r#"{"filename": "a.png", "contentType": "image/png", "expiresInSeconds": 60}"#,
        )
        .unwrap();
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_complete_body_defaults_kind() {
        let body: CompleteBody = serde_json::from_str(&format!(
            r#"{{"outfitId": "{}", "path": "u1/outfits/a.png"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert_eq!(body.kind, AssetKind::Image);
        assert!(serde_json::from_str::<CompleteBody>(
            r#"{"outfitId": "x", "path": "u1/outfits/a.png"}"#
        )
        .is_err());
    }
}
