//! Ownership and redirect guards.
//!
//! Checks here run before any collaborator is called. A path outside the
//! caller's namespace is a 403, never a storage round-trip.

use crate::http::ApiError;
use crate::storage::{GALLERY_BUCKET, USERS_BUCKET};

/// Gallery folder holding the shared model photos.
pub const AVATARS_FOLDER: &str = "avatars/";

/// Reject any path not under `<user_id>/`.
pub fn require_owned_path(user_id: &str, path: &str) -> Result<(), ApiError> {
    if path.starts_with(&format!("{}/", user_id)) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Resolve the bucket of a reference image.
///
/// Reference images are either shared gallery avatars (`avatars/…`) or the
/// caller's own earlier outputs (`<user_id>/outputs/…`).
pub fn reference_image_bucket(user_id: &str, path: &str) -> Result<&'static str, ApiError> {
    if path.starts_with(AVATARS_FOLDER) {
        Ok(GALLERY_BUCKET)
    } else if path.starts_with(&format!("{}/outputs/", user_id)) {
        Ok(USERS_BUCKET)
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Clothing type segment of `<user_id>/clothes/<type>/<file>`.
pub fn owned_clothes_type<'a>(user_id: &str, path: &'a str) -> Result<&'a str, ApiError> {
    let prefix = format!("{}/clothes/", user_id);
    let rest = path.strip_prefix(&prefix).ok_or(ApiError::Forbidden)?;
    match rest.split('/').next() {
        Some(kind) if !kind.is_empty() => Ok(kind),
        _ => Err(ApiError::bad_request("Invalid clothesPath")),
    }
}

/// Accept only same-site absolute paths as a post-login redirect target.
pub fn safe_next_path<'a>(next: Option<&'a str>, fallback: &'a str) -> &'a str {
    let Some(next) = next.filter(|n| !n.is_empty()) else {
        return fallback;
    };

    if !next.starts_with('/')
        || next.starts_with("//")
        || next.contains("://")
        || next.contains('\\')
        || next.chars().any(char::is_whitespace)
    {
        return fallback;
    }

    next
}
