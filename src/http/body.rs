//! Request body parsing: validated JSON and multipart file fields.

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::Multipart;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::http::ApiError;

/// Message for any body that fails to parse or validate.
pub const INVALID_BODY: &str = "Invalid request body";

/// Parse and validate a JSON body from raw bytes.
///
/// Parse failures and constraint violations both surface as a 400 with a
/// fixed message; the details go to the debug log only.
pub fn parse_json<T>(bytes: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_slice(bytes).map_err(|e| {
        tracing::debug!(error = %e, "Request body did not parse");
        ApiError::bad_request(INVALID_BODY)
    })?;

    value.validate().map_err(|e| {
        tracing::debug!(error = %e, "Request body failed validation");
        ApiError::bad_request(INVALID_BODY)
    })?;

    Ok(value)
}

/// A file submitted in a multipart form.
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    /// Declared part content type; empty when the client sent none.
    pub content_type: String,
    pub bytes: Bytes,
}

/// The first `file` field carrying a filename.
///
/// 400 "Invalid form data" when the form does not parse, 400 "Missing file"
/// when no such field exists.
pub async fn file_field(
    form: Result<Multipart, MultipartRejection>,
) -> Result<UploadedFile, ApiError> {
    let mut form = form.map_err(|e| {
        tracing::debug!(error = %e, "Multipart extraction rejected");
        ApiError::bad_request("Invalid form data")
    })?;
    let invalid = |e: MultipartError| {
        tracing::debug!(error = %e, "Multipart form did not parse");
        ApiError::bad_request("Invalid form data")
    };

    while let Some(field) = form.next_field().await.map_err(invalid)? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(invalid)?;
        return Ok(UploadedFile {
            filename,
            content_type,
            bytes,
        });
    }
    Err(ApiError::bad_request("Missing file"))
}
