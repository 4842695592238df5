//! Uniform JSON response envelope.
//!
//! Success is `{"ok": true, "data": …}`, failure is `{"ok": false, "error": …}`.
//! The two shapes never share a key.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Success body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiOk<T> {
    pub ok: bool,
    pub data: T,
}

/// Failure body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiFail {
    pub ok: bool,
    pub error: String,
}

/// A 200 response wrapping `data`.
pub fn ok<T: Serialize>(data: T) -> Response {
    ok_with_status(StatusCode::OK, data)
}

pub fn ok_with_status<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(ApiOk { ok: true, data })).into_response()
}

/// A failure response with the given status and message.
pub fn fail(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ApiFail {
            ok: false,
            error: error.into(),
        }),
    )
        .into_response()
}
