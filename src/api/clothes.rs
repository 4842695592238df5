//! Clothing uploads and AI try-on.
//!
//! ```text
//! upload     file ─▶ classify ─▶ <uid>/clothes/<type>/<ms>.<ext>
//! wear       base + clothes ─▶ edit model ─▶ <uid>/outputs/wear/<ms>.<ext>
//! photoshoot [avatar] + base ─▶ shot prompt ─▶ <uid>/outputs/photoshoot/<ms>-<shot>.<ext>
//! ```

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::ai::parse::{
    avatar_description, ext_from_content_type, extract_first_image_url, image_extension,
    parse_json_answer, strip_code_fences, text_candidate,
};
use crate::ai::prompts::{self, AVATAR_DESCRIPTION, CLOTH_TYPE};
use crate::ai::{AiError, Fetched};
use crate::auth::require_user;
use crate::http::body::{file_field, parse_json, INVALID_BODY};
use crate::http::{envelope, wrap, ApiError, AppState};
use crate::security::access::{owned_clothes_type, reference_image_bucket, AVATARS_FOLDER};
use crate::storage::{user_object_path, AssetPrefix, GALLERY_BUCKET, USERS_BUCKET};

/// Clothing types the classifier may answer with.
pub const CLOTHING_TYPES: [&str; 13] = [
    "t-shirt", "shirt", "sweater", "jacket", "coat", "pants", "shorts", "skirt", "dress", "hat",
    "shoes", "bag", "glasses",
];

const INVALID_AI_RESPONSE: &str = "Invalid AI response";

/// Characters of model text echoed back when an answer does not parse.
const SNIPPET_CHARS: usize = 200;

/// Output parameters shared by the image-edit calls.
const ASPECT_RATIO: &str = "9:16";
const OUTPUT_FORMAT: &str = "jpeg";
const RESOLUTION: &str = "1K";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClothingItem {
    name: String,
    path: String,
    signed_url: String,
}

#[derive(Serialize)]
struct ClothingGroup {
    #[serde(rename = "type")]
    kind: String,
    items: Vec<ClothingItem>,
}

/// The caller's clothes grouped by type, every item with a fresh signed URL.
pub async fn list(State(state): State<AppState>, headers: HeaderMap) -> Response {
    wrap("clothes.list.get", async move {
        let user = require_user(state.identity.as_ref(), &headers).await?;
        let root = user_object_path(&user.id, AssetPrefix::Clothes, "");
        let root = root.trim_end_matches('/');

        let folders: Vec<String> = state
            .storage
            .list(USERS_BUCKET, root)
            .await?
            .into_iter()
            .filter(|entry| entry.is_folder())
            .map(|entry| entry.name)
            .collect();

        let state = &state;
        let mut groups = join_all(folders.into_iter().map(|kind| async move {
            let folder = format!("{}/{}", root, kind);
            let mut files: Vec<_> = state
                .storage
                .list(USERS_BUCKET, &folder)
                .await
                .unwrap_or_default()
                .into_iter()
                .filter(|entry| !entry.is_folder() || entry.name.contains('.'))
                .collect();
            files.sort_by(|a, b| b.name.cmp(&a.name));

            let signed = join_all(files.into_iter().map(|file| {
                let path = format!("{}/{}", folder, file.name);
                async move {
                    let signed_url = state
                        .storage
                        .create_signed_url(USERS_BUCKET, &path, state.signed_url_ttl())
                        .await
                        .ok()?;
                    Some(ClothingItem {
                        name: file.name,
                        path,
                        signed_url,
                    })
                }
            }))
            .await;

            ClothingGroup {
                kind,
                items: signed.into_iter().flatten().collect(),
            }
        }))
        .await;
        groups.sort_by(|a, b| a.kind.cmp(&b.kind));

        Ok(envelope::ok(json!({ "groups": groups })))
    })
    .await
}

/// Classifier answer once recovered from the model output.
#[derive(Debug, Deserialize)]
struct Classification {
    response: bool,
    #[serde(rename = "type")]
    kind: String,
}

/// Message for an answer that could not be recovered. Outside production
/// the start of the model's text is appended for debugging.
fn invalid_answer_message(result: &Value, production: bool) -> String {
    if production {
        return INVALID_AI_RESPONSE.to_string();
    }
    let snippet: String = strip_code_fences(text_candidate(result).unwrap_or_default())
        .chars()
        .take(SNIPPET_CHARS)
        .collect();
    let quoted = serde_json::to_string(&snippet).unwrap_or_default();
    format!("{} (got: {})", INVALID_AI_RESPONSE, quoted)
}

fn classify(result: &Value, production: bool) -> Result<Classification, ApiError> {
    parse_json_answer(result)
        .and_then(|answer| serde_json::from_value(answer).ok())
        .ok_or_else(|| ApiError::bad_request(invalid_answer_message(result, production)))
}

/// Classify an uploaded clothing photo and file it under its type.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Multipart, MultipartRejection>,
) -> Response {
    wrap("clothes.upload.post", async move {
        state
            .limiter
            .admit("clothes:upload", &state.config.rate_limit.clothes_upload, &headers)?;
        let user = require_user(state.identity.as_ref(), &headers).await?;

        let file = file_field(form).await?;

        if !file.content_type.starts_with("image/") {
            return Err(ApiError::bad_request("Invalid file type"));
        }
        if file.bytes.len() > state.config.ai.max_image_bytes {
            return Err(ApiError::bad_request("File too large"));
        }

        let production = state.is_production();
        let ai_error = |e: AiError| e.into_api_error(production);

        let prompt = state.prompts.load(prompts::VALIDATE_IMAGE).await?;
        let image_url = state
            .ai
            .upload(file.bytes.clone(), &file.content_type)
            .await
            .map_err(ai_error)?;
        let result = state
            .ai
            .run(
                &prompt.model,
                json!({ "prompt": prompt.prompt, "image_url": image_url }),
            )
            .await
            .map_err(ai_error)?;

        let answer = classify(&result, production)?;
        if !answer.response {
            return Ok(envelope::ok(json!({ "valid": false, "type": "none" })));
        }

        let kind = answer.kind.trim().to_lowercase();
        if !CLOTHING_TYPES.contains(&kind.as_str()) {
            return Err(ApiError::bad_request("Unsupported clothing type"));
        }

        let ext = image_extension(Some(file.filename.as_str()), Some(file.content_type.as_str()));
        let filename = format!("{}/{}.{}", kind, state.clock.now_ms(), ext);
        let path = user_object_path(&user.id, AssetPrefix::Clothes, &filename);

        state
            .storage
            .upload(USERS_BUCKET, &path, file.bytes, &file.content_type)
            .await?;
        let signed_url = state
            .storage
            .create_signed_url(USERS_BUCKET, &path, state.signed_url_ttl())
            .await?;

        tracing::info!(user_id = %user.id, kind = %kind, path = %path, "Clothing item stored");
        Ok(envelope::ok(json!({
            "valid": true,
            "type": kind,
            "path": path,
            "signedUrl": signed_url,
        })))
    })
    .await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredImage {
    path: String,
    signed_url: String,
}

/// Reject gallery references that are not under `avatars/`.
fn check_avatar_path(avatar_path: Option<&str>) -> Result<(), ApiError> {
    match avatar_path {
        Some(path) if !path.starts_with(AVATARS_FOLDER) => {
            Err(ApiError::bad_request("Invalid avatarPath"))
        }
        _ => Ok(()),
    }
}

async fn sign(state: &AppState, bucket: &str, path: &str) -> Result<String, ApiError> {
    Ok(state
        .storage
        .create_signed_url(bucket, path, state.signed_url_ttl())
        .await?)
}

/// Download the first generated image and store it at `<stem>.<ext>`.
async fn store_output(state: &AppState, result: &Value, stem: &str) -> Result<StoredImage, ApiError> {
    let url = extract_first_image_url(result)
        .ok_or_else(|| ApiError::bad_request(INVALID_AI_RESPONSE))?;
    let Fetched {
        bytes,
        content_type,
    } = state
        .ai
        .fetch(&url)
        .await
        .map_err(|e| e.into_api_error(state.is_production()))?;

    let path = format!("{}.{}", stem, ext_from_content_type(content_type.as_deref()));
    state
        .storage
        .upload(
            USERS_BUCKET,
            &path,
            bytes,
            content_type.as_deref().unwrap_or("image/jpeg"),
        )
        .await?;
    let signed_url = sign(state, USERS_BUCKET, &path).await?;

    Ok(StoredImage { path, signed_url })
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WearBody {
    /// Gallery photo the base was derived from; only used for the prompt.
    #[validate(length(min = 1))]
    pub avatar_path: Option<String>,
    #[validate(length(min = 1))]
    pub base_model_path: Option<String>,
    #[validate(length(min = 1))]
    pub clothes_path: String,
}

impl WearBody {
    /// Image to dress: an earlier output when given, otherwise the avatar.
    fn base_path(&self) -> Option<&str> {
        self.base_model_path
            .as_deref()
            .or(self.avatar_path.as_deref())
    }
}

/// Dress a model photo in one of the caller's clothing items.
pub async fn wear(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    wrap("clothes.wear.post", async move {
        let user = require_user(state.identity.as_ref(), &headers).await?;
        let body: WearBody = parse_json(&body)?;
        let base_path = body
            .base_path()
            .ok_or_else(|| ApiError::bad_request(INVALID_BODY))?;

        check_avatar_path(body.avatar_path.as_deref())?;
        let base_bucket = reference_image_bucket(&user.id, base_path)?;
        let cloth_type = owned_clothes_type(&user.id, &body.clothes_path)?;

        let base_url = sign(&state, base_bucket, base_path).await?;
        let clothes_url = sign(&state, USERS_BUCKET, &body.clothes_path).await?;

        let prompt = state.prompts.load(prompts::WEAR_MODEL).await?;
        let description = avatar_description(body.avatar_path.as_deref().unwrap_or(base_path));
        let rendered = prompt.render(&[
            (AVATAR_DESCRIPTION, description.as_str()),
            (CLOTH_TYPE, cloth_type),
        ]);

        let result = state
            .ai
            .run(
                &prompt.model,
                json!({
                    "prompt": rendered,
                    "image_urls": [base_url, clothes_url],
                    "aspect_ratio": ASPECT_RATIO,
                    "output_format": OUTPUT_FORMAT,
                    "resolution": RESOLUTION,
                }),
            )
            .await
            .map_err(|e| e.into_api_error(state.is_production()))?;

        let stem = user_object_path(
            &user.id,
            AssetPrefix::Outputs,
            &format!("wear/{}", state.clock.now_ms()),
        );
        let image = store_output(&state, &result, &stem).await?;

        Ok(envelope::ok(image))
    })
    .await
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PhotoshootBody {
    #[validate(length(min = 1))]
    pub avatar_path: Option<String>,
    #[validate(length(min = 1))]
    pub base_model_path: String,
    #[validate(range(min = 1, max = 3))]
    pub shot: u8,
}

/// Every photoshoot failure after the guards is a 400. Unclassified causes
/// are logged and replaced with a fixed message.
fn photoshoot_failure(err: ApiError) -> ApiError {
    match err {
        ApiError::Internal(message) => {
            tracing::error!(message = %message, "Photoshoot generation failed");
            ApiError::bad_request("Failed to generate photoshoot image")
        }
        ApiError::NotImplemented(message) => ApiError::BadRequest(message),
        other => other,
    }
}

/// One styled still of a dressed model.
pub async fn photoshoot(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    wrap("clothes.photoshoot.post", async move {
        let user = require_user(state.identity.as_ref(), &headers).await?;
        let body: PhotoshootBody = parse_json(&body)?;

        check_avatar_path(body.avatar_path.as_deref())?;
        let base_bucket = reference_image_bucket(&user.id, &body.base_model_path)?;

        let base_url = sign(&state, base_bucket, &body.base_model_path).await?;
        let avatar_url = match body.avatar_path.as_deref() {
            Some(avatar) => Some(sign(&state, GALLERY_BUCKET, avatar).await?),
            None => None,
        };
        let prompt_file =
            prompts::photoshoot_prompt(body.shot).ok_or_else(|| ApiError::bad_request("Invalid shot"))?;

        let generated: Result<StoredImage, ApiError> = async {
            let prompt = state.prompts.load(prompt_file).await?;
            let description = avatar_description(
                body.avatar_path.as_deref().unwrap_or(&body.base_model_path),
            );
            let rendered = prompt.render(&[(AVATAR_DESCRIPTION, description.as_str())]);
            let image_urls: Vec<String> = avatar_url.into_iter().chain([base_url]).collect();

            let result = state
                .ai
                .run(
                    &prompt.model,
                    json!({
                        "prompt": rendered,
                        "image_urls": image_urls,
                        "aspect_ratio": ASPECT_RATIO,
                        "output_format": OUTPUT_FORMAT,
                        "resolution": RESOLUTION,
                    }),
                )
                .await
                .map_err(|e| e.into_api_error(state.is_production()))?;

            let stem = user_object_path(
                &user.id,
                AssetPrefix::Outputs,
                &format!("photoshoot/{}-{}", state.clock.now_ms(), body.shot),
            );
            store_output(&state, &result, &stem).await
        }
        .await;
        let image = generated.map_err(photoshoot_failure)?;

        Ok(envelope::ok(json!({ "shot": body.shot, "image": image })))
    })
    .await
}
