use axum::{
    Json,
    extract::{Multipart, State},
    http::HeaderMap,
    response::IntoResponse,
};
use tracing::{error, info};
use uuid::Uuid;

use pmap_types::api::UploadResponse;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::optional_claims;

/// 10 MB upload limit for images
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Public path prefix the upload directory is served under.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// POST /upload — multipart form with an `image` field.
/// Saves to `{upload_dir}/{uuid}_{name}` and returns its public URL.
pub async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let uploader = optional_claims(&headers, &state.jwt_secret)?;

    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }

        if let Some(content_type) = field.content_type() {
            if !content_type.starts_with("image/") {
                return Err(ApiError::BadRequest("Only image uploads are accepted".into()));
            }
        }

        let file_name = sanitize_file_name(field.file_name().unwrap_or("image"));
        let bytes = field.bytes().await?;
        image = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = image.ok_or(ApiError::BadRequest("No image file provided".into()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("No image file provided".into()));
    }
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(ApiError::PayloadTooLarge);
    }

    tokio::fs::create_dir_all(&state.upload_dir).await.map_err(|e| {
        error!("Failed to create upload directory {}: {}", state.upload_dir.display(), e);
        ApiError::Internal
    })?;

    let stored_name = format!("{}_{}", Uuid::new_v4(), file_name);
    let path = state.upload_dir.join(&stored_name);
    tokio::fs::write(&path, &bytes).await.map_err(|e| {
        error!("Failed to save file {}: {}", path.display(), e);
        ApiError::Internal
    })?;

    info!(
        "Stored upload {} ({} bytes) for {}",
        stored_name,
        bytes.len(),
        uploader.map(|c| c.email).unwrap_or_else(|| "anonymous".into())
    );

    Ok(Json(UploadResponse {
        status: "success".to_string(),
        message: "Image uploaded successfully".to_string(),
        image_url: format!("{}/{}", UPLOADS_PREFIX, stored_name),
    }))
}

/// Keep only characters that are safe in a path segment and a URL.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_flattened() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\pot hole.jpg"), "pothole.jpg");
        assert_eq!(sanitize_file_name("..."), "image");
        assert_eq!(sanitize_file_name("фото.png"), "png");
    }
}
