use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use pmap_types::Coordinates;
use pmap_types::api::{CreateMarkerRequest, MarkersResponse, StatusResponse};

use crate::auth::{AppState, with_db};
use crate::convert;
use crate::error::ApiError;
use crate::middleware::Claims;

pub async fn get_markers(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, |db| db.get_markers()).await?;
    let markers: Vec<_> = rows.into_iter().map(convert::marker).collect();

    Ok(Json(MarkersResponse {
        count: markers.len(),
        markers,
    }))
}

/// The author is always the token's subject; a `user_id` in the body is ignored.
pub async fn create_marker(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateMarkerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Text is required".into()));
    }

    let coords = Coordinates::new(req.latitude, req.longitude);
    if !coords.is_valid() {
        return Err(ApiError::BadRequest("Coordinates are required".into()));
    }

    let image_url = req.image_url.filter(|url| !url.trim().is_empty());
    let user_id = claims.sub;

    let row = with_db(&state, move |db| {
        let id = db.insert_marker(user_id, &text, coords.latitude, coords.longitude, image_url.as_deref())?;
        db.get_marker(id)?
            .ok_or_else(|| anyhow::anyhow!("Marker {} vanished after insert", id))
    })
    .await?;

    info!("Marker {} created by {}", row.id, claims.email);

    Ok((StatusCode::CREATED, Json(convert::marker(row))))
}

/// Only the author may delete a marker.
pub async fn delete_marker(
    State(state): State<AppState>,
    Path(marker_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let marker = with_db(&state, move |db| db.get_marker(marker_id))
        .await?
        .ok_or(ApiError::NotFound("Marker not found"))?;

    if marker.user_id != claims.sub {
        return Err(ApiError::Forbidden("Only the author can delete this marker"));
    }

    with_db(&state, move |db| db.delete_marker(marker_id)).await?;
    info!("Marker {} deleted by {}", marker_id, claims.email);

    Ok(Json(StatusResponse::success("Marker deleted successfully")))
}
