use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use pmap_types::api::{CommentsResponse, CreateCommentRequest};

use crate::auth::{AppState, with_db};
use crate::convert;
use crate::error::ApiError;
use crate::middleware::Claims;

pub async fn get_comments(
    State(state): State<AppState>,
    Path(marker_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = with_db(&state, move |db| {
        if db.get_marker(marker_id)?.is_none() {
            return Ok(None);
        }
        db.get_comments(marker_id).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("Marker not found"))?;

    let comments: Vec<_> = rows.into_iter().map(convert::comment).collect();
    Ok(Json(CommentsResponse {
        count: comments.len(),
        comments,
    }))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(marker_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Comment text is required".into()));
    }

    let user_id = claims.sub;
    let row = with_db(&state, move |db| {
        if db.get_marker(marker_id)?.is_none() {
            return Ok(None);
        }
        let id = db.insert_comment(marker_id, user_id, &text)?;
        db.get_comment(id)
    })
    .await?
    .ok_or(ApiError::NotFound("Marker not found"))?;

    Ok((StatusCode::CREATED, Json(convert::comment(row))))
}
