use axum::{Extension, Json, extract::State, response::IntoResponse};

use pmap_types::api::ProfileResponse;

use crate::auth::{AppState, with_db};
use crate::convert::parse_timestamp;
use crate::error::ApiError;
use crate::middleware::Claims;

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let (user, stats) = with_db(&state, move |db| {
        let user = db.get_user_by_id(user_id)?;
        let stats = db.marker_stats_for_user(user_id)?;
        Ok((user, stats))
    })
    .await?;

    let user = user.ok_or(ApiError::NotFound("User not found"))?;

    Ok(Json(ProfileResponse {
        id: user.id,
        email: user.email,
        created_at: parse_timestamp(&user.created_at),
        total_markers: stats.total,
        pending_markers: stats.pending,
        resolved_markers: stats.resolved,
    }))
}
