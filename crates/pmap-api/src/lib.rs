//! HTTP surface of the problem map: auth, markers, comments, uploads, profile.

pub mod auth;
pub mod comments;
pub mod convert;
pub mod error;
pub mod markers;
pub mod middleware;
pub mod profile;
pub mod uploads;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use tower_http::services::ServeDir;

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Build the full application router: `/api/*` plus static `/uploads/*`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/markers", get(markers::get_markers))
        .route("/markers/{id}/comments", get(comments::get_comments))
        .route(
            "/upload",
            // Multipart framing needs some headroom over the image itself.
            post(uploads::upload_image).layer(DefaultBodyLimit::max(uploads::MAX_IMAGE_SIZE + 64 * 1024)),
        )
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/markers", post(markers::create_marker))
        .route("/markers/{id}", delete(markers::delete_marker))
        .route("/markers/{id}/comments", post(comments::create_comment))
        .route("/profile", get(profile::get_profile))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let api = Router::new().merge(public_routes).merge(protected_routes);

    Router::new()
        .nest("/api", api)
        .nest_service(uploads::UPLOADS_PREFIX, ServeDir::new(&state.upload_dir))
}
