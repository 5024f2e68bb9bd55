use std::path::PathBuf;
use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};

use pmap_db::Database;
use pmap_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, StatusResponse};

use crate::convert;
use crate::error::ApiError;
use crate::middleware::{Claims, optional_claims};

/// Shortest password the server accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Tokens stay valid for a day.
const TOKEN_TTL_HOURS: i64 = 24;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(|e| {
            error!("Database error: {}", e);
            ApiError::Internal
        })
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let email = req.email.trim().to_string();

    // Validate input
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".into()));
    }
    if !email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    // Check if email is taken
    let lookup = email.clone();
    if with_db(&state, move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })?
        .to_string();

    // A concurrent registration can win the race past the check above.
    let row = with_db(&state, move |db| {
        let Some(id) = db.create_user(&email, &password_hash)? else {
            return Ok(None);
        };
        db.get_user_by_id(id)?
            .ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", id))
            .map(Some)
    })
    .await?
    .ok_or(ApiError::Conflict("Email already registered"))?;

    info!("Registered user {} ({})", row.id, row.email);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            status: Some("success".to_string()),
            message: Some("User registered successfully".to_string()),
            user: Some(convert::user(row)),
            error: None,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required".into()));
    }

    let email = req.email.trim().to_string();
    let user = with_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized("Invalid email or password"))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
        error!("Stored hash for user {} is unreadable: {}", user.id, e);
        ApiError::Internal
    })?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized("Invalid email or password"))?;

    let token = create_token(&state.jwt_secret, user.id, &user.email).map_err(|e| {
        error!("Token signing failed: {}", e);
        ApiError::Internal
    })?;

    Ok(Json(LoginResponse {
        token,
        user: convert::user(user),
    }))
}

/// Tokens are stateless, so logout only acknowledges.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Ok(Some(claims)) = optional_claims(&headers, &state.jwt_secret) {
        info!("User {} logged out", claims.email);
    }
    Json(StatusResponse::success("Logged out successfully"))
}

pub fn create_token(secret: &str, user_id: i64, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
