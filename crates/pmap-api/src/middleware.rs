use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

pub use pmap_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = decode_bearer(req.headers(), &state.jwt_secret)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Claims for routes where signing in is optional.
///
/// No header means anonymous (`Ok(None)`); a header that is present but
/// invalid is still rejected so the client learns its session is gone.
pub fn optional_claims(headers: &HeaderMap, secret: &str) -> Result<Option<Claims>, ApiError> {
    if headers.get(header::AUTHORIZATION).is_none() {
        return Ok(None);
    }
    decode_bearer(headers, secret).map(Some)
}

pub fn decode_bearer(headers: &HeaderMap, secret: &str) -> Result<Claims, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized("Authorization header required"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized("Invalid authorization format"))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("Invalid token"))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_anonymous_for_optional_routes() {
        let headers = HeaderMap::new();
        assert!(optional_claims(&headers, "secret").unwrap().is_none());
        assert!(decode_bearer(&headers, "secret").is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"));
        assert!(optional_claims(&headers, "secret").is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        let err = decode_bearer(&headers, "secret").unwrap_err();
        assert_eq!(err.to_string(), "Invalid authorization format");
    }
}
