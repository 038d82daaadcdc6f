//! Bearer-token extraction and verification for protected routes.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use uuid::Uuid;

use super::state::AuthConfig;
use super::tokens::verify_access_token;

/// Authenticated user context derived from the access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
}

/// Verify the `Authorization: Bearer` access token, or return 401.
/// Token verification is purely cryptographic; handlers that need the user
/// record load it from the store afterwards.
pub(crate) fn require_auth(
    headers: &HeaderMap,
    config: &AuthConfig,
) -> Result<Principal, StatusCode> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    match verify_access_token(config.jwt_secret(), &token) {
        Ok(claims) => Ok(Principal {
            user_id: claims.sub,
        }),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
