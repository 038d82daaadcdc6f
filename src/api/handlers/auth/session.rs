//! Refresh and logout endpoints plus refresh-cookie handling.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::handlers::message_response;

use super::principal::require_auth;
use super::state::{AuthConfig, AuthState};
use super::storage::{delete_refresh_token, lookup_refresh_token};
use super::tokens::issue_access_token;
use super::types::{MessageResponse, RefreshResponse};
use super::utils::hash_refresh_token;

pub(crate) const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Mint a new access token from the HttpOnly refresh cookie.
///
/// The refresh token is read from the cookie only, never from the body, and is
/// NOT rotated: the same cookie stays valid until expiry or logout.
#[utoipa::path(
    post,
    path = "/user/refresh",
    responses(
        (status = 200, description = "New access token issued", body = RefreshResponse),
        (status = 401, description = "Missing, unknown, or expired refresh token", body = MessageResponse),
        (status = 500, description = "Refresh failed", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let Some(token) = extract_refresh_cookie(&headers) else {
        return message_response(StatusCode::UNAUTHORIZED, "No refresh token");
    };

    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_refresh_token(&token);
    let record = match lookup_refresh_token(&pool, &token_hash).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return message_response(StatusCode::UNAUTHORIZED, "Invalid refresh token");
        }
        Err(err) => {
            error!("Failed to lookup refresh token: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to refresh token");
        }
    };

    if record.expired {
        // Expired rows are removed eagerly; there is no passive pruning.
        if let Err(err) = delete_refresh_token(&pool, &token_hash).await {
            error!("Failed to delete expired refresh token: {err}");
        }
        return message_response(StatusCode::UNAUTHORIZED, "Refresh token expired");
    }

    let token = match issue_access_token(
        auth_state.config().jwt_secret(),
        record.user.id,
        auth_state.config().access_token_ttl_seconds(),
    ) {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue access token: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to refresh token");
        }
    };

    let response = RefreshResponse {
        token,
        user: record.user.public(),
    };
    (StatusCode::OK, axum::Json(response)).into_response()
}

/// Revoke the refresh token and clear its cookie.
///
/// Requires a valid access token. Deleting a token that is already gone is not
/// an error; the cookie is cleared unconditionally.
#[utoipa::path(
    post,
    path = "/user/logout",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Missing or invalid access token", body = MessageResponse),
        (status = 500, description = "Logout failed", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, auth_state.config()) {
        return message_response(status, "Not authorized");
    }

    if let Some(token) = extract_refresh_cookie(&headers) {
        let token_hash = hash_refresh_token(&token);
        if let Err(err) = delete_refresh_token(&pool, &token_hash).await {
            error!("Failed to delete refresh token: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Logout failed");
        }
    }

    // Always clear the cookie, even if no matching row existed.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_refresh_cookie(auth_state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        StatusCode::OK,
        response_headers,
        axum::Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
        .into_response()
}

/// Build the `HttpOnly` refresh cookie set on register/login.
pub(crate) fn refresh_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = config.refresh_token_ttl_seconds();
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if config.production() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_refresh_cookie(
    config: &AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{REFRESH_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.production() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
            continue;
        };
        if key.trim() == REFRESH_COOKIE_NAME {
            return Some(val.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{
        clear_refresh_cookie, extract_refresh_cookie, logout, refresh, refresh_cookie,
    };
    use crate::api::handlers::auth::test_support::auth_state;
    use anyhow::{Context, Result};
    use axum::{
        extract::Extension,
        http::{HeaderMap, HeaderValue, StatusCode},
        response::IntoResponse,
    };
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn refresh_cookie_carries_expected_attributes() -> Result<()> {
        let state = auth_state();
        let cookie = refresh_cookie(state.config(), "tok")?;
        let value = cookie.to_str()?;
        assert!(value.starts_with("refreshToken=tok"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=604800"));
        assert!(!value.contains("Secure"));
        Ok(())
    }

    #[test]
    fn refresh_cookie_is_secure_in_production() -> Result<()> {
        let state = crate::api::handlers::auth::test_support::production_auth_state();
        let cookie = refresh_cookie(state.config(), "tok")?;
        assert!(cookie.to_str()?.contains("Secure"));
        Ok(())
    }

    #[test]
    fn clear_cookie_zeroes_max_age() -> Result<()> {
        let state = auth_state();
        let cookie = clear_refresh_cookie(state.config())?;
        let value = cookie.to_str()?;
        assert!(value.starts_with("refreshToken=;"));
        assert!(value.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn extract_refresh_cookie_finds_the_right_pair() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; refreshToken=abc123; lang=en"),
        );
        assert_eq!(
            extract_refresh_cookie(&headers).context("cookie missing")?,
            "abc123"
        );
        Ok(())
    }

    #[test]
    fn extract_refresh_cookie_none_when_absent() {
        let headers = HeaderMap::new();
        assert_eq!(extract_refresh_cookie(&headers), None);
    }

    #[tokio::test]
    async fn refresh_without_cookie_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = refresh(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_without_access_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = logout(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
