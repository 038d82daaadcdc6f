//! Authenticated profile read and update.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::handlers::message_response;

use super::principal::require_auth;
use super::state::AuthState;
use super::storage::{lookup_user_by_id, update_profile, ProfileUpdateOutcome};
use super::types::{
    MessageResponse, ProfileUpdateRequest, ProfileUpdateResponse, PublicUser,
};
use super::utils::{normalize_email, valid_email};

/// Return the authenticated user's public profile.
#[utoipa::path(
    get,
    path = "/user/profile",
    responses(
        (status = 200, description = "Profile for the authenticated user", body = PublicUser),
        (status = 401, description = "Missing or invalid access token", body = MessageResponse),
        (status = 404, description = "User no longer exists", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn get_profile(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return message_response(status, "Not authorized"),
    };

    match lookup_user_by_id(&pool, principal.user_id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(user.public())).into_response(),
        Ok(None) => message_response(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!("Failed to load profile: {err}");
            message_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load profile")
        }
    }
}

/// Update name and/or email; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/user/profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileUpdateResponse),
        (status = 400, description = "Invalid field or email taken", body = MessageResponse),
        (status = 401, description = "Missing or invalid access token", body = MessageResponse),
        (status = 404, description = "User no longer exists", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn update_profile_handler(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ProfileUpdateRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return message_response(status, "Not authorized"),
    };

    let request: ProfileUpdateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let name = match request.name {
        Some(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return message_response(StatusCode::BAD_REQUEST, "Name cannot be empty");
            }
            Some(name)
        }
        None => None,
    };

    let email = match request.email {
        Some(email) => {
            let email = normalize_email(&email);
            if !valid_email(&email) {
                return message_response(StatusCode::BAD_REQUEST, "Invalid email");
            }
            Some(email)
        }
        None => None,
    };

    // An empty payload is a no-op update: the row is saved as-is and 200 returned.
    match update_profile(&pool, principal.user_id, name.as_deref(), email.as_deref()).await {
        Ok(ProfileUpdateOutcome::Updated(user)) => {
            let body = ProfileUpdateResponse {
                message: "Profile updated successfully".to_string(),
                user: user.public(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(ProfileUpdateOutcome::EmailConflict) => {
            message_response(StatusCode::BAD_REQUEST, "Email already in use")
        }
        Ok(ProfileUpdateOutcome::NotFound) => {
            message_response(StatusCode::NOT_FOUND, "User not found")
        }
        Err(err) => {
            error!("Failed to update profile: {err}");
            message_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update profile",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{get_profile, update_profile_handler};
    use crate::api::handlers::auth::test_support::auth_state;
    use anyhow::Result;
    use axum::{
        extract::Extension,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        Json,
    };
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn get_profile_without_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_profile(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn update_profile_without_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let request = serde_json::from_value(serde_json::json!({"name": "New Name"}))?;
        let response = update_profile_handler(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(request)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
