//! Login endpoint.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::handlers::message_response;

use super::password::verify_password;
use super::register::issue_session;
use super::state::AuthState;
use super::storage::lookup_user_by_email;
use super::types::{AuthResponse, LoginRequest, MessageResponse};
use super::utils::normalize_email;

/// Authenticate with email and password.
///
/// Missing users and wrong passwords produce the same "Invalid credentials"
/// message so the endpoint cannot be used to enumerate accounts.
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid credentials", body = MessageResponse),
        (status = 500, description = "Login failed", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    let user = match lookup_user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return message_response(StatusCode::BAD_REQUEST, "Invalid credentials");
        }
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Login failed");
        }
    };

    if !verify_password(&request.password, &user.password_hash) {
        // Same message as the missing-user branch on purpose.
        return message_response(StatusCode::BAD_REQUEST, "Invalid credentials");
    }

    match issue_session(&pool, &auth_state, &user).await {
        Ok((token, cookie)) => {
            let mut response_headers = HeaderMap::new();
            response_headers.insert(SET_COOKIE, cookie);
            let response = AuthResponse {
                message: "Login successful".to_string(),
                token,
                user: user.public(),
            };
            (StatusCode::OK, response_headers, Json(response)).into_response()
        }
        Err(err) => {
            error!("Failed to start session: {err}");
            message_response(StatusCode::INTERNAL_SERVER_ERROR, "Login failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::login;
    use crate::api::handlers::auth::test_support::auth_state;
    use anyhow::Result;
    use axum::{extract::Extension, http::StatusCode, response::IntoResponse};
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
