//! Registration endpoint.

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
use crate::api::mail::OutgoingMail;

use super::password::hash_password;
use super::session::refresh_cookie;
use super::state::AuthState;
use super::storage::{insert_refresh_token, insert_user, InsertUserOutcome, UserRecord};
use super::tokens::issue_access_token;
use super::types::{AuthResponse, MessageResponse, RegisterRequest};
use super::utils::{normalize_email, valid_email};

/// Create a user and start a session.
///
/// The password is hashed before storage, both tokens are issued, the refresh
/// token lands in an `HttpOnly` cookie, and only once the session is
/// established is the welcome mail fired from a detached task that never
/// fails the request.
#[utoipa::path(
    post,
    path = "/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered", body = AuthResponse),
        (status = 400, description = "Validation error or email already registered", body = MessageResponse),
        (status = 500, description = "Registration failed", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let name = request.name.trim().to_string();
    let email = normalize_email(&request.email);
    if name.is_empty() {
        return message_response(StatusCode::BAD_REQUEST, "Missing name");
    }
    if !valid_email(&email) {
        return message_response(StatusCode::BAD_REQUEST, "Invalid email");
    }
    if request.password.is_empty() {
        return message_response(StatusCode::BAD_REQUEST, "Missing password");
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed");
        }
    };

    // The unique index on users.email decides conflicts, not a prior read.
    let role = request.role.unwrap_or_default();
    let user = match insert_user(&pool, &name, &email, &password_hash, role).await {
        Ok(InsertUserOutcome::Created(user)) => user,
        Ok(InsertUserOutcome::Conflict) => {
            return message_response(StatusCode::BAD_REQUEST, "User already exists");
        }
        Err(err) => {
            error!("Failed to insert user: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed");
        }
    };

    match issue_session(&pool, &auth_state, &user).await {
        Ok((token, cookie)) => {
            // The mail only goes out once the session is fully established.
            spawn_welcome_mail(&auth_state, &user);
            let mut response_headers = HeaderMap::new();
            response_headers.insert(SET_COOKIE, cookie);
            let response = AuthResponse {
                message: "User registered successfully".to_string(),
                token,
                user: user.public(),
            };
            (StatusCode::OK, response_headers, Json(response)).into_response()
        }
        Err(err) => {
            error!("Failed to start session: {err}");
            message_response(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed")
        }
    }
}

/// Issue the access token plus the refresh cookie for a fresh login/register.
/// Every call persists exactly one new refresh row; old rows stay valid.
pub(super) async fn issue_session(
    pool: &PgPool,
    auth_state: &AuthState,
    user: &UserRecord,
) -> anyhow::Result<(String, axum::http::HeaderValue)> {
    let token = issue_access_token(
        auth_state.config().jwt_secret(),
        user.id,
        auth_state.config().access_token_ttl_seconds(),
    )?;
    let refresh_token = insert_refresh_token(
        pool,
        user.id,
        auth_state.config().refresh_token_ttl_seconds(),
    )
    .await?;
    let cookie = refresh_cookie(auth_state.config(), &refresh_token)
        .map_err(|err| anyhow::anyhow!("failed to build refresh cookie: {err}"))?;
    Ok((token, cookie))
}

/// Fire the welcome mail without awaiting it; failures are logged only.
fn spawn_welcome_mail(auth_state: &AuthState, user: &UserRecord) {
    let mailer = Arc::clone(auth_state.mailer());
    let mail = OutgoingMail {
        to: user.email.clone(),
        subject: format!("Welcome to Quiz Master, {}!", user.name),
        html_body: format!(
            "<div style=\"font-family: Arial, sans-serif; color: #333;\">\
             <h2 style=\"color:#4f46e5;\">Welcome to Quiz Master</h2>\
             <p>Hi {},</p>\
             <p>Thanks for signing up, we're excited to have you on board. \
             You can now login and start taking quizzes.</p>\
             <p style=\"color:#777; font-size:12px; margin-top:20px\">- The Quiz Master Team</p>\
             </div>",
            user.name
        ),
    };
    tokio::spawn(async move {
        if let Err(err) = mailer.send(&mail).await {
            error!("Welcome mail failed: {err}");
        }
    });
}
