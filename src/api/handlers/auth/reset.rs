//! Password-reset flow: forgot-password, verify-otp, reset-password.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::handlers::message_response;
use crate::api::mail::OutgoingMail;

use super::password::hash_password;
use super::state::AuthState;
use super::storage::{
    delete_otp, delete_otps_for_email, lookup_latest_otp, lookup_user_by_email, mark_otp_verified,
    replace_otp, update_password,
};
use super::types::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest, VerifyOtpRequest};
use super::utils::{generate_otp, normalize_email, valid_email, valid_otp};

const GENERIC_OTP_MESSAGE: &str = "If email exists, OTP has been sent";

/// Start a password reset by mailing a one-time code.
///
/// The response is identical whether or not the email is registered; only the
/// side effects differ. Any previous OTP for the email is superseded.
#[utoipa::path(
    post,
    path = "/user/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Generic acknowledgement", body = MessageResponse),
        (status = 500, description = "OTP could not be stored or sent", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let request: ForgotPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        // Malformed addresses get the same acknowledgement as unknown ones.
        return message_response(StatusCode::OK, GENERIC_OTP_MESSAGE);
    }

    let user = match lookup_user_by_email(&pool, &email).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to lookup user for password reset: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
        }
    };

    let Some(_user) = user else {
        // No OTP row, no mail; the acknowledgement stays uniform.
        return message_response(StatusCode::OK, GENERIC_OTP_MESSAGE);
    };

    let code = generate_otp();
    if let Err(err) = replace_otp(&pool, &email, &code, auth_state.config().otp_ttl_seconds()).await
    {
        error!("Failed to store otp: {err}");
        return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
    }

    // The OTP mail is awaited: a delivery failure is this request's failure.
    let mail = OutgoingMail {
        to: email.clone(),
        subject: "Your Password Reset OTP".to_string(),
        html_body: format!(
            "<p>Your OTP for password reset is: <strong>{code}</strong></p>\
             <p>It will expire in 5 minutes.</p>"
        ),
    };
    if let Err(err) = auth_state.mailer().send(&mail).await {
        error!("Failed to send otp mail: {err}");
        return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
    }

    message_response(StatusCode::OK, GENERIC_OTP_MESSAGE)
}

/// Verify a reset code; on success the row is marked verified, not deleted.
/// Reset-password consumes it next.
#[utoipa::path(
    post,
    path = "/user/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP verified", body = MessageResponse),
        (status = 400, description = "Unknown, invalid, or expired OTP", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    pool: Extension<PgPool>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    let code = request.otp.trim();
    if !valid_otp(code) {
        return message_response(StatusCode::BAD_REQUEST, "Invalid OTP");
    }

    let record = match lookup_latest_otp(&pool, &email, code, false).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return message_response(StatusCode::BAD_REQUEST, "OTP not found or expired");
        }
        Err(err) => {
            error!("Failed to lookup otp: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "OTP verification failed");
        }
    };

    if record.expired {
        // Expired rows are deleted on detection.
        if let Err(err) = delete_otp(&pool, record.id).await {
            error!("Failed to delete expired otp: {err}");
        }
        return message_response(StatusCode::BAD_REQUEST, "OTP expired");
    }

    if let Err(err) = mark_otp_verified(&pool, record.id).await {
        error!("Failed to mark otp verified: {err}");
        return message_response(StatusCode::INTERNAL_SERVER_ERROR, "OTP verification failed");
    }

    message_response(StatusCode::OK, "OTP verified successfully")
}

/// Complete the reset with a verified, unexpired OTP.
///
/// All OTP rows for the email are purged afterwards, so the code is single-use.
#[utoipa::path(
    post,
    path = "/user/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "OTP missing, unverified, or expired", body = MessageResponse),
        (status = 404, description = "User no longer exists", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return message_response(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let email = normalize_email(&request.email);
    let code = request.otp.trim();
    if !valid_otp(code) {
        return message_response(StatusCode::BAD_REQUEST, "Invalid OTP");
    }
    if request.new_password.is_empty() {
        return message_response(StatusCode::BAD_REQUEST, "Missing password");
    }

    // Only a row that verify-otp already flagged counts.
    let record = match lookup_latest_otp(&pool, &email, code, true).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return message_response(StatusCode::BAD_REQUEST, "OTP not found or not verified");
        }
        Err(err) => {
            error!("Failed to lookup otp: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
        }
    };

    if record.expired {
        if let Err(err) = delete_otp(&pool, record.id).await {
            error!("Failed to delete expired otp: {err}");
        }
        return message_response(StatusCode::BAD_REQUEST, "OTP expired");
    }

    let password_hash = match hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
        }
    };

    match update_password(&pool, &email, &password_hash).await {
        Ok(true) => {}
        Ok(false) => {
            return message_response(StatusCode::NOT_FOUND, "User not found");
        }
        Err(err) => {
            error!("Failed to update password: {err}");
            return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
        }
    }

    if let Err(err) = delete_otps_for_email(&pool, &email).await {
        error!("Failed to purge otps: {err}");
        return message_response(StatusCode::INTERNAL_SERVER_ERROR, "Password reset failed");
    }

    message_response(StatusCode::OK, "Password reset successfully")
}
