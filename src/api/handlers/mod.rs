pub mod auth;
pub mod health;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use auth::types::MessageResponse;

/// Build a `{"message": ...}` response with the given status.
pub(crate) fn message_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(MessageResponse {
            message: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::message_response;
    use anyhow::Result;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn message_response_carries_status_and_body() -> Result<()> {
        let response = message_response(StatusCode::BAD_REQUEST, "Invalid credentials");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await?.to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["message"], "Invalid credentials");
        Ok(())
    }
}
