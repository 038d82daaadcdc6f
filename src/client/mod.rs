//! HTTP client that keeps a session alive against the auth API.
//!
//! The access token lives in memory only; the refresh token stays in the
//! cookie jar, mirroring how a browser holds the `HttpOnly` cookie. When a
//! request comes back 401 the client performs one silent refresh and replays
//! the request once. A second 401, or a failed refresh, surfaces as
//! [`SessionExpired`] and the caller has to log in again.

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::{fmt, time::Duration};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::api::handlers::auth::types::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, ProfileUpdateRequest,
    ProfileUpdateResponse, PublicUser, RefreshResponse, RegisterRequest, ResetPasswordRequest,
    VerifyOtpRequest,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The session could not be refreshed; the caller must authenticate again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExpired;

impl fmt::Display for SessionExpired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("session expired, please log in again")
    }
}

impl std::error::Error for SessionExpired {}

/// Client with an in-memory access token and a cookie jar for the refresh
/// token.
pub struct SessionClient {
    http: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl SessionClient {
    /// Build a client for the given API base URL.
    /// # Errors
    /// Returns an error if the URL is invalid or the client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid base URL")?;
        let http = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    /// Whether an access token is currently held.
    pub async fn has_session(&self) -> bool {
        self.token.read().await.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid endpoint path: {path}"))
    }

    /// Register a new account; the returned session is stored.
    /// # Errors
    /// Returns an error if the request fails or is rejected.
    pub async fn register(&self, request: &RegisterRequest) -> Result<PublicUser> {
        let response = self
            .http
            .post(self.endpoint("/user/register")?)
            .json(request)
            .send()
            .await?;
        self.store_session(response).await
    }

    /// Log in and store the session.
    /// # Errors
    /// Returns an error if the request fails or the credentials are rejected.
    pub async fn login(&self, request: &LoginRequest) -> Result<PublicUser> {
        let response = self
            .http
            .post(self.endpoint("/user/login")?)
            .json(request)
            .send()
            .await?;
        self.store_session(response).await
    }

    /// Log out, dropping the access token and the server-side refresh token.
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn logout(&self) -> Result<()> {
        let request = self.http.post(self.endpoint("/user/logout")?);
        let response = self.execute(request).await?;
        self.token.write().await.take();
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }

    /// Fetch the authenticated user's profile.
    /// # Errors
    /// Returns [`SessionExpired`] if the session cannot be kept alive.
    pub async fn profile(&self) -> Result<PublicUser> {
        let request = self.http.get(self.endpoint("/user/profile")?);
        let response = self.execute(request).await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response.json().await?)
    }

    /// Update name and/or email on the authenticated profile.
    /// # Errors
    /// Returns [`SessionExpired`] if the session cannot be kept alive.
    pub async fn update_profile(&self, request: &ProfileUpdateRequest) -> Result<PublicUser> {
        let request = self
            .http
            .put(self.endpoint("/user/profile")?)
            .json(request);
        let response = self.execute(request).await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let body: ProfileUpdateResponse = response.json().await?;
        Ok(body.user)
    }

    /// Request a password-reset code for an email.
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn forgot_password(&self, email: &str) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint("/user/forgot-password")?)
            .json(&ForgotPasswordRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        message_or_error(response).await
    }

    /// Verify a password-reset code.
    /// # Errors
    /// Returns an error if the code is rejected.
    pub async fn verify_otp(&self, request: &VerifyOtpRequest) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint("/user/verify-otp")?)
            .json(request)
            .send()
            .await?;
        message_or_error(response).await
    }

    /// Set a new password with a verified reset code.
    /// # Errors
    /// Returns an error if the code or user is rejected.
    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint("/user/reset-password")?)
            .json(request)
            .send()
            .await?;
        message_or_error(response).await
    }

    /// Send a request with the bearer token, refreshing the session once on
    /// 401 and replaying the request.
    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        // Clone before sending; the original builder is consumed.
        let retry = request.try_clone();

        let response = self.with_bearer(request).await.send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(retry) = retry else {
            // Streaming bodies cannot be replayed.
            self.token.write().await.take();
            return Err(SessionExpired.into());
        };

        debug!("Access token rejected, attempting silent refresh");
        self.refresh().await?;

        let response = self.with_bearer(retry).await.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            // One retry only; a second 401 means the session is gone.
            self.token.write().await.take();
            return Err(SessionExpired.into());
        }
        Ok(response)
    }

    /// Exchange the refresh cookie for a new access token.
    async fn refresh(&self) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint("/user/refresh")?)
            .send()
            .await?;

        if !response.status().is_success() {
            self.token.write().await.take();
            return Err(SessionExpired.into());
        }

        let body: RefreshResponse = response.json().await?;
        *self.token.write().await = Some(body.token);
        Ok(())
    }

    async fn with_bearer(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn store_session(&self, response: Response) -> Result<PublicUser> {
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let body: AuthResponse = response.json().await?;
        *self.token.write().await = Some(body.token);
        Ok(body.user)
    }
}

/// Read the success message body, or turn a failure status into an error.
async fn message_or_error(response: Response) -> Result<String> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    let body: MessageResponse = response.json().await?;
    Ok(body.message)
}

/// Turn a failure response into an error carrying the server's message.
async fn api_error(response: Response) -> anyhow::Error {
    let status = response.status();
    match response.json::<MessageResponse>().await {
        Ok(body) => anyhow::anyhow!("{status}: {}", body.message),
        Err(_) => anyhow::anyhow!("{status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionClient, SessionExpired};
    use anyhow::Result;
    use reqwest::header::AUTHORIZATION;

    #[tokio::test]
    async fn bearer_header_reflects_stored_token() -> Result<()> {
        let client = SessionClient::new("http://localhost:8080")?;
        assert!(!client.has_session().await);

        let request = client.http.get(client.endpoint("/user/profile")?);
        let built = client.with_bearer(request).await.build()?;
        assert!(built.headers().get(AUTHORIZATION).is_none());

        *client.token.write().await = Some("token-123".to_string());
        let request = client.http.get(client.endpoint("/user/profile")?);
        let built = client.with_bearer(request).await.build()?;
        assert_eq!(
            built
                .headers()
                .get(AUTHORIZATION)
                .map(|v| v.to_str().map_err(|_| ())),
            Some(Ok("Bearer token-123"))
        );
        Ok(())
    }

    #[test]
    fn endpoint_joins_paths() -> Result<()> {
        let client = SessionClient::new("http://localhost:8080")?;
        assert_eq!(
            client.endpoint("/user/login")?.as_str(),
            "http://localhost:8080/user/login"
        );
        Ok(())
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(SessionClient::new("not a url").is_err());
    }

    #[test]
    fn session_expired_downcasts() {
        let err: anyhow::Error = SessionExpired.into();
        assert!(err.downcast_ref::<SessionExpired>().is_some());
        assert_eq!(
            err.to_string(),
            "session expired, please log in again"
        );
    }
}
