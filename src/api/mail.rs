//! Outbound mail abstractions.
//!
//! Handlers talk to a `Mailer` and never to SMTP directly. Production wires
//! `SmtpMailer`; local development falls back to `LogMailer`, which logs the
//! payload and reports success. The welcome mail is sent from a detached task
//! whose failure is logged only; the OTP mail is awaited by the request path
//! and a transport failure surfaces as that request's error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::info;

// Bound outbound SMTP so a hung relay cannot hang a request indefinitely.
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Mail delivery abstraction used by the auth handlers.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error.
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

/// Local dev mailer that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.html_body,
            "mail send stub"
        );
        Ok(())
    }
}

/// SMTP mailer over a TLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    /// Build an SMTP mailer from transport credentials.
    ///
    /// # Errors
    /// Returns an error if the relay host is invalid.
    pub fn new(
        host: &str,
        port: u16,
        username: String,
        password: &SecretString,
        from: String,
    ) -> Result<Self> {
        let credentials = Credentials::new(username, password.expose_secret().to_string());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP relay host: {host}"))?
            .port(port)
            .credentials(credentials)
            .timeout(Some(SMTP_TIMEOUT))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.parse().context("invalid sender address")?)
            .to(mail.to.parse().context("invalid recipient address")?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body.clone())
            .context("failed to build mail message")?;

        self.transport
            .send(message)
            .await
            .context("failed to send mail")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{LogMailer, Mailer, OutgoingMail, SmtpMailer};
    use anyhow::Result;
    use secrecy::SecretString;

    #[tokio::test]
    async fn log_mailer_always_succeeds() -> Result<()> {
        let mail = OutgoingMail {
            to: "a@x.com".to_string(),
            subject: "Hello".to_string(),
            html_body: "<p>Hi</p>".to_string(),
        };
        LogMailer.send(&mail).await?;
        Ok(())
    }

    #[test]
    fn smtp_mailer_builds_for_valid_host() {
        let mailer = SmtpMailer::new(
            "smtp.example.com",
            465,
            "user".to_string(),
            &SecretString::from("pass"),
            "Quiz Master <no-reply@quizmaster.dev>".to_string(),
        );
        assert!(mailer.is_ok());
    }
}
