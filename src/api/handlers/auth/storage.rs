//! Database helpers for users, refresh tokens, and password-reset OTPs.

use anyhow::{anyhow, Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{PublicUser, Role};
use super::utils::{generate_refresh_token, hash_refresh_token, is_unique_violation};

/// Full user row as read by handlers; the hash never leaves this module's callers.
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
    pub(crate) role: Role,
}

impl UserRecord {
    pub(crate) fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(crate) enum InsertUserOutcome {
    Created(UserRecord),
    Conflict,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"***")
            .field("role", &self.role)
            .finish()
    }
}

/// Refresh-token row joined with its owner. Expiry is resolved by the database
/// clock so the caller can delete stale rows before rejecting.
pub(crate) struct RefreshRecord {
    pub(crate) user: UserRecord,
    pub(crate) expired: bool,
}

/// Latest OTP row for an email+code pair.
pub(crate) struct OtpRecord {
    pub(crate) id: Uuid,
    pub(crate) verified: bool,
    pub(crate) expired: bool,
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
    }
}

/// Insert a new user; uniqueness is enforced by the `users.email` constraint,
/// not by a prior read.
pub(crate) async fn insert_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<InsertUserOutcome> {
    let query = r"
        INSERT INTO users (name, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, email, password_hash, role
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertUserOutcome::Created(user_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(InsertUserOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

pub(crate) async fn lookup_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = "SELECT id, name, email, password_hash, role FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.map(|row| user_from_row(&row)))
}

pub(crate) async fn lookup_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = "SELECT id, name, email, password_hash, role FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.map(|row| user_from_row(&row)))
}

/// Set a new password hash for the user owning `email`.
/// Returns false when no such user exists.
pub(crate) async fn update_password(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
) -> Result<bool> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(email)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(result.rows_affected() > 0)
}

/// Outcome of a profile update.
#[derive(Debug)]
pub(crate) enum ProfileUpdateOutcome {
    Updated(UserRecord),
    EmailConflict,
    NotFound,
}

/// Apply only the provided fields; an email collision surfaces as a unique
/// violation from the store rather than a pre-check.
pub(crate) async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    name: Option<&str>,
    email: Option<&str>,
) -> Result<ProfileUpdateOutcome> {
    let query = r"
        UPDATE users
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, name, email, password_hash, role
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(name)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(row)) => Ok(ProfileUpdateOutcome::Updated(user_from_row(&row))),
        Ok(None) => Ok(ProfileUpdateOutcome::NotFound),
        Err(err) if is_unique_violation(&err) => Ok(ProfileUpdateOutcome::EmailConflict),
        Err(err) => Err(err).context("failed to update profile"),
    }
}

/// Generate a refresh token, store only its hash, and return the raw value so
/// the caller can set the cookie. Old rows for the user stay valid; multiple
/// concurrent sessions are allowed.
pub(crate) async fn insert_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_refresh_token()?;
        let token_hash = hash_refresh_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert refresh token"),
        }
    }

    Err(anyhow!("failed to generate unique refresh token"))
}

/// Look up a refresh token together with its owner. Expired rows are still
/// returned (flagged) so the caller can delete them before responding 401.
pub(crate) async fn lookup_refresh_token(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<RefreshRecord>> {
    let query = r"
        SELECT users.id, users.name, users.email, users.password_hash, users.role,
               refresh_tokens.expires_at <= NOW() AS expired
        FROM refresh_tokens
        JOIN users ON users.id = refresh_tokens.user_id
        WHERE refresh_tokens.token_hash = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup refresh token")?;

    Ok(row.map(|row| RefreshRecord {
        expired: row.get("expired"),
        user: user_from_row(&row),
    }))
}

/// Delete a refresh token row. Idempotent; logout and expiry cleanup both use it.
pub(crate) async fn delete_refresh_token(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM refresh_tokens WHERE token_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete refresh token")?;
    Ok(())
}

/// Replace any previous OTP for the email with a fresh one, atomically.
pub(crate) async fn replace_otp(
    pool: &PgPool,
    email: &str,
    code: &str,
    ttl_seconds: i64,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin otp transaction")?;

    let query = "DELETE FROM password_otps WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete previous otps")?;

    let query = r"
        INSERT INTO password_otps (email, code, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(code)
        .bind(ttl_seconds)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert otp")?;

    tx.commit().await.context("commit otp transaction")?;
    Ok(())
}

/// Select the most recently created OTP matching email+code.
/// Expiry is resolved by the database clock and returned as a flag.
pub(crate) async fn lookup_latest_otp(
    pool: &PgPool,
    email: &str,
    code: &str,
    require_verified: bool,
) -> Result<Option<OtpRecord>> {
    let query = r"
        SELECT id, verified, expires_at <= NOW() AS expired
        FROM password_otps
        WHERE email = $1
          AND code = $2
          AND ($3 = FALSE OR verified = TRUE)
        ORDER BY created_at DESC
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(code)
        .bind(require_verified)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup otp")?;

    Ok(row.map(|row| OtpRecord {
        id: row.get("id"),
        verified: row.get("verified"),
        expired: row.get("expired"),
    }))
}

/// Persist the unverified -> verified transition.
pub(crate) async fn mark_otp_verified(pool: &PgPool, otp_id: Uuid) -> Result<()> {
    let query = "UPDATE password_otps SET verified = TRUE WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(otp_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark otp verified")?;
    Ok(())
}

/// Remove a single OTP row (used when expiry is detected on lookup).
pub(crate) async fn delete_otp(pool: &PgPool, otp_id: Uuid) -> Result<()> {
    let query = "DELETE FROM password_otps WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(otp_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete otp")?;
    Ok(())
}

/// Purge every OTP for the email after a successful reset.
pub(crate) async fn delete_otps_for_email(pool: &PgPool, email: &str) -> Result<()> {
    let query = "DELETE FROM password_otps WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge otps for email")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{InsertUserOutcome, OtpRecord, ProfileUpdateOutcome, RefreshRecord, UserRecord};
    use crate::api::handlers::auth::types::Role;
    use uuid::Uuid;

    fn user() -> UserRecord {
        UserRecord {
            id: Uuid::nil(),
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn user_record_debug_redacts_hash() {
        let rendered = format!("{:?}", user());
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("argon2id"));
    }

    #[test]
    fn public_view_drops_the_hash() {
        let record = user();
        let public = record.public();
        assert_eq!(public.id, record.id);
        assert_eq!(public.email, record.email);
        assert_eq!(public.role, Role::User);
    }

    #[test]
    fn outcome_debug_names() {
        assert_eq!(
            format!("{:?}", InsertUserOutcome::Conflict),
            "Conflict"
        );
        assert_eq!(
            format!("{:?}", ProfileUpdateOutcome::EmailConflict),
            "EmailConflict"
        );
        assert_eq!(format!("{:?}", ProfileUpdateOutcome::NotFound), "NotFound");
    }

    #[test]
    fn refresh_record_carries_expiry_flag() {
        let record = RefreshRecord {
            user: user(),
            expired: true,
        };
        assert!(record.expired);
        assert_eq!(record.user.email, "a@x.com");
    }

    #[test]
    fn otp_record_holds_values() {
        let record = OtpRecord {
            id: Uuid::nil(),
            verified: false,
            expired: false,
        };
        assert_eq!(record.id, Uuid::nil());
        assert!(!record.verified);
        assert!(!record.expired);
    }
}
