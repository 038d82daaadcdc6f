//! # Quiz Master auth service
//!
//! `quizmaster` is the account and session backend for the Quiz Master web
//! app. It owns user registration, login, and profile data, and keeps
//! sessions alive with a two-token scheme:
//!
//! - **Access token:** a short-lived `JWT` (15 minutes) sent as a bearer
//!   header. It is never persisted server-side.
//! - **Refresh token:** a random 256-bit value held in an `HttpOnly` cookie.
//!   Only its `SHA-256` hash is stored in `PostgreSQL`, so a database leak
//!   does not expose usable tokens.
//!
//! Password resets use short-lived email OTPs with a verify-then-reset
//! handshake; passwords are hashed with `Argon2id`.
//!
//! The [`client`] module provides the matching consumer: a `reqwest`-based
//! client that silently refreshes its session once on 401 before giving up.

pub mod api;
pub mod cli;
pub mod client;

#[cfg(test)]
mod tests {
    use anyhow::{Context, Result, ensure};
    use std::fs;
    use std::path::{Path, PathBuf};

    // Normalize SQL to avoid brittle formatting checks in schema tests.
    fn canonicalize_sql(sql: &str) -> String {
        sql.chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| ch.to_ascii_lowercase())
            .collect()
    }

    fn canonical_sql(path: &Path) -> Result<String> {
        let sql = fs::read_to_string(path)
            .with_context(|| format!("Failed to read SQL file at {}", path.display()))?;
        Ok(canonicalize_sql(&sql))
    }

    fn assert_contains(path: &Path, canonical: &str, needle: &str) -> Result<()> {
        ensure!(
            canonical.contains(needle),
            "Expected {needle} is missing in {}",
            path.display()
        );
        Ok(())
    }

    #[test]
    fn schema_sql_integrity() -> Result<()> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("db/sql/01_quizmaster.sql");
        let canonical = canonical_sql(&path)?;
        // Email uniqueness is enforced by the store, not by handler pre-checks.
        assert_contains(&path, &canonical, "emailtextnotnullunique")?;
        // Refresh tokens are stored hashed, never raw.
        assert_contains(&path, &canonical, "token_hashbyteanotnullunique")?;
        // OTPs carry the verified flag used by the two-step reset.
        assert_contains(&path, &canonical, "verifiedbooleannotnulldefaultfalse")
    }
}
