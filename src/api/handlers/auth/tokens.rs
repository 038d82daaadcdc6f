//! Access token issuance and verification.
//!
//! Access tokens are short-lived HS256 JWTs carrying the user id; they are
//! never persisted. Refresh tokens are opaque random values handled by
//! `utils`/`storage`.

use anyhow::{anyhow, Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AccessClaims {
    pub(crate) sub: Uuid,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}

/// Sign a short-lived access token for the given user.
pub(crate) fn issue_access_token(secret: &[u8], user_id: Uuid, ttl_seconds: i64) -> Result<String> {
    let iat = chrono::Utc::now().timestamp();
    let exp = iat
        .checked_add(ttl_seconds)
        .ok_or_else(|| anyhow!("access token expiry overflow"))?;

    let claims = AccessClaims {
        sub: user_id,
        iat,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .context("failed to sign access token")
}

/// Decode and validate an access token, returning its claims.
pub(crate) fn verify_access_token(secret: &[u8], token: &str) -> Result<AccessClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 30; // clock skew

    let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .context("invalid access token")?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::{issue_access_token, verify_access_token};
    use anyhow::Result;
    use uuid::Uuid;

    const SECRET: &[u8] = b"unit-test-secret-unit-test-secret";

    #[test]
    fn issue_and_verify_round_trip() -> Result<()> {
        let user_id = Uuid::new_v4();
        let token = issue_access_token(SECRET, user_id, 900)?;
        let claims = verify_access_token(SECRET, &token)?;
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<()> {
        let token = issue_access_token(SECRET, Uuid::new_v4(), -120)?;
        assert!(verify_access_token(SECRET, &token).is_err());
        Ok(())
    }

    #[test]
    fn wrong_secret_is_rejected() -> Result<()> {
        let token = issue_access_token(SECRET, Uuid::new_v4(), 900)?;
        assert!(verify_access_token(b"another-secret-another-secret!!", &token).is_err());
        Ok(())
    }

    #[test]
    fn tampered_token_is_rejected() -> Result<()> {
        let token = issue_access_token(SECRET, Uuid::new_v4(), 900)?;
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });
        assert!(verify_access_token(SECRET, &tampered).is_err());
        Ok(())
    }
}
