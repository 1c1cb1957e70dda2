//! Password hashing and password-reset tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Reset tokens are 32 random
//! bytes sent to the user in hex; only their SHA-256 digest is stored.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Lifetime of a password-reset token.
pub const RESET_TOKEN_TTL_SECS: i64 = 3600;

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// Check a password against a stored hash. A malformed hash never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

/// A freshly issued reset token.
pub struct ResetToken {
    /// Sent to the user, never stored.
    pub plain: Zeroizing<String>,
    /// Stored on the user record.
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

/// Issue a reset token valid for [`RESET_TOKEN_TTL_SECS`] from `now`.
pub fn issue_reset_token(now: DateTime<Utc>) -> ResetToken {
    let mut raw = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut raw[..]);
    let plain = Zeroizing::new(to_hex(&raw[..]));
    let digest = token_digest(&plain);
    ResetToken {
        plain,
        digest,
        expires_at: now + Duration::seconds(RESET_TOKEN_TTL_SECS),
    }
}

/// SHA-256 hex digest of a reset token as presented by the client.
pub fn token_digest(token: &str) -> String {
    to_hex(&Sha256::digest(token.trim().as_bytes()))
}

/// Constant-time comparison of a stored reset digest with a presented one.
pub fn digest_matches(stored: Option<&str>, presented: &str) -> bool {
    let Some(stored) = stored else {
        return false;
    };
    if stored.len() != presented.len() {
        return false;
    }
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn reset_token_digest_matches() {
        let now = Utc::now();
        let token = issue_reset_token(now);
        assert_eq!(token.plain.len(), 64);
        assert_eq!(token_digest(&token.plain), token.digest);
        assert_ne!(token.plain.as_str(), token.digest);
        assert_eq!(token.expires_at - now, Duration::hours(1));
    }

    #[test]
    fn digest_comparison() {
        let digest = token_digest("abc");
        assert!(digest_matches(Some(&digest), &token_digest(" abc ")));
        assert!(!digest_matches(Some(&digest), &token_digest("abd")));
        assert!(!digest_matches(None, &digest));
        assert!(!digest_matches(Some("short"), &digest));
    }
}
