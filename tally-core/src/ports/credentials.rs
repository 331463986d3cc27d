//! Credential ports - password digests, bearer tokens, and time

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("failed to hash secret: {0}")]
    Hash(String),
}

/// One-way, salted digest of a secret
pub trait CredentialHasher: Send + Sync {
    /// Hash a secret; two calls with the same input yield different digests
    fn hash(&self, secret: &str) -> Result<String, CredentialError>;

    /// Check a secret against a digest; a malformed digest never verifies
    fn verify(&self, secret: &str, digest: &str) -> bool;
}

/// Claims carried by a bearer token (unix seconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub account_id: Uuid,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl TokenClaims {
    pub fn new(account_id: Uuid, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        let issued_at = issued_at.timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            account_id,
            issued_at,
            expires_at: issued_at.saturating_add(ttl_secs),
        }
    }

    /// A token is expired from `expires_at` onwards
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed or its signature does not match")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Signs and verifies time-limited identity tokens
pub trait TokenIssuer: Send + Sync {
    /// Issue a token for `account_id` valid for `ttl` from now
    fn issue(&self, account_id: Uuid, ttl: Duration) -> Result<String, TokenError>;

    /// Verify signature first, then expiry
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_claims_expiry_boundary() {
        let issued = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let claims = TokenClaims::new(Uuid::new_v4(), issued, Duration::from_secs(3600));
        assert_eq!(claims.expires_at - claims.issued_at, 3600);

        assert!(!claims.is_expired_at(issued + chrono::Duration::seconds(3599)));
        assert!(claims.is_expired_at(issued + chrono::Duration::seconds(3600)));
        assert!(claims.is_expired_at(issued + chrono::Duration::seconds(3601)));
    }
}
