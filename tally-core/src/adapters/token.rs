//! HMAC-SHA256 bearer tokens
//!
//! Wire format: `base64url(json(claims)) "." hex(hmac_sha256(payload))`.
//! The signature is checked before the claims are decoded, so an expired
//! token is only reported as expired when it is also authentic.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::ports::{Clock, TokenClaims, TokenError, TokenIssuer};

type HmacSha256 = Hmac<Sha256>;

/// Minimum shared secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

pub struct HmacTokenIssuer {
    secret: Vec<u8>,
    clock: Arc<dyn Clock>,
}

impl HmacTokenIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            anyhow::bail!(
                "Token secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                secret.len()
            );
        }
        Ok(Self { secret, clock })
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

impl TokenIssuer for HmacTokenIssuer {
    fn issue(&self, account_id: Uuid, ttl: Duration) -> Result<String, TokenError> {
        let claims = TokenClaims::new(account_id, self.clock.now(), ttl);
        let json = serde_json::to_vec(&claims).map_err(|e| TokenError::Signing(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.mac(&payload)?.finalize().into_bytes();
        Ok(format!("{}.{}", payload, hex::encode(signature)))
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(TokenError::Invalid)?;
        let signature = hex::decode(signature).map_err(|_| TokenError::Invalid)?;

        // verify_slice compares in constant time
        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::Invalid)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Invalid)?;
        let claims: TokenClaims = serde_json::from_slice(&json).map_err(|_| TokenError::Invalid)?;

        if claims.is_expired_at(self.clock.now()) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
