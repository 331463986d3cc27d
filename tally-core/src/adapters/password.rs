//! Argon2id credential hasher

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::config::Argon2Params;
use crate::ports::{CredentialError, CredentialHasher};

/// Hashes secrets into PHC strings with a fresh random salt per call
///
/// Verification reads the cost parameters from the stored digest, so
/// digests created under older settings keep verifying.
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new(params: &Argon2Params) -> anyhow::Result<Self> {
        let params = Params::new(
            params.memory_cost,
            params.time_cost,
            params.parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Failed to create argon2 params: {:?}", e))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CredentialError::Hash(e.to_string()))
    }

    fn verify(&self, secret: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => self
                .argon2
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
