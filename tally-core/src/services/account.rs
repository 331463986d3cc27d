//! Account service - registration, authentication and activation state

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, PublicAccount, Session};
use crate::ports::{AccountStore, CredentialHasher, StoreError, TokenError, TokenIssuer};

use super::store_failure;

/// Orchestrates the account lifecycle
///
/// Every value returned from here is a `PublicAccount`; the password hash
/// stays inside the service and the store.
pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenIssuer>,
    token_ttl: Duration,
    /// Digest checked when no account matches, so unknown emails cost the
    /// same hasher work as wrong passwords
    dummy_digest: OnceCell<String>,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            accounts,
            hasher,
            tokens,
            token_ttl,
            dummy_digest: OnceCell::new(),
        }
    }

    /// Register a new account and issue its first token
    ///
    /// The email lookup gives a friendly early answer; the store's unique
    /// constraint decides when two registrations race.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Session> {
        require("username", username)?;
        require("email", email)?;
        require("password", password)?;

        let existing = self
            .accounts
            .find_account_by_email(email)
            .await
            .map_err(|e| store_failure("find_account_by_email", e))?;
        if existing.is_some() {
            return Err(Error::conflict("an account with this email already exists"));
        }

        let password_hash = self.hash_password(password).await?;

        let account = Account::new(username, email, password_hash);
        self.accounts
            .insert_account(&account)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => {
                    Error::conflict("an account with this email already exists")
                }
                other => store_failure("insert_account", other),
            })?;

        let token = self.issue_token(account.id)?;
        tracing::info!(account_id = %account.id, "account registered");

        Ok(Session {
            account: account.to_public(),
            token,
        })
    }

    /// Log in with email and password
    ///
    /// Unknown email and wrong password are the same `InvalidCredentials`.
    /// A deactivated account is only reported once the password verified.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        require("email", email)?;
        require("password", password)?;

        let account = self
            .accounts
            .find_account_by_email(email)
            .await
            .map_err(|e| store_failure("find_account_by_email", e))?;

        let account = match account {
            Some(account) => {
                let digest = account.password_hash.clone();
                self.verify_password(password, digest).await?.then_some(account)
            }
            None => {
                let digest = self.dummy_digest().await?;
                self.verify_password(password, digest).await?;
                None
            }
        };

        let Some(account) = account else {
            tracing::warn!("authentication failed");
            return Err(Error::InvalidCredentials);
        };

        if !account.active {
            tracing::warn!(account_id = %account.id, "login attempt on deactivated account");
            return Err(Error::AccountDisabled);
        }

        let token = self.issue_token(account.id)?;
        Ok(Session {
            account: account.to_public(),
            token,
        })
    }

    /// All accounts, oldest first
    pub async fn list(&self) -> Result<Vec<PublicAccount>> {
        let accounts = self
            .accounts
            .list_accounts()
            .await
            .map_err(|e| store_failure("list_accounts", e))?;
        Ok(accounts.iter().map(Account::to_public).collect())
    }

    /// Activate or deactivate an account. Idempotent.
    pub async fn set_active(&self, account_id: Uuid, active: bool) -> Result<PublicAccount> {
        let updated = self
            .accounts
            .set_account_active(account_id, active, Utc::now())
            .await
            .map_err(|e| store_failure("set_account_active", e))?
            .ok_or_else(|| Error::not_found(format!("account {}", account_id)))?;

        tracing::info!(account_id = %account_id, active, "account activation changed");
        Ok(updated.to_public())
    }

    pub async fn get(&self, account_id: Uuid) -> Result<PublicAccount> {
        self.find(account_id)
            .await?
            .map(|a| a.to_public())
            .ok_or_else(|| Error::not_found(format!("account {}", account_id)))
    }

    pub async fn exists(&self, account_id: Uuid) -> Result<bool> {
        Ok(self.find(account_id).await?.is_some())
    }

    /// Resolve a bearer token to the account it was issued for
    pub async fn verify_token(&self, token: &str) -> Result<PublicAccount> {
        let claims = self.tokens.verify(token).map_err(|e| match e {
            TokenError::Expired => Error::ExpiredToken,
            TokenError::Invalid => Error::InvalidToken,
            TokenError::Signing(msg) => {
                tracing::error!(error = %msg, "token verification failed");
                Error::InvalidToken
            }
        })?;

        let account = self
            .find(claims.account_id)
            .await?
            .ok_or(Error::InvalidToken)?;
        if !account.active {
            return Err(Error::AccountDisabled);
        }
        Ok(account.to_public())
    }

    async fn find(&self, account_id: Uuid) -> Result<Option<Account>> {
        self.accounts
            .find_account_by_id(account_id)
            .await
            .map_err(|e| store_failure("find_account_by_id", e))
    }

    /// Argon2 is CPU and memory heavy; keep it off the async workers
    async fn hash_password(&self, password: &str) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "password hashing task failed");
                Error::Store("hash_password")
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "password hashing failed");
                Error::Store("hash_password")
            })
    }

    async fn verify_password(&self, password: &str, digest: String) -> Result<bool> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "password verification task failed");
                Error::Store("verify_password")
            })
    }

    async fn dummy_digest(&self) -> Result<String> {
        self.dummy_digest
            .get_or_try_init(|| self.hash_password("tally-unknown-account"))
            .await
            .cloned()
    }

    fn issue_token(&self, account_id: Uuid) -> Result<String> {
        self.tokens.issue(account_id, self.token_ttl).map_err(|e| {
            tracing::error!(error = %e, "token issuance failed");
            Error::Store("issue_token")
        })
    }
}

/// Reject absent or blank input
fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::adapters::{Argon2Hasher, HmacTokenIssuer, MemoryStore, SystemClock};
    use crate::config::Argon2Params;
    use crate::ports::CredentialError;

    /// Real hasher that counts how often each capability is used
    struct CountingHasher {
        inner: Argon2Hasher,
        hashes: AtomicUsize,
        verifies: AtomicUsize,
    }

    impl CredentialHasher for CountingHasher {
        fn hash(&self, secret: &str) -> std::result::Result<String, CredentialError> {
            self.hashes.fetch_add(1, Ordering::SeqCst);
            self.inner.hash(secret)
        }

        fn verify(&self, secret: &str, digest: &str) -> bool {
            self.verifies.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(secret, digest)
        }
    }

    fn counting_service() -> (AccountService, Arc<CountingHasher>) {
        let hasher = Arc::new(CountingHasher {
            inner: Argon2Hasher::new(&Argon2Params::minimal()).unwrap(),
            hashes: AtomicUsize::new(0),
            verifies: AtomicUsize::new(0),
        });
        let tokens = HmacTokenIssuer::new(vec![5u8; 32], Arc::new(SystemClock)).unwrap();
        let service = AccountService::new(
            Arc::new(MemoryStore::new()),
            hasher.clone(),
            Arc::new(tokens),
            Duration::from_secs(3600),
        );
        (service, hasher)
    }

    #[test]
    fn test_require_rejects_blank() {
        assert!(require("email", "a@x.com").is_ok());
        assert_eq!(
            require("email", ""),
            Err(Error::Validation("email is required".to_string()))
        );
        assert!(require("password", "   ").is_err());
    }

    #[tokio::test]
    async fn test_unknown_email_costs_one_verify() {
        let (service, hasher) = counting_service();
        service.register("alice", "a@x.com", "pw1").await.unwrap();

        let before = hasher.verifies.load(Ordering::SeqCst);
        let known = service.authenticate("a@x.com", "wrong").await.unwrap_err();
        let known_calls = hasher.verifies.load(Ordering::SeqCst) - before;

        let before = hasher.verifies.load(Ordering::SeqCst);
        let unknown = service.authenticate("b@x.com", "wrong").await.unwrap_err();
        let unknown_calls = hasher.verifies.load(Ordering::SeqCst) - before;

        assert_eq!(known, Error::InvalidCredentials);
        assert_eq!(unknown, Error::InvalidCredentials);
        assert_eq!(known_calls, 1);
        assert_eq!(unknown_calls, 1);
    }

    #[tokio::test]
    async fn test_dummy_digest_is_hashed_once() {
        let (service, hasher) = counting_service();
        for _ in 0..3 {
            let err = service.authenticate("nobody@x.com", "pw").await.unwrap_err();
            assert_eq!(err, Error::InvalidCredentials);
        }
        assert_eq!(hasher.hashes.load(Ordering::SeqCst), 1);
        assert_eq!(hasher.verifies.load(Ordering::SeqCst), 3);
    }
}
