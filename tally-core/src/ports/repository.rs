//! Repository ports - persistence abstraction
//!
//! Each store enforces its declared uniqueness constraints at write time.
//! A lost race on a unique key surfaces as `StoreError::UniqueViolation`,
//! never as a silent duplicate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Account, LedgerEntry, Wallet};

/// Failure reported by a store adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A declared unique key (email, wallet owner) already exists
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A referenced row does not exist
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persisted account records, unique by email
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account; `UniqueViolation("email")` if the email is taken
    async fn insert_account(&self, account: &Account) -> StoreResult<()>;

    async fn find_account_by_id(&self, id: Uuid) -> StoreResult<Option<Account>>;

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// All accounts, oldest first
    async fn list_accounts(&self) -> StoreResult<Vec<Account>>;

    /// Set the activation flag; `None` if no such account
    async fn set_account_active(
        &self,
        id: Uuid,
        active: bool,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Account>>;
}

/// Persisted wallet records, at most one per account
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Insert a new wallet; `UniqueViolation("account_id")` if the owner has one
    async fn insert_wallet(&self, wallet: &Wallet) -> StoreResult<()>;

    async fn find_wallet_by_id(&self, id: Uuid) -> StoreResult<Option<Wallet>>;

    async fn find_wallet_by_account(&self, account_id: Uuid) -> StoreResult<Option<Wallet>>;
}

/// Append-only ledger of transactions, each bound to one wallet
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append an entry; `ForeignKeyViolation` if the wallet does not exist
    async fn append_entry(&self, entry: &LedgerEntry) -> StoreResult<()>;

    /// Entries for a wallet, oldest first
    async fn list_entries_by_wallet(&self, wallet_id: Uuid) -> StoreResult<Vec<LedgerEntry>>;

    async fn count_entries_by_wallet(&self, wallet_id: Uuid) -> StoreResult<u64>;
}
