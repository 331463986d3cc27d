//! In-memory store
//!
//! Mirrors the DuckDB schema's unique and foreign keys. Every check and
//! insert happens under one lock, so concurrent inserts on the same key
//! produce exactly one winner.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Account, LedgerEntry, Wallet};
use crate::ports::{AccountStore, LedgerStore, StoreError, StoreResult, WalletStore};

#[derive(Default)]
struct MemoryState {
    /// Insertion order doubles as creation order
    accounts: Vec<Account>,
    wallets: HashMap<Uuid, Wallet>,
    ledger: Vec<LedgerEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| StoreError::backend(format!("lock poisoned: {}", e)))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.accounts.iter().any(|a| a.email == account.email) {
            return Err(StoreError::UniqueViolation("email".to_string()));
        }
        if state.accounts.iter().any(|a| a.id == account.id) {
            return Err(StoreError::UniqueViolation("account_id".to_string()));
        }
        state.accounts.push(account.clone());
        Ok(())
    }

    async fn find_account_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let state = self.lock()?;
        Ok(state.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let state = self.lock()?;
        Ok(state.accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let state = self.lock()?;
        Ok(state.accounts.clone())
    }

    async fn set_account_active(
        &self,
        id: Uuid,
        active: bool,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Account>> {
        let mut state = self.lock()?;
        Ok(state.accounts.iter_mut().find(|a| a.id == id).map(|account| {
            account.active = active;
            account.updated_at = updated_at;
            account.clone()
        }))
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn insert_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.wallets.contains_key(&wallet.id) {
            return Err(StoreError::UniqueViolation("wallet_id".to_string()));
        }
        if state.wallets.values().any(|w| w.account_id == wallet.account_id) {
            return Err(StoreError::UniqueViolation("account_id".to_string()));
        }
        state.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn find_wallet_by_id(&self, id: Uuid) -> StoreResult<Option<Wallet>> {
        let state = self.lock()?;
        Ok(state.wallets.get(&id).cloned())
    }

    async fn find_wallet_by_account(&self, account_id: Uuid) -> StoreResult<Option<Wallet>> {
        let state = self.lock()?;
        Ok(state
            .wallets
            .values()
            .find(|w| w.account_id == account_id)
            .cloned())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn append_entry(&self, entry: &LedgerEntry) -> StoreResult<()> {
        let mut state = self.lock()?;
        if !state.wallets.contains_key(&entry.wallet_id()) {
            return Err(StoreError::ForeignKeyViolation("wallet_id".to_string()));
        }
        if state.ledger.iter().any(|e| e.id() == entry.id()) {
            return Err(StoreError::UniqueViolation("entry_id".to_string()));
        }
        state.ledger.push(entry.clone());
        Ok(())
    }

    async fn list_entries_by_wallet(&self, wallet_id: Uuid) -> StoreResult<Vec<LedgerEntry>> {
        let state = self.lock()?;
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.wallet_id() == wallet_id)
            .cloned()
            .collect())
    }

    async fn count_entries_by_wallet(&self, wallet_id: Uuid) -> StoreResult<u64> {
        let state = self.lock()?;
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.wallet_id() == wallet_id)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionType;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_unique_email() {
        let store = MemoryStore::new();
        store
            .insert_account(&Account::new("a", "same@x.com", "h"))
            .await
            .unwrap();
        let err = store
            .insert_account(&Account::new("b", "same@x.com", "h"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation("email".to_string()));
    }

    #[tokio::test]
    async fn test_unique_wallet_owner() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        store.insert_wallet(&Wallet::new(owner, Decimal::ZERO)).await.unwrap();
        let err = store
            .insert_wallet(&Wallet::new(owner, Decimal::ZERO))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation("account_id".to_string()));
    }

    #[tokio::test]
    async fn test_ledger_foreign_key() {
        let store = MemoryStore::new();
        let entry = LedgerEntry::new(Uuid::new_v4(), Decimal::ONE, TransactionType::Receive, "gift");
        let err = store.append_entry(&entry).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn test_set_active_missing_account() {
        let store = MemoryStore::new();
        let result = store
            .set_account_active(Uuid::new_v4(), true, Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
