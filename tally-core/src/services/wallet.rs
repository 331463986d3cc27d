//! Wallet service - wallet creation and ledger posting

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{LedgerEntry, TransactionType, Wallet};
use crate::ports::{LedgerStore, StoreError, WalletStore};

use super::{store_failure, AccountService};

/// Orchestrates wallets and their append-only ledgers
///
/// Posting a transaction records it and leaves `Wallet::balance` alone;
/// the balance is not reconciled against the ledger here.
pub struct WalletService {
    wallets: Arc<dyn WalletStore>,
    ledger: Arc<dyn LedgerStore>,
    accounts: Arc<AccountService>,
}

impl WalletService {
    pub fn new(
        wallets: Arc<dyn WalletStore>,
        ledger: Arc<dyn LedgerStore>,
        accounts: Arc<AccountService>,
    ) -> Self {
        Self {
            wallets,
            ledger,
            accounts,
        }
    }

    /// Open the wallet for an account, with balance 0 unless given
    pub async fn open_wallet(
        &self,
        account_id: Uuid,
        initial_balance: Option<Decimal>,
    ) -> Result<Wallet> {
        let wallet = Wallet::new(account_id, initial_balance.unwrap_or(Decimal::ZERO));
        wallet.validate().map_err(Error::validation)?;

        if !self.accounts.exists(account_id).await? {
            return Err(Error::not_found(format!("account {}", account_id)));
        }

        let existing = self
            .wallets
            .find_wallet_by_account(account_id)
            .await
            .map_err(|e| store_failure("find_wallet_by_account", e))?;
        if existing.is_some() {
            return Err(Error::conflict("this account already has a wallet"));
        }

        self.wallets
            .insert_wallet(&wallet)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => {
                    Error::conflict("this account already has a wallet")
                }
                StoreError::ForeignKeyViolation(_) => {
                    Error::not_found(format!("account {}", account_id))
                }
                other => store_failure("insert_wallet", other),
            })?;

        tracing::info!(wallet_id = %wallet.id, account_id = %account_id, "wallet opened");
        Ok(wallet)
    }

    /// Append an immutable transaction to a wallet's ledger
    ///
    /// `kind` must be "send" or "receive"; `amount` must be positive.
    pub async fn post_transaction(
        &self,
        wallet_id: Uuid,
        amount: Decimal,
        kind: &str,
        category: &str,
    ) -> Result<LedgerEntry> {
        let kind: TransactionType = kind.parse().map_err(Error::Validation)?;
        let entry = LedgerEntry::new(wallet_id, amount, kind, category);
        entry.validate().map_err(Error::validation)?;

        self.get_wallet(wallet_id).await?;

        self.ledger.append_entry(&entry).await.map_err(|e| match e {
            StoreError::ForeignKeyViolation(_) => Error::not_found(format!("wallet {}", wallet_id)),
            other => store_failure("append_entry", other),
        })?;

        tracing::info!(entry_id = %entry.id(), wallet_id = %wallet_id, "transaction posted");
        Ok(entry)
    }

    pub async fn get_wallet(&self, wallet_id: Uuid) -> Result<Wallet> {
        self.wallets
            .find_wallet_by_id(wallet_id)
            .await
            .map_err(|e| store_failure("find_wallet_by_id", e))?
            .ok_or_else(|| Error::not_found(format!("wallet {}", wallet_id)))
    }

    /// The wallet owned by an account
    pub async fn wallet_for_account(&self, account_id: Uuid) -> Result<Wallet> {
        self.wallets
            .find_wallet_by_account(account_id)
            .await
            .map_err(|e| store_failure("find_wallet_by_account", e))?
            .ok_or_else(|| Error::not_found(format!("wallet for account {}", account_id)))
    }

    /// Number of ledger entries posted to a wallet
    pub async fn transaction_count(&self, wallet_id: Uuid) -> Result<u64> {
        self.get_wallet(wallet_id).await?;
        self.ledger
            .count_entries_by_wallet(wallet_id)
            .await
            .map_err(|e| store_failure("count_entries_by_wallet", e))
    }

    /// Ledger entries for a wallet, oldest first
    pub async fn ledger(&self, wallet_id: Uuid) -> Result<Vec<LedgerEntry>> {
        self.get_wallet(wallet_id).await?;
        self.ledger
            .list_entries_by_wallet(wallet_id)
            .await
            .map_err(|e| store_failure("list_entries_by_wallet", e))
    }
}
