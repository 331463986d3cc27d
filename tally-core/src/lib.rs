//! Tally Core - accounts, credentials and wallet ledgers
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Wallet, LedgerEntry)
//! - **ports**: Trait definitions for external dependencies (stores, hasher, token issuer)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, in-memory, Argon2, HMAC)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use adapters::{Argon2Hasher, DuckDbStore, HmacTokenIssuer, MemoryStore, SystemClock};
use config::Config;
use ports::{AccountStore, Clock, LedgerStore, WalletStore};
use services::{AccountService, WalletService};

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{Account, LedgerEntry, PublicAccount, Session, TransactionType, Wallet};

/// Main context for Tally operations
///
/// Wires stores, hasher and token issuer into the two services. Both
/// services share one store instance.
pub struct TallyContext {
    pub config: Config,
    pub account_service: Arc<AccountService>,
    pub wallet_service: WalletService,
}

impl TallyContext {
    /// Context backed by the DuckDB file in `data_dir`
    ///
    /// The config must carry a token secret; see `Config::ensure_token_secret`.
    pub fn new(data_dir: &Path, config: Config) -> Result<Self> {
        let db_path = data_dir.join(&config.database_file);
        let store = Arc::new(DuckDbStore::new(&db_path)?);
        store.ensure_schema()?;
        Self::wire(config, store.clone(), store.clone(), store, Arc::new(SystemClock))
    }

    /// Context backed by a fresh in-memory store
    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        Self::wire(config, store.clone(), store.clone(), store, Arc::new(SystemClock))
    }

    /// Assemble the services over caller-provided stores and clock
    pub fn wire(
        config: Config,
        accounts: Arc<dyn AccountStore>,
        wallets: Arc<dyn WalletStore>,
        ledger: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let secret = config
            .token_secret
            .clone()
            .ok_or_else(|| anyhow!("No token secret configured"))?;

        let hasher = Arc::new(Argon2Hasher::new(&config.argon2)?);
        let tokens = Arc::new(HmacTokenIssuer::new(secret, clock)?);

        let account_service = Arc::new(AccountService::new(
            accounts,
            hasher,
            tokens,
            config.token_ttl,
        ));
        let wallet_service = WalletService::new(wallets, ledger, Arc::clone(&account_service));

        Ok(Self {
            config,
            account_service,
            wallet_service,
        })
    }
}
