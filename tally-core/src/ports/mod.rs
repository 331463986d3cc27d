//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The services
//! depend only on these traits, not on concrete implementations.

mod credentials;
mod repository;

pub use credentials::{Clock, CredentialError, CredentialHasher, TokenClaims, TokenError, TokenIssuer};
pub use repository::{AccountStore, LedgerStore, StoreError, StoreResult, WalletStore};
