//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod transaction;
mod wallet;
pub mod result;

pub use account::{Account, PublicAccount, Session};
pub use transaction::{LedgerEntry, TransactionType};
pub use wallet::Wallet;
