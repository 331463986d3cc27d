//! Adapter implementations (hexagonal architecture)
//!
//! Adapters provide concrete implementations of the port traits.

pub mod clock;
pub mod duckdb;
pub mod memory;
pub mod password;
pub mod token;

pub use clock::{ManualClock, SystemClock};
pub use duckdb::DuckDbStore;
pub use memory::MemoryStore;
pub use password::Argon2Hasher;
pub use token::HmacTokenIssuer;
