//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
pub mod logging;
pub mod migration;
mod wallet;

pub use account::AccountService;
pub use logging::{LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use wallet::WalletService;

use crate::domain::result::Error;
use crate::ports::StoreError;

/// Collapse a store failure into the public error, keeping the backend
/// detail in the trace only
pub(crate) fn store_failure(operation: &'static str, err: StoreError) -> Error {
    tracing::error!(operation, error = %err, "store operation failed");
    Error::Store(operation)
}
