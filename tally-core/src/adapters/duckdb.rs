//! DuckDB store implementation

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Account, LedgerEntry, TransactionType, Wallet};
use crate::ports::{AccountStore, LedgerStore, StoreError, StoreResult, WalletStore};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const ACCOUNT_COLUMNS: &str =
    "account_id, username, email, password_hash, active, created_at, updated_at";

const WALLET_COLUMNS: &str =
    "wallet_id, account_id, CAST(balance AS VARCHAR), created_at";

const ENTRY_COLUMNS: &str =
    "entry_id, wallet_id, CAST(amount AS VARCHAR), entry_type, category, created_at";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("could not set lock")
        || lower.contains("database is locked")
}

/// Classify a DuckDB error message into a store error
///
/// DuckDB reports constraint violations as e.g.
/// `Constraint Error: Duplicate key "email: a@x.com" violates unique constraint.`
/// Only the column name is kept; the offending value never leaves this module.
fn classify_error_message(msg: &str) -> StoreError {
    let lower = msg.to_lowercase();
    if lower.contains("foreign key") {
        let column = constraint_column(msg).unwrap_or("foreign key");
        StoreError::ForeignKeyViolation(column.to_string())
    } else if lower.contains("duplicate key")
        || lower.contains("unique constraint")
        || lower.contains("primary key constraint")
    {
        let column = constraint_column(msg).unwrap_or("unique key");
        StoreError::UniqueViolation(column.to_string())
    } else {
        StoreError::Backend(msg.to_string())
    }
}

/// Extract `column` from `... key "column: value" ...`
fn constraint_column(msg: &str) -> Option<&str> {
    let start = msg.find("key \"")? + "key \"".len();
    let rest = &msg[start..];
    let end = rest.find(':')?;
    Some(rest[..end].trim())
}

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        classify_error_message(&err.to_string())
    }
}

/// DuckDB-backed account, wallet and ledger store
///
/// All statements run on one connection behind a mutex. Uniqueness of
/// email and wallet owner is enforced by the table constraints, so a
/// lost check-then-insert race fails at insert time.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Open (or create) a database file
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which occur when another process holds the database.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max_attempts = MAX_RETRIES,
                            "database busy, retrying: {}",
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::backend(format!("lock poisoned: {}", e)))
    }

    fn query_account(
        conn: &Connection,
        filter: &str,
        value: &str,
    ) -> StoreResult<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE {} = ?", ACCOUNT_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map([value], AccountRow::read)?;
        rows.next().transpose()?.map(Account::try_from).transpose()
    }

    fn query_wallet(conn: &Connection, filter: &str, value: &str) -> StoreResult<Option<Wallet>> {
        let sql = format!("SELECT {} FROM wallets WHERE {} = ?", WALLET_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map([value], WalletRow::read)?;
        rows.next().transpose()?.map(Wallet::try_from).transpose()
    }
}

#[async_trait]
impl AccountStore for DuckDbStore {
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO accounts (account_id, username, email, password_hash, active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                account.id.to_string(),
                account.username,
                account.email,
                account.password_hash,
                account.active,
                format_timestamp(&account.created_at),
                format_timestamp(&account.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn find_account_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let conn = self.lock()?;
        Self::query_account(&conn, "account_id", &id.to_string())
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let conn = self.lock()?;
        Self::query_account(&conn, "email", email)
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM accounts ORDER BY created_at, account_id",
            ACCOUNT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], AccountRow::read)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(Account::try_from(row?)?);
        }
        Ok(accounts)
    }

    async fn set_account_active(
        &self,
        id: Uuid,
        active: bool,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Account>> {
        let conn = self.lock()?;
        let id = id.to_string();
        let changed = conn.execute(
            "UPDATE accounts SET active = ?, updated_at = ? WHERE account_id = ?",
            params![active, format_timestamp(&updated_at), id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Self::query_account(&conn, "account_id", &id)
    }
}

#[async_trait]
impl WalletStore for DuckDbStore {
    async fn insert_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO wallets (wallet_id, account_id, balance, created_at)
             VALUES (?, ?, CAST(? AS DECIMAL(38, 8)), ?)",
            params![
                wallet.id.to_string(),
                wallet.account_id.to_string(),
                wallet.balance.to_string(),
                format_timestamp(&wallet.created_at),
            ],
        )?;
        Ok(())
    }

    async fn find_wallet_by_id(&self, id: Uuid) -> StoreResult<Option<Wallet>> {
        let conn = self.lock()?;
        Self::query_wallet(&conn, "wallet_id", &id.to_string())
    }

    async fn find_wallet_by_account(&self, account_id: Uuid) -> StoreResult<Option<Wallet>> {
        let conn = self.lock()?;
        Self::query_wallet(&conn, "account_id", &account_id.to_string())
    }
}

#[async_trait]
impl LedgerStore for DuckDbStore {
    async fn append_entry(&self, entry: &LedgerEntry) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ledger_entries (entry_id, wallet_id, amount, entry_type, category, created_at)
             VALUES (?, ?, CAST(? AS DECIMAL(38, 8)), ?, ?, ?)",
            params![
                entry.id().to_string(),
                entry.wallet_id().to_string(),
                entry.amount().to_string(),
                entry.kind().as_str(),
                entry.category(),
                format_timestamp(&entry.created_at()),
            ],
        )?;
        Ok(())
    }

    async fn list_entries_by_wallet(&self, wallet_id: Uuid) -> StoreResult<Vec<LedgerEntry>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE wallet_id = ? ORDER BY created_at, entry_id",
            ENTRY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([wallet_id.to_string()], EntryRow::read)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(LedgerEntry::try_from(row?)?);
        }
        Ok(entries)
    }

    async fn count_entries_by_wallet(&self, wallet_id: Uuid) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ledger_entries WHERE wallet_id = ?",
            [wallet_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

// Raw rows as read from DuckDB, converted after the statement finishes

struct AccountRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl AccountRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            active: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> StoreResult<Self> {
        Ok(Account {
            id: parse_uuid(&row.id)?,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            active: row.active,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

struct WalletRow {
    id: String,
    account_id: String,
    balance: String,
    created_at: String,
}

impl WalletRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            account_id: row.get(1)?,
            balance: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl TryFrom<WalletRow> for Wallet {
    type Error = StoreError;

    fn try_from(row: WalletRow) -> StoreResult<Self> {
        Ok(Wallet {
            id: parse_uuid(&row.id)?,
            account_id: parse_uuid(&row.account_id)?,
            balance: parse_decimal(&row.balance)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

struct EntryRow {
    id: String,
    wallet_id: String,
    amount: String,
    kind: String,
    category: String,
    created_at: String,
}

impl EntryRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            wallet_id: row.get(1)?,
            amount: row.get(2)?,
            kind: row.get(3)?,
            category: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> StoreResult<Self> {
        let kind = TransactionType::from_str(&row.kind).map_err(StoreError::Backend)?;
        Ok(LedgerEntry::from_parts(
            parse_uuid(&row.id)?,
            parse_uuid(&row.wallet_id)?,
            parse_decimal(&row.amount)?,
            kind,
            row.category,
            parse_timestamp(&row.created_at)?,
        ))
    }
}

// Helper functions

/// Fixed-width RFC 3339 so that string order is time order
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::backend(format!("invalid timestamp '{}': {}", s, e)))
}

fn parse_uuid(s: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::backend(format!("invalid uuid '{}': {}", s, e)))
}

fn parse_decimal(s: &str) -> StoreResult<Decimal> {
    Decimal::from_str(s)
        .map(|d| d.normalize())
        .map_err(|e| StoreError::backend(format!("invalid decimal '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DuckDbStore {
        let store = DuckDbStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    #[test]
    fn test_classify_unique_violation() {
        let err = classify_error_message(
            "Constraint Error: Duplicate key \"email: alice@x.com\" violates unique constraint.",
        );
        assert_eq!(err, StoreError::UniqueViolation("email".to_string()));
    }

    #[test]
    fn test_classify_primary_key_violation() {
        let err = classify_error_message(
            "Constraint Error: Duplicate key \"account_id: 1234\" violates primary key constraint.",
        );
        assert_eq!(err, StoreError::UniqueViolation("account_id".to_string()));
    }

    #[test]
    fn test_classify_foreign_key_violation() {
        let err = classify_error_message(
            "Constraint Error: Violates foreign key constraint because key \"wallet_id: abc\" does not exist in the referenced table",
        );
        assert_eq!(err, StoreError::ForeignKeyViolation("wallet_id".to_string()));
    }

    #[test]
    fn test_classify_other_errors_as_backend() {
        let err = classify_error_message("IO Error: disk full");
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn test_constraint_detail_does_not_leak_value() {
        let err = classify_error_message(
            "Constraint Error: Duplicate key \"email: alice@x.com\" violates unique constraint.",
        );
        assert!(!err.to_string().contains("alice@x.com"));
    }

    #[test]
    fn test_timestamp_round_trip_preserves_order() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::nanoseconds(1);
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
        assert_eq!(parse_timestamp(&format_timestamp(&earlier)).unwrap(), earlier);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_by_schema() {
        let store = store();
        store
            .insert_account(&Account::new("alice", "alice@x.com", "h1"))
            .await
            .unwrap();

        let err = store
            .insert_account(&Account::new("alice2", "alice@x.com", "h2"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        // Case-sensitive as stored
        store
            .insert_account(&Account::new("alice3", "Alice@x.com", "h3"))
            .await
            .unwrap();
        assert_eq!(store.list_accounts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_account_round_trip_and_activation() {
        let store = store();
        let account = Account::new("bob", "bob@x.com", "$argon2id$digest");
        store.insert_account(&account).await.unwrap();

        let found = store.find_account_by_email("bob@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert_eq!(found.password_hash, "$argon2id$digest");
        assert_eq!(found.created_at, account.created_at);
        assert!(found.active);

        let updated = store
            .set_account_active(account.id, false, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.active);

        let missing = store
            .set_account_active(Uuid::new_v4(), false, Utc::now())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_one_wallet_per_account() {
        let store = store();
        let account = Account::new("carol", "carol@x.com", "h");
        store.insert_account(&account).await.unwrap();

        let wallet = Wallet::new(account.id, Decimal::new(1050, 2));
        store.insert_wallet(&wallet).await.unwrap();

        let err = store
            .insert_wallet(&Wallet::new(account.id, Decimal::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let found = store.find_wallet_by_account(account.id).await.unwrap().unwrap();
        assert_eq!(found.id, wallet.id);
        assert_eq!(found.balance, Decimal::new(1050, 2));
    }

    #[tokio::test]
    async fn test_ledger_requires_existing_wallet() {
        let store = store();
        let entry = LedgerEntry::new(Uuid::new_v4(), Decimal::ONE, TransactionType::Send, "rent");
        let err = store.append_entry(&entry).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn test_ledger_round_trip_in_order() {
        let store = store();
        let account = Account::new("dave", "dave@x.com", "h");
        store.insert_account(&account).await.unwrap();
        let wallet = Wallet::new(account.id, Decimal::ZERO);
        store.insert_wallet(&wallet).await.unwrap();

        let first = LedgerEntry::new(wallet.id, Decimal::new(5000, 2), TransactionType::Receive, "deposit");
        let second = LedgerEntry::from_parts(
            Uuid::new_v4(),
            wallet.id,
            Decimal::new(1234, 2),
            TransactionType::Send,
            "groceries",
            first.created_at() + chrono::Duration::milliseconds(1),
        );
        store.append_entry(&first).await.unwrap();
        store.append_entry(&second).await.unwrap();

        let entries = store.list_entries_by_wallet(wallet.id).await.unwrap();
        assert_eq!(entries, vec![first, second]);
        assert_eq!(store.count_entries_by_wallet(wallet.id).await.unwrap(), 2);
    }
}
