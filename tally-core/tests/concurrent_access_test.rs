//! Concurrent access tests
//!
//! Racing registrations on one email and racing wallet openings on one
//! account must each produce exactly one winner, with every loser seeing
//! `Conflict`. The store's unique constraints decide the race.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::sync::Barrier;
use uuid::Uuid;

use tally_core::adapters::{DuckDbStore, MemoryStore, SystemClock};
use tally_core::config::{Argon2Params, Config};
use tally_core::domain::Account;
use tally_core::ports::{AccountStore, StoreResult};
use tally_core::{Error, TallyContext};

/// Number of concurrent tasks per race
const TASK_COUNT: usize = 8;

fn test_config() -> Config {
    let mut config = Config::default();
    config.token_secret = Some(vec![3u8; 32]);
    config.argon2 = Argon2Params::minimal();
    config
}

fn memory_context() -> Arc<TallyContext> {
    let store = Arc::new(MemoryStore::new());
    Arc::new(
        TallyContext::wire(test_config(), store.clone(), store.clone(), store, Arc::new(SystemClock))
            .unwrap(),
    )
}

fn duckdb_context(temp_dir: &TempDir) -> Arc<TallyContext> {
    let store = Arc::new(DuckDbStore::new(&temp_dir.path().join("race.duckdb")).unwrap());
    store.ensure_schema().unwrap();
    Arc::new(
        TallyContext::wire(test_config(), store.clone(), store.clone(), store, Arc::new(SystemClock))
            .unwrap(),
    )
}

/// Wraps a real store but always misses on email lookup, as if every
/// caller read before any of the others wrote
struct StaleReadStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl AccountStore for StaleReadStore {
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        self.inner.insert_account(account).await
    }

    async fn find_account_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        self.inner.find_account_by_id(id).await
    }

    async fn find_account_by_email(&self, _email: &str) -> StoreResult<Option<Account>> {
        Ok(None)
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        self.inner.list_accounts().await
    }

    async fn set_account_active(
        &self,
        id: Uuid,
        active: bool,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Option<Account>> {
        self.inner.set_account_active(id, active, updated_at).await
    }
}

/// Run TASK_COUNT registrations of the same email at once
async fn race_registrations(ctx: Arc<TallyContext>) -> Vec<Result<Uuid, Error>> {
    let barrier = Arc::new(Barrier::new(TASK_COUNT));
    let mut handles = Vec::new();

    for task_id in 0..TASK_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            ctx.account_service
                .register(&format!("user{}", task_id), "race@x.com", "pw")
                .await
                .map(|s| s.account.id)
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

fn assert_single_winner<T: std::fmt::Debug>(results: &[Result<T, Error>]) {
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(Error::Conflict(_))))
        .count();

    println!("successes={} conflicts={}", successes, conflicts);
    assert_eq!(successes, 1, "expected exactly one winner: {:?}", results);
    assert_eq!(conflicts, results.len() - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_memory() {
    let ctx = memory_context();
    let results = race_registrations(Arc::clone(&ctx)).await;

    assert_single_winner(&results);
    assert_eq!(ctx.account_service.list().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_duckdb() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = duckdb_context(&temp_dir);
    let results = race_registrations(Arc::clone(&ctx)).await;

    assert_single_winner(&results);
    assert_eq!(ctx.account_service.list().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_constraint_decides_when_lookup_is_stale() {
    let inner = Arc::new(MemoryStore::new());
    let accounts = Arc::new(StaleReadStore {
        inner: Arc::clone(&inner),
    });
    let ctx = Arc::new(
        TallyContext::wire(test_config(), accounts, inner.clone(), inner, Arc::new(SystemClock))
            .unwrap(),
    );

    let results = race_registrations(Arc::clone(&ctx)).await;
    assert_single_winner(&results);

    // Sequential duplicate also relies on the constraint alone
    let err = ctx
        .account_service
        .register("late", "race@x.com", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

async fn race_wallet_openings(ctx: Arc<TallyContext>) {
    let account_id = ctx
        .account_service
        .register("owner", "owner@x.com", "pw")
        .await
        .unwrap()
        .account
        .id;

    let barrier = Arc::new(Barrier::new(TASK_COUNT));
    let mut handles = Vec::new();
    for _ in 0..TASK_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            ctx.wallet_service.open_wallet(account_id, None).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert_single_winner(&results);

    let winner = results.into_iter().find_map(Result::ok).unwrap();
    let owned = ctx
        .wallet_service
        .wallet_for_account(account_id)
        .await
        .unwrap();
    assert_eq!(owned.id, winner.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_open_wallet_memory() {
    race_wallet_openings(memory_context()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_open_wallet_duckdb() {
    let temp_dir = TempDir::new().unwrap();
    race_wallet_openings(duckdb_context(&temp_dir)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_posts_all_recorded() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = duckdb_context(&temp_dir);
    let account_id = ctx
        .account_service
        .register("owner", "owner@x.com", "pw")
        .await
        .unwrap()
        .account
        .id;
    let wallet = ctx
        .wallet_service
        .open_wallet(account_id, None)
        .await
        .unwrap();

    let barrier = Arc::new(Barrier::new(TASK_COUNT));
    let mut handles = Vec::new();
    for _ in 0..TASK_COUNT {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            ctx.wallet_service
                .post_transaction(wallet.id, rust_decimal::Decimal::ONE, "send", "coffee")
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let ledger = ctx.wallet_service.ledger(wallet.id).await.unwrap();
    assert_eq!(ledger.len(), TASK_COUNT);
    assert_eq!(
        ctx.wallet_service.transaction_count(wallet.id).await.unwrap(),
        TASK_COUNT as u64
    );
}
