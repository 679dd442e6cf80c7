//! Shared test helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use validated::payout::{TransferError, TransferProvider};

/// Returns the test database URL from the `TEST_DATABASE_URL` environment variable.
/// Panics if the variable is not set.
pub fn test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set for integration tests")
}

/// Returns true if the test database URL is configured.
pub fn has_test_db() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

/// One-time schema initialization.
static SCHEMA_INIT: Once = Once::new();

/// Ensure the test database schema is set up (runs migrations once per test suite).
pub fn ensure_schema() {
    SCHEMA_INIT.call_once(|| {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let pool = sqlx::PgPool::connect(&test_db_url()).await.unwrap();
            run_migrations(&pool).await;
        });
    });
}

/// Connect to the test database (also ensures schema is set up).
pub async fn setup_test_db() -> validated::db::Database {
    ensure_schema();
    let db = validated::db::Database::connect(&test_db_url())
        .await
        .expect("Failed to connect to test database");
    truncate_all_tables(db.pool()).await;
    db
}

/// Build an Axum test app with an always-succeeding transfer provider.
pub async fn build_test_app() -> axum::Router {
    build_test_app_with(Arc::new(FakeTransferProvider::succeeding())).await
}

/// Build an Axum test app with a caller-supplied transfer provider.
pub async fn build_test_app_with(provider: Arc<dyn TransferProvider>) -> axum::Router {
    let db = setup_test_db().await;
    let state = validated::api::AppState::new(db, provider, Duration::from_secs(2));
    validated::api::build_router(state)
}

/// Build a router over an existing database handle without truncating —
/// used by tests that seed fixtures through `db` first.
pub fn router_for(
    db: &validated::db::Database,
    provider: Arc<dyn TransferProvider>,
) -> axum::Router {
    let state = validated::api::AppState::new(db.clone(), provider, Duration::from_secs(2));
    validated::api::build_router(state)
}

/// Truncate all tables to ensure test isolation.
pub async fn truncate_all_tables(pool: &sqlx::PgPool) {
    sqlx::raw_sql("TRUNCATE TABLE winners, entries, rounds RESTART IDENTITY CASCADE")
        .execute(pool)
        .await
        .unwrap();
}

/// Run all migrations against the test database.
async fn run_migrations(pool: &sqlx::PgPool) {
    let migration_files = ["migrations/001_marketplace.sql"];

    for file in &migration_files {
        let path = std::path::Path::new(file);
        if !path.exists() {
            panic!("Migration file not found: {}", file);
        }
        let sql = std::fs::read_to_string(path).unwrap();
        sqlx::raw_sql(&sql).execute(pool).await.unwrap_or_else(|e| {
            panic!("Migration {} failed: {}", file, e);
        });
    }
}

// ── Fixtures ────────────────────────────────────────────────────

/// Create a round ending `end_in_hours` from now (negative = already expired).
pub async fn seed_round(
    db: &validated::db::Database,
    author_user_id: i64,
    prize_pool: &str,
    end_in_hours: i64,
    min_entries_threshold: i32,
) -> i64 {
    db.create_round(
        author_user_id,
        "Validate my landing page",
        prize_pool.parse::<Decimal>().unwrap(),
        Utc::now() + ChronoDuration::hours(end_in_hours),
        min_entries_threshold,
    )
    .await
    .unwrap()
}

/// Create an entry and boost it as the round author.
pub async fn seed_boosted_entry(
    db: &validated::db::Database,
    round_id: i64,
    round_author_id: i64,
    entry_author_id: i64,
    likes: i32,
) -> i64 {
    let entry_id = db
        .create_entry(round_id, entry_author_id, "Great idea, ship it", likes)
        .await
        .unwrap();
    db.boost_entry(round_id, entry_id, round_author_id)
        .await
        .unwrap();
    entry_id
}

// ── Fake transfer provider ──────────────────────────────────────

/// In-memory transfer provider: records every call, fails configured
/// destinations, and can delay to exercise the settler's timeout bound.
pub struct FakeTransferProvider {
    pub calls: Mutex<Vec<(Decimal, String)>>,
    fail_destinations: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    counter: AtomicU64,
}

impl FakeTransferProvider {
    /// A provider where every transfer succeeds.
    pub fn succeeding() -> Self {
        FakeTransferProvider {
            calls: Mutex::new(Vec::new()),
            fail_destinations: Mutex::new(HashSet::new()),
            delay: None,
            counter: AtomicU64::new(0),
        }
    }

    /// A provider that declines transfers to the given destinations.
    pub fn failing_for(destinations: &[&str]) -> Self {
        let provider = Self::succeeding();
        *provider.fail_destinations.lock().unwrap() =
            destinations.iter().map(|d| d.to_string()).collect();
        provider
    }

    /// A provider that sleeps before answering, to trip the settler timeout.
    pub fn delayed(delay: Duration) -> Self {
        let mut provider = Self::succeeding();
        provider.delay = Some(delay);
        provider
    }

    /// Stop failing a destination (simulates the provider recovering).
    pub fn recover(&self, destination: &str) {
        self.fail_destinations.lock().unwrap().remove(destination);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TransferProvider for FakeTransferProvider {
    async fn transfer(&self, amount: Decimal, destination: &str) -> Result<String, TransferError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls
            .lock()
            .unwrap()
            .push((amount, destination.to_string()));
        if self.fail_destinations.lock().unwrap().contains(destination) {
            return Err(TransferError::Provider("simulated decline".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("tr_{n}"))
    }
}
