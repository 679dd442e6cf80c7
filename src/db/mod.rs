//! # Database — PostgreSQL Storage Layer
//!
//! Async storage operations for the marketplace settlement core via
//! `sqlx::PgPool` connecting to Supabase PostgreSQL.
//!
//! ## Schema
//!
//! - `rounds`: prize pool, deadline, engagement guarantee, completion flag
//! - `entries`: feedback submissions, boost flag, moderation status, likes
//! - `winners`: materialized prize allocations with payout state
//!
//! ## Module Structure
//!
//! Operations are split into submodules by domain:
//!
//! - [`rounds`] — round lookup, deadline sweep selection, guarded extension
//! - [`entries`] — the entry ledger: eligibility counting/listing, boosting
//! - [`winners`] — transactional winner creation, payout state transitions
//!
//! ## Concurrency
//!
//! Mutations that guard an invariant (extension cap, boost cap, single
//! winner selection) are expressed as conditional UPDATEs or row-locking
//! transactions so two concurrent invocations cannot both pass a
//! check-then-write window. See the submodule docs for the specific guards.

mod entries;
mod rounds;
mod winners;

pub use entries::BoostOutcome;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

// ── Round types ─────────────────────────────────────────────────

/// A feedback round ("post"): a request for validation backed by a prize pool.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RoundRow {
    pub id: i64,
    pub author_user_id: i64,
    pub title: String,
    pub prize_pool: Decimal,
    pub end_date: DateTime<Utc>,
    pub original_end_date: DateTime<Utc>,
    pub min_entries_threshold: i32,
    pub extension_count: i32,
    pub extension_reason: Option<String>,
    pub contest_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

// ── Entry types ─────────────────────────────────────────────────

/// A feedback submission ("comment") against a round.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EntryRow {
    pub id: i64,
    pub round_id: i64,
    pub author_user_id: i64,
    pub content: String,
    pub is_boosted: bool,
    pub report_status: String,
    pub likes: i32,
    pub created_at: DateTime<Utc>,
}

/// Projection of an eligible entry used by winner selection: just enough to
/// rank it and denormalize the payee.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EligibleEntryRow {
    pub id: i64,
    pub author_user_id: i64,
    pub likes: i32,
    pub created_at: DateTime<Utc>,
}

// ── Winner types ────────────────────────────────────────────────

/// A materialized prize allocation for one entry of a completed round.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WinnerRow {
    pub id: i64,
    pub round_id: i64,
    pub entry_id: i64,
    pub user_id: i64,
    pub position: i32,
    pub prize_amount: Decimal,
    pub payout_status: String,
    pub transfer_ref: Option<String>,
    pub payout_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Specification for one winner row created during winner selection.
#[derive(Debug, Clone)]
pub struct NewWinner {
    pub entry_id: i64,
    pub user_id: i64,
    pub position: i32,
    pub prize_amount: Decimal,
}

// ── Database struct and connection ──────────────────────────────

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL using the provided database URL.
    ///
    /// Manually parses the URL to preserve the full username — sqlx's built-in
    /// parser strips the ".project-ref" suffix that Supabase pooler requires.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let url = url::Url::parse(database_url)?;
        let username = urlencoding::decode(url.username())?.into_owned();
        let password = url
            .password()
            .map(|p| urlencoding::decode(p).map(|s| s.into_owned()))
            .transpose()?;
        let mut opts = PgConnectOptions::new()
            .host(url.host_str().unwrap_or("localhost"))
            .port(url.port().unwrap_or(5432))
            .database(url.path().trim_start_matches('/'))
            .username(&username)
            .statement_cache_capacity(0);
        if let Some(ref pw) = password {
            opts = opts.password(pw);
        }
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;
        Ok(Database { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check: execute `SELECT 1` to verify database connectivity.
    ///
    /// Used by the `/readyz` readiness probe. Returns `Ok(())` if the
    /// database responds, or an error if the connection is broken.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
