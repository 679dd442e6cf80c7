//! The entry ledger: which submissions count toward a round's engagement
//! guarantee and which are eligible for prizes.
//!
//! The eligibility rule — `report_status = 'active' AND is_boosted = TRUE` —
//! is defined once as [`ELIGIBLE_PREDICATE`] and shared by the guarantee
//! count and the selection listing, so the two can never drift apart.
//! Note that the guarantee deliberately counts *boosted* entries, not raw
//! participation; the engagement bar is tied to the boost mechanism.
//!
//! ## Boost lifecycle
//!
//! `is_boosted` is monotonic: it moves false→true exactly once, only by the
//! round's author, and only while fewer than [`MAX_BOOSTS_PER_ROUND`] entries
//! of that round are boosted. `boost_entry` takes a `FOR UPDATE` lock on the
//! round row so two concurrent boosts serialize and cannot overshoot the cap.

use super::{Database, EligibleEntryRow, EntryRow};
use crate::error::MarketError;

/// A round author may mark at most this many entries prize-eligible.
pub const MAX_BOOSTS_PER_ROUND: i64 = 5;

/// The single source of truth for prize/guarantee eligibility.
const ELIGIBLE_PREDICATE: &str = "report_status = 'active' AND is_boosted = TRUE";

/// Result of a boost attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostOutcome {
    /// The entry was newly marked prize-eligible.
    Boosted,
    /// The entry was already boosted; nothing changed.
    AlreadyBoosted,
}

impl Database {
    /// Count entries that satisfy the engagement guarantee for a round.
    pub async fn count_eligible_entries(&self, round_id: i64) -> Result<i64, MarketError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM entries WHERE round_id = $1 AND {ELIGIBLE_PREDICATE}"
        ))
        .bind(round_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// List prize-eligible entries in deterministic selection order: likes
    /// descending, ties broken by creation time ascending (first submitted
    /// wins), then by id as a final total-order tiebreak.
    pub async fn list_eligible_entries(
        &self,
        round_id: i64,
    ) -> Result<Vec<EligibleEntryRow>, MarketError> {
        let rows = sqlx::query_as::<_, EligibleEntryRow>(&format!(
            "SELECT id, author_user_id, likes, created_at
             FROM entries
             WHERE round_id = $1 AND {ELIGIBLE_PREDICATE}
             ORDER BY likes DESC, created_at ASC, id ASC"
        ))
        .bind(round_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Boost an entry into prize-eligible status.
    ///
    /// Fails with `Forbidden` unless `acting_user_id` authored the round,
    /// and with `LimitExceeded` once the round already has
    /// [`MAX_BOOSTS_PER_ROUND`] boosted entries. Boosting an already-boosted
    /// entry is a no-op success.
    ///
    /// The round row is locked `FOR UPDATE` for the duration of the
    /// count-then-write, which serializes concurrent boosts on the same
    /// round and makes the cap check race-free.
    pub async fn boost_entry(
        &self,
        round_id: i64,
        entry_id: i64,
        acting_user_id: i64,
    ) -> Result<BoostOutcome, MarketError> {
        let mut tx = self.pool.begin().await?;

        let author: Option<i64> =
            sqlx::query_scalar("SELECT author_user_id FROM rounds WHERE id = $1 FOR UPDATE")
                .bind(round_id)
                .fetch_optional(&mut *tx)
                .await?;
        let author = author.ok_or(MarketError::NotFound("round"))?;
        if author != acting_user_id {
            return Err(MarketError::Forbidden);
        }

        let entry: Option<(i64, bool)> =
            sqlx::query_as("SELECT round_id, is_boosted FROM entries WHERE id = $1")
                .bind(entry_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (entry_round, already_boosted) = entry.ok_or(MarketError::NotFound("entry"))?;
        if entry_round != round_id {
            return Err(MarketError::NotFound("entry"));
        }
        if already_boosted {
            return Ok(BoostOutcome::AlreadyBoosted);
        }

        let boosted: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE round_id = $1 AND is_boosted")
                .bind(round_id)
                .fetch_one(&mut *tx)
                .await?;
        if boosted >= MAX_BOOSTS_PER_ROUND {
            return Err(MarketError::LimitExceeded {
                max: MAX_BOOSTS_PER_ROUND,
            });
        }

        sqlx::query("UPDATE entries SET is_boosted = TRUE WHERE id = $1")
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(BoostOutcome::Boosted)
    }

    /// Get a single entry by ID.
    pub async fn get_entry(&self, entry_id: i64) -> Result<Option<EntryRow>, MarketError> {
        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT id, round_id, author_user_id, content, is_boosted, report_status, likes,
                    created_at
             FROM entries WHERE id = $1",
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Create an entry. Commenting flows live elsewhere; this is used by
    /// operational tooling and test fixtures.
    pub async fn create_entry(
        &self,
        round_id: i64,
        author_user_id: i64,
        content: &str,
        likes: i32,
    ) -> Result<i64, MarketError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO entries (round_id, author_user_id, content, likes)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(round_id)
        .bind(author_user_id)
        .bind(content)
        .bind(likes)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Set an entry's moderation status (admin flow). A reported or removed
    /// entry drops out of eligibility even if it stays boosted.
    pub async fn set_entry_report_status(
        &self,
        entry_id: i64,
        report_status: &str,
    ) -> Result<(), MarketError> {
        let res = sqlx::query("UPDATE entries SET report_status = $2 WHERE id = $1")
            .bind(entry_id)
            .bind(report_status)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(MarketError::NotFound("entry"));
        }
        Ok(())
    }
}
