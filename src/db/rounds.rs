//! Round lookup and deadline management.
//!
//! The Guarantee Monitor never reads-then-writes a deadline in application
//! code: `extend_deadline` re-checks every precondition inside the UPDATE's
//! WHERE clause, so a concurrent sweep (or a sweep racing winner selection)
//! either extends exactly once or touches nothing.

use super::{Database, RoundRow};
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

const ROUND_COLUMNS: &str = "id, author_user_id, title, prize_pool, end_date, original_end_date,
     min_entries_threshold, extension_count, extension_reason,
     contest_completed, completed_at, status, created_at";

impl Database {
    /// Get a single round by ID.
    pub async fn get_round(&self, round_id: i64) -> Result<Option<RoundRow>, MarketError> {
        let row = sqlx::query_as::<_, RoundRow>(&format!(
            "SELECT {ROUND_COLUMNS} FROM rounds WHERE id = $1"
        ))
        .bind(round_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Create a round. Founder-facing creation flows live elsewhere; this is
    /// used by operational tooling and test fixtures. `original_end_date` is
    /// set once here and never updated afterwards.
    pub async fn create_round(
        &self,
        author_user_id: i64,
        title: &str,
        prize_pool: Decimal,
        end_date: DateTime<Utc>,
        min_entries_threshold: i32,
    ) -> Result<i64, MarketError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO rounds (author_user_id, title, prize_pool, end_date, original_end_date,
                                 min_entries_threshold)
             VALUES ($1, $2, $3, $4, $4, $5)
             RETURNING id",
        )
        .bind(author_user_id)
        .bind(title)
        .bind(prize_pool)
        .bind(end_date)
        .bind(min_entries_threshold)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Rounds the Guarantee Monitor should examine: not completed, deadline
    /// within the next `window_hours`, and still below the extension cap.
    ///
    /// Rounds whose deadline has already passed are excluded; those belong
    /// to winner selection, not the monitor.
    pub async fn rounds_near_deadline(
        &self,
        window_hours: i64,
        max_extensions: i32,
    ) -> Result<Vec<RoundRow>, MarketError> {
        let rows = sqlx::query_as::<_, RoundRow>(&format!(
            "SELECT {ROUND_COLUMNS} FROM rounds
             WHERE contest_completed = FALSE
               AND end_date > NOW()
               AND end_date <= NOW() + ($1 || ' hours')::interval
               AND extension_count < $2
             ORDER BY end_date ASC"
        ))
        .bind(window_hours.to_string())
        .bind(max_extensions)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Atomically extend a round's deadline by `days`, incrementing the
    /// extension counter.
    ///
    /// All preconditions (not completed, deadline still in the future and
    /// imminent, extension cap not reached) are re-verified in the WHERE
    /// clause. Returns the new deadline, or `None` if the round no longer
    /// qualified — e.g. a concurrent sweep already extended it.
    pub async fn extend_deadline(
        &self,
        round_id: i64,
        days: i64,
        window_hours: i64,
        max_extensions: i32,
        reason: &str,
    ) -> Result<Option<DateTime<Utc>>, MarketError> {
        let new_end: Option<DateTime<Utc>> = sqlx::query_scalar(
            "UPDATE rounds
             SET end_date = end_date + ($2 || ' days')::interval,
                 extension_count = extension_count + 1,
                 extension_reason = $3
             WHERE id = $1
               AND contest_completed = FALSE
               AND end_date > NOW()
               AND end_date <= NOW() + ($4 || ' hours')::interval
               AND extension_count < $5
             RETURNING end_date",
        )
        .bind(round_id)
        .bind(days.to_string())
        .bind(reason)
        .bind(window_hours.to_string())
        .bind(max_extensions)
        .fetch_optional(&self.pool)
        .await?;
        Ok(new_end)
    }
}
