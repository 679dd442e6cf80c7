//! Winner creation and payout state transitions.
//!
//! Winner rows are created exactly once per round, inside a single
//! transaction with the `contest_completed` flip. The flip is a conditional
//! UPDATE: if another selection already completed the round, zero rows match
//! and the whole transaction rolls back with `AlreadyCompleted`. The
//! `(round_id, position)` and `(round_id, entry_id)` uniqueness constraints
//! back this up at the storage level.
//!
//! Payout state transitions are likewise conditional UPDATEs keyed on the
//! current `payout_status`, so a settler run that races another never
//! double-claims a winner.

use super::{Database, NewWinner, WinnerRow};
use crate::error::MarketError;

const WINNER_COLUMNS: &str = "id, round_id, entry_id, user_id, position, prize_amount,
     payout_status, transfer_ref, payout_error, created_at, updated_at";

impl Database {
    /// Mark a round completed and create its winner rows as one unit of work.
    ///
    /// Either every winner row exists and `contest_completed` is true, or
    /// nothing changed and the operation can be retried. An empty `winners`
    /// slice is valid: the round is completed with no prize allocations.
    pub async fn complete_round_with_winners(
        &self,
        round_id: i64,
        winners: &[NewWinner],
    ) -> Result<Vec<WinnerRow>, MarketError> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            "UPDATE rounds SET contest_completed = TRUE, completed_at = NOW()
             WHERE id = $1 AND contest_completed = FALSE",
        )
        .bind(round_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if flipped == 0 {
            // Raced by another selection; dropping the tx rolls back.
            return Err(MarketError::AlreadyCompleted);
        }

        let mut created = Vec::with_capacity(winners.len());
        for w in winners {
            let row = sqlx::query_as::<_, WinnerRow>(&format!(
                "INSERT INTO winners (round_id, entry_id, user_id, position, prize_amount)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {WINNER_COLUMNS}"
            ))
            .bind(round_id)
            .bind(w.entry_id)
            .bind(w.user_id)
            .bind(w.position)
            .bind(w.prize_amount)
            .fetch_one(&mut *tx)
            .await?;
            created.push(row);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// All winners of a round, ranked.
    pub async fn winners_for_round(&self, round_id: i64) -> Result<Vec<WinnerRow>, MarketError> {
        let rows = sqlx::query_as::<_, WinnerRow>(&format!(
            "SELECT {WINNER_COLUMNS} FROM winners WHERE round_id = $1 ORDER BY position ASC"
        ))
        .bind(round_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Winners of a round still awaiting payout.
    pub async fn pending_winners(&self, round_id: i64) -> Result<Vec<WinnerRow>, MarketError> {
        let rows = sqlx::query_as::<_, WinnerRow>(&format!(
            "SELECT {WINNER_COLUMNS} FROM winners
             WHERE round_id = $1 AND payout_status = 'pending'
             ORDER BY position ASC"
        ))
        .bind(round_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Claim a pending winner for payout: pending → processing.
    ///
    /// Returns false if the winner was not in `pending` (already claimed by
    /// a concurrent settler run, or already settled) — the caller skips it.
    pub async fn mark_winner_processing(&self, winner_id: i64) -> Result<bool, MarketError> {
        let res = sqlx::query(
            "UPDATE winners SET payout_status = 'processing', updated_at = NOW()
             WHERE id = $1 AND payout_status = 'pending'",
        )
        .bind(winner_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Record a successful transfer: processing → completed.
    pub async fn mark_winner_completed(
        &self,
        winner_id: i64,
        transfer_ref: &str,
    ) -> Result<(), MarketError> {
        sqlx::query(
            "UPDATE winners
             SET payout_status = 'completed', transfer_ref = $2, payout_error = NULL,
                 updated_at = NOW()
             WHERE id = $1 AND payout_status = 'processing'",
        )
        .bind(winner_id)
        .bind(transfer_ref)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed transfer: processing → failed. No transfer reference
    /// is stored; the error message is kept for the operator.
    pub async fn mark_winner_failed(
        &self,
        winner_id: i64,
        error: &str,
    ) -> Result<(), MarketError> {
        sqlx::query(
            "UPDATE winners
             SET payout_status = 'failed', payout_error = $2, updated_at = NOW()
             WHERE id = $1 AND payout_status = 'processing'",
        )
        .bind(winner_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a transfer that succeeded but whose completion write was lost:
    /// processing → failed, keeping the provider's transfer reference so an
    /// operator can reconcile. The row is terminal, never left in
    /// `processing`.
    pub async fn mark_winner_failed_after_transfer(
        &self,
        winner_id: i64,
        transfer_ref: &str,
        error: &str,
    ) -> Result<(), MarketError> {
        sqlx::query(
            "UPDATE winners
             SET payout_status = 'failed', transfer_ref = $2, payout_error = $3,
                 updated_at = NOW()
             WHERE id = $1 AND payout_status = 'processing'",
        )
        .bind(winner_id)
        .bind(transfer_ref)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Explicit retry of a failed payout: failed → pending. Returns false if
    /// the winner was not in `failed` (a completed winner can never be reset,
    /// which is what prevents double payment on retry).
    pub async fn retry_failed_winner(&self, winner_id: i64) -> Result<bool, MarketError> {
        let res = sqlx::query(
            "UPDATE winners
             SET payout_status = 'pending', payout_error = NULL, updated_at = NOW()
             WHERE id = $1 AND payout_status = 'failed'",
        )
        .bind(winner_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Get a single winner by ID.
    pub async fn get_winner(&self, winner_id: i64) -> Result<Option<WinnerRow>, MarketError> {
        let row = sqlx::query_as::<_, WinnerRow>(&format!(
            "SELECT {WINNER_COLUMNS} FROM winners WHERE id = $1"
        ))
        .bind(winner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
