//! # Winner Selector — Deterministic Prize Settlement
//!
//! Once a round's deadline has passed, this module consumes the entry
//! ledger's boosted entries, ranks them, computes the prize split, and
//! materializes winner rows exactly once.
//!
//! ## Split table
//!
//! The split is a fixed lookup by winner count, preserved exactly from the
//! product behavior (no generalizing formula exists):
//!
//! | N | ratios |
//! |---|--------|
//! | 1 | 1.00 |
//! | 2 | 0.60, 0.40 |
//! | 3 | 0.50, 0.30, 0.20 |
//! | 4 | 0.40, 0.25, 0.20, 0.15 |
//! | 5 | 0.35, 0.25, 0.20, 0.15, 0.05 |
//!
//! Each row sums to 1.00, and amounts are exact `Decimal` products of the
//! pool, so the sum of a round's prizes always equals the pool. Eligible
//! entries beyond the top five receive nothing.
//!
//! ## Idempotency
//!
//! Selection is a checked-then-set flip of `contest_completed` inside the
//! same transaction that inserts the winner rows (see
//! [`Database::complete_round_with_winners`]). A second call — or the loser
//! of a concurrent race — fails with `AlreadyCompleted` and alters nothing.

use crate::db::{Database, NewWinner, WinnerRow};
use crate::error::MarketError;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

/// At most this many ranked winners are paid per round.
pub const MAX_WINNERS: usize = 5;

/// Prize split ratios for `n` winners, in rank order. `n` is clamped to
/// [`MAX_WINNERS`]; `n = 0` yields an empty split.
pub fn split_ratios(n: usize) -> Vec<Decimal> {
    let hundredths: &[i64] = match n.min(MAX_WINNERS) {
        0 => &[],
        1 => &[100],
        2 => &[60, 40],
        3 => &[50, 30, 20],
        4 => &[40, 25, 20, 15],
        _ => &[35, 25, 20, 15, 5],
    };
    hundredths.iter().map(|&c| Decimal::new(c, 2)).collect()
}

/// Compute per-rank prize amounts for a pool split across `n` winners.
///
/// Pure decimal multiplication — no binary floating point, no rounding —
/// so `amounts.sum() == pool` whenever `n >= 1`.
pub fn compute_prize_split(pool: Decimal, n: usize) -> Vec<Decimal> {
    split_ratios(n).iter().map(|r| pool * r).collect()
}

/// Select and persist winners for an expired round.
///
/// Preconditions: the deadline has passed (`ContestStillActive` otherwise)
/// and the round has not been settled (`AlreadyCompleted` otherwise — safe
/// to receive on repeat calls). A round with no eligible entries is
/// completed with an empty winner list; that is success, not an error.
pub async fn select_winners(
    db: &Database,
    round_id: i64,
) -> Result<Vec<WinnerRow>, MarketError> {
    let round = db
        .get_round(round_id)
        .await?
        .ok_or(MarketError::NotFound("round"))?;
    if round.contest_completed {
        return Err(MarketError::AlreadyCompleted);
    }
    if Utc::now() < round.end_date {
        return Err(MarketError::ContestStillActive);
    }

    let eligible = db.list_eligible_entries(round_id).await?;
    let take = eligible.len().min(MAX_WINNERS);
    let amounts = compute_prize_split(round.prize_pool, take);

    let specs: Vec<NewWinner> = eligible
        .iter()
        .take(take)
        .zip(amounts)
        .enumerate()
        .map(|(i, (entry, prize_amount))| NewWinner {
            entry_id: entry.id,
            user_id: entry.author_user_id,
            position: (i + 1) as i32,
            prize_amount,
        })
        .collect();

    let winners = db.complete_round_with_winners(round_id, &specs).await?;
    info!(
        round_id,
        winners = winners.len(),
        eligible = eligible.len(),
        prize_pool = %round.prize_pool,
        "round settled"
    );
    Ok(winners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn ratios_sum_to_one_for_each_table_row() {
        for n in 1..=MAX_WINNERS {
            let sum: Decimal = split_ratios(n).iter().sum();
            assert_eq!(sum, Decimal::ONE, "ratio row for n={n} must sum to 1");
        }
    }

    #[test]
    fn ratios_are_monotonically_non_increasing() {
        for n in 1..=MAX_WINNERS {
            let ratios = split_ratios(n);
            for pair in ratios.windows(2) {
                assert!(pair[0] >= pair[1], "rank {n}: higher rank must not earn less");
            }
        }
    }

    #[test]
    fn more_than_five_winners_clamps_to_five() {
        assert_eq!(split_ratios(9), split_ratios(5));
        assert_eq!(compute_prize_split(dec("100"), 12).len(), 5);
    }

    #[test]
    fn zero_winners_yields_empty_split() {
        assert!(split_ratios(0).is_empty());
        assert!(compute_prize_split(dec("100"), 0).is_empty());
    }

    #[test]
    fn hundred_across_three_splits_fifty_thirty_twenty() {
        let amounts = compute_prize_split(dec("100"), 3);
        assert_eq!(amounts, vec![dec("50"), dec("30"), dec("20")]);
    }

    #[test]
    fn single_winner_takes_the_whole_pool() {
        assert_eq!(compute_prize_split(dec("250.00"), 1), vec![dec("250.00")]);
    }

    #[test]
    fn odd_pools_stay_exact() {
        // 101 * 0.35 = 35.35 exactly in decimal; a float split would drift.
        let amounts = compute_prize_split(dec("101"), 5);
        assert_eq!(amounts[0], dec("35.35"));
        let sum: Decimal = amounts.iter().sum();
        assert_eq!(sum, dec("101"));
    }

    proptest! {
        /// For any pool in minor units and any winner count, the split never
        /// exceeds the pool, and equals it whenever at least one winner exists.
        #[test]
        fn split_conserves_the_pool(cents in 0i64..=10_000_000, n in 0usize..=8) {
            let pool = Decimal::new(cents, 2);
            let amounts = compute_prize_split(pool, n);
            let sum: Decimal = amounts.iter().sum();
            prop_assert!(sum <= pool);
            if n >= 1 {
                prop_assert_eq!(sum, pool);
            }
        }

        /// Amounts are handed out in non-increasing rank order.
        #[test]
        fn split_respects_rank_order(cents in 1i64..=10_000_000, n in 1usize..=8) {
            let amounts = compute_prize_split(Decimal::new(cents, 2), n);
            for pair in amounts.windows(2) {
                prop_assert!(pair[0] >= pair[1]);
            }
        }
    }
}
