//! Component-level integration tests for the settlement core, driving the
//! guarantee monitor, winner selector, and payout settler directly (no HTTP
//! layer). Requires `TEST_DATABASE_URL`; see `api_integration.rs` for setup.

mod common;

use common::FakeTransferProvider;
use rust_decimal::Decimal;
use std::time::Duration;
use validated::error::MarketError;
use validated::{guarantee, payout, selection};

macro_rules! require_db {
    () => {
        if !common::has_test_db() {
            eprintln!("Skipping: TEST_DATABASE_URL not set");
            return;
        }
    };
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

// == Winner selection ==========================================================

#[tokio::test]
async fn prize_sum_equals_pool_for_every_winner_count() {
    require_db!();
    let db = common::setup_test_db().await;
    for n in 1..=5i64 {
        let round = common::seed_round(&db, 1, "250.00", -1, 1).await;
        for user in 0..n {
            common::seed_boosted_entry(&db, round, 1, 100 + user, (n - user) as i32).await;
        }
        let winners = selection::select_winners(&db, round).await.unwrap();
        assert_eq!(winners.len(), n as usize);
        let sum: Decimal = winners.iter().map(|w| w.prize_amount).sum();
        assert_eq!(sum, dec("250.00"), "prizes for {n} winners must exhaust the pool");
        for (i, w) in winners.iter().enumerate() {
            assert_eq!(w.position, (i + 1) as i32);
        }
    }
}

#[tokio::test]
async fn second_selection_fails_without_touching_winner_rows() {
    require_db!();
    let db = common::setup_test_db().await;
    let round = common::seed_round(&db, 1, "100.00", -1, 1).await;
    common::seed_boosted_entry(&db, round, 1, 100, 2).await;
    common::seed_boosted_entry(&db, round, 1, 200, 1).await;

    let first = selection::select_winners(&db, round).await.unwrap();
    let err = selection::select_winners(&db, round).await.unwrap_err();
    assert!(matches!(err, MarketError::AlreadyCompleted));
    assert!(err.is_benign());

    let after = db.winners_for_round(round).await.unwrap();
    assert_eq!(after.len(), first.len());
    for (a, b) in first.iter().zip(&after) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.prize_amount, b.prize_amount);
    }
}

#[tokio::test]
async fn concurrent_selections_produce_exactly_one_winner_set() {
    require_db!();
    let db = common::setup_test_db().await;
    let round = common::seed_round(&db, 1, "100.00", -1, 1).await;
    common::seed_boosted_entry(&db, round, 1, 100, 1).await;

    let (a, b) = tokio::join!(
        selection::select_winners(&db, round),
        selection::select_winners(&db, round),
    );
    let oks = [a.is_ok(), b.is_ok()].iter().filter(|x| **x).count();
    assert_eq!(oks, 1, "exactly one concurrent selection may win");
    for res in [a, b] {
        if let Err(e) = res {
            assert!(matches!(e, MarketError::AlreadyCompleted));
        }
    }
    assert_eq!(db.winners_for_round(round).await.unwrap().len(), 1);
}

// == Guarantee monitor =========================================================

#[tokio::test]
async fn deadline_extends_twice_then_freezes_at_the_cap() {
    require_db!();
    let db = common::setup_test_db().await;
    let round = common::seed_round(&db, 1, "100.00", 5, 10).await;

    let report = guarantee::run_sweep(&db).await.unwrap();
    assert_eq!(report.summary.extended, 1);
    let after_first = db.get_round(round).await.unwrap().unwrap();
    assert_eq!(after_first.extension_count, 1);

    // Pull the extended deadline back into the 24h window to force a
    // second decision.
    sqlx::query("UPDATE rounds SET end_date = NOW() + interval '5 hours' WHERE id = $1")
        .bind(round)
        .execute(db.pool())
        .await
        .unwrap();
    let report = guarantee::run_sweep(&db).await.unwrap();
    assert_eq!(report.summary.extended, 1);
    assert_eq!(db.get_round(round).await.unwrap().unwrap().extension_count, 2);

    // At the cap the round is no longer examined, however short it falls.
    sqlx::query("UPDATE rounds SET end_date = NOW() + interval '5 hours' WHERE id = $1")
        .bind(round)
        .execute(db.pool())
        .await
        .unwrap();
    let report = guarantee::run_sweep(&db).await.unwrap();
    assert_eq!(report.summary.total_checked, 0);
    assert_eq!(db.get_round(round).await.unwrap().unwrap().extension_count, 2);
}

#[tokio::test]
async fn rounds_far_from_deadline_are_not_examined() {
    require_db!();
    let db = common::setup_test_db().await;
    // Ends in 3 days: outside the 24h window, whatever the shortfall.
    common::seed_round(&db, 1, "100.00", 72, 10).await;
    let report = guarantee::run_sweep(&db).await.unwrap();
    assert_eq!(report.summary.total_checked, 0);
}

#[tokio::test]
async fn completed_rounds_are_not_examined() {
    require_db!();
    let db = common::setup_test_db().await;
    let round = common::seed_round(&db, 1, "100.00", -1, 10).await;
    selection::select_winners(&db, round).await.unwrap();
    sqlx::query("UPDATE rounds SET end_date = NOW() + interval '5 hours' WHERE id = $1")
        .bind(round)
        .execute(db.pool())
        .await
        .unwrap();
    let report = guarantee::run_sweep(&db).await.unwrap();
    assert_eq!(report.summary.total_checked, 0);
}

// == Payout settler ============================================================

#[tokio::test]
async fn settler_forwards_exact_prize_amounts_to_the_provider() {
    require_db!();
    let db = common::setup_test_db().await;
    let round = common::seed_round(&db, 1, "100.00", -1, 1).await;
    common::seed_boosted_entry(&db, round, 1, 100, 3).await;
    common::seed_boosted_entry(&db, round, 1, 200, 2).await;
    common::seed_boosted_entry(&db, round, 1, 300, 1).await;
    selection::select_winners(&db, round).await.unwrap();

    let provider = FakeTransferProvider::succeeding();
    let report = payout::settle_round(&db, &provider, Duration::from_secs(2), round)
        .await
        .unwrap();
    assert_eq!(report.succeeded.len(), 3);
    assert!(report.failed.is_empty());

    let calls = provider.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            (dec("50"), "user:100".to_string()),
            (dec("30"), "user:200".to_string()),
            (dec("20"), "user:300".to_string()),
        ]
    );
}

#[tokio::test]
async fn slow_provider_times_out_into_failed_not_processing() {
    require_db!();
    let db = common::setup_test_db().await;
    let round = common::seed_round(&db, 1, "100.00", -1, 1).await;
    common::seed_boosted_entry(&db, round, 1, 100, 1).await;
    selection::select_winners(&db, round).await.unwrap();

    let provider = FakeTransferProvider::delayed(Duration::from_secs(10));
    let report = payout::settle_round(&db, &provider, Duration::from_millis(100), round)
        .await
        .unwrap();
    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.as_ref().unwrap().contains("timed out"));

    let winners = db.winners_for_round(round).await.unwrap();
    assert_eq!(winners[0].payout_status, "failed");
    assert!(winners[0].transfer_ref.is_none());
}

#[tokio::test]
async fn lost_completion_write_parks_the_winner_in_failed_with_the_ref() {
    require_db!();
    let db = common::setup_test_db().await;
    let round = common::seed_round(&db, 1, "100.00", -1, 1).await;
    common::seed_boosted_entry(&db, round, 1, 100, 1).await;
    selection::select_winners(&db, round).await.unwrap();

    let winner = db.pending_winners(round).await.unwrap().remove(0);
    assert!(db.mark_winner_processing(winner.id).await.unwrap());
    db.mark_winner_failed_after_transfer(winner.id, "tr_orphaned", "completion write failed")
        .await
        .unwrap();

    let after = db.get_winner(winner.id).await.unwrap().unwrap();
    assert_eq!(after.payout_status, "failed");
    assert_eq!(after.transfer_ref.as_deref(), Some("tr_orphaned"));
    assert!(after
        .payout_error
        .as_deref()
        .unwrap()
        .contains("completion write"));
}

#[tokio::test]
async fn settling_a_round_with_no_winners_is_an_empty_success() {
    require_db!();
    let db = common::setup_test_db().await;
    let round = common::seed_round(&db, 1, "100.00", -1, 1).await;
    selection::select_winners(&db, round).await.unwrap();

    let provider = FakeTransferProvider::succeeding();
    let report = payout::settle_round(&db, &provider, Duration::from_secs(2), round)
        .await
        .unwrap();
    assert!(report.succeeded.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(provider.call_count(), 0);
}
