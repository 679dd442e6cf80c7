//! Payout settlement endpoints: batch processing and explicit retry.

use super::{envelope_err, envelope_ok, error_response, AppState};
use crate::payout;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProcessPayoutsPayload {
    round_id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RetryPayoutPayload {
    winner_id: i64,
}

/// `POST /api/payouts/process` — settle all pending winners of a round.
///
/// Re-invocable: only winners still `pending` are touched, so a completed
/// winner can never be paid twice. Per-winner failures land in the `failed`
/// list inside a 200 envelope.
pub(super) async fn handler_payouts_process(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ProcessPayoutsPayload>,
) -> impl IntoResponse {
    let report = match payout::settle_round(
        &state.db,
        state.transfer.as_ref(),
        state.transfer_timeout,
        payload.round_id,
    )
    .await
    {
        Ok(report) => report,
        Err(e) => return error_response(&e),
    };

    state
        .prom_metrics
        .record_payout("completed", report.succeeded.len() as u64);
    state
        .prom_metrics
        .record_payout("failed", report.failed.len() as u64);

    let message = format!(
        "{} payout(s) completed, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    envelope_ok(serde_json::json!({
        "succeeded": report.succeeded,
        "failed": report.failed,
        "message": message,
    }))
}

/// `POST /api/payouts/retry` — reset one failed winner back to `pending` so
/// the next processing run picks it up. Refuses (409) if the winner is not
/// in `failed`; completed winners can never be reset.
pub(super) async fn handler_payouts_retry(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RetryPayoutPayload>,
) -> impl IntoResponse {
    match state.db.retry_failed_winner(payload.winner_id).await {
        Ok(true) => envelope_ok(serde_json::json!({
            "winnerId": payload.winner_id,
            "message": "payout reset to pending",
        })),
        Ok(false) => match state.db.get_winner(payload.winner_id).await {
            Ok(Some(w)) => envelope_err(
                StatusCode::CONFLICT,
                &format!("winner is {}, only failed payouts can be retried", w.payout_status),
            ),
            Ok(None) => envelope_err(StatusCode::NOT_FOUND, "not found: winner"),
            Err(e) => error_response(&e),
        },
        Err(e) => error_response(&e),
    }
}
