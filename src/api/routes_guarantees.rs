//! Guarantee sweep endpoint — invoked by an external scheduler (cron or an
//! admin action), not an embedded timer loop.

use super::{envelope_ok, error_response, AppState};
use crate::guarantee;
use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::Arc;

/// `POST /api/guarantees/check` — run one sweep over rounds nearing their
/// deadline. No body required. Per-round failures are reported inside the
/// envelope; only a failure to even list the rounds fails the request.
pub(super) async fn handler_guarantees_check(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match guarantee::run_sweep(&state.db).await {
        Ok(report) => {
            state
                .prom_metrics
                .rounds_extended
                .inc_by(report.summary.extended as u64);
            state
                .prom_metrics
                .guarantees_satisfied
                .inc_by(report.summary.satisfied as u64);
            envelope_ok(serde_json::json!({
                "processedRounds": report.processed_rounds,
                "summary": report.summary,
            }))
        }
        Err(e) => error_response(&e),
    }
}
