//! Round inspection — operator view of a round's settlement state.

use super::{envelope_err, envelope_ok, error_response, AppState};
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;

/// `GET /api/rounds/{id}` — round detail with its eligible-entry count and
/// any materialized winners.
pub(super) async fn handler_round_get(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<i64>,
) -> impl IntoResponse {
    let round = match state.db.get_round(id).await {
        Ok(Some(r)) => r,
        Ok(None) => return envelope_err(StatusCode::NOT_FOUND, "not found: round"),
        Err(e) => return error_response(&e),
    };
    let eligible = match state.db.count_eligible_entries(id).await {
        Ok(n) => n,
        Err(e) => return error_response(&e),
    };
    let winners = match state.db.winners_for_round(id).await {
        Ok(w) => w,
        Err(e) => return error_response(&e),
    };
    envelope_ok(serde_json::json!({
        "round": round,
        "eligibleEntries": eligible,
        "winners": winners,
    }))
}
