//! Boost endpoint — the round author marks an entry prize-eligible.
//!
//! The acting user id arrives already resolved; authentication is the
//! identity provider's concern upstream of this API.

use super::{envelope_ok, error_response, AppState};
use crate::db::BoostOutcome;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BoostPayload {
    round_id: i64,
    entry_id: i64,
    acting_user_id: i64,
}

/// `POST /api/entries/boost` — set `is_boosted` on an entry.
///
/// 403 for non-authors, 409 once five entries of the round are boosted,
/// no-op success if the entry is already boosted.
pub(super) async fn handler_entries_boost(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BoostPayload>,
) -> impl IntoResponse {
    match state
        .db
        .boost_entry(payload.round_id, payload.entry_id, payload.acting_user_id)
        .await
    {
        Ok(outcome) => {
            let message = match outcome {
                BoostOutcome::Boosted => "entry boosted",
                BoostOutcome::AlreadyBoosted => "entry was already boosted",
            };
            envelope_ok(serde_json::json!({
                "roundId": payload.round_id,
                "entryId": payload.entry_id,
                "message": message,
            }))
        }
        Err(e) => error_response(&e),
    }
}
