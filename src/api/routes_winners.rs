//! Winner selection endpoint.

use super::{envelope_ok, error_response, AppState};
use crate::selection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SelectWinnersPayload {
    round_id: i64,
}

/// `POST /api/winners/select` — materialize winners for an expired round.
///
/// Fails with 409 `ContestStillActive` before the deadline and 409
/// `AlreadyCompleted` on any call after the first; a round with no eligible
/// entries completes successfully with an empty winner list.
pub(super) async fn handler_winners_select(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SelectWinnersPayload>,
) -> impl IntoResponse {
    match selection::select_winners(&state.db, payload.round_id).await {
        Ok(winners) => {
            state
                .prom_metrics
                .winners_selected
                .inc_by(winners.len() as u64);
            let message = if winners.is_empty() {
                "round completed with no eligible entries".to_string()
            } else {
                format!("selected {} winner(s)", winners.len())
            };
            let winners: Vec<serde_json::Value> = winners
                .iter()
                .map(|w| {
                    serde_json::json!({
                        "position": w.position,
                        "userId": w.user_id,
                        "prizeAmount": w.prize_amount,
                        "entryId": w.entry_id,
                    })
                })
                .collect();
            envelope_ok(serde_json::json!({ "winners": winners, "message": message }))
        }
        Err(e) => error_response(&e),
    }
}
