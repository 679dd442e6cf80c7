//! # Guarantee Monitor — Engagement-Guarantee Sweep
//!
//! A scheduled one-shot sweep over rounds approaching their deadline. Any
//! round whose boosted-entry count falls short of its minimum-entries
//! threshold gets its deadline pushed out by seven days, at most twice over
//! the round's lifetime. Rounds that meet the guarantee are reported for
//! observability and left untouched.
//!
//! The sweep is stateless and safe to run from multiple instances: round
//! selection only picks deadlines inside the next 24 hours, and the actual
//! extension is a conditional UPDATE that re-checks the cap and the window
//! (see `db::rounds`), so re-running cannot re-extend an already-extended
//! round before its new deadline.
//!
//! A failure on one round is recorded in that round's result entry and never
//! aborts the rest of the sweep.

use crate::db::Database;
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Deadline extension granted when a guarantee is unmet.
pub const EXTENSION_DAYS: i64 = 7;
/// A round's deadline is extended at most this many times.
pub const MAX_EXTENSIONS: i32 = 2;
/// Only rounds ending within this window are examined.
pub const NEAR_WINDOW_HOURS: i64 = 24;

/// What the sweep did for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuaranteeAction {
    /// Guarantee unmet; deadline extended.
    Extended,
    /// Guarantee met (or the extension guard refused a race); no mutation.
    Satisfied,
    /// Processing this round failed; see `error`.
    Error,
}

/// Per-round outcome of a sweep.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOutcome {
    pub round_id: i64,
    pub action: GuaranteeAction,
    pub eligible_entries: Option<i64>,
    pub min_entries_threshold: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate counts for a sweep.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub total_checked: usize,
    pub extended: usize,
    pub satisfied: usize,
    pub errors: usize,
}

/// Full report of one sweep invocation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub processed_rounds: Vec<RoundOutcome>,
    pub summary: SweepSummary,
}

/// Run one guarantee sweep over all rounds nearing their deadline.
///
/// Only the initial round selection can fail as a whole; from then on each
/// round is processed independently and errors land in its result entry.
pub async fn run_sweep(db: &Database) -> Result<SweepReport, MarketError> {
    let rounds = db
        .rounds_near_deadline(NEAR_WINDOW_HOURS, MAX_EXTENSIONS)
        .await?;

    let mut outcomes = Vec::with_capacity(rounds.len());
    let mut summary = SweepSummary {
        total_checked: rounds.len(),
        ..Default::default()
    };

    for round in &rounds {
        match check_round(db, round.id, round.min_entries_threshold).await {
            Ok(outcome) => {
                match outcome.action {
                    GuaranteeAction::Extended => summary.extended += 1,
                    GuaranteeAction::Satisfied => summary.satisfied += 1,
                    GuaranteeAction::Error => summary.errors += 1,
                }
                outcomes.push(outcome);
            }
            Err(e) => {
                warn!(round_id = round.id, error = %e, "guarantee check failed");
                summary.errors += 1;
                outcomes.push(RoundOutcome {
                    round_id: round.id,
                    action: GuaranteeAction::Error,
                    eligible_entries: None,
                    min_entries_threshold: round.min_entries_threshold,
                    new_end_date: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    info!(
        checked = summary.total_checked,
        extended = summary.extended,
        errors = summary.errors,
        "guarantee sweep complete"
    );
    Ok(SweepReport {
        processed_rounds: outcomes,
        summary,
    })
}

/// Decide one round: count eligible entries, extend if short of threshold.
async fn check_round(
    db: &Database,
    round_id: i64,
    threshold: i32,
) -> Result<RoundOutcome, MarketError> {
    let eligible = db.count_eligible_entries(round_id).await?;
    if eligible >= threshold as i64 {
        return Ok(RoundOutcome {
            round_id,
            action: GuaranteeAction::Satisfied,
            eligible_entries: Some(eligible),
            min_entries_threshold: threshold,
            new_end_date: None,
            error: None,
        });
    }

    let reason = format!(
        "engagement guarantee unmet: {eligible} of {threshold} required entries; \
         deadline extended by {EXTENSION_DAYS} days"
    );
    let new_end = db
        .extend_deadline(
            round_id,
            EXTENSION_DAYS,
            NEAR_WINDOW_HOURS,
            MAX_EXTENSIONS,
            &reason,
        )
        .await?;

    match new_end {
        Some(end) => {
            info!(round_id, eligible, threshold, new_end = %end, "round extended");
            Ok(RoundOutcome {
                round_id,
                action: GuaranteeAction::Extended,
                eligible_entries: Some(eligible),
                min_entries_threshold: threshold,
                new_end_date: Some(end),
                error: None,
            })
        }
        // The guard refused: a concurrent sweep got there first, or the
        // round expired between selection and update. Nothing to do.
        None => Ok(RoundOutcome {
            round_id,
            action: GuaranteeAction::Satisfied,
            eligible_entries: Some(eligible),
            min_entries_threshold: threshold,
            new_end_date: None,
            error: None,
        }),
    }
}
