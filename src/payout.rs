//! # Payout Settler — Transfer Driving with Per-Winner Isolation
//!
//! Consumes a round's pending winners and drives each through the external
//! payment provider. Each winner is settled independently: one failure never
//! blocks or rolls back another winner's payout, and every winner that
//! starts a run finishes it in `completed` or `failed` — never parked in
//! `processing`.
//!
//! The payment backend sits behind the narrow [`TransferProvider`] trait so
//! the retry and failure paths are testable against a fake. Transfers are
//! bounded by a timeout; a timed-out transfer is a failure, same as a
//! provider rejection.
//!
//! Re-invoking the settler for a round only touches winners still `pending`
//! (first run, or explicitly reset via [`Database::retry_failed_winner`]);
//! a `completed` winner can never be paid twice.

use crate::db::{Database, WinnerRow};
use crate::error::MarketError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Failure modes of the external payment provider.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer provider error: {0}")]
    Provider(String),
    #[error("transfer timed out")]
    Timeout,
}

/// The single seam to the external payment backend: move `amount` to
/// `destination`, returning the provider's transfer reference.
#[async_trait]
pub trait TransferProvider: Send + Sync {
    async fn transfer(&self, amount: Decimal, destination: &str) -> Result<String, TransferError>;
}

/// HTTP adapter for a JSON transfer endpoint:
/// `POST {endpoint} {"amount": "...", "destination": "..."}` →
/// `{"transferId": "..."}`.
pub struct HttpTransferProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransferProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpTransferProvider {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl TransferProvider for HttpTransferProvider {
    async fn transfer(&self, amount: Decimal, destination: &str) -> Result<String, TransferError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "amount": amount, "destination": destination }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransferError::Timeout
                } else {
                    TransferError::Provider(e.to_string())
                }
            })?;
        if !resp.status().is_success() {
            return Err(TransferError::Provider(format!(
                "provider returned {}",
                resp.status()
            )));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TransferError::Provider(e.to_string()))?;
        body.get("transferId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| TransferError::Provider("response missing transferId".into()))
    }
}

/// One winner's outcome in a settler run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutResult {
    pub winner_id: i64,
    pub position: i32,
    pub user_id: i64,
    pub prize_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report of one settler invocation: disjoint success/failure lists.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleReport {
    pub succeeded: Vec<PayoutResult>,
    pub failed: Vec<PayoutResult>,
}

/// The destination reference handed to the payment provider. Resolving it
/// to an actual account is the provider's concern; the denormalized user id
/// is the stable key both sides share.
fn destination_ref(user_id: i64) -> String {
    format!("user:{user_id}")
}

/// Settle all pending winners of a round.
///
/// Fails only if the round is unknown or the initial winner listing fails;
/// per-winner transfer and bookkeeping errors are recorded in the report.
pub async fn settle_round(
    db: &Database,
    provider: &dyn TransferProvider,
    transfer_timeout: Duration,
    round_id: i64,
) -> Result<SettleReport, MarketError> {
    db.get_round(round_id)
        .await?
        .ok_or(MarketError::NotFound("round"))?;
    let pending = db.pending_winners(round_id).await?;

    let mut report = SettleReport::default();
    for winner in pending {
        // A concurrent settler may have claimed this winner between the
        // listing and now; skip it rather than double-paying.
        if !db.mark_winner_processing(winner.id).await? {
            continue;
        }
        settle_one(db, provider, transfer_timeout, winner, &mut report).await;
    }

    info!(
        round_id,
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "payout settlement complete"
    );
    Ok(report)
}

/// Drive one claimed winner to a terminal payout state.
async fn settle_one(
    db: &Database,
    provider: &dyn TransferProvider,
    transfer_timeout: Duration,
    winner: WinnerRow,
    report: &mut SettleReport,
) {
    let dest = destination_ref(winner.user_id);
    let attempt = tokio::time::timeout(
        transfer_timeout,
        provider.transfer(winner.prize_amount, &dest),
    )
    .await
    .unwrap_or(Err(TransferError::Timeout));

    let mut result = PayoutResult {
        winner_id: winner.id,
        position: winner.position,
        user_id: winner.user_id,
        prize_amount: winner.prize_amount,
        transfer_ref: None,
        error: None,
    };

    match attempt {
        Ok(transfer_ref) => {
            if let Err(e) = db.mark_winner_completed(winner.id, &transfer_ref).await {
                // The money moved but the bookkeeping write failed. Park the
                // row in `failed` with the transfer ref attached so it is
                // terminal and an operator reconciles before retrying.
                warn!(winner_id = winner.id, error = %e, "transfer succeeded but completion write failed");
                let note = format!("completion write failed: {e}");
                if let Err(db_err) = db
                    .mark_winner_failed_after_transfer(winner.id, &transfer_ref, &note)
                    .await
                {
                    warn!(winner_id = winner.id, error = %db_err, "reconciliation write failed");
                }
                result.transfer_ref = Some(transfer_ref);
                result.error = Some(note);
                report.failed.push(result);
                return;
            }
            result.transfer_ref = Some(transfer_ref);
            report.succeeded.push(result);
        }
        Err(e) => {
            let err = MarketError::TransferFailed(e.to_string());
            warn!(winner_id = winner.id, position = winner.position, error = %err, "transfer failed");
            if let Err(db_err) = db.mark_winner_failed(winner.id, &err.to_string()).await {
                warn!(winner_id = winner.id, error = %db_err, "failure write failed");
            }
            result.error = Some(err.to_string());
            report.failed.push(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_ref_is_stable_per_user() {
        assert_eq!(destination_ref(42), "user:42");
        assert_eq!(destination_ref(42), destination_ref(42));
    }

    #[test]
    fn timeout_reads_as_a_transfer_failure() {
        let err = TransferError::Timeout;
        assert!(err.to_string().contains("timed out"));
    }
}
