//! Domain error taxonomy for the settlement core.
//!
//! Every fallible operation returns [`MarketError`]; the API layer maps each
//! variant to an HTTP status in `api::error_response`. Variants split into
//! two registers: expected domain outcomes (a caller raced, asked too early,
//! or asked for something that is not theirs) and genuine infrastructure
//! failures. [`MarketError::is_benign`] distinguishes them so callers and
//! alerting can treat a lost race differently from a broken database.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    /// The named resource does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Winner selection was requested before the round's deadline passed.
    #[error("contest is still active")]
    ContestStillActive,

    /// The round's contest was already completed; winners are immutable.
    #[error("contest already completed")]
    AlreadyCompleted,

    /// The acting user is not allowed to perform this operation.
    #[error("only the round author may do this")]
    Forbidden,

    /// A per-round cap was hit.
    #[error("limit exceeded: at most {max} boosted entries per round")]
    LimitExceeded { max: i64 },

    /// The external payment provider rejected or failed a transfer.
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// The database failed us.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl MarketError {
    /// True for expected domain outcomes — a well-formed request that the
    /// core's guards correctly refused. False for infrastructure failures
    /// (transfer or persistence) that an operator should look at.
    pub fn is_benign(&self) -> bool {
        !matches!(
            self,
            MarketError::TransferFailed(_) | MarketError::Persistence(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_texts_name_the_condition() {
        assert!(MarketError::NotFound("round").to_string().contains("round not found"));
        assert!(MarketError::ContestStillActive.to_string().contains("still active"));
        assert!(MarketError::AlreadyCompleted.to_string().contains("already completed"));
        assert!(MarketError::LimitExceeded { max: 5 }.to_string().contains("at most 5"));
    }

    #[test]
    fn guard_refusals_are_benign_but_infra_failures_are_not() {
        assert!(MarketError::AlreadyCompleted.is_benign());
        assert!(MarketError::ContestStillActive.is_benign());
        assert!(MarketError::Forbidden.is_benign());
        assert!(MarketError::LimitExceeded { max: 5 }.is_benign());
        assert!(!MarketError::TransferFailed("provider returned 500".into()).is_benign());
        assert!(!MarketError::Persistence(sqlx::Error::PoolClosed).is_benign());
    }
}
