//! Error types for the wagering engine.
//!
//! The taxonomy separates player-facing rejections (no side effects, safe to
//! retry with adjusted input), infrastructure failures (safe to retry the
//! whole operation), and post-debit inconsistencies (never auto-retried).

use crate::games::types::GameType;
use thiserror::Error;

/// Root error type for all engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Wagers on a disabled game are rejected before any mutation.
    #[error("game '{0}' is disabled")]
    GameDisabled(GameType),

    /// Bet amount falls outside the configured bounds.
    #[error("bet {amount} outside allowed range [{min}, {max}]")]
    BetOutOfRange { amount: u64, min: u64, max: u64 },

    /// Balance check failed before the debit was attempted.
    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: u64, required: u64 },

    /// Game identifier from the caller did not resolve to a known game.
    #[error("unknown game type: '{0}'")]
    UnknownGame(String),

    /// No stored configuration and no built-in default for this game.
    #[error("no configuration registered for game '{0}'")]
    NotConfigured(GameType),

    /// Admin config update produced a structurally invalid configuration.
    #[error("config update rejected: {0}")]
    UpdateRejected(String),

    /// The conditional debit was refused by the store (e.g. a concurrent
    /// wager drained the balance between validation and debit).
    #[error("debit of {amount} failed for user '{user_id}': {reason}")]
    DebitFailed {
        user_id: String,
        amount: u64,
        reason: String,
    },

    /// The debit committed but a later step (payout credit or ledger write)
    /// failed. Not safe to retry automatically: a blind retry risks double
    /// payment. Carries enough detail for manual reconciliation.
    #[error(
        "wager '{wager_id}' left inconsistent for user '{user_id}' \
         (bet {bet_amount}, win {win_amount}): {reason}"
    )]
    CreditFailed {
        user_id: String,
        wager_id: String,
        bet_amount: u64,
        win_amount: u64,
        reason: String,
    },

    /// A store round trip timed out or the store was unreachable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Persistent store rejected or corrupted an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// Engine settings file or environment override was invalid.
    #[error("settings error: {0}")]
    Settings(String),
}

impl EngineError {
    /// Player-facing rejection: the wager never progressed past validation
    /// and the caller may retry with adjusted input.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::GameDisabled(_)
                | EngineError::BetOutOfRange { .. }
                | EngineError::InsufficientBalance { .. }
                | EngineError::UnknownGame(_)
        )
    }

    /// Infrastructure failure with no balance change; the whole operation is
    /// safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::DebitFailed { .. } | EngineError::StoreUnavailable(_)
        )
    }

    /// Post-debit inconsistency that must be surfaced for reconciliation
    /// rather than retried.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(self, EngineError::CreditFailed { .. })
    }
}

/// Convenience type alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::BetOutOfRange {
            amount: 5,
            min: 10,
            max: 1000,
        };
        assert!(err.to_string().contains("outside allowed range"));
        assert!(err.to_string().contains("[10, 1000]"));
    }

    #[test]
    fn test_error_categories() {
        let rejection = EngineError::GameDisabled(GameType::Plinko);
        assert!(rejection.is_rejection());
        assert!(!rejection.is_retryable());

        let retryable = EngineError::StoreUnavailable("timeout".to_string());
        assert!(retryable.is_retryable());
        assert!(!retryable.is_rejection());

        let inconsistent = EngineError::CreditFailed {
            user_id: "u1".to_string(),
            wager_id: "w1".to_string(),
            bet_amount: 20,
            win_amount: 100,
            reason: "store write failed".to_string(),
        };
        assert!(inconsistent.needs_reconciliation());
        assert!(!inconsistent.is_retryable());
    }
}
