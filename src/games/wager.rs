//! End-to-end wager orchestration.
//!
//! A wager is a saga: `Created -> Validated -> Debited -> Decided ->
//! (Paid | SettledAsLoss) -> Recorded`. Validation failures abort with no
//! balance change. Once the debit commits, the transaction runs to
//! completion or surfaces a reconciliation error; it is never retried
//! blindly, because a retry after a committed debit could double-debit.

use crate::errors::{EngineError, EngineResult};
use crate::games::config::GameConfigStore;
use crate::games::outcome::OutcomeDecider;
use crate::games::payout::PayoutCalculator;
use crate::games::types::{WagerReceipt, WagerRecord, WagerRequest, WagerResult};
use crate::settings::EngineSettings;
use crate::store::{AccountStore, WagerLedger};
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Saga phase, carried in log context so an operator can tell how far an
/// inconsistent wager progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WagerState {
    Created,
    Validated,
    Debited,
    Decided,
    Paid,
    SettledAsLoss,
    Recorded,
}

impl fmt::Display for WagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WagerState::Created => write!(f, "created"),
            WagerState::Validated => write!(f, "validated"),
            WagerState::Debited => write!(f, "debited"),
            WagerState::Decided => write!(f, "decided"),
            WagerState::Paid => write!(f, "paid"),
            WagerState::SettledAsLoss => write!(f, "settled-as-loss"),
            WagerState::Recorded => write!(f, "recorded"),
        }
    }
}

/// Orchestrates a single bet end-to-end against the external store.
pub struct WagerTransaction {
    configs: Arc<GameConfigStore>,
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn WagerLedger>,
    decider: OutcomeDecider,
    payouts: PayoutCalculator,
    store_timeout: Duration,
}

impl WagerTransaction {
    pub fn new(
        configs: Arc<GameConfigStore>,
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn WagerLedger>,
        decider: OutcomeDecider,
        payouts: PayoutCalculator,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            configs,
            accounts,
            ledger,
            decider,
            payouts,
            store_timeout: Duration::from_millis(settings.store_timeout_ms),
        }
    }

    /// Place a bet: validate, debit, decide, pay out, record.
    ///
    /// Failures before the debit abort with no side effects. Failures after
    /// the debit surface as `CreditFailed` with enough detail for manual
    /// reconciliation.
    pub async fn place(&self, request: WagerRequest) -> EngineResult<WagerReceipt> {
        // Validate against a fresh config fetch; admin changes apply to the
        // very next wager.
        let config = self
            .with_timeout(self.configs.get(request.game_type))
            .await?;
        if !config.is_enabled {
            return Err(EngineError::GameDisabled(request.game_type));
        }
        if request.bet_amount < config.min_bet || request.bet_amount > config.max_bet {
            return Err(EngineError::BetOutOfRange {
                amount: request.bet_amount,
                min: config.min_bet,
                max: config.max_bet,
            });
        }
        let balance = self
            .with_timeout(self.accounts.balance(&request.user_id))
            .await?;
        if balance < request.bet_amount {
            return Err(EngineError::InsufficientBalance {
                balance,
                required: request.bet_amount,
            });
        }

        // Conditional debit: a concurrent session may have drained the
        // balance since validation.
        let balance_after_debit = self
            .with_timeout(
                self.accounts
                    .try_debit(&request.user_id, request.bet_amount),
            )
            .await?;

        // From here on the user is debited; every failure is a
        // reconciliation case, not a retry case.
        let now = Utc::now();
        let record = WagerRecord::pending(&request, now);
        let wager_id = record.id.clone();

        if let Err(e) = self.with_timeout(self.ledger.append(record)).await {
            return Err(self.inconsistent(
                &request,
                &wager_id,
                0,
                WagerState::Debited,
                format!("in-flight record write failed: {}", e),
            ));
        }

        let won = self.decider.decide(&config, &request.user_id, now);

        let wins_so_far_today = match self
            .with_timeout(
                self.ledger
                    .sum_wins_today(&request.user_id, request.game_type, now),
            )
            .await
        {
            Ok(sum) => sum,
            Err(e) => {
                return Err(self.inconsistent(
                    &request,
                    &wager_id,
                    0,
                    WagerState::Decided,
                    format!("daily-win lookup failed: {}", e),
                ));
            }
        };

        let win_amount = self.payouts.compute(
            request.bet_amount,
            won,
            request.multiplier,
            &config,
            wins_so_far_today,
        );

        let mut new_balance = balance_after_debit;
        let mut credit_failure = None;
        if win_amount > 0 {
            match self
                .with_timeout(self.accounts.credit(&request.user_id, win_amount))
                .await
            {
                Ok(balance) => new_balance = balance,
                Err(e) => credit_failure = Some(e.to_string()),
            }
        }

        // The record reflects the intended outcome even when the credit
        // failed; a missing credit is a distinct fault to surface.
        let result = if won { WagerResult::Win } else { WagerResult::Loss };
        if let Err(e) = self
            .with_timeout(self.ledger.finalize(&wager_id, result, win_amount))
            .await
        {
            return Err(self.inconsistent(
                &request,
                &wager_id,
                win_amount,
                if won { WagerState::Paid } else { WagerState::SettledAsLoss },
                format!("record finalize failed: {}", e),
            ));
        }

        if let Some(reason) = credit_failure {
            return Err(self.inconsistent(
                &request,
                &wager_id,
                win_amount,
                WagerState::Recorded,
                format!("payout credit failed: {}", reason),
            ));
        }

        tracing::debug!(
            user_id = %request.user_id,
            game_type = %request.game_type,
            wager_id = %wager_id,
            bet_amount = request.bet_amount,
            win_amount,
            won,
            "wager settled"
        );

        Ok(WagerReceipt {
            wager_id,
            won,
            win_amount,
            new_balance,
        })
    }

    /// Wagers still pending past `older_than`: sagas that did not run to
    /// completion, for the reconciliation sweep.
    pub async fn incomplete_wagers(
        &self,
        older_than: chrono::Duration,
    ) -> EngineResult<Vec<WagerRecord>> {
        let cutoff = Utc::now() - older_than;
        let pending = self.with_timeout(self.ledger.pending_wagers()).await?;
        Ok(pending
            .into_iter()
            .filter(|record| record.created_at < cutoff)
            .collect())
    }

    /// Build and error-log a post-debit inconsistency. This is the one
    /// place where silent failure is unacceptable: the log line carries
    /// everything manual reconciliation needs.
    fn inconsistent(
        &self,
        request: &WagerRequest,
        wager_id: &str,
        win_amount: u64,
        state: WagerState,
        reason: String,
    ) -> EngineError {
        tracing::error!(
            user_id = %request.user_id,
            game_type = %request.game_type,
            wager_id = %wager_id,
            bet_amount = request.bet_amount,
            win_amount,
            state = %state,
            reason = %reason,
            "wager left inconsistent after debit; flagged for reconciliation"
        );
        EngineError::CreditFailed {
            user_id: request.user_id.clone(),
            wager_id: wager_id.to_string(),
            bet_amount: request.bet_amount,
            win_amount,
            reason,
        }
    }

    async fn with_timeout<T>(
        &self,
        operation: impl Future<Output = EngineResult<T>>,
    ) -> EngineResult<T> {
        match tokio::time::timeout(self.store_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::StoreUnavailable(format!(
                "store call exceeded {}ms",
                self.store_timeout.as_millis()
            ))),
        }
    }
}
