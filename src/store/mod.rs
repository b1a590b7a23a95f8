//! External store boundary.
//!
//! The engine delegates all persistence to a remote store reachable over
//! request/response calls with JSON-like payloads. These traits are the
//! seam: balance mutations are atomic conditional updates at the store
//! (never read-then-write-later round trips), the wager ledger is
//! append-only with a one-way pending->terminal transition, and config
//! changes fan out through a subscribe channel for live admin sync.

pub mod memory;

use crate::errors::EngineResult;
use crate::games::types::{
    GameConfigPatch, GameType, ReferralRecord, WagerRecord, WagerResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

pub use memory::MemoryStore;

/// Point read/write of per-game configuration rows.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Stored (possibly partial) config for a game, if any.
    async fn read_config(&self, game_type: GameType) -> EngineResult<Option<GameConfigPatch>>;

    /// Replace the stored row and notify subscribers.
    async fn write_config(
        &self,
        game_type: GameType,
        patch: GameConfigPatch,
    ) -> EngineResult<()>;

    /// Enumerate all stored config rows.
    async fn list_configs(&self) -> EngineResult<Vec<(GameType, GameConfigPatch)>>;

    /// Change notifications for live admin/UI sync.
    fn subscribe(&self) -> broadcast::Receiver<GameType>;
}

/// Account balance operations. Both mutation paths are atomic at the store;
/// the engine never composes a balance update from two round trips.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn balance(&self, user_id: &str) -> EngineResult<u64>;

    /// Conditional decrement: fails (with no change) when the balance would
    /// go negative. Returns the new balance.
    async fn try_debit(&self, user_id: &str, amount: u64) -> EngineResult<u64>;

    /// Atomic increment. Returns the new balance.
    async fn credit(&self, user_id: &str, amount: u64) -> EngineResult<u64>;

    /// Resolve a referral code to the owning user id.
    async fn find_by_referral_code(&self, code: &str) -> EngineResult<Option<String>>;
}

/// Append-only wager ledger with the daily-win aggregation used for cap
/// enforcement.
#[async_trait]
pub trait WagerLedger: Send + Sync {
    async fn append(&self, record: WagerRecord) -> EngineResult<()>;

    /// One-way transition from `Pending` to a terminal result. Rejects a
    /// second finalize for the same wager.
    async fn finalize(
        &self,
        wager_id: &str,
        result: WagerResult,
        win_amount: u64,
    ) -> EngineResult<()>;

    async fn get(&self, wager_id: &str) -> EngineResult<Option<WagerRecord>>;

    /// Sum of `win_amount` over winning wagers for this user and game within
    /// the UTC day containing `now`.
    async fn sum_wins_today(
        &self,
        user_id: &str,
        game_type: GameType,
        now: DateTime<Utc>,
    ) -> EngineResult<u64>;

    /// All records still `Pending`: wagers whose saga did not run to
    /// completion, surfaced for reconciliation.
    async fn pending_wagers(&self) -> EngineResult<Vec<WagerRecord>>;
}

/// Referral payout records with a uniqueness constraint on the referred
/// user.
#[async_trait]
pub trait ReferralStore: Send + Sync {
    /// Insert a referral record. Returns `false` without writing when a
    /// record for the same referred user already exists.
    async fn insert(&self, record: ReferralRecord) -> EngineResult<bool>;

    async fn find_by_referred(
        &self,
        referred_id: &str,
    ) -> EngineResult<Option<ReferralRecord>>;
}

/// One-time registration award bookkeeping.
#[async_trait]
pub trait BonusStore: Send + Sync {
    async fn registration_awarded(&self, user_id: &str) -> EngineResult<bool>;

    /// Check-and-insert of the award record. Returns `false` when the user
    /// was already awarded.
    async fn record_registration_award(
        &self,
        user_id: &str,
        amount: u64,
    ) -> EngineResult<bool>;
}
