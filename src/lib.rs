//! Stakehouse - house-edge wagering and payout engine
//!
//! Decides, for a given wager, whether the player wins and how much,
//! against per-game configuration (bet limits, win ratios, daily caps,
//! enable flags) and stateful outcome policies (pity windows, forced
//! win/loss sequences). Balance mutation and persistence are delegated to
//! an external store behind async traits; the engine orchestrates each bet
//! as a saga with an in-flight ledger record so partial failures are
//! detectable and reconcilable rather than silently swallowed.

pub mod errors;
pub mod settings;
pub mod store;
pub mod games;

pub use errors::{EngineError, EngineResult};
pub use games::{
    BonusLedger, GameConfig, GameConfigPatch, GameConfigStore, GameType, OutcomeDecider,
    OutcomePolicy, PayoutCalculator, PayoutStrategy, PolicyState, WagerReceipt, WagerRecord,
    WagerRequest, WagerResult, WagerTransaction,
};
pub use settings::{EngineSettings, SettingsLoader};
pub use store::MemoryStore;
