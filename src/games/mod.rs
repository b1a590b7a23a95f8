pub mod types;
pub mod config;
pub mod outcome;
pub mod payout;
pub mod wager;
pub mod bonus;

pub use types::*;
pub use config::GameConfigStore;
pub use outcome::{OutcomeDecider, PolicyState};
pub use payout::PayoutCalculator;
pub use wager::{WagerState, WagerTransaction};
pub use bonus::BonusLedger;
