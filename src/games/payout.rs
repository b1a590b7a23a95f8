//! Payout computation with per-game clamp strategies.

use crate::games::types::{GameConfig, PayoutStrategy};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::Mutex;

/// Computes the exact payout for a decided outcome. All amounts are integer
/// minor units; no sub-unit currency is ever paid.
pub struct PayoutCalculator {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl PayoutCalculator {
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }

    /// Construct with an injected RNG for deterministic tests.
    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Win amount for this wager, after the game's clamp strategy.
    ///
    /// `wins_so_far_today` is the user's summed winning payouts for this
    /// game within the current UTC day, used by the daily-cap strategy.
    pub fn compute(
        &self,
        bet_amount: u64,
        won: bool,
        multiplier: f64,
        config: &GameConfig,
        wins_so_far_today: u64,
    ) -> u64 {
        if !won {
            return 0;
        }

        let raw = (bet_amount as f64 * multiplier).floor().max(0.0) as u64;

        match config.payout_strategy {
            PayoutStrategy::BandClamp { floor, ceiling } => {
                if raw > ceiling {
                    self.rng.lock().unwrap().gen_range(floor..=ceiling)
                } else if raw < floor {
                    floor
                } else {
                    raw
                }
            }
            PayoutStrategy::DailyCapClamp => {
                let remaining = config.max_daily_win.saturating_sub(wins_so_far_today);
                raw.min(remaining)
            }
        }
    }
}

impl Default for PayoutCalculator {
    fn default() -> Self {
        Self::new()
    }
}
