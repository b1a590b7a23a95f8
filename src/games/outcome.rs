//! Outcome decision policies.
//!
//! Three interchangeable policies, selected per game by configuration:
//! fixed-ratio random, ratio-with-pity (a global rolling window paces wins
//! platform-wide while a per-user pity counter guarantees nobody is shut
//! out indefinitely), and a deterministic looping win/loss pattern.

use crate::games::types::{GameConfig, OutcomePolicy};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Window entries older than this are excluded from any decision.
const WINDOW_RETENTION_MINUTES: i64 = 10;
/// Any win among this many most-recent global outcomes forces a loss.
const GATE_LOOKBACK: usize = 5;
/// Consecutive personal losses at which the pity odds kick in.
const PITY_THRESHOLD: u32 = 8;
const BASE_WIN_CHANCE: f64 = 0.2;
const PITY_WIN_CHANCE: f64 = 0.5;

#[derive(Debug, Clone)]
struct WindowEntry {
    user_id: String,
    won: bool,
    at: DateTime<Utc>,
}

#[derive(Default)]
struct PityWindow {
    entries: VecDeque<WindowEntry>,
    /// Denormalized for O(1) lookup; kept in sync with every appended
    /// outcome (reset on win, incremented on loss).
    consecutive_losses: HashMap<String, u32>,
}

/// Shared mutable policy state, injected explicitly rather than living as a
/// module-level global. The pity window is read-and-written by every wager
/// across all users, so it sits behind a single mutex; pattern counters are
/// per-user and use entry-level locking.
pub struct PolicyState {
    window: Mutex<PityWindow>,
    bet_counts: DashMap<String, u64>,
}

impl PolicyState {
    pub fn new() -> Self {
        Self {
            window: Mutex::new(PityWindow::default()),
            bet_counts: DashMap::new(),
        }
    }

    /// Administrative reset of a user's pattern position. Pattern state
    /// never expires on its own.
    pub fn reset_pattern_state(&self, user_id: &str) {
        self.bet_counts.remove(user_id);
    }

    /// Monotonic bet count for the pattern policy.
    pub fn bet_count(&self, user_id: &str) -> u64 {
        self.bet_counts
            .get(user_id)
            .map(|entry| *entry)
            .unwrap_or(0)
    }

    /// Current consecutive-loss streak for a user under the pity policy.
    pub fn consecutive_losses(&self, user_id: &str) -> u32 {
        self.window
            .lock()
            .unwrap()
            .consecutive_losses
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }

    /// Most recent window outcomes, newest first.
    pub fn recent_outcomes(&self, limit: usize) -> Vec<(String, bool)> {
        self.window
            .lock()
            .unwrap()
            .entries
            .iter()
            .rev()
            .take(limit)
            .map(|entry| (entry.user_id.clone(), entry.won))
            .collect()
    }
}

impl Default for PolicyState {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides win/lose for a wager using the policy configured for its game.
pub struct OutcomeDecider {
    state: Arc<PolicyState>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl OutcomeDecider {
    pub fn new(state: Arc<PolicyState>) -> Self {
        Self::with_rng(state, Box::new(StdRng::from_entropy()))
    }

    /// Construct with an injected RNG for deterministic tests.
    pub fn with_rng(state: Arc<PolicyState>, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            state,
            rng: Mutex::new(rng),
        }
    }

    /// Decide whether this bet wins. Disabled games never reach this point;
    /// that check happens earlier in the wager flow.
    pub fn decide(&self, config: &GameConfig, user_id: &str, now: DateTime<Utc>) -> bool {
        match &config.outcome_policy {
            OutcomePolicy::FixedRatio => {
                self.rng.lock().unwrap().gen::<f64>() < config.win_ratio
            }
            OutcomePolicy::RatioWithPity => self.decide_with_pity(user_id, now),
            OutcomePolicy::Pattern { pattern } => self.decide_pattern(user_id, pattern),
        }
    }

    fn decide_with_pity(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        let mut window = self.state.window.lock().unwrap();

        let cutoff = now - Duration::minutes(WINDOW_RETENTION_MINUTES);
        while window
            .entries
            .front()
            .map_or(false, |entry| entry.at < cutoff)
        {
            window.entries.pop_front();
        }

        // The gate is platform-global: one recent win anywhere blocks the
        // next wins for everyone.
        let gate_blocked = window
            .entries
            .iter()
            .rev()
            .take(GATE_LOOKBACK)
            .any(|entry| entry.won);

        let won = if gate_blocked {
            false
        } else {
            let losses = window
                .consecutive_losses
                .get(user_id)
                .copied()
                .unwrap_or(0);
            let chance = if losses >= PITY_THRESHOLD {
                PITY_WIN_CHANCE
            } else {
                BASE_WIN_CHANCE
            };
            self.rng.lock().unwrap().gen::<f64>() < chance
        };

        window.entries.push_back(WindowEntry {
            user_id: user_id.to_string(),
            won,
            at: now,
        });
        if won {
            window.consecutive_losses.insert(user_id.to_string(), 0);
        } else {
            *window
                .consecutive_losses
                .entry(user_id.to_string())
                .or_insert(0) += 1;
        }

        won
    }

    fn decide_pattern(&self, user_id: &str, pattern: &[u8]) -> bool {
        if pattern.is_empty() {
            return false;
        }
        let mut count = self
            .state
            .bet_counts
            .entry(user_id.to_string())
            .or_insert(0);
        *count += 1;
        let position = ((*count - 1) % pattern.len() as u64) as usize;
        pattern[position] == 1
    }
}
