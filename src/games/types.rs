use crate::errors::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Plinko,
    MegaSpin,
    Aviator,
    CoinFlip,
}

impl GameType {
    /// All known game types, in declaration order.
    pub fn all() -> [GameType; 4] {
        [
            GameType::Plinko,
            GameType::MegaSpin,
            GameType::Aviator,
            GameType::CoinFlip,
        ]
    }

    /// Resolve a game identifier arriving from the UI boundary.
    pub fn parse(raw: &str) -> EngineResult<GameType> {
        match raw.to_ascii_lowercase().as_str() {
            "plinko" => Ok(GameType::Plinko),
            "megaspin" => Ok(GameType::MegaSpin),
            "aviator" => Ok(GameType::Aviator),
            "coinflip" => Ok(GameType::CoinFlip),
            _ => Err(EngineError::UnknownGame(raw.to_string())),
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::Plinko => write!(f, "plinko"),
            GameType::MegaSpin => write!(f, "megaspin"),
            GameType::Aviator => write!(f, "aviator"),
            GameType::CoinFlip => write!(f, "coinflip"),
        }
    }
}

/// Outcome decision policy, selected per game by configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OutcomePolicy {
    /// `won = draw < win_ratio`, no state beyond the config.
    FixedRatio,
    /// Global rolling window gates wins platform-wide; a per-user pity
    /// counter raises the odds after a run of consecutive losses.
    RatioWithPity,
    /// Fixed win/loss sequence looping forever per user.
    Pattern { pattern: Vec<u8> },
}

/// Payout clamp strategy, selected per game by configuration.
///
/// The two strategies serve different games' tuning and are deliberately
/// kept as distinct named variants rather than unified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PayoutStrategy {
    /// Fixed payout band independent of bet size: raw wins above `ceiling`
    /// are replaced with a uniform draw in `[floor, ceiling]`, raws below
    /// `floor` are raised to `floor`.
    BandClamp { floor: u64, ceiling: u64 },
    /// Pay `raw` uncapped per-bet but never more than the remaining daily
    /// win allowance.
    DailyCapClamp,
}

/// Per-game betting parameters. Created with defaults at first use, mutated
/// only through the admin surface, never deleted (only disabled).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    pub game_type: GameType,
    pub min_bet: u64,
    pub max_bet: u64,
    /// Probability in [0,1] that a bet wins under the fixed-ratio policy.
    pub win_ratio: f64,
    /// Cap on total payout per user per game per UTC day.
    pub max_daily_win: u64,
    /// Disabled games reject all new wagers.
    pub is_enabled: bool,
    pub outcome_policy: OutcomePolicy,
    pub payout_strategy: PayoutStrategy,
}

impl GameConfig {
    /// Structural validation, applied at the admin update boundary and to
    /// built-in defaults at settings load.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_bet == 0 {
            return Err("min_bet must be positive".to_string());
        }
        if self.min_bet > self.max_bet {
            return Err(format!(
                "min_bet {} exceeds max_bet {}",
                self.min_bet, self.max_bet
            ));
        }
        if !(0.0..=1.0).contains(&self.win_ratio) {
            return Err(format!("win_ratio {} outside [0, 1]", self.win_ratio));
        }
        if let OutcomePolicy::Pattern { pattern } = &self.outcome_policy {
            if pattern.is_empty() {
                return Err("pattern policy requires a non-empty pattern".to_string());
            }
            if pattern.iter().any(|slot| *slot > 1) {
                return Err("pattern entries must be 0 or 1".to_string());
            }
        }
        if let PayoutStrategy::BandClamp { floor, ceiling } = &self.payout_strategy {
            if floor > ceiling {
                return Err(format!(
                    "band floor {} exceeds ceiling {}",
                    floor, ceiling
                ));
            }
        }
        Ok(())
    }
}

/// Partial config used for admin updates and for the stored representation.
/// Omitted fields keep their previous (or default) values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bet: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bet: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_daily_win: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_policy: Option<OutcomePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_strategy: Option<PayoutStrategy>,
}

impl GameConfigPatch {
    /// Merge this patch over a base config.
    pub fn apply(&self, base: GameConfig) -> GameConfig {
        GameConfig {
            game_type: base.game_type,
            min_bet: self.min_bet.unwrap_or(base.min_bet),
            max_bet: self.max_bet.unwrap_or(base.max_bet),
            win_ratio: self.win_ratio.unwrap_or(base.win_ratio),
            max_daily_win: self.max_daily_win.unwrap_or(base.max_daily_win),
            is_enabled: self.is_enabled.unwrap_or(base.is_enabled),
            outcome_policy: self
                .outcome_policy
                .clone()
                .unwrap_or(base.outcome_policy),
            payout_strategy: self
                .payout_strategy
                .clone()
                .unwrap_or(base.payout_strategy),
        }
    }

    /// Complete patch capturing every field of a config. Used when writing
    /// the merged result back to the store.
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            min_bet: Some(config.min_bet),
            max_bet: Some(config.max_bet),
            win_ratio: Some(config.win_ratio),
            max_daily_win: Some(config.max_daily_win),
            is_enabled: Some(config.is_enabled),
            outcome_policy: Some(config.outcome_policy.clone()),
            payout_strategy: Some(config.payout_strategy.clone()),
        }
    }

    /// Build a full config from this patch alone, when no default exists to
    /// merge over. `None` if any field is missing.
    pub fn into_config(self, game_type: GameType) -> Option<GameConfig> {
        Some(GameConfig {
            game_type,
            min_bet: self.min_bet?,
            max_bet: self.max_bet?,
            win_ratio: self.win_ratio?,
            max_daily_win: self.max_daily_win?,
            is_enabled: self.is_enabled?,
            outcome_policy: self.outcome_policy?,
            payout_strategy: self.payout_strategy?,
        })
    }
}

/// Terminal state of a wager ledger entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WagerResult {
    Pending,
    Win,
    Loss,
}

/// Append-only ledger entry. `result` transitions `Pending -> Win/Loss`
/// exactly once; the store rejects any further mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerRecord {
    pub id: String,
    pub user_id: String,
    pub game_type: GameType,
    pub bet_amount: u64,
    pub win_amount: u64,
    pub result: WagerResult,
    pub multiplier: f64,
    pub created_at: DateTime<Utc>,
}

impl WagerRecord {
    /// In-flight record written immediately after the debit commits, so a
    /// crash between steps is detectable and reconcilable.
    pub fn pending(request: &WagerRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            game_type: request.game_type,
            bet_amount: request.bet_amount,
            win_amount: 0,
            result: WagerResult::Pending,
            multiplier: request.multiplier,
            created_at,
        }
    }
}

/// Request to place a single bet. The multiplier carries the game round's
/// symbol/slot data (e.g. the plinko slot the ball landed in).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerRequest {
    pub user_id: String,
    pub game_type: GameType,
    pub bet_amount: u64,
    pub multiplier: f64,
}

/// Outcome returned to the caller for UI feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerReceipt {
    pub wager_id: String,
    pub won: bool,
    pub win_amount: u64,
    pub new_balance: u64,
}

/// Account view at the store boundary. The engine only reads and mutates
/// `balance`; everything else is owned by the external store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub balance: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
}

/// One-time referral payout record, unique per referred user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub referrer_id: String,
    pub referred_id: String,
    pub bonus_amount: u64,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> GameConfig {
        GameConfig {
            game_type: GameType::Plinko,
            min_bet: 10,
            max_bet: 1000,
            win_ratio: 0.25,
            max_daily_win: 5000,
            is_enabled: true,
            outcome_policy: OutcomePolicy::FixedRatio,
            payout_strategy: PayoutStrategy::DailyCapClamp,
        }
    }

    #[test]
    fn test_game_type_parse() {
        assert_eq!(GameType::parse("plinko").unwrap(), GameType::Plinko);
        assert_eq!(GameType::parse("MegaSpin").unwrap(), GameType::MegaSpin);
        assert!(matches!(
            GameType::parse("roulette"),
            Err(EngineError::UnknownGame(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(base_config().validate().is_ok());

        let mut inverted = base_config();
        inverted.min_bet = 2000;
        assert!(inverted.validate().is_err());

        let mut bad_ratio = base_config();
        bad_ratio.win_ratio = 1.5;
        assert!(bad_ratio.validate().is_err());

        let mut empty_pattern = base_config();
        empty_pattern.outcome_policy = OutcomePolicy::Pattern { pattern: vec![] };
        assert!(empty_pattern.validate().is_err());
    }

    #[test]
    fn test_patch_merge_keeps_omitted_fields() {
        let patch = GameConfigPatch {
            max_bet: Some(500),
            is_enabled: Some(false),
            ..Default::default()
        };
        let merged = patch.apply(base_config());
        assert_eq!(merged.max_bet, 500);
        assert!(!merged.is_enabled);
        assert_eq!(merged.min_bet, 10);
        assert_eq!(merged.win_ratio, 0.25);
    }

    #[test]
    fn test_incomplete_patch_cannot_become_config() {
        let patch = GameConfigPatch {
            min_bet: Some(5),
            ..Default::default()
        };
        assert!(patch.into_config(GameType::Plinko).is_none());

        let full = GameConfigPatch::from_config(&base_config());
        assert!(full.into_config(GameType::Plinko).is_some());
    }

    #[test]
    fn test_policy_serde_tagging() {
        let policy = OutcomePolicy::Pattern {
            pattern: vec![1, 1, 0],
        };
        let json = serde_json::to_string(&policy).expect("serialize");
        assert!(json.contains("\"policy\":\"pattern\""));
        let back: OutcomePolicy = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, policy);
    }
}
