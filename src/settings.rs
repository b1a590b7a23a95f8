//! Engine-wide settings with validation, defaults, and environment
//! variable support.
//!
//! Bonus amounts live here on the server side; they are never sourced from
//! anything a client can write.

use crate::errors::{EngineError, EngineResult};
use crate::games::types::{GameConfig, GameType, OutcomePolicy, PayoutStrategy};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// MegaSpin's looping win/loss sequence: a fixed long-run win rate with a
/// deliberate short-run streak texture.
pub const MEGASPIN_PATTERN: [u8; 15] = [1, 1, 0, 0, 1, 1, 1, 0, 0, 0, 0, 0, 1, 0, 0];

/// Engine configuration: per-game defaults plus the cross-cutting knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Timeout applied to every store round trip on the wager path.
    pub store_timeout_ms: u64,
    /// One-time bonus credited on registration, in minor units.
    pub registration_bonus: u64,
    /// One-time bonus credited to a referrer, in minor units.
    pub referral_bonus: u64,
    /// Built-in per-game defaults, used when no stored config row exists and
    /// as the base that stored partial rows merge over.
    pub default_games: Vec<GameConfig>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            store_timeout_ms: 8_000,
            registration_bonus: 100,
            referral_bonus: 250,
            default_games: vec![
                GameConfig {
                    game_type: GameType::Plinko,
                    min_bet: 10,
                    max_bet: 1000,
                    win_ratio: 0.25,
                    max_daily_win: 5000,
                    is_enabled: true,
                    outcome_policy: OutcomePolicy::FixedRatio,
                    payout_strategy: PayoutStrategy::DailyCapClamp,
                },
                GameConfig {
                    game_type: GameType::MegaSpin,
                    min_bet: 10,
                    max_bet: 500,
                    win_ratio: 0.4,
                    max_daily_win: 3000,
                    is_enabled: true,
                    outcome_policy: OutcomePolicy::Pattern {
                        pattern: MEGASPIN_PATTERN.to_vec(),
                    },
                    payout_strategy: PayoutStrategy::BandClamp {
                        floor: 50,
                        ceiling: 100,
                    },
                },
                GameConfig {
                    game_type: GameType::Aviator,
                    min_bet: 20,
                    max_bet: 2000,
                    win_ratio: 0.2,
                    max_daily_win: 8000,
                    is_enabled: true,
                    outcome_policy: OutcomePolicy::RatioWithPity,
                    payout_strategy: PayoutStrategy::DailyCapClamp,
                },
                GameConfig {
                    game_type: GameType::CoinFlip,
                    min_bet: 1,
                    max_bet: 100,
                    win_ratio: 0.5,
                    max_daily_win: 1000,
                    is_enabled: true,
                    outcome_policy: OutcomePolicy::FixedRatio,
                    payout_strategy: PayoutStrategy::BandClamp {
                        floor: 50,
                        ceiling: 100,
                    },
                },
            ],
        }
    }
}

impl EngineSettings {
    /// Built-in default config for a game, if one is registered.
    pub fn default_for(&self, game_type: GameType) -> Option<&GameConfig> {
        self.default_games
            .iter()
            .find(|config| config.game_type == game_type)
    }
}

/// Settings loader with file and environment variable support.
pub struct SettingsLoader {
    settings_path: Option<String>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self {
            settings_path: None,
        }
    }

    /// Set the settings file path.
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load settings from file and environment variables.
    pub fn load(&self) -> EngineResult<EngineSettings> {
        let mut settings = if let Some(ref path) = self.settings_path {
            self.load_from_file(path)?
        } else {
            EngineSettings::default()
        };

        self.apply_env_overrides(&mut settings)?;
        self.validate(&settings)?;

        Ok(settings)
    }

    fn load_from_file(&self, path: &str) -> EngineResult<EngineSettings> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Settings(format!("failed to read {}: {}", path, e))
        })?;

        toml::from_str(&content)
            .map_err(|e| EngineError::Settings(format!("failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides(&self, settings: &mut EngineSettings) -> EngineResult<()> {
        if let Ok(timeout) = env::var("STAKEHOUSE_STORE_TIMEOUT_MS") {
            settings.store_timeout_ms = timeout.parse().map_err(|_| {
                EngineError::Settings(format!(
                    "invalid STAKEHOUSE_STORE_TIMEOUT_MS: '{}'",
                    timeout
                ))
            })?;
        }
        if let Ok(bonus) = env::var("STAKEHOUSE_REGISTRATION_BONUS") {
            settings.registration_bonus = bonus.parse().map_err(|_| {
                EngineError::Settings(format!(
                    "invalid STAKEHOUSE_REGISTRATION_BONUS: '{}'",
                    bonus
                ))
            })?;
        }
        if let Ok(bonus) = env::var("STAKEHOUSE_REFERRAL_BONUS") {
            settings.referral_bonus = bonus.parse().map_err(|_| {
                EngineError::Settings(format!(
                    "invalid STAKEHOUSE_REFERRAL_BONUS: '{}'",
                    bonus
                ))
            })?;
        }
        Ok(())
    }

    /// Validate settings values, including every built-in game default.
    fn validate(&self, settings: &EngineSettings) -> EngineResult<()> {
        if settings.store_timeout_ms == 0 {
            return Err(EngineError::Settings(
                "store_timeout_ms cannot be zero".to_string(),
            ));
        }

        for config in &settings.default_games {
            config.validate().map_err(|reason| {
                EngineError::Settings(format!(
                    "default config for '{}' invalid: {}",
                    config.game_type, reason
                ))
            })?;
        }

        let mut seen = Vec::with_capacity(settings.default_games.len());
        for config in &settings.default_games {
            if seen.contains(&config.game_type) {
                return Err(EngineError::Settings(format!(
                    "duplicate default for game '{}'",
                    config.game_type
                )));
            }
            seen.push(config.game_type);
        }

        Ok(())
    }

    /// Save settings to a TOML file.
    pub fn save(&self, settings: &EngineSettings, path: &str) -> EngineResult<()> {
        let toml_string = toml::to_string_pretty(settings).map_err(|e| {
            EngineError::Settings(format!("failed to serialize settings: {}", e))
        })?;

        std::fs::write(path, toml_string).map_err(|e| {
            EngineError::Settings(format!("failed to write to {}: {}", path, e))
        })
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.store_timeout_ms, 8_000);
        assert_eq!(settings.default_games.len(), 4);

        let plinko = settings.default_for(GameType::Plinko).expect("plinko default");
        assert_eq!(plinko.min_bet, 10);
        assert_eq!(plinko.max_bet, 1000);
        assert!(plinko.is_enabled);

        let megaspin = settings
            .default_for(GameType::MegaSpin)
            .expect("megaspin default");
        assert!(matches!(
            &megaspin.outcome_policy,
            OutcomePolicy::Pattern { pattern } if pattern.len() == 15
        ));
    }

    #[test]
    fn test_settings_validation() {
        let loader = SettingsLoader::new();
        let mut settings = EngineSettings::default();
        assert!(loader.validate(&settings).is_ok());

        settings.store_timeout_ms = 0;
        assert!(loader.validate(&settings).is_err());

        settings.store_timeout_ms = 8_000;
        settings.default_games[0].min_bet = 10_000;
        assert!(loader.validate(&settings).is_err());
    }

    #[test]
    fn test_duplicate_game_default_rejected() {
        let loader = SettingsLoader::new();
        let mut settings = EngineSettings::default();
        let duplicate = settings.default_games[0].clone();
        settings.default_games.push(duplicate);
        assert!(loader.validate(&settings).is_err());
    }

    #[test]
    fn test_save_and_load_settings() -> EngineResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let original = EngineSettings::default();
        let loader = SettingsLoader::new();
        loader.save(&original, path)?;

        let loaded = SettingsLoader::new().with_path(path).load()?;

        assert_eq!(loaded.store_timeout_ms, original.store_timeout_ms);
        assert_eq!(loaded.registration_bonus, original.registration_bonus);
        assert_eq!(loaded.default_games.len(), original.default_games.len());

        Ok(())
    }
}
