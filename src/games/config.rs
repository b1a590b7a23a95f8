//! Per-game configuration access for validation and the admin surface.
//!
//! Reads are never cached: every wager re-fetches current config, so an
//! admin change takes effect on the very next bet.

use crate::errors::{EngineError, EngineResult};
use crate::games::types::{GameConfig, GameConfigPatch, GameType};
use crate::settings::EngineSettings;
use crate::store::ConfigStore;
use std::sync::Arc;
use tokio::sync::broadcast;

pub struct GameConfigStore {
    store: Arc<dyn ConfigStore>,
    settings: Arc<EngineSettings>,
}

impl GameConfigStore {
    pub fn new(store: Arc<dyn ConfigStore>, settings: Arc<EngineSettings>) -> Self {
        Self { store, settings }
    }

    /// Effective config for a game: the stored row merged over the built-in
    /// default. Fails with `NotConfigured` when neither exists.
    pub async fn get(&self, game_type: GameType) -> EngineResult<GameConfig> {
        let stored = self.store.read_config(game_type).await?;
        match (self.settings.default_for(game_type), stored) {
            (Some(default), Some(patch)) => Ok(patch.apply(default.clone())),
            (Some(default), None) => Ok(default.clone()),
            (None, Some(patch)) => patch
                .into_config(game_type)
                .ok_or(EngineError::NotConfigured(game_type)),
            (None, None) => Err(EngineError::NotConfigured(game_type)),
        }
    }

    /// Effective configs for every configured game, ordered by game type
    /// ascending for deterministic admin display.
    pub async fn get_all(&self) -> EngineResult<Vec<GameConfig>> {
        let mut configs = Vec::new();
        for game_type in GameType::all() {
            match self.get(game_type).await {
                Ok(config) => configs.push(config),
                Err(EngineError::NotConfigured(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        configs.sort_by_key(|config| config.game_type.to_string());
        Ok(configs)
    }

    /// Partial admin update. Omitted fields keep their current values; the
    /// merged result is validated before anything is written.
    pub async fn update(
        &self,
        game_type: GameType,
        patch: GameConfigPatch,
    ) -> EngineResult<GameConfig> {
        let current = self.get(game_type).await?;
        let merged = patch.apply(current);
        merged
            .validate()
            .map_err(EngineError::UpdateRejected)?;

        self.store
            .write_config(game_type, GameConfigPatch::from_config(&merged))
            .await?;

        tracing::info!(
            game_type = %game_type,
            min_bet = merged.min_bet,
            max_bet = merged.max_bet,
            is_enabled = merged.is_enabled,
            "game config updated"
        );
        Ok(merged)
    }

    /// Idempotent: creates a stored row only for game types missing one,
    /// from the built-in defaults. Returns how many rows were created.
    pub async fn initialize_defaults(&self) -> EngineResult<usize> {
        let mut created = 0;
        for game_type in GameType::all() {
            let Some(default) = self.settings.default_for(game_type) else {
                continue;
            };
            if self.store.read_config(game_type).await?.is_some() {
                continue;
            }
            self.store
                .write_config(game_type, GameConfigPatch::from_config(default))
                .await?;
            created += 1;
        }
        if created > 0 {
            tracing::info!(created, "initialized default game configs");
        }
        Ok(created)
    }

    /// Change notifications for live admin/UI sync.
    pub fn subscribe(&self) -> broadcast::Receiver<GameType> {
        self.store.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::{OutcomePolicy, PayoutStrategy};
    use crate::store::MemoryStore;

    fn config_store() -> GameConfigStore {
        GameConfigStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(EngineSettings::default()),
        )
    }

    #[tokio::test]
    async fn test_get_falls_back_to_default() {
        let configs = config_store();
        let plinko = configs.get(GameType::Plinko).await.unwrap();
        assert_eq!(plinko.min_bet, 10);
        assert_eq!(plinko.max_bet, 1000);
        assert_eq!(plinko.win_ratio, 0.25);
    }

    #[tokio::test]
    async fn test_not_configured_without_default() {
        let settings = EngineSettings {
            default_games: vec![],
            ..EngineSettings::default()
        };
        let configs = GameConfigStore::new(Arc::new(MemoryStore::new()), Arc::new(settings));
        assert!(matches!(
            configs.get(GameType::Plinko).await,
            Err(EngineError::NotConfigured(GameType::Plinko))
        ));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let configs = config_store();
        configs
            .update(
                GameType::Plinko,
                GameConfigPatch {
                    max_bet: Some(200),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let plinko = configs.get(GameType::Plinko).await.unwrap();
        assert_eq!(plinko.max_bet, 200);
        assert_eq!(plinko.min_bet, 10);
        assert_eq!(plinko.win_ratio, 0.25);
        assert!(plinko.is_enabled);
    }

    #[tokio::test]
    async fn test_invalid_update_rejected_without_write() {
        let configs = config_store();
        let err = configs
            .update(
                GameType::Plinko,
                GameConfigPatch {
                    min_bet: Some(5000),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UpdateRejected(_)));

        // The rejected write left the stored state untouched.
        let plinko = configs.get(GameType::Plinko).await.unwrap();
        assert_eq!(plinko.min_bet, 10);
    }

    #[tokio::test]
    async fn test_update_visible_to_next_get() {
        let configs = config_store();
        let before = configs.get(GameType::Aviator).await.unwrap();
        assert!(before.is_enabled);

        configs
            .update(
                GameType::Aviator,
                GameConfigPatch {
                    is_enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let after = configs.get(GameType::Aviator).await.unwrap();
        assert!(!after.is_enabled);
    }

    #[tokio::test]
    async fn test_initialize_defaults_idempotent() {
        let configs = config_store();
        assert_eq!(configs.initialize_defaults().await.unwrap(), 4);
        assert_eq!(configs.initialize_defaults().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_all_ordering() {
        let configs = config_store();
        let all = configs.get_all().await.unwrap();
        let names: Vec<String> = all.iter().map(|c| c.game_type.to_string()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_update_notifies_subscribers() {
        let configs = config_store();
        let mut changes = configs.subscribe();
        configs
            .update(
                GameType::MegaSpin,
                GameConfigPatch {
                    payout_strategy: Some(PayoutStrategy::BandClamp {
                        floor: 50,
                        ceiling: 100,
                    }),
                    outcome_policy: Some(OutcomePolicy::Pattern {
                        pattern: vec![1, 0],
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(changes.try_recv().unwrap(), GameType::MegaSpin);
    }
}
