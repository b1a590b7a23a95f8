//! In-process store backed by concurrent maps.
//!
//! Reference implementation of the store traits for tests and
//! single-process embedding. Balance updates use entry-level locking so
//! debit and credit are read-modify-write safe under concurrent wagers
//! (e.g. two sessions for the same user).

use crate::errors::{EngineError, EngineResult};
use crate::games::types::{
    GameConfigPatch, GameType, ReferralRecord, UserAccount, WagerRecord, WagerResult,
};
use crate::store::{AccountStore, BonusStore, ConfigStore, ReferralStore, WagerLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;

const CONFIG_CHANGE_CHANNEL_CAPACITY: usize = 64;

/// DashMap-backed implementation of every store trait.
pub struct MemoryStore {
    accounts: DashMap<String, UserAccount>,
    configs: DashMap<GameType, GameConfigPatch>,
    wagers: DashMap<String, WagerRecord>,
    referrals: DashMap<String, ReferralRecord>,
    registration_awards: DashMap<String, u64>,
    config_changes: broadcast::Sender<GameType>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (config_changes, _) = broadcast::channel(CONFIG_CHANGE_CHANNEL_CAPACITY);
        Self {
            accounts: DashMap::new(),
            configs: DashMap::new(),
            wagers: DashMap::new(),
            referrals: DashMap::new(),
            registration_awards: DashMap::new(),
            config_changes,
        }
    }

    /// Create or replace an account row. Account provisioning itself is
    /// owned by the external auth system; this exists for embedding and
    /// tests.
    pub fn upsert_account(&self, account: UserAccount) {
        self.accounts.insert(account.id.clone(), account);
    }

    pub fn account(&self, user_id: &str) -> Option<UserAccount> {
        self.accounts.get(user_id).map(|entry| entry.clone())
    }

    /// Number of ledger entries, across all users and games.
    pub fn wager_count(&self) -> usize {
        self.wagers.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn read_config(&self, game_type: GameType) -> EngineResult<Option<GameConfigPatch>> {
        Ok(self.configs.get(&game_type).map(|entry| entry.clone()))
    }

    async fn write_config(
        &self,
        game_type: GameType,
        patch: GameConfigPatch,
    ) -> EngineResult<()> {
        self.configs.insert(game_type, patch);
        // No receivers is fine; admin sync is best-effort.
        let _ = self.config_changes.send(game_type);
        Ok(())
    }

    async fn list_configs(&self) -> EngineResult<Vec<(GameType, GameConfigPatch)>> {
        Ok(self
            .configs
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<GameType> {
        self.config_changes.subscribe()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn balance(&self, user_id: &str) -> EngineResult<u64> {
        self.accounts
            .get(user_id)
            .map(|entry| entry.balance)
            .ok_or_else(|| EngineError::Storage(format!("unknown account '{}'", user_id)))
    }

    async fn try_debit(&self, user_id: &str, amount: u64) -> EngineResult<u64> {
        let mut entry = self.accounts.get_mut(user_id).ok_or_else(|| {
            EngineError::DebitFailed {
                user_id: user_id.to_string(),
                amount,
                reason: "unknown account".to_string(),
            }
        })?;
        if entry.balance < amount {
            return Err(EngineError::DebitFailed {
                user_id: user_id.to_string(),
                amount,
                reason: format!("insufficient funds: balance {}", entry.balance),
            });
        }
        entry.balance -= amount;
        Ok(entry.balance)
    }

    async fn credit(&self, user_id: &str, amount: u64) -> EngineResult<u64> {
        let mut entry = self.accounts.get_mut(user_id).ok_or_else(|| {
            EngineError::Storage(format!("unknown account '{}'", user_id))
        })?;
        entry.balance = entry.balance.saturating_add(amount);
        Ok(entry.balance)
    }

    async fn find_by_referral_code(&self, code: &str) -> EngineResult<Option<String>> {
        Ok(self
            .accounts
            .iter()
            .find(|entry| entry.referral_code.as_deref() == Some(code))
            .map(|entry| entry.id.clone()))
    }
}

#[async_trait]
impl WagerLedger for MemoryStore {
    async fn append(&self, record: WagerRecord) -> EngineResult<()> {
        if self.wagers.contains_key(&record.id) {
            return Err(EngineError::Storage(format!(
                "wager '{}' already recorded",
                record.id
            )));
        }
        self.wagers.insert(record.id.clone(), record);
        Ok(())
    }

    async fn finalize(
        &self,
        wager_id: &str,
        result: WagerResult,
        win_amount: u64,
    ) -> EngineResult<()> {
        let mut entry = self.wagers.get_mut(wager_id).ok_or_else(|| {
            EngineError::Storage(format!("wager '{}' not found", wager_id))
        })?;
        if entry.result != WagerResult::Pending {
            return Err(EngineError::Storage(format!(
                "wager '{}' already finalized as {:?}",
                wager_id, entry.result
            )));
        }
        entry.result = result;
        entry.win_amount = win_amount;
        Ok(())
    }

    async fn get(&self, wager_id: &str) -> EngineResult<Option<WagerRecord>> {
        Ok(self.wagers.get(wager_id).map(|entry| entry.clone()))
    }

    async fn sum_wins_today(
        &self,
        user_id: &str,
        game_type: GameType,
        now: DateTime<Utc>,
    ) -> EngineResult<u64> {
        let day_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| EngineError::Storage("invalid day boundary".to_string()))?;
        Ok(self
            .wagers
            .iter()
            .filter(|entry| {
                entry.user_id == user_id
                    && entry.game_type == game_type
                    && entry.result == WagerResult::Win
                    && entry.created_at >= day_start
            })
            .map(|entry| entry.win_amount)
            .sum())
    }

    async fn pending_wagers(&self) -> EngineResult<Vec<WagerRecord>> {
        Ok(self
            .wagers
            .iter()
            .filter(|entry| entry.result == WagerResult::Pending)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[async_trait]
impl ReferralStore for MemoryStore {
    async fn insert(&self, record: ReferralRecord) -> EngineResult<bool> {
        match self.referrals.entry(record.referred_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(true)
            }
        }
    }

    async fn find_by_referred(
        &self,
        referred_id: &str,
    ) -> EngineResult<Option<ReferralRecord>> {
        Ok(self.referrals.get(referred_id).map(|entry| entry.clone()))
    }
}

#[async_trait]
impl BonusStore for MemoryStore {
    async fn registration_awarded(&self, user_id: &str) -> EngineResult<bool> {
        Ok(self.registration_awards.contains_key(user_id))
    }

    async fn record_registration_award(
        &self,
        user_id: &str,
        amount: u64,
    ) -> EngineResult<bool> {
        match self.registration_awards.entry(user_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(amount);
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::WagerRequest;
    use chrono::Duration;

    fn account(id: &str, balance: u64) -> UserAccount {
        UserAccount {
            id: id.to_string(),
            balance,
            referral_code: None,
        }
    }

    fn record(user_id: &str, win_amount: u64, created_at: DateTime<Utc>) -> WagerRecord {
        let request = WagerRequest {
            user_id: user_id.to_string(),
            game_type: GameType::Plinko,
            bet_amount: 10,
            multiplier: 2.0,
        };
        let mut record = WagerRecord::pending(&request, created_at);
        record.result = WagerResult::Win;
        record.win_amount = win_amount;
        record
    }

    #[tokio::test]
    async fn test_try_debit_refuses_overdraw() {
        let store = MemoryStore::new();
        store.upsert_account(account("u1", 50));

        assert_eq!(store.try_debit("u1", 30).await.unwrap(), 20);
        let err = store.try_debit("u1", 30).await.unwrap_err();
        assert!(matches!(err, EngineError::DebitFailed { .. }));
        // Failed debit leaves the balance untouched.
        assert_eq!(store.balance("u1").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_finalize_is_one_way() {
        let store = MemoryStore::new();
        let request = WagerRequest {
            user_id: "u1".to_string(),
            game_type: GameType::Plinko,
            bet_amount: 10,
            multiplier: 2.0,
        };
        let pending = WagerRecord::pending(&request, Utc::now());
        let id = pending.id.clone();
        store.append(pending).await.unwrap();

        store.finalize(&id, WagerResult::Win, 20).await.unwrap();
        assert!(store.finalize(&id, WagerResult::Loss, 0).await.is_err());

        let stored = store.get(&id).await.unwrap().expect("record exists");
        assert_eq!(stored.result, WagerResult::Win);
        assert_eq!(stored.win_amount, 20);
    }

    #[tokio::test]
    async fn test_sum_wins_today_excludes_yesterday() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.append(record("u1", 100, now)).await.unwrap();
        store
            .append(record("u1", 400, now - Duration::days(1)))
            .await
            .unwrap();
        store.append(record("u2", 70, now)).await.unwrap();

        let total = store
            .sum_wins_today("u1", GameType::Plinko, now)
            .await
            .unwrap();
        assert_eq!(total, 100);
    }

    #[tokio::test]
    async fn test_referral_uniqueness() {
        let store = MemoryStore::new();
        let record = ReferralRecord {
            referrer_id: "ref".to_string(),
            referred_id: "new".to_string(),
            bonus_amount: 100,
            is_paid: true,
            created_at: Utc::now(),
        };
        assert!(store.insert(record.clone()).await.unwrap());
        assert!(!store.insert(record).await.unwrap());
    }

    #[tokio::test]
    async fn test_config_change_notification() {
        let store = MemoryStore::new();
        let mut changes = ConfigStore::subscribe(&store);
        store
            .write_config(GameType::Aviator, GameConfigPatch::default())
            .await
            .unwrap();
        assert_eq!(changes.try_recv().unwrap(), GameType::Aviator);
    }
}
