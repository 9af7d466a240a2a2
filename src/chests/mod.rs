//! Reward/Chest Engine: purchasable loot with a weighted-random payout
//!
//! The draw is uniform over the weighted total of the configured
//! (value, weight) pairs. The sampler is injected so tests can seed it; the
//! debit, the draw and the credit commit as one unit, logged as two separate
//! transactions (purchase and reward, never netted).

use crate::error::{BotError, Result};
use crate::storage::Database;
use crate::types::{Chest, ChestRewards, TxKind};
use chrono::Utc;
use parking_lot::Mutex;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Weighted-sampling strategy for chest rewards. Implementations must be
/// statistically fair to the configured weights; cryptographic strength is
/// not required.
pub trait RewardSampler: Send {
    /// Draw one reward. `None` when the table is unusable (empty, mismatched
    /// lengths, or all-zero weights).
    fn draw(&mut self, rewards: &[i64], weights: &[u32]) -> Option<i64>;
}

/// Default sampler over any `rand` RNG.
pub struct WeightedSampler<R: Rng> {
    rng: R,
}

impl WeightedSampler<StdRng> {
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic sampler for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng + Send> RewardSampler for WeightedSampler<R> {
    fn draw(&mut self, rewards: &[i64], weights: &[u32]) -> Option<i64> {
        if rewards.is_empty() || rewards.len() != weights.len() {
            return None;
        }
        let dist = WeightedIndex::new(weights.iter().copied()).ok()?;
        Some(rewards[dist.sample(&mut self.rng)])
    }
}

/// Chest catalog and the open-chest purchase flow.
#[derive(Clone)]
pub struct ChestShop {
    db: Database,
    sampler: Arc<Mutex<Box<dyn RewardSampler>>>,
}

impl ChestShop {
    pub fn new(db: Database) -> Self {
        Self::with_sampler(db, Box::new(WeightedSampler::from_os_rng()))
    }

    pub fn with_sampler(db: Database, sampler: Box<dyn RewardSampler>) -> Self {
        Self {
            db,
            sampler: Arc::new(Mutex::new(sampler)),
        }
    }

    /// The catalog, cheapest first. Reward tables are intentionally not part
    /// of this view.
    pub async fn list(&self) -> Result<Vec<Chest>> {
        let chests =
            sqlx::query_as::<_, Chest>("SELECT id, name, price FROM chests ORDER BY price")
                .fetch_all(self.db.reader())
                .await?;
        Ok(chests)
    }

    /// Buy and open a chest: debit the price, draw one reward, credit it.
    /// Returns the awarded amount.
    pub async fn open(&self, user_id: i64, chest_id: i64) -> Result<i64> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let chest: Option<(i64, String)> =
            sqlx::query_as("SELECT price, rewards_json FROM chests WHERE id = ?")
                .bind(chest_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (price, rewards_json) = chest.ok_or(BotError::ChestNotFound)?;

        let balance: Option<i64> = sqlx::query_scalar("SELECT balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let balance = balance.ok_or(BotError::UserNotFound)?;
        if balance < price {
            return Err(BotError::InsufficientBalance);
        }

        let table: ChestRewards = serde_json::from_str(&rewards_json)
            .map_err(|e| BotError::RewardTable(e.to_string()))?;
        let reward = {
            let mut sampler = self.sampler.lock();
            sampler
                .draw(&table.rewards, &table.weights)
                .ok_or_else(|| BotError::RewardTable("empty or mismatched table".into()))?
        };

        sqlx::query("UPDATE users SET balance = balance - ? WHERE id = ?")
            .bind(price)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
            .bind(reward)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO transactions (user_id, amount, kind, note, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(-price)
        .bind(TxKind::ChestBuy)
        .bind(format!("bought chest {chest_id}"))
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO transactions (user_id, amount, kind, note, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(reward)
        .bind(TxKind::ChestReward)
        .bind(format!("reward from chest {chest_id}"))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(user_id, chest_id, price, reward, "chest opened");
        Ok(reward)
    }
}
