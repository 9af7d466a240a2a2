//! Ledger Store: durable SQLite tables behind a read/write pool split
//!
//! All mutating operations run inside a transaction taken from a writer pool
//! capped at one connection, so writes are serialized end to end (human-paced
//! contention, not bulk throughput). Reads go through a separate pool and see
//! committed snapshots only; WAL mode keeps them from blocking the writer.

use crate::error::Result;
use crate::types::ChestRewards;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::time::Duration;

/// How long a writer may wait for the write slot before the operation fails
/// with a retryable contention error instead of hanging.
const WRITE_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to the ledger database. Cheap to clone; every component gets one.
#[derive(Debug, Clone)]
pub struct Database {
    write: SqlitePool,
    read: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the ledger at `path` and apply the schema.
    pub async fn connect(path: &str) -> Result<Self> {
        Self::connect_with(path, false).await
    }

    /// Like [`connect`](Self::connect), optionally wiping the file first.
    pub async fn connect_with(path: &str, recreate: bool) -> Result<Self> {
        if recreate && Path::new(path).exists() {
            std::fs::remove_file(path).ok();
            std::fs::remove_file(format!("{path}-wal")).ok();
            std::fs::remove_file(format!("{path}-shm")).ok();
            tracing::warn!("existing database at {} removed on startup", path);
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let write = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(WRITE_ACQUIRE_TIMEOUT)
            .connect_with(options.clone())
            .await?;

        let read = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let db = Self { write, read };
        db.migrate().await?;
        db.seed_chests().await?;
        Ok(db)
    }

    /// Pool for snapshot reads.
    pub fn reader(&self) -> &SqlitePool {
        &self.read
    }

    /// Serialized writer pool, for single-statement mutations that need no
    /// explicit transaction.
    pub fn writer(&self) -> &SqlitePool {
        &self.write
    }

    /// Begin the serialized write transaction every mutating ledger operation
    /// runs in. Dropping the transaction without committing rolls it back.
    pub async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.write.begin().await?)
    }

    async fn migrate(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                balance INTEGER NOT NULL DEFAULT 1000,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE TABLE IF NOT EXISTS polls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                creator_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'accepting_bets',
                created_at TEXT NOT NULL,
                message_id INTEGER,
                closes_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS poll_options (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                poll_id INTEGER NOT NULL,
                option_text TEXT NOT NULL,
                FOREIGN KEY(poll_id) REFERENCES polls(id) ON DELETE CASCADE
            )",
            "CREATE TABLE IF NOT EXISTS bets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                poll_id INTEGER NOT NULL,
                option_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(poll_id, user_id),
                FOREIGN KEY(poll_id) REFERENCES polls(id) ON DELETE CASCADE,
                FOREIGN KEY(option_id) REFERENCES poll_options(id) ON DELETE CASCADE,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
            "CREATE TABLE IF NOT EXISTS chests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                price INTEGER NOT NULL,
                rewards_json TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                kind TEXT NOT NULL,
                note TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            )",
        ];

        for stmt in statements {
            sqlx::query(stmt).execute(&self.write).await?;
        }
        Ok(())
    }

    /// Insert the default chest catalog if the table is empty.
    async fn seed_chests(&self) -> Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chests")
            .fetch_one(&self.write)
            .await?;
        if count > 0 {
            return Ok(());
        }

        let catalog: [(&str, i64, ChestRewards); 3] = [
            (
                "Small chest",
                50,
                ChestRewards {
                    rewards: vec![20, 50, 100, 300],
                    weights: vec![65, 25, 8, 2],
                },
            ),
            (
                "Medium chest",
                200,
                ChestRewards {
                    rewards: vec![100, 200, 400, 800],
                    weights: vec![60, 28, 10, 2],
                },
            ),
            (
                "Large chest",
                500,
                ChestRewards {
                    rewards: vec![300, 500, 1000, 3000],
                    weights: vec![55, 30, 13, 2],
                },
            ),
        ];

        for (name, price, rewards) in catalog {
            let rewards_json =
                serde_json::to_string(&rewards).expect("static catalog serializes");
            sqlx::query("INSERT INTO chests (name, price, rewards_json) VALUES (?, ?, ?)")
                .bind(name)
                .bind(price)
                .bind(rewards_json)
                .execute(&self.write)
                .await?;
        }

        tracing::info!("seeded default chest catalog");
        Ok(())
    }

    /// Sum of a user's transaction deltas. With the starting balance added
    /// this must reconcile to the current balance.
    pub async fn transaction_sum(&self, user_id: i64) -> Result<i64> {
        let sum: i64 =
            sqlx::query_scalar("SELECT IFNULL(SUM(amount), 0) FROM transactions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.read)
                .await?;
        Ok(sum)
    }
}
