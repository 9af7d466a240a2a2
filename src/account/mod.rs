//! Account Service: user creation, lookup, and balance adjustments

use crate::error::{BotError, Result};
use crate::storage::Database;
use crate::types::{TxKind, User};
use chrono::Utc;

pub const DEFAULT_STARTING_BALANCE: i64 = 1000;

/// User creation and balance mutation primitives.
#[derive(Debug, Clone)]
pub struct Accounts {
    db: Database,
    starting_balance: i64,
}

impl Accounts {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            starting_balance: DEFAULT_STARTING_BALANCE,
        }
    }

    pub fn with_starting_balance(mut self, balance: i64) -> Self {
        self.starting_balance = balance;
        self
    }

    /// Create the user with the starting balance if absent. Idempotent: a
    /// repeat call is a no-op and never refreshes the stored name.
    pub async fn ensure_user(&self, id: i64, username: Option<&str>) -> Result<()> {
        let name = match username {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("user{id}"),
        };

        let res = sqlx::query(
            "INSERT INTO users (id, username, balance) VALUES (?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(id)
        .bind(&name)
        .bind(self.starting_balance)
        .execute(self.db.writer())
        .await?;

        if res.rows_affected() > 0 {
            tracing::info!(user_id = id, username = %name, "registered new user");
        }
        Ok(())
    }

    /// Current snapshot, or `None` for an unknown id.
    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, balance, wins, losses FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.reader())
        .await?;
        Ok(user)
    }

    /// Case-insensitive lookup by display name, for the command surface.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, balance, wins, losses FROM users
             WHERE lower(username) = lower(?)",
        )
        .bind(username)
        .fetch_optional(self.db.reader())
        .await?;
        Ok(user)
    }

    /// Administrative credit (or debit, with a negative amount). Logged as an
    /// `admin_add` transaction; debit and log commit together.
    pub async fn add_balance(&self, id: i64, amount: i64) -> Result<User> {
        let mut tx = self.db.begin_write().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(BotError::UserNotFound);
        }

        sqlx::query("UPDATE users SET balance = balance + ? WHERE id = ?")
            .bind(amount)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO transactions (user_id, amount, kind, note, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(amount)
        .bind(TxKind::AdminAdd)
        .bind("balance adjusted by administrator")
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, balance, wins, losses FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(user_id = id, amount, "admin balance adjustment");
        Ok(user)
    }
}
