//! Rating/Reporting: derived leaderboard views, no mutation

use crate::error::Result;
use crate::storage::Database;
use crate::types::{RatingEntry, User};
use std::cmp::Ordering;

/// Win rate as a percentage rounded to two decimals; 0.0 until the user has
/// at least one decided bet.
pub fn win_rate(wins: i64, losses: i64) -> f64 {
    let total = wins + losses;
    if total == 0 {
        return 0.0;
    }
    let pct = wins as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Leaderboard over all users, sorted by win rate then raw wins, both
/// descending. `limit` truncates; `None` returns everyone.
pub async fn get_rating(db: &Database, limit: Option<usize>) -> Result<Vec<RatingEntry>> {
    let users =
        sqlx::query_as::<_, User>("SELECT id, username, balance, wins, losses FROM users")
            .fetch_all(db.reader())
            .await?;

    let mut entries: Vec<RatingEntry> = users
        .into_iter()
        .map(|u| RatingEntry {
            id: u.id,
            username: u.username,
            balance: u.balance,
            wins: u.wins,
            losses: u.losses,
            winrate: win_rate(u.wins, u.losses),
        })
        .collect();

    entries.sort_by(|a, b| {
        b.winrate
            .partial_cmp(&a.winrate)
            .unwrap_or(Ordering::Equal)
            .then(b.wins.cmp(&a.wins))
    });

    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    Ok(entries)
}
