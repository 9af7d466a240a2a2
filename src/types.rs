//! Domain records for the wager ledger
//!
//! Every entity the store persists gets an explicit struct with typed fields;
//! row decoding goes through sqlx `FromRow` so a renamed column is a compile
//! error in tests rather than a silent `None` at runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat user and their authoritative currency balance.
///
/// Created lazily on first interaction, never deleted. The balance must never
/// go negative: every debit is checked against it inside the same write
/// transaction that applies it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub balance: i64,
    pub wins: i64,
    pub losses: i64,
}

/// Poll lifecycle. Transitions only move forward:
/// `AcceptingBets -> VotingClosed -> Resolved`, with a direct
/// `AcceptingBets -> Resolved` shortcut for explicit resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PollStatus {
    AcceptingBets,
    VotingClosed,
    Resolved,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::AcceptingBets => "accepting_bets",
            PollStatus::VotingClosed => "voting_closed",
            PollStatus::Resolved => "resolved",
        }
    }

    /// Whether moving to `next` keeps the lifecycle monotonic.
    pub fn can_transition_to(&self, next: PollStatus) -> bool {
        matches!(
            (self, next),
            (PollStatus::AcceptingBets, PollStatus::VotingClosed)
                | (PollStatus::AcceptingBets, PollStatus::Resolved)
                | (PollStatus::VotingClosed, PollStatus::Resolved)
        )
    }
}

impl std::fmt::Display for PollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A multiple-choice poll taking wagers.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    pub creator_id: i64,
    pub status: PollStatus,
    pub created_at: DateTime<Utc>,
    /// Handle of the outward chat message, used to edit the announcement.
    /// Cleared once the poll is resolved.
    pub message_id: Option<i64>,
    pub closes_at: DateTime<Utc>,
}

/// One answer option. Created atomically with its poll, immutable after.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollOption {
    pub id: i64,
    pub poll_id: i64,
    pub option_text: String,
}

/// An option together with the total staked on it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OptionTotal {
    pub id: i64,
    pub option_text: String,
    pub total_bet: i64,
}

/// A poll with its per-option totals, the shape both surfaces render.
#[derive(Debug, Clone, Serialize)]
pub struct PollDetail {
    pub id: i64,
    pub question: String,
    pub creator_id: i64,
    pub status: PollStatus,
    pub created_at: DateTime<Utc>,
    pub message_id: Option<i64>,
    pub closes_at: DateTime<Utc>,
    pub options: Vec<OptionTotal>,
}

impl PollDetail {
    /// Total staked across all options.
    pub fn pool(&self) -> i64 {
        self.options.iter().map(|o| o.total_bet).sum()
    }
}

/// Compact row for poll listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PollSummaryRow {
    pub id: i64,
    pub question: String,
    pub status: PollStatus,
    pub creator_id: i64,
}

/// A single wager. At most one per (poll, user); immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bet {
    pub id: i64,
    pub poll_id: i64,
    pub option_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// A bet joined with the bettor's name, for the poll breakdown.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BetView {
    pub option_id: i64,
    pub amount: i64,
    pub username: String,
}

/// Catalog entry for a purchasable loot chest. The reward distribution is
/// deliberately absent here: callers see price, never odds.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chest {
    pub id: i64,
    pub name: String,
    pub price: i64,
}

/// The (value, weight) reward table stored in the chest's JSON column.
/// Weights are relative integers and need not sum to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChestRewards {
    pub rewards: Vec<i64>,
    pub weights: Vec<u32>,
}

/// Category of a balance-affecting event in the append-only log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TxKind {
    Bet,
    BetWin,
    ChestBuy,
    ChestReward,
    AdminAdd,
}

/// One row of the audit trail. Never updated or deleted; a user's balance
/// equals the starting balance plus the sum of their deltas.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub kind: TxKind,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// One winner's share of a settled pool.
#[derive(Debug, Clone, Serialize)]
pub struct WinnerPayout {
    pub username: String,
    pub payout: i64,
}

/// What `resolve` hands the notification collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveOutcome {
    pub pool: i64,
    pub win_total: i64,
    pub winning_option_text: String,
    pub winners: Vec<WinnerPayout>,
}

/// A poll flipped to `voting_closed` by the deadline sweep, with enough
/// identity for the notifier to refresh its outward message.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClosedPoll {
    pub id: i64,
    pub message_id: Option<i64>,
}

/// One leaderboard row. `winrate` is a percentage rounded to two decimals,
/// 0.0 until the user has at least one decided bet.
#[derive(Debug, Clone, Serialize)]
pub struct RatingEntry {
    pub id: i64,
    pub username: String,
    pub balance: i64,
    pub wins: i64,
    pub losses: i64,
    pub winrate: f64,
}
