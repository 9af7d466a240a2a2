//! Error types for the wager ledger and its surfaces

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

/// Crate-wide error type.
///
/// Business-rule violations (closed poll, duplicate bet, missing funds) are
/// routine outcomes of ledger operations and get their own variants so callers
/// can react to them without string matching. `Storage` and `Http` are the
/// fatal categories: a storage failure rolls back the enclosing transaction
/// and is never retried by the core.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("poll not found")]
    PollNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("chest not found")]
    ChestNotFound,

    #[error("that option does not belong to this poll")]
    OptionNotInPoll,

    #[error("a poll needs at least two options")]
    InvalidOptions,

    #[error("bet amount must be greater than zero")]
    InvalidAmount,

    #[error("bets are no longer accepted on this poll")]
    BettingClosed,

    #[error("you already placed a bet on this poll")]
    DuplicateBet,

    #[error("this poll has already been resolved")]
    AlreadyResolved,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("you are not allowed to do that")]
    Unauthorized,

    #[error("chest reward table is invalid: {0}")]
    RewardTable(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("telegram api error: {0}")]
    Http(#[from] reqwest::Error),
}

impl BotError {
    /// Expected business-rule outcome, as opposed to an infrastructure fault.
    pub fn is_business(&self) -> bool {
        !matches!(
            self,
            BotError::Storage(_) | BotError::Http(_) | BotError::RewardTable(_)
        )
    }

    /// Failed on write-lock contention; the caller may retry the operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            BotError::Storage(sqlx::Error::PoolTimedOut) => true,
            BotError::Storage(sqlx::Error::Database(db)) => {
                // SQLITE_BUSY / SQLITE_LOCKED surface through the driver code
                db.code().is_some_and(|c| c == "5" || c == "6")
            }
            _ => false,
        }
    }
}
