//! Poll Lifecycle Engine: bet admission, deadline close, pari-mutuel settlement
//!
//! Every mutating operation runs in one serialized write transaction: either
//! the debit, the bet row and the log entry all commit, or none do. Payout
//! math is integer throughout; floor-division remainders stay in the house.

use crate::error::{BotError, Result};
use crate::storage::Database;
use crate::types::{
    BetView, ClosedPoll, OptionTotal, Poll, PollDetail, PollStatus, PollSummaryRow,
    ResolveOutcome, TxKind, WinnerPayout,
};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_CLOSE_AFTER_MINUTES: i64 = 20;

/// Poll creation, bet admission, auto-close, and resolution.
#[derive(Debug, Clone)]
pub struct PollEngine {
    db: Database,
    close_after: Duration,
}

impl PollEngine {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            close_after: Duration::minutes(DEFAULT_CLOSE_AFTER_MINUTES),
        }
    }

    /// Override the creation-to-deadline offset (config, and deterministic
    /// deadline tests).
    pub fn with_close_after(mut self, close_after: Duration) -> Self {
        self.close_after = close_after;
        self
    }

    /// Create a poll with its options in one transaction. The betting
    /// deadline is a fixed offset from creation.
    pub async fn create_poll(
        &self,
        creator_id: i64,
        question: &str,
        options: &[String],
    ) -> Result<i64> {
        if options.len() < 2 {
            return Err(BotError::InvalidOptions);
        }

        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let res = sqlx::query(
            "INSERT INTO polls (question, creator_id, status, created_at, closes_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(question)
        .bind(creator_id)
        .bind(PollStatus::AcceptingBets)
        .bind(now)
        .bind(now + self.close_after)
        .execute(&mut *tx)
        .await?;
        let poll_id = res.last_insert_rowid();

        for option in options {
            sqlx::query("INSERT INTO poll_options (poll_id, option_text) VALUES (?, ?)")
                .bind(poll_id)
                .bind(option)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(poll_id, creator_id, "poll created");
        Ok(poll_id)
    }

    /// Admit a wager: check the poll is open, the option belongs to it, the
    /// user exists with sufficient balance and no prior bet, then debit,
    /// record the bet and log the stake in one transaction.
    pub async fn place_bet(
        &self,
        user_id: i64,
        poll_id: i64,
        option_id: i64,
        amount: i64,
    ) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let poll: Option<(PollStatus, DateTime<Utc>)> =
            sqlx::query_as("SELECT status, closes_at FROM polls WHERE id = ?")
                .bind(poll_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (status, closes_at) = poll.ok_or(BotError::PollNotFound)?;
        if status != PollStatus::AcceptingBets || closes_at <= now {
            return Err(BotError::BettingClosed);
        }

        if amount <= 0 {
            return Err(BotError::InvalidAmount);
        }

        let option_ok: Option<i64> =
            sqlx::query_scalar("SELECT id FROM poll_options WHERE id = ? AND poll_id = ?")
                .bind(option_id)
                .bind(poll_id)
                .fetch_optional(&mut *tx)
                .await?;
        if option_ok.is_none() {
            return Err(BotError::OptionNotInPoll);
        }

        let balance: Option<i64> = sqlx::query_scalar("SELECT balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let balance = balance.ok_or(BotError::UserNotFound)?;
        if balance < amount {
            return Err(BotError::InsufficientBalance);
        }

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM bets WHERE poll_id = ? AND user_id = ?")
                .bind(poll_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(BotError::DuplicateBet);
        }

        sqlx::query("UPDATE users SET balance = balance - ? WHERE id = ?")
            .bind(amount)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO bets (poll_id, option_id, user_id, amount, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(poll_id)
        .bind(option_id)
        .bind(user_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO transactions (user_id, amount, kind, note, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(-amount)
        .bind(TxKind::Bet)
        .bind(format!("stake on poll {poll_id}"))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(user_id, poll_id, option_id, amount, "bet placed");
        Ok(())
    }

    /// Flip every open poll whose deadline has passed to `voting_closed` and
    /// return them, message handles included, so the caller can refresh the
    /// outward announcements. Side-effecting; meant to be driven by the
    /// periodic scheduler.
    pub async fn auto_close_due_polls(&self) -> Result<Vec<ClosedPoll>> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let due: Vec<ClosedPoll> = sqlx::query_as(
            "SELECT id, message_id FROM polls WHERE status = ? AND closes_at <= ?",
        )
        .bind(PollStatus::AcceptingBets)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        if due.is_empty() {
            return Ok(due);
        }

        sqlx::query("UPDATE polls SET status = ? WHERE status = ? AND closes_at <= ?")
            .bind(PollStatus::VotingClosed)
            .bind(PollStatus::AcceptingBets)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        for poll in &due {
            tracing::info!(poll_id = poll.id, "poll auto-closed at deadline");
        }
        Ok(due)
    }

    /// Settle the poll: compute the pool, pay the winning side proportionally
    /// to their stake share, bump win/loss counters, and mark the poll
    /// resolved, all in one transaction.
    ///
    /// When everyone picked the winning option the payout is a flat 2x stake
    /// (proportional division would just hand stakes back). When nobody did,
    /// the pool is forfeit and every bettor takes a loss.
    pub async fn resolve(
        &self,
        requester_id: i64,
        poll_id: i64,
        winning_option_id: i64,
    ) -> Result<ResolveOutcome> {
        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let status: Option<PollStatus> =
            sqlx::query_scalar("SELECT status FROM polls WHERE id = ?")
                .bind(poll_id)
                .fetch_optional(&mut *tx)
                .await?;
        let status = status.ok_or(BotError::PollNotFound)?;
        if status == PollStatus::Resolved {
            return Err(BotError::AlreadyResolved);
        }

        let winning_option_text: Option<String> = sqlx::query_scalar(
            "SELECT option_text FROM poll_options WHERE id = ? AND poll_id = ?",
        )
        .bind(winning_option_id)
        .bind(poll_id)
        .fetch_optional(&mut *tx)
        .await?;
        let winning_option_text = winning_option_text.ok_or(BotError::OptionNotInPoll)?;

        let bets: Vec<(i64, i64, i64)> =
            sqlx::query_as("SELECT user_id, option_id, amount FROM bets WHERE poll_id = ?")
                .bind(poll_id)
                .fetch_all(&mut *tx)
                .await?;

        let pool: i64 = bets.iter().map(|(_, _, amount)| amount).sum();
        let win_total: i64 = bets
            .iter()
            .filter(|(_, option_id, _)| *option_id == winning_option_id)
            .map(|(_, _, amount)| amount)
            .sum();

        let mut winners = Vec::new();
        if pool > 0 && win_total > 0 {
            let only_winners = win_total == pool;
            for (user_id, option_id, amount) in &bets {
                if *option_id == winning_option_id {
                    // Flat 2x when there is no losing side; otherwise the
                    // bettor's stake share of the pool, floored. The rounding
                    // remainder is retained, never redistributed.
                    let payout = if only_winners {
                        amount * 2
                    } else {
                        amount * pool / win_total
                    };

                    sqlx::query(
                        "UPDATE users SET balance = balance + ?, wins = wins + 1 WHERE id = ?",
                    )
                    .bind(payout)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                    sqlx::query(
                        "INSERT INTO transactions (user_id, amount, kind, note, created_at)
                         VALUES (?, ?, ?, ?, ?)",
                    )
                    .bind(user_id)
                    .bind(payout)
                    .bind(TxKind::BetWin)
                    .bind(format!("won poll {poll_id}"))
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;

                    let username: String =
                        sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
                            .bind(user_id)
                            .fetch_one(&mut *tx)
                            .await?;
                    winners.push(WinnerPayout { username, payout });
                } else {
                    sqlx::query("UPDATE users SET losses = losses + 1 WHERE id = ?")
                        .bind(user_id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        } else if pool > 0 {
            // Nobody picked the winning option: stakes are forfeit.
            for (user_id, _, _) in &bets {
                sqlx::query("UPDATE users SET losses = losses + 1 WHERE id = ?")
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        sqlx::query("UPDATE polls SET status = ?, message_id = NULL WHERE id = ?")
            .bind(PollStatus::Resolved)
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            poll_id,
            requester_id,
            pool,
            win_total,
            winners = winners.len(),
            "poll resolved"
        );
        Ok(ResolveOutcome {
            pool,
            win_total,
            winning_option_text,
            winners,
        })
    }

    /// Poll with per-option staked totals, or `None` if it does not exist.
    pub async fn poll_detail(&self, poll_id: i64) -> Result<Option<PollDetail>> {
        let poll: Option<Poll> = sqlx::query_as(
            "SELECT id, question, creator_id, status, created_at, message_id, closes_at
             FROM polls WHERE id = ?",
        )
        .bind(poll_id)
        .fetch_optional(self.db.reader())
        .await?;
        let Some(poll) = poll else {
            return Ok(None);
        };

        let options = self.option_totals(poll_id).await?;
        Ok(Some(PollDetail {
            id: poll.id,
            question: poll.question,
            creator_id: poll.creator_id,
            status: poll.status,
            created_at: poll.created_at,
            message_id: poll.message_id,
            closes_at: poll.closes_at,
            options,
        }))
    }

    /// Polls still visible to bettors (accepting or closed-but-unsettled),
    /// newest first, with option totals.
    pub async fn list_open(&self) -> Result<Vec<PollDetail>> {
        let polls: Vec<Poll> = sqlx::query_as(
            "SELECT id, question, creator_id, status, created_at, message_id, closes_at
             FROM polls WHERE status IN (?, ?) ORDER BY created_at DESC",
        )
        .bind(PollStatus::AcceptingBets)
        .bind(PollStatus::VotingClosed)
        .fetch_all(self.db.reader())
        .await?;

        let mut details = Vec::with_capacity(polls.len());
        for poll in polls {
            let options = self.option_totals(poll.id).await?;
            details.push(PollDetail {
                id: poll.id,
                question: poll.question,
                creator_id: poll.creator_id,
                status: poll.status,
                created_at: poll.created_at,
                message_id: poll.message_id,
                closes_at: poll.closes_at,
                options,
            });
        }
        Ok(details)
    }

    /// Every poll ever, compact form, newest first.
    pub async fn list_all(&self) -> Result<Vec<PollSummaryRow>> {
        let rows = sqlx::query_as::<_, PollSummaryRow>(
            "SELECT id, question, status, creator_id FROM polls ORDER BY id DESC",
        )
        .fetch_all(self.db.reader())
        .await?;
        Ok(rows)
    }

    /// Per-bettor breakdown in placement order.
    pub async fn bets_for_poll(&self, poll_id: i64) -> Result<Vec<BetView>> {
        let bets = sqlx::query_as::<_, BetView>(
            "SELECT b.option_id, b.amount, u.username
             FROM bets b JOIN users u ON u.id = b.user_id
             WHERE b.poll_id = ? ORDER BY b.created_at",
        )
        .bind(poll_id)
        .fetch_all(self.db.reader())
        .await?;
        Ok(bets)
    }

    /// Remember (or clear) the outward announcement handle for a poll.
    pub async fn set_message_id(&self, poll_id: i64, message_id: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE polls SET message_id = ? WHERE id = ?")
            .bind(message_id)
            .bind(poll_id)
            .execute(self.db.writer())
            .await?;
        Ok(())
    }

    /// Render the poll state for the notification collaborator: question,
    /// per-option totals, per-bettor breakdown, pool size and deadline.
    /// `None` when the poll does not exist.
    pub async fn poll_summary(&self, poll_id: i64) -> Result<Option<String>> {
        let Some(detail) = self.poll_detail(poll_id).await? else {
            return Ok(None);
        };
        let bets = self.bets_for_poll(poll_id).await?;

        let mut text = format!("🎲 <b>{}</b>\n", detail.question);
        match detail.status {
            PollStatus::AcceptingBets => {
                text.push_str(&format!(
                    "Bets close at {} UTC\n",
                    detail.closes_at.format("%H:%M")
                ));
            }
            PollStatus::VotingClosed => text.push_str("Betting is closed, awaiting result\n"),
            PollStatus::Resolved => text.push_str("Resolved\n"),
        }
        text.push('\n');

        for (i, option) in detail.options.iter().enumerate() {
            text.push_str(&format!(
                "{}. {} — {} staked\n",
                i + 1,
                option.option_text,
                option.total_bet
            ));
            for bet in bets.iter().filter(|b| b.option_id == option.id) {
                text.push_str(&format!("    • {}: {}\n", bet.username, bet.amount));
            }
        }

        text.push_str(&format!("\nPool: {}", detail.pool()));
        Ok(Some(text))
    }

    async fn option_totals(&self, poll_id: i64) -> Result<Vec<OptionTotal>> {
        let options = sqlx::query_as::<_, OptionTotal>(
            "SELECT po.id, po.option_text, IFNULL(SUM(b.amount), 0) AS total_bet
             FROM poll_options po LEFT JOIN bets b ON b.option_id = po.id
             WHERE po.poll_id = ? GROUP BY po.id ORDER BY po.id",
        )
        .bind(poll_id)
        .fetch_all(self.db.reader())
        .await?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Accounts;
    use crate::storage::testutil::temp_db;
    use crate::storage::Database;

    async fn setup() -> (Database, Accounts, PollEngine, tempfile::TempDir) {
        let (db, dir) = temp_db().await;
        let accounts = Accounts::new(db.clone());
        let engine = PollEngine::new(db.clone());
        for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            accounts.ensure_user(id, Some(name)).await.unwrap();
        }
        (db, accounts, engine, dir)
    }

    async fn two_option_poll(engine: &PollEngine) -> (i64, i64, i64) {
        let poll_id = engine
            .create_poll(1, "Who wins tonight?", &["Red".into(), "Blue".into()])
            .await
            .unwrap();
        let detail = engine.poll_detail(poll_id).await.unwrap().unwrap();
        (poll_id, detail.options[0].id, detail.options[1].id)
    }

    #[tokio::test]
    async fn create_poll_requires_two_options() {
        let (_db, _accounts, engine, _dir) = setup().await;
        let err = engine
            .create_poll(1, "Trivial?", &["Only".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::InvalidOptions));
    }

    #[tokio::test]
    async fn create_poll_sets_deadline_and_status() {
        let (_db, _accounts, engine, _dir) = setup().await;
        let (poll_id, _, _) = two_option_poll(&engine).await;
        let detail = engine.poll_detail(poll_id).await.unwrap().unwrap();
        assert_eq!(detail.status, PollStatus::AcceptingBets);
        assert_eq!(detail.options.len(), 2);
        let offset = detail.closes_at - detail.created_at;
        assert_eq!(offset.num_minutes(), DEFAULT_CLOSE_AFTER_MINUTES);
    }

    #[tokio::test]
    async fn place_bet_debits_and_logs_atomically() {
        let (db, accounts, engine, _dir) = setup().await;
        let (poll_id, red, _) = two_option_poll(&engine).await;

        engine.place_bet(1, poll_id, red, 100).await.unwrap();

        let user = accounts.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.balance, 900);
        assert_eq!(db.transaction_sum(1).await.unwrap(), -100);

        let detail = engine.poll_detail(poll_id).await.unwrap().unwrap();
        assert_eq!(detail.pool(), 100);
    }

    #[tokio::test]
    async fn duplicate_bet_is_rejected_whatever_the_option() {
        let (_db, _accounts, engine, _dir) = setup().await;
        let (poll_id, red, blue) = two_option_poll(&engine).await;

        engine.place_bet(1, poll_id, red, 100).await.unwrap();
        let err = engine.place_bet(1, poll_id, blue, 50).await.unwrap_err();
        assert!(matches!(err, BotError::DuplicateBet));
    }

    #[tokio::test]
    async fn bet_rejections_leave_balance_untouched() {
        let (_db, accounts, engine, _dir) = setup().await;
        let (poll_id, red, _) = two_option_poll(&engine).await;

        assert!(matches!(
            engine.place_bet(1, poll_id, red, 0).await.unwrap_err(),
            BotError::InvalidAmount
        ));
        assert!(matches!(
            engine.place_bet(1, poll_id, red, -5).await.unwrap_err(),
            BotError::InvalidAmount
        ));
        assert!(matches!(
            engine.place_bet(1, poll_id, red, 5000).await.unwrap_err(),
            BotError::InsufficientBalance
        ));
        assert!(matches!(
            engine.place_bet(99, poll_id, red, 10).await.unwrap_err(),
            BotError::UserNotFound
        ));
        assert!(matches!(
            engine.place_bet(1, 777, red, 10).await.unwrap_err(),
            BotError::PollNotFound
        ));

        let user = accounts.get_user(1).await.unwrap().unwrap();
        assert_eq!(user.balance, 1000);
    }

    #[tokio::test]
    async fn bet_on_foreign_option_is_rejected() {
        let (_db, _accounts, engine, _dir) = setup().await;
        let (poll_a, _, _) = two_option_poll(&engine).await;
        let (_, other_red, _) = two_option_poll(&engine).await;

        let err = engine.place_bet(1, poll_a, other_red, 10).await.unwrap_err();
        assert!(matches!(err, BotError::OptionNotInPoll));
    }

    #[tokio::test]
    async fn past_deadline_means_betting_closed() {
        let (db, _accounts, engine, _dir) = setup().await;
        let stale = PollEngine::new(db).with_close_after(Duration::seconds(-1));
        let poll_id = stale
            .create_poll(1, "Too late?", &["Yes".into(), "No".into()])
            .await
            .unwrap();
        let detail = stale.poll_detail(poll_id).await.unwrap().unwrap();

        let err = engine
            .place_bet(1, poll_id, detail.options[0].id, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::BettingClosed));
    }

    #[tokio::test]
    async fn auto_close_flips_due_polls_only() {
        let (db, _accounts, engine, _dir) = setup().await;
        let stale = PollEngine::new(db).with_close_after(Duration::seconds(-1));

        let due = stale
            .create_poll(1, "Due?", &["A".into(), "B".into()])
            .await
            .unwrap();
        let (fresh, _, _) = two_option_poll(&engine).await;

        let closed = engine.auto_close_due_polls().await.unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].id, due);

        let due_detail = engine.poll_detail(due).await.unwrap().unwrap();
        assert_eq!(due_detail.status, PollStatus::VotingClosed);
        let fresh_detail = engine.poll_detail(fresh).await.unwrap().unwrap();
        assert_eq!(fresh_detail.status, PollStatus::AcceptingBets);

        // A second sweep finds nothing new.
        assert!(engine.auto_close_due_polls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bets_are_rejected_after_auto_close() {
        let (db, _accounts, engine, _dir) = setup().await;
        let stale = PollEngine::new(db).with_close_after(Duration::seconds(-1));
        let poll_id = stale
            .create_poll(1, "Closed?", &["A".into(), "B".into()])
            .await
            .unwrap();
        engine.auto_close_due_polls().await.unwrap();

        let detail = engine.poll_detail(poll_id).await.unwrap().unwrap();
        let err = engine
            .place_bet(2, poll_id, detail.options[0].id, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::BettingClosed));
    }

    #[tokio::test]
    async fn resolve_pays_winner_full_pool_in_two_way_head_to_head() {
        let (_db, accounts, engine, _dir) = setup().await;
        let (poll_id, red, blue) = two_option_poll(&engine).await;

        engine.place_bet(1, poll_id, red, 100).await.unwrap();
        engine.place_bet(2, poll_id, blue, 100).await.unwrap();

        let outcome = engine.resolve(1, poll_id, red).await.unwrap();
        assert_eq!(outcome.pool, 200);
        assert_eq!(outcome.win_total, 100);
        assert_eq!(outcome.winning_option_text, "Red");
        assert_eq!(outcome.winners.len(), 1);
        assert_eq!(outcome.winners[0].username, "alice");
        assert_eq!(outcome.winners[0].payout, 200);

        let alice = accounts.get_user(1).await.unwrap().unwrap();
        assert_eq!(alice.balance, 1100);
        assert_eq!(alice.wins, 1);
        assert_eq!(alice.losses, 0);

        let bob = accounts.get_user(2).await.unwrap().unwrap();
        assert_eq!(bob.balance, 900);
        assert_eq!(bob.wins, 0);
        assert_eq!(bob.losses, 1);

        let detail = engine.poll_detail(poll_id).await.unwrap().unwrap();
        assert_eq!(detail.status, PollStatus::Resolved);
        assert_eq!(detail.message_id, None);
    }

    #[tokio::test]
    async fn all_winners_get_double_stake_not_a_pool_split() {
        let (_db, accounts, engine, _dir) = setup().await;
        let (poll_id, red, _) = two_option_poll(&engine).await;

        engine.place_bet(1, poll_id, red, 100).await.unwrap();
        engine.place_bet(2, poll_id, red, 100).await.unwrap();

        let outcome = engine.resolve(1, poll_id, red).await.unwrap();
        assert_eq!(outcome.pool, 200);
        assert_eq!(outcome.win_total, 200);
        for winner in &outcome.winners {
            assert_eq!(winner.payout, 200);
        }
        assert_eq!(accounts.get_user(1).await.unwrap().unwrap().balance, 1100);
        assert_eq!(accounts.get_user(2).await.unwrap().unwrap().balance, 1100);
    }

    #[tokio::test]
    async fn nobody_right_means_pool_is_forfeit() {
        let (_db, accounts, engine, _dir) = setup().await;
        let (poll_id, red, blue) = two_option_poll(&engine).await;

        engine.place_bet(1, poll_id, red, 100).await.unwrap();
        engine.place_bet(2, poll_id, red, 50).await.unwrap();

        let outcome = engine.resolve(1, poll_id, blue).await.unwrap();
        assert_eq!(outcome.pool, 150);
        assert_eq!(outcome.win_total, 0);
        assert!(outcome.winners.is_empty());

        let alice = accounts.get_user(1).await.unwrap().unwrap();
        assert_eq!(alice.balance, 900);
        assert_eq!(alice.losses, 1);
        let bob = accounts.get_user(2).await.unwrap().unwrap();
        assert_eq!(bob.balance, 950);
        assert_eq!(bob.losses, 1);
    }

    #[tokio::test]
    async fn floor_division_keeps_the_remainder() {
        let (_db, _accounts, engine, _dir) = setup().await;
        let (poll_id, red, blue) = two_option_poll(&engine).await;

        engine.place_bet(1, poll_id, red, 100).await.unwrap();
        engine.place_bet(2, poll_id, red, 50).await.unwrap();
        engine.place_bet(3, poll_id, blue, 100).await.unwrap();

        let outcome = engine.resolve(1, poll_id, red).await.unwrap();
        assert_eq!(outcome.pool, 250);
        assert_eq!(outcome.win_total, 150);

        // 100 * 250 / 150 = 166.66 -> 166, 50 * 250 / 150 = 83.33 -> 83
        let paid: i64 = outcome.winners.iter().map(|w| w.payout).sum();
        assert_eq!(paid, 166 + 83);
        assert!(paid <= outcome.pool);
    }

    #[tokio::test]
    async fn resolve_twice_fails_without_double_credit() {
        let (_db, accounts, engine, _dir) = setup().await;
        let (poll_id, red, blue) = two_option_poll(&engine).await;

        engine.place_bet(1, poll_id, red, 100).await.unwrap();
        engine.place_bet(2, poll_id, blue, 100).await.unwrap();
        engine.resolve(1, poll_id, red).await.unwrap();

        let err = engine.resolve(1, poll_id, red).await.unwrap_err();
        assert!(matches!(err, BotError::AlreadyResolved));
        assert_eq!(accounts.get_user(1).await.unwrap().unwrap().balance, 1100);
    }

    #[tokio::test]
    async fn resolve_empty_poll_still_transitions() {
        let (_db, _accounts, engine, _dir) = setup().await;
        let (poll_id, red, _) = two_option_poll(&engine).await;

        let outcome = engine.resolve(1, poll_id, red).await.unwrap();
        assert_eq!(outcome.pool, 0);
        assert!(outcome.winners.is_empty());
        let detail = engine.poll_detail(poll_id).await.unwrap().unwrap();
        assert_eq!(detail.status, PollStatus::Resolved);
    }

    #[tokio::test]
    async fn resolve_rejects_foreign_option() {
        let (_db, _accounts, engine, _dir) = setup().await;
        let (poll_a, _, _) = two_option_poll(&engine).await;
        let (_, other_red, _) = two_option_poll(&engine).await;

        let err = engine.resolve(1, poll_a, other_red).await.unwrap_err();
        assert!(matches!(err, BotError::OptionNotInPoll));
        assert!(matches!(
            engine.resolve(1, 999, other_red).await.unwrap_err(),
            BotError::PollNotFound
        ));
    }

    #[tokio::test]
    async fn concurrent_bets_all_land_and_pool_adds_up() {
        let (_db, accounts, engine, _dir) = setup().await;
        let (poll_id, red, blue) = two_option_poll(&engine).await;

        for id in 4..=13 {
            accounts
                .ensure_user(id, Some(&format!("user{id}")))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for id in 4..=13 {
            let engine = engine.clone();
            let option = if id % 2 == 0 { red } else { blue };
            let amount = 10 * (id - 3);
            handles.push(tokio::spawn(async move {
                engine.place_bet(id, poll_id, option, amount).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // 10 + 20 + ... + 100
        let detail = engine.poll_detail(poll_id).await.unwrap().unwrap();
        assert_eq!(detail.pool(), 550);

        for id in 4..=13 {
            let user = accounts.get_user(id).await.unwrap().unwrap();
            assert_eq!(user.balance, 1000 - 10 * (id - 3));
        }
    }

    #[tokio::test]
    async fn poll_summary_shows_totals_and_bettors() {
        let (_db, _accounts, engine, _dir) = setup().await;
        let (poll_id, red, _) = two_option_poll(&engine).await;
        engine.place_bet(1, poll_id, red, 100).await.unwrap();

        let summary = engine.poll_summary(poll_id).await.unwrap().unwrap();
        assert!(summary.contains("Who wins tonight?"));
        assert!(summary.contains("Red — 100 staked"));
        assert!(summary.contains("alice: 100"));
        assert!(summary.contains("Pool: 100"));

        assert!(engine.poll_summary(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listings_filter_by_status() {
        let (_db, _accounts, engine, _dir) = setup().await;
        let (open_poll, _, _) = two_option_poll(&engine).await;
        let (resolved_poll, red, _) = two_option_poll(&engine).await;
        engine.resolve(1, resolved_poll, red).await.unwrap();

        let open = engine.list_open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, open_poll);

        let all = engine.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, resolved_poll); // newest first
    }
}
