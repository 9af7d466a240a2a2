//! Telegram bot for receiving betting commands
//!
//! Supports commands like /newpoll, /bet, /resolve, /balance, /rating,
//! /chests. This layer owns all free-text parsing and the admin allowlist;
//! the ledger core only ever sees validated, well-typed arguments.

use crate::account::Accounts;
use crate::chests::ChestShop;
use crate::error::{BotError, Result};
use crate::notify::Notifier;
use crate::polls::PollEngine;
use crate::rating;
use crate::storage::Database;
use crate::types::PollDetail;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Telegram long-poll listener that turns chat messages into [`BotCommand`]s.
pub struct TelegramBot {
    http: Client,
    bot_token: String,
    chat_id: String,
    last_update_id: RwLock<i64>,
    command_tx: mpsc::Sender<BotCommand>,
}

/// A validated chat command with the caller's identity attached.
#[derive(Debug, Clone)]
pub enum BotCommand {
    /// Register the user and show help
    Start { user_id: i64, username: Option<String> },
    /// Create a poll: question plus `|`-separated options
    NewPoll {
        user_id: i64,
        username: Option<String>,
        question: String,
        options: Vec<String>,
    },
    /// Stake on a poll option (option given by number or text)
    Bet {
        user_id: i64,
        username: Option<String>,
        poll_id: i64,
        option: String,
        amount: i64,
    },
    /// Settle a poll in favor of an option
    Resolve {
        user_id: i64,
        poll_id: i64,
        option: String,
    },
    /// Show the caller's balance and record
    Balance { user_id: i64, username: Option<String> },
    /// Leaderboard
    Rating { limit: Option<usize> },
    /// List open polls
    Polls,
    /// Chest catalog
    Chests,
    /// Buy and open a chest
    OpenChest {
        user_id: i64,
        username: Option<String>,
        chest_id: i64,
    },
    /// Admin balance credit
    Credit {
        admin_id: i64,
        target: String,
        amount: i64,
    },
    /// Help
    Help,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    from: Option<TelegramUser>,
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    first_name: String,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    #[allow(dead_code)]
    ok: bool,
    result: Vec<TelegramUpdate>,
}

impl TelegramBot {
    pub fn new(bot_token: String, chat_id: String, command_tx: mpsc::Sender<BotCommand>) -> Self {
        Self {
            http: Client::new(),
            bot_token,
            chat_id,
            last_update_id: RwLock::new(0),
            command_tx,
        }
    }

    /// Start polling for updates
    pub async fn start_polling(self: Arc<Self>) {
        tracing::info!("Starting Telegram command listener...");

        loop {
            match self.poll_updates().await {
                Ok(updates) => {
                    for update in updates {
                        if let Some(msg) = update.message {
                            // Only process messages from the configured chat
                            if msg.chat.id.to_string() == self.chat_id {
                                if let (Some(from), Some(text)) = (msg.from, msg.text) {
                                    self.handle_message(&from, &text).await;
                                }
                            }
                        }

                        let mut last_id = self.last_update_id.write().await;
                        *last_id = update.update_id + 1;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to poll Telegram updates: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
        }
    }

    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let last_id = *self.last_update_id.read().await;

        let url = format!(
            "https://api.telegram.org/bot{}/getUpdates?offset={}&timeout=30",
            self.bot_token, last_id
        );

        let response: GetUpdatesResponse = self.http.get(&url).send().await?.json().await?;
        Ok(response.result)
    }

    async fn handle_message(&self, from: &TelegramUser, text: &str) {
        let text = text.trim();

        let (cmd, args) = if let Some(stripped) = text.strip_prefix('/') {
            let parts: Vec<&str> = stripped.splitn(2, ' ').collect();
            let cmd = parts[0].split('@').next().unwrap_or(parts[0]); // Remove @botname
            let args = parts.get(1).map(|s| s.trim()).unwrap_or("");
            (cmd, args)
        } else {
            return; // Ignore non-commands
        };

        tracing::info!(user_id = from.id, "Received command: /{} {}", cmd, args);

        let username = from
            .username
            .clone()
            .or_else(|| Some(from.first_name.clone()));

        let command = match cmd.to_lowercase().as_str() {
            "start" => Some(BotCommand::Start {
                user_id: from.id,
                username,
            }),
            "help" => Some(BotCommand::Help),
            "newpoll" => parse_newpoll(from.id, username, args),
            "bet" => parse_bet(from.id, username, args),
            "resolve" => parse_resolve(from.id, args),
            "balance" => Some(BotCommand::Balance {
                user_id: from.id,
                username,
            }),
            "rating" => Some(BotCommand::Rating {
                limit: args.parse().ok(),
            }),
            "polls" => Some(BotCommand::Polls),
            "chests" => Some(BotCommand::Chests),
            "open" => args.parse().ok().map(|chest_id| BotCommand::OpenChest {
                user_id: from.id,
                username,
                chest_id,
            }),
            "credit" => parse_credit(from.id, args),
            _ => None,
        };

        match command {
            Some(command) => {
                let _ = self.command_tx.send(command).await;
            }
            None => {
                tracing::debug!("ignoring malformed command: /{} {}", cmd, args);
            }
        }
    }
}

fn parse_newpoll(user_id: i64, username: Option<String>, args: &str) -> Option<BotCommand> {
    let mut parts = args.split('|').map(|s| s.trim().to_string());
    let question = parts.next().filter(|q| !q.is_empty())?;
    let options: Vec<String> = parts.filter(|o| !o.is_empty()).collect();
    Some(BotCommand::NewPoll {
        user_id,
        username,
        question,
        options,
    })
}

fn parse_bet(user_id: i64, username: Option<String>, args: &str) -> Option<BotCommand> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }
    Some(BotCommand::Bet {
        user_id,
        username,
        poll_id: parts[0].parse().ok()?,
        option: parts[1].to_string(),
        amount: parts[2].parse().ok()?,
    })
}

fn parse_resolve(user_id: i64, args: &str) -> Option<BotCommand> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    Some(BotCommand::Resolve {
        user_id,
        poll_id: parts[0].parse().ok()?,
        option: parts[1..].join(" "),
    })
}

fn parse_credit(admin_id: i64, args: &str) -> Option<BotCommand> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    Some(BotCommand::Credit {
        admin_id,
        target: parts[0].to_string(),
        amount: parts[1].parse().ok()?,
    })
}

/// Resolve an option given by 1-based number or (case-insensitive) text to
/// its id. Convenience translation only; the core is keyed by option id.
fn resolve_option(detail: &PollDetail, token: &str) -> Option<i64> {
    if let Ok(number) = token.parse::<usize>() {
        if number >= 1 && number <= detail.options.len() {
            return Some(detail.options[number - 1].id);
        }
    }
    detail
        .options
        .iter()
        .find(|o| o.option_text.eq_ignore_ascii_case(token))
        .map(|o| o.id)
}

/// Command handler that executes chat commands against the ledger.
pub struct CommandHandler {
    accounts: Accounts,
    polls: PollEngine,
    chests: ChestShop,
    db: Database,
    notifier: Notifier,
    admin_ids: Vec<i64>,
}

impl CommandHandler {
    pub fn new(
        accounts: Accounts,
        polls: PollEngine,
        chests: ChestShop,
        db: Database,
        notifier: Notifier,
        admin_ids: Vec<i64>,
    ) -> Self {
        Self {
            accounts,
            polls,
            chests,
            db,
            notifier,
            admin_ids,
        }
    }

    fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub async fn handle(&self, cmd: BotCommand) {
        let result = self.dispatch(cmd).await;
        if let Err(e) = result {
            if e.is_business() {
                let _ = self.notifier.send(&format!("❌ {e}")).await;
            } else {
                tracing::error!("command failed: {}", e);
                let _ = self.notifier.error("Command failed", &e.to_string()).await;
            }
        }
    }

    async fn dispatch(&self, cmd: BotCommand) -> Result<()> {
        match cmd {
            BotCommand::Start { user_id, username } => {
                self.accounts.ensure_user(user_id, username.as_deref()).await?;
                self.send_help().await
            }
            BotCommand::Help => self.send_help().await,
            BotCommand::NewPoll {
                user_id,
                username,
                question,
                options,
            } => {
                self.accounts.ensure_user(user_id, username.as_deref()).await?;
                let poll_id = self.polls.create_poll(user_id, &question, &options).await?;

                // Announce after the commit; remember the handle for edits.
                if let Some(summary) = self.polls.poll_summary(poll_id).await? {
                    if let Some(message_id) = self.notifier.send(&summary).await? {
                        self.polls.set_message_id(poll_id, Some(message_id)).await?;
                    }
                }
                Ok(())
            }
            BotCommand::Bet {
                user_id,
                username,
                poll_id,
                option,
                amount,
            } => {
                self.accounts.ensure_user(user_id, username.as_deref()).await?;
                let detail = self
                    .polls
                    .poll_detail(poll_id)
                    .await?
                    .ok_or(BotError::PollNotFound)?;
                let option_id =
                    resolve_option(&detail, &option).ok_or(BotError::OptionNotInPoll)?;

                self.polls.place_bet(user_id, poll_id, option_id, amount).await?;
                self.refresh_announcement(poll_id).await;
                let _ = self.notifier.send("✅ Bet accepted").await;
                Ok(())
            }
            BotCommand::Resolve {
                user_id,
                poll_id,
                option,
            } => {
                let detail = self
                    .polls
                    .poll_detail(poll_id)
                    .await?
                    .ok_or(BotError::PollNotFound)?;
                if !self.is_admin(user_id) && detail.creator_id != user_id {
                    return Err(BotError::Unauthorized);
                }
                let option_id =
                    resolve_option(&detail, &option).ok_or(BotError::OptionNotInPoll)?;
                let message_id = detail.message_id;

                let outcome = self.polls.resolve(user_id, poll_id, option_id).await?;

                let mut text = format!(
                    "🏁 <b>{}</b>\nWinner: {}\nPool: {}\n",
                    detail.question, outcome.winning_option_text, outcome.pool
                );
                if outcome.winners.is_empty() {
                    text.push_str("Nobody picked the winning option.");
                } else {
                    for winner in &outcome.winners {
                        text.push_str(&format!("💰 {}: +{}\n", winner.username, winner.payout));
                    }
                }
                let _ = self.notifier.send(&text).await;
                if let Some(message_id) = message_id {
                    if let Ok(Some(summary)) = self.polls.poll_summary(poll_id).await {
                        let _ = self.notifier.edit_message(message_id, &summary).await;
                    }
                }
                Ok(())
            }
            BotCommand::Balance { user_id, username } => {
                self.accounts.ensure_user(user_id, username.as_deref()).await?;
                let user = self
                    .accounts
                    .get_user(user_id)
                    .await?
                    .ok_or(BotError::UserNotFound)?;
                let _ = self
                    .notifier
                    .send(&format!(
                        "💰 <b>{}</b>\nBalance: <code>{}</code>\nRecord: {}W / {}L",
                        user.username, user.balance, user.wins, user.losses
                    ))
                    .await;
                Ok(())
            }
            BotCommand::Rating { limit } => {
                let rating = rating::get_rating(&self.db, limit.or(Some(10))).await?;
                let mut text = String::from("🏆 <b>Leaderboard</b>\n\n");
                for (i, entry) in rating.iter().enumerate() {
                    text.push_str(&format!(
                        "{}. {} — {:.2}% ({}W/{}L), balance {}\n",
                        i + 1,
                        entry.username,
                        entry.winrate,
                        entry.wins,
                        entry.losses,
                        entry.balance
                    ));
                }
                let _ = self.notifier.send(&text).await;
                Ok(())
            }
            BotCommand::Polls => {
                let polls = self.polls.list_open().await?;
                if polls.is_empty() {
                    let _ = self.notifier.send("📭 No open polls").await;
                    return Ok(());
                }
                let mut text = String::from("🎲 <b>Open polls</b>\n\n");
                for poll in &polls {
                    text.push_str(&format!(
                        "#{} {} — pool {} ({})\n",
                        poll.id,
                        poll.question,
                        poll.pool(),
                        poll.status
                    ));
                }
                let _ = self.notifier.send(&text).await;
                Ok(())
            }
            BotCommand::Chests => {
                let chests = self.chests.list().await?;
                let mut text = String::from("🧰 <b>Chests</b>\n\n");
                for chest in &chests {
                    text.push_str(&format!("#{} {} — {}\n", chest.id, chest.name, chest.price));
                }
                text.push_str("\nOpen one with /open <id>");
                let _ = self.notifier.send(&text).await;
                Ok(())
            }
            BotCommand::OpenChest {
                user_id,
                username,
                chest_id,
            } => {
                self.accounts.ensure_user(user_id, username.as_deref()).await?;
                let reward = self.chests.open(user_id, chest_id).await?;
                let user = self
                    .accounts
                    .get_user(user_id)
                    .await?
                    .ok_or(BotError::UserNotFound)?;
                let _ = self
                    .notifier
                    .send(&format!(
                        "🎁 {} opened a chest and won <b>{}</b>! Balance: {}",
                        user.username, reward, user.balance
                    ))
                    .await;
                Ok(())
            }
            BotCommand::Credit {
                admin_id,
                target,
                amount,
            } => {
                if !self.is_admin(admin_id) {
                    return Err(BotError::Unauthorized);
                }
                let target_id = if let Ok(id) = target.parse::<i64>() {
                    id
                } else {
                    let name = target.trim_start_matches('@');
                    self.accounts
                        .find_by_username(name)
                        .await?
                        .ok_or(BotError::UserNotFound)?
                        .id
                };
                let user = self.accounts.add_balance(target_id, amount).await?;
                let _ = self
                    .notifier
                    .send(&format!(
                        "🏦 {} credited {:+}. New balance: {}",
                        user.username, amount, user.balance
                    ))
                    .await;
                Ok(())
            }
        }
    }

    /// Best-effort refresh of a poll's announcement message. Never touches
    /// ledger state; failures are logged and dropped.
    pub async fn refresh_announcement(&self, poll_id: i64) {
        let detail = match self.polls.poll_detail(poll_id).await {
            Ok(Some(detail)) => detail,
            _ => return,
        };
        let Some(message_id) = detail.message_id else {
            return;
        };
        match self.polls.poll_summary(poll_id).await {
            Ok(Some(summary)) => {
                if let Err(e) = self.notifier.edit_message(message_id, &summary).await {
                    tracing::warn!(poll_id, "failed to refresh announcement: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(poll_id, "failed to build summary: {}", e),
        }
    }

    async fn send_help(&self) -> Result<()> {
        let help_text = r#"🎲 <b>Toto Bot Commands</b>

<b>Polls</b>
/newpoll question | option 1 | option 2 — create a poll
/polls — list open polls
/bet &lt;poll_id&gt; &lt;option&gt; &lt;amount&gt; — stake on an option
/resolve &lt;poll_id&gt; &lt;option&gt; — settle (creator or admin)

<b>Account</b>
/balance — balance and record
/rating [n] — leaderboard

<b>Chests</b>
/chests — catalog
/open &lt;id&gt; — buy and open a chest

/help — show this message"#;

        self.notifier.send(help_text).await?;
        Ok(())
    }
}
