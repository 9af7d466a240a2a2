//! Toto Bot
//!
//! Pari-mutuel betting bot for group chats, with an HTTP API for the
//! companion mini-app.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use toto_bot::{
    account::Accounts,
    chests::ChestShop,
    config::Config,
    notify::Notifier,
    polls::PollEngine,
    rating,
    scheduler::Scheduler,
    server::{self, AppState},
    storage::Database,
    telegram::{BotCommand, CommandHandler, TelegramBot},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "toto-bot")]
#[command(about = "Pari-mutuel betting bot for group chats")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot and the mini-app API
    Run,
    /// Print the leaderboard
    Rating {
        /// Number of rows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// List polls with their status
    Polls,
    /// Credit (or debit, with a negative amount) a user's balance
    Credit {
        /// Target user id
        user_id: i64,
        /// Amount to add; may be negative
        amount: i64,
    },
    /// Test Telegram notification
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Rating { limit } => show_rating(config, limit).await,
        Commands::Polls => show_polls(config).await,
        Commands::Credit { user_id, amount } => credit_user(config, user_id, amount).await,
        Commands::TestNotify => test_notify(config).await,
    }
}

async fn connect_db(config: &Config) -> anyhow::Result<Database> {
    let db = Database::connect_with(
        &config.database_path(),
        config.database.recreate_on_startup,
    )
    .await?;
    Ok(db)
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting toto bot");

    let notifier = if let Some(tg) = &config.telegram {
        Notifier::new(tg.bot_token.clone(), tg.chat_id.clone())
            .with_error_reports(tg.notify_errors)
    } else {
        tracing::warn!("Telegram not configured, notifications disabled");
        Notifier::disabled()
    };

    let db = connect_db(&config).await?;
    let accounts = Accounts::new(db.clone()).with_starting_balance(config.betting.starting_balance);
    let polls = PollEngine::new(db.clone())
        .with_close_after(chrono::Duration::minutes(config.betting.poll_close_minutes));
    let chests = ChestShop::new(db.clone());

    // Command channel between the Telegram listener and the handler loop
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<BotCommand>(100);

    if let Some(tg) = &config.telegram {
        let telegram_bot = Arc::new(TelegramBot::new(
            tg.bot_token.clone(),
            tg.chat_id.clone(),
            cmd_tx,
        ));
        tokio::spawn(telegram_bot.start_polling());
        tracing::info!("Telegram command listener started");
    }

    let admin_ids = config
        .telegram
        .as_ref()
        .map(|tg| tg.admin_ids.clone())
        .unwrap_or_default();
    let handler = Arc::new(CommandHandler::new(
        accounts.clone(),
        polls.clone(),
        chests.clone(),
        db.clone(),
        notifier.clone(),
        admin_ids,
    ));

    let handler_clone = handler.clone();
    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            handler_clone.handle(cmd).await;
        }
    });

    // Deadline sweep
    let scheduler = Arc::new(Scheduler::new(
        polls.clone(),
        notifier.clone(),
        config.scheduler.auto_close_interval_secs,
    ));
    tokio::spawn(scheduler.run());

    // Mini-app API blocks until shutdown
    let state = Arc::new(AppState {
        accounts,
        polls,
        chests,
        db,
    });
    server::serve(state, &config.server.host, config.server.port).await
}

async fn show_rating(config: Config, limit: usize) -> anyhow::Result<()> {
    let db = connect_db(&config).await?;
    let entries = rating::get_rating(&db, Some(limit)).await?;

    println!("{:<4} {:<20} {:>8} {:>6} {:>6} {:>8}", "#", "user", "winrate", "wins", "losses", "balance");
    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{:<4} {:<20} {:>7.2}% {:>6} {:>6} {:>8}",
            i + 1,
            entry.username,
            entry.winrate,
            entry.wins,
            entry.losses,
            entry.balance
        );
    }
    Ok(())
}

async fn show_polls(config: Config) -> anyhow::Result<()> {
    let db = connect_db(&config).await?;
    let polls = PollEngine::new(db);

    for row in polls.list_all().await? {
        println!("#{:<4} [{}] {}", row.id, row.status, row.question);
    }
    Ok(())
}

async fn credit_user(config: Config, user_id: i64, amount: i64) -> anyhow::Result<()> {
    let db = connect_db(&config).await?;
    let accounts = Accounts::new(db).with_starting_balance(config.betting.starting_balance);

    let user = accounts.add_balance(user_id, amount).await?;
    println!(
        "{} credited {:+}, new balance {}",
        user.username, amount, user.balance
    );
    Ok(())
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let Some(tg) = &config.telegram else {
        anyhow::bail!("telegram is not configured");
    };
    let notifier = Notifier::new(tg.bot_token.clone(), tg.chat_id.clone());
    notifier.send("🔔 Test notification from toto-bot").await?;
    println!("Notification sent");
    Ok(())
}
