//! Configuration loading
//!
//! Layers a TOML file with `TOTO_`-prefixed environment variables, so the
//! bot token can stay out of the checked-in config.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub betting: BettingConfig,
    /// Absent means the chat surface and notifications are disabled.
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite file; `~` expands.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Drop and recreate the database on startup. Deployment escape hatch
    /// for throwaway environments.
    #[serde(default)]
    pub recreate_on_startup: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            recreate_on_startup: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BettingConfig {
    /// Balance granted to a user on first contact.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: i64,
    /// Minutes from creation until a poll stops accepting bets.
    #[serde(default = "default_poll_close_minutes")]
    pub poll_close_minutes: i64,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            poll_close_minutes: default_poll_close_minutes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Group chat the bot serves; commands from other chats are ignored.
    pub chat_id: String,
    /// Users allowed to resolve any poll and credit balances.
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    #[serde(default = "default_true")]
    pub notify_errors: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// How often the deadline sweep runs.
    #[serde(default = "default_sweep_secs")]
    pub auto_close_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            auto_close_interval_secs: default_sweep_secs(),
        }
    }
}

fn default_db_path() -> String {
    "toto.db".to_string()
}

fn default_starting_balance() -> i64 {
    1000
}

fn default_poll_close_minutes() -> i64 {
    20
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_sweep_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load from a TOML file (optional) layered with `TOTO_*` env vars.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("TOTO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Database path with `~` and env vars expanded.
    pub fn database_path(&self) -> String {
        shellexpand::full(&self.database.path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| self.database.path.clone())
    }
}
