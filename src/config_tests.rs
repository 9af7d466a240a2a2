//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;

    #[test]
    fn test_database_config_defaults() {
        let config: DatabaseConfig = toml::from_str("").unwrap();
        assert_eq!(config.path, "toto.db");
        assert!(!config.recreate_on_startup);
    }

    #[test]
    fn test_betting_config_defaults() {
        let config: BettingConfig = toml::from_str("").unwrap();
        assert_eq!(config.starting_balance, 1000);
        assert_eq!(config.poll_close_minutes, 20);
    }

    #[test]
    fn test_server_config_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_scheduler_config_defaults() {
        let config: SchedulerConfig = toml::from_str("").unwrap();
        assert_eq!(config.auto_close_interval_secs, 30);
    }

    #[test]
    fn test_telegram_section_is_optional() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.telegram.is_none());
    }

    #[test]
    fn test_telegram_config_defaults() {
        let toml_str = r#"
bot_token = "123:abc"
chat_id = "-100200300"
"#;
        let config: TelegramConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.chat_id, "-100200300");
        assert!(config.admin_ids.is_empty());
        assert!(config.notify_errors);
    }

    #[test]
    fn test_full_config_round_trip() {
        let toml_str = r#"
[database]
path = "~/data/toto.db"
recreate_on_startup = true

[betting]
starting_balance = 500
poll_close_minutes = 5

[telegram]
bot_token = "123:abc"
chat_id = "-100200300"
admin_ids = [11, 22]
notify_errors = false

[server]
host = "127.0.0.1"
port = 9090

[scheduler]
auto_close_interval_secs = 10
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database.path, "~/data/toto.db");
        assert!(config.database.recreate_on_startup);
        assert_eq!(config.betting.starting_balance, 500);
        assert_eq!(config.betting.poll_close_minutes, 5);

        let tg = config.telegram.unwrap();
        assert_eq!(tg.admin_ids, vec![11, 22]);
        assert!(!tg.notify_errors);

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.scheduler.auto_close_interval_secs, 10);
    }
}
