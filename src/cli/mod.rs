//! Command line and environment configuration.
//!
//! Every flag can also be supplied through the environment variable named
//! in its help text, matching the container-oriented deployment of this
//! tool. Ranged values (port, backup cap, interval, compression level)
//! are rejected by clap at startup; cross-field rules live in
//! [Cli::validate].

use std::io;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use derive_more::{Display, Error};
use log::LevelFilter;

/// Periodically dumps one PostgreSQL database, rotates old backups and
/// reports the outcome.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the log output.
    #[arg(long)]
    pub verbose: Option<LevelFilter>,

    /// Database host.
    #[arg(long, env = "HOST", default_value = "localhost")]
    pub host: String,

    /// Database port.
    #[arg(long, env = "PORT", default_value_t = 5432)]
    pub port: u16,

    /// Database user.
    #[arg(long, env = "USER")]
    pub user: String,

    /// Database password, handed to the dump process via its environment.
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Name of the database to back up.
    #[arg(long, env = "DATABASE")]
    pub database: String,

    /// Folder for backup artifacts, created at startup if absent.
    #[arg(long = "dir", short = 'r', env = "BACKUP_DIR", default_value = "backups")]
    pub backup_dir: PathBuf,

    /// Maximum number of backups to keep.
    #[arg(
        long,
        env = "MAX_BACKUP_COUNT",
        default_value_t = 10,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub max_backup_count: u8,

    /// Seconds between backup runs.
    #[arg(
        long = "interval-seconds",
        env = "INTERVAL_SECONDS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub interval_seconds: u32,

    /// Compress backups with gzip.
    #[arg(long, env = "COMPRESS", default_value_t = true, action = ArgAction::Set)]
    pub compress: bool,

    /// Gzip compression level: -1 for the default, -2 for the fastest
    /// mode, 0 to 9 for an explicit level.
    #[arg(
        long,
        env = "COMPRESSION_LEVEL",
        default_value_t = -1,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i32).range(-2..=9)
    )]
    pub compression_level: i32,

    /// Webhook URL to POST success/failure events to.
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Telegram bot token for chat notifications.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat the bot posts notifications to.
    #[arg(long = "telegram-chat-id", env = "CHANNEL_ID")]
    pub telegram_chat_id: Option<String>,
}

#[derive(Debug, Display, Error)]
/// Invalid startup parameters; the process refuses to start.
pub enum ConfigError {
    /// The database password is missing or blank.
    #[display("database password is required")]
    MissingPassword,
    /// Telegram notifications were only half-configured.
    #[display("telegram notifications need both a bot token and a chat id")]
    IncompleteTelegram,
    /// Webhook and telegram notifications exclude each other.
    #[display("configure either a webhook url or telegram credentials, not both")]
    ConflictingSinks,
    /// The dump command is not installed.
    #[display("pg_dump not found in PATH")]
    DumpCommandNotFound,
    /// The backup directory can't be created.
    #[display("backup directory is unusable: {_0}")]
    BackupDirUnusable(io::Error),
}

impl Cli {
    /// Cross-field checks clap can't express; run once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.password.trim().is_empty() {
            return Err(ConfigError::MissingPassword);
        }

        if self.telegram_bot_token.is_some() != self.telegram_chat_id.is_some() {
            return Err(ConfigError::IncompleteTelegram);
        }

        if self.webhook_url.is_some() && self.telegram_bot_token.is_some() {
            return Err(ConfigError::ConflictingSinks);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        let mut args = vec![
            "db_guard",
            "--user",
            "postgres",
            "--password",
            "hunter2",
            "--database",
            "shop",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args)
    }

    #[test]
    fn defaults_match_the_documented_surface() {
        let cli = parse(&["--host", "localhost"]).unwrap();
        assert_eq!(cli.port, 5432);
        assert_eq!(cli.max_backup_count, 10);
        assert_eq!(cli.interval_seconds, 60);
        assert!(cli.compress);
        assert_eq!(cli.compression_level, -1);
    }

    #[test]
    fn compression_level_aliases_parse() {
        assert_eq!(parse(&["--compression-level", "-1"]).unwrap().compression_level, -1);
        assert_eq!(parse(&["--compression-level", "-2"]).unwrap().compression_level, -2);
        assert_eq!(parse(&["--compression-level", "9"]).unwrap().compression_level, 9);
    }

    #[test]
    fn out_of_range_compression_levels_are_rejected_at_startup() {
        assert!(parse(&["--compression-level", "15"]).is_err());
        assert!(parse(&["--compression-level", "-5"]).is_err());
    }

    #[test]
    fn backup_cap_and_interval_bounds_are_enforced() {
        assert!(parse(&["--max-backup-count", "0"]).is_err());
        assert!(parse(&["--max-backup-count", "101"]).is_err());
        assert!(parse(&["--interval-seconds", "0"]).is_err());
        assert!(parse(&["--max-backup-count", "100"]).is_ok());
    }

    #[test]
    fn blank_password_fails_validation() {
        let mut cli = parse(&[]).unwrap();
        cli.password = "   ".into();
        assert!(matches!(cli.validate(), Err(ConfigError::MissingPassword)));
    }

    #[test]
    fn half_configured_telegram_fails_validation() {
        let cli = parse(&["--telegram-bot-token", "123:abc"]).unwrap();
        assert!(matches!(cli.validate(), Err(ConfigError::IncompleteTelegram)));
    }

    #[test]
    fn webhook_and_telegram_exclude_each_other() {
        let cli = parse(&[
            "--webhook-url",
            "https://hooks.example/backup",
            "--telegram-bot-token",
            "123:abc",
            "--telegram-chat-id",
            "42",
        ])
        .unwrap();
        assert!(matches!(cli.validate(), Err(ConfigError::ConflictingSinks)));
    }

    #[test]
    fn fully_configured_cli_validates() {
        let cli = parse(&["--webhook-url", "https://hooks.example/backup"]).unwrap();
        assert!(cli.validate().is_ok());
    }
}
