use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use db_guard_lib::cli::{Cli, ConfigError};
use db_guard_lib::dump::{BackupTarget, DumpPipeline};
use db_guard_lib::notify::{Sink, Telegram, Webhook};
use db_guard_lib::registry::RunStateRegistry;
use db_guard_lib::scheduler::{ScheduleConfig, Scheduler};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // init logger
    let mut env_logger = env_logger::builder();
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    env_logger.try_init().expect("env_logger should not fail");

    if let Err(e) = run(cli).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ConfigError> {
    cli.validate()?;

    let program = which::which("pg_dump").map_err(|_| ConfigError::DumpCommandNotFound)?;
    log::debug!("Found pg_dump at {}", program.display());

    fs::create_dir_all(&cli.backup_dir).map_err(ConfigError::BackupDirUnusable)?;

    let sink = match (&cli.webhook_url, &cli.telegram_bot_token, &cli.telegram_chat_id) {
        (Some(url), _, _) => Sink::Webhook(Webhook::new(url.clone())),
        (None, Some(token), Some(chat_id)) => {
            Sink::Telegram(Telegram::new(token.clone(), chat_id.clone()))
        }
        _ => {
            log::debug!("No notification sink configured");
            Sink::Disabled
        }
    };

    let target = BackupTarget {
        host: cli.host,
        port: cli.port,
        user: cli.user,
        password: cli.password,
        database: cli.database,
    };

    log::info!(
        "Backing up \"{}\" every {}s into {}, keeping the {} most recent backup(s)",
        target.database,
        cli.interval_seconds,
        cli.backup_dir.display(),
        cli.max_backup_count
    );

    let scheduler = Scheduler::new(
        DumpPipeline::new(program, target),
        Arc::new(RunStateRegistry::new()),
        sink,
        ScheduleConfig {
            backup_dir: cli.backup_dir,
            interval: Duration::from_secs(cli.interval_seconds.into()),
            max_backup_count: cli.max_backup_count.into(),
            compress: cli.compress,
            compression_level: cli.compression_level,
        },
    );

    scheduler.run().await
}
