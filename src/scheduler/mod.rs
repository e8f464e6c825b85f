//! Periodic driver: one timer task, at most one dump run in flight.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tokio::time::{self, MissedTickBehavior};

use crate::dump::DumpPipeline;
use crate::notify::{Notification, Sink};
use crate::registry::RunStateRegistry;
use crate::retention;

/// Per-cycle parameters of the [Scheduler], fixed at startup.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub backup_dir: PathBuf,
    pub interval: Duration,
    pub max_backup_count: usize,
    pub compress: bool,
    pub compression_level: i32,
}

/// Drives backup cycles on a fixed interval.
///
/// Each run executes on its own task so a slow dump never blocks the
/// timer; a tick that finds a run still in flight skips its dump and only
/// performs the retention sweep. Missed ticks are not queued.
pub struct Scheduler {
    pipeline: Arc<DumpPipeline>,
    registry: Arc<RunStateRegistry>,
    sink: Sink,
    config: ScheduleConfig,
}

impl Scheduler {
    pub fn new(
        pipeline: DumpPipeline,
        registry: Arc<RunStateRegistry>,
        sink: Sink,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            registry,
            sink,
            config,
        }
    }

    /// Runs the timer loop forever.
    ///
    /// There is no drain or shutdown contract; run state lives in memory
    /// only and is discarded on process termination.
    pub async fn run(self) -> ! {
        let mut ticker = time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval() fires immediately; consume that so the first backup
        // happens one full period after startup, like every later one.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.cycle().await;
        }
    }

    /// One timer tick: launch a dump run if the target is idle, then sweep
    /// old artifacts.
    ///
    /// The sweep is driven by the tick rather than by run completion, so a
    /// long-running dump doesn't stall rotation of older artifacts.
    pub async fn cycle(&self) {
        log::debug!(target: "scheduler", "Starting new backup cycle");

        let database = self.pipeline.database().to_owned();
        if self.registry.try_begin(&database) {
            self.spawn_run(database);
        } else {
            log::info!(
                target: "scheduler",
                "Backup of \"{database}\" is still running, skipping this cycle"
            );
        }

        // The sweep does blocking directory i/o; keep it off the timer task.
        let backup_dir = self.config.backup_dir.clone();
        let max_backup_count = self.config.max_backup_count;
        match task::spawn_blocking(move || retention::sweep(&backup_dir, max_backup_count)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!(
                    target: "scheduler",
                    "Retention sweep of {} failed: {e}",
                    self.config.backup_dir.display()
                );
            }
            Err(e) => {
                log::error!(target: "scheduler", "Retention sweep task aborted: {e}");
            }
        }
    }

    /// Spawns one dump run with its completion handling.
    ///
    /// The run state is cleared and the notification emitted on every exit
    /// path, including a panicked run task.
    fn spawn_run(&self, database: String) {
        let pipeline = Arc::clone(&self.pipeline);
        let registry = Arc::clone(&self.registry);
        let sink = self.sink.clone();
        let backup_dir = self.config.backup_dir.clone();
        let compress = self.config.compress;
        let compression_level = self.config.compression_level;

        tokio::spawn(async move {
            // The pipeline blocks on the dump process and file i/o.
            let run = task::spawn_blocking(move || {
                pipeline.run(&backup_dir, compress, compression_level)
            })
            .await;

            // Clear the run state before anything else; a notification
            // hiccup must not wedge the target in its running state.
            registry.end(&database);

            let notification = match run {
                Ok(Ok(artifact)) => {
                    let file_name = artifact
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    Notification::success(&database, &file_name)
                }
                Ok(Err(e)) => {
                    log::error!(target: "scheduler", "Backup of \"{database}\" failed: {e}");
                    Notification::failure(&database, &e.to_string())
                }
                Err(e) => {
                    log::error!(target: "scheduler", "Backup task for \"{database}\" aborted: {e}");
                    Notification::failure(&database, "backup task aborted")
                }
            };

            sink.deliver(&notification).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use crate::dump::{parse_timestamp, BackupTarget};

    fn stub_dump(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("stub-dump");
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn scheduler(
        program: PathBuf,
        backup_dir: &Path,
        max_backup_count: usize,
    ) -> (Scheduler, Arc<RunStateRegistry>) {
        let target = BackupTarget {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: "hunter2".into(),
            database: "shop".into(),
        };
        let registry = Arc::new(RunStateRegistry::new());
        let scheduler = Scheduler::new(
            DumpPipeline::new(program, target),
            Arc::clone(&registry),
            Sink::Disabled,
            ScheduleConfig {
                backup_dir: backup_dir.to_path_buf(),
                interval: Duration::from_secs(60),
                max_backup_count,
                compress: false,
                compression_level: -1,
            },
        );

        (scheduler, registry)
    }

    fn artifacts(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .filter(|name| parse_timestamp(name).is_some())
            .collect();
        names.sort();
        names
    }

    async fn wait_until_idle(registry: &RunStateRegistry, database: &str) {
        for _ in 0..100 {
            if registry.try_begin(database) {
                registry.end(database);
                return;
            }
            time::sleep(Duration::from_millis(50)).await;
        }
        panic!("backup run never finished");
    }

    #[tokio::test]
    async fn overlapping_cycles_run_a_single_dump() {
        let tmp = tempfile::tempdir().unwrap();
        let program = stub_dump(tmp.path(), "sleep 1\necho done");
        let (scheduler, registry) = scheduler(program, tmp.path(), 10);

        scheduler.cycle().await;
        // Second tick fires while the first dump is still asleep.
        scheduler.cycle().await;

        assert!(!registry.try_begin("shop"));
        wait_until_idle(&registry, "shop").await;

        assert_eq!(artifacts(tmp.path()).len(), 1);
    }

    #[tokio::test]
    async fn completed_run_frees_the_target_for_the_next_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let program = stub_dump(tmp.path(), "echo done");
        let (scheduler, registry) = scheduler(program, tmp.path(), 10);

        scheduler.cycle().await;
        wait_until_idle(&registry, "shop").await;
    }

    #[tokio::test]
    async fn failed_run_frees_the_target_and_leaves_no_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let program = stub_dump(tmp.path(), "echo 'no space left' >&2\nexit 1");
        let (scheduler, registry) = scheduler(program, tmp.path(), 10);

        scheduler.cycle().await;
        wait_until_idle(&registry, "shop").await;

        assert!(artifacts(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn sweep_runs_even_while_a_dump_is_in_flight() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("shop-2020-01-01T00-00-00.sql"), b"old").unwrap();
        fs::write(tmp.path().join("shop-2020-01-02T00-00-00.sql"), b"old").unwrap();

        let program = stub_dump(tmp.path(), "echo done");
        let (scheduler, registry) = scheduler(program, tmp.path(), 1);

        // A run from an earlier tick is still in flight.
        assert!(registry.try_begin("shop"));

        scheduler.cycle().await;

        // The tick skipped its dump, yet rotated the old artifacts down to
        // the cap; the in-flight run is untouched.
        assert!(!registry.try_begin("shop"));
        assert_eq!(artifacts(tmp.path()), vec!["shop-2020-01-02T00-00-00.sql"]);
    }
}
