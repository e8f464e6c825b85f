//! Rotation of old backup artifacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use derive_more::{Display, Error, From};

use crate::dump::parse_timestamp;

#[derive(Debug, Display, Error, From)]
/// Listing the backup directory failed; nothing was deleted.
#[display("listing backup directory failed: {_0}")]
pub struct SweepError(io::Error);

/// Deletes the oldest artifacts in `directory` beyond `max_count`.
///
/// Ordering follows the timestamp embedded in the file name, never the
/// filesystem modification time, which copies and restores can alter.
/// Ties are broken by lexical file name order. Files whose names don't
/// match the artifact pattern are left alone, and individual deletion
/// failures are logged and skipped; the next sweep retries them.
///
/// Running a sweep twice without new artifacts deletes nothing the second
/// time.
pub fn sweep(directory: &Path, max_count: usize) -> Result<(), SweepError> {
    let mut artifacts = list_artifacts(directory)?;
    log::debug!(
        target: "retention",
        "Found {} artifact(s) in {} (allowed: {max_count})",
        artifacts.len(),
        directory.display()
    );

    if artifacts.len() <= max_count {
        return Ok(());
    }

    artifacts.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.path.cmp(&b.path)));

    let excess = artifacts.len() - max_count;
    for artifact in artifacts.into_iter().take(excess) {
        match fs::remove_file(&artifact.path) {
            Ok(()) => {
                log::info!(target: "retention", "Deleted old backup artifact: {}", artifact.path.display());
            }
            Err(e) => {
                log::warn!(target: "retention", "Deleting {} failed: {e}", artifact.path.display());
            }
        }
    }

    Ok(())
}

struct Artifact {
    timestamp: NaiveDateTime,
    path: PathBuf,
}

fn list_artifacts(directory: &Path) -> Result<Vec<Artifact>, SweepError> {
    let mut artifacts = Vec::new();

    for entry in fs::read_dir(directory).map_err(SweepError)? {
        let entry = entry.map_err(SweepError)?;
        if !entry.file_type().map_err(SweepError)?.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        // A malformed name is not this component's concern.
        let Some(timestamp) = file_name.to_str().and_then(parse_timestamp) else {
            continue;
        };

        artifacts.push(Artifact {
            timestamp,
            path: entry.path(),
        });
    }

    Ok(artifacts)
}
