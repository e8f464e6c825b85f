//! Artifact naming shared by the dump pipeline and retention.

use chrono::{DateTime, Local, NaiveDateTime};
use regex::Regex;

/// Timestamp layout embedded in artifact file names.
///
/// Chosen so that lexical file name order matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// File extension of an artifact, depending on compression.
pub fn extension(compress: bool) -> &'static str {
    if compress {
        "sql.gz"
    } else {
        "sql"
    }
}

/// Builds the artifact file name for a run started at `timestamp`.
///
/// The timestamp is sampled once by the caller and reused for logging and
/// notifications, so a single run never carries two different times.
pub fn artifact_name(database: &str, timestamp: &DateTime<Local>, compress: bool) -> String {
    format!(
        "{database}-{}.{}",
        timestamp.format(TIMESTAMP_FORMAT),
        extension(compress)
    )
}

/// Extracts the embedded timestamp from an artifact file name.
///
/// Returns [None] for names that don't follow the artifact pattern; such
/// files are ignored by retention instead of failing the whole sweep.
pub fn parse_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let re = Regex::new(r"^.+-(\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2})\.sql(\.gz)?$").unwrap();
    let captures = re.captures(file_name)?;

    NaiveDateTime::parse_from_str(&captures[1], TIMESTAMP_FORMAT).ok()
}
