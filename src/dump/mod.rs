//! Dump pipeline: runs the external dump command and streams its output
//! into a freshly created, optionally gzip-compressed artifact file.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;

use chrono::Local;
use derive_more::{Display, Error, From};
use flate2::write::GzEncoder;

mod compression;
mod filename;

pub use compression::normalize_level;
pub use filename::{artifact_name, extension, parse_timestamp, TIMESTAMP_FORMAT};

/// Environment variable the dump command reads its credential from.
const PASSWORD_ENV: &str = "PGPASSWORD";

/// Connection coordinates of the single database this process backs up.
///
/// Built once at startup and immutable afterwards. The password is only
/// ever handed to the dump process through its environment, never through
/// argv, so it can't leak into process listings.
#[derive(Debug, Clone)]
pub struct BackupTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Display, Error, From)]
/// Errors of a single dump run.
pub enum DumpError {
    /// Creating the artifact file or waiting on the dump process failed.
    #[display("artifact i/o failed: {_0}")]
    #[from]
    Io(io::Error),
    /// The dump command exited nonzero or its output stream broke.
    ///
    /// Carries the captured stderr of the command for error reporting.
    #[display("dump command failed: {_0}")]
    DumpFailed(#[error(ignore)] String),
}

/// Streams one `pg_dump` invocation into a timestamped artifact file.
///
/// A failed run never leaves a partial artifact behind and is never
/// retried here; the next scheduler tick is the retry mechanism.
pub struct DumpPipeline {
    /// Resolved path of the dump executable.
    program: PathBuf,
    target: BackupTarget,
}

impl DumpPipeline {
    pub fn new(program: PathBuf, target: BackupTarget) -> Self {
        Self { program, target }
    }

    /// Name of the database this pipeline dumps.
    pub fn database(&self) -> &str {
        &self.target.database
    }

    /// Runs one dump into `destination_dir` and returns the artifact path.
    ///
    /// The artifact is created exclusively; a leftover file with the same
    /// second-resolution timestamp fails the run instead of being
    /// overwritten.
    pub fn run(
        &self,
        destination_dir: &Path,
        compress: bool,
        compression_level: i32,
    ) -> Result<PathBuf, DumpError> {
        let started = Local::now();
        let file_name = filename::artifact_name(&self.target.database, &started, compress);
        let artifact = destination_dir.join(&file_name);
        log::debug!(target: "dump", "Dumping \"{}\" to {}", self.target.database, artifact.display());

        let artifact_file = File::create_new(&artifact)?;

        match self.stream_dump(artifact_file, compress, compression_level) {
            Ok(()) => {
                log::info!(target: "dump", "Finished dump of \"{}\": {file_name}", self.target.database);
                Ok(artifact)
            }
            Err(e) => {
                remove_partial_artifact(&artifact);
                Err(e)
            }
        }
    }

    fn stream_dump(
        &self,
        artifact_file: File,
        compress: bool,
        compression_level: i32,
    ) -> Result<(), DumpError> {
        let mut dump_process = self.spawn_dump_command()?;
        log::trace!(target: "dump", "Started {} process", self.program.display());

        let mut stdout = dump_process
            .stdout
            .take()
            .expect("dump process stdout should be piped");
        let mut stderr = dump_process
            .stderr
            .take()
            .expect("dump process stderr should be piped");

        // Drain stderr on its own thread so a chatty dump command can't
        // dead-lock against the stdout copy below.
        let diagnostics = thread::spawn(move || {
            let mut diagnostic = String::new();
            let _ = stderr.read_to_string(&mut diagnostic);
            diagnostic
        });

        let copied: io::Result<File> = if compress {
            let mut encoder =
                GzEncoder::new(artifact_file, compression::normalize_level(compression_level));
            io::copy(&mut stdout, &mut encoder).and_then(|_| encoder.finish())
        } else {
            let mut artifact_file = artifact_file;
            io::copy(&mut stdout, &mut artifact_file).map(|_| artifact_file)
        };

        let artifact_file = wait_for_dump_process(copied, stdout, dump_process, diagnostics)?;

        // Make sure everything hit the disk before success is reported.
        artifact_file.sync_all()?;

        Ok(())
    }

    fn spawn_dump_command(&self) -> io::Result<Child> {
        let BackupTarget {
            host,
            port,
            user,
            password,
            database,
        } = &self.target;

        Command::new(&self.program)
            .arg("-h")
            .arg(host)
            .arg("-p")
            .arg(port.to_string())
            .arg("-U")
            .arg(user)
            .arg("-d")
            .arg(database)
            .env(PASSWORD_ENV, password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }
}

/// Closes the output pipe and reaps the dump process.
///
/// When the artifact stream broke mid-copy the process may still be
/// producing output with nowhere for it to go; it is killed first so the
/// wait can't block on a full pipe. A broken stream counts as a failed
/// dump, not as an environment problem like a missing directory.
fn wait_for_dump_process(
    copied: io::Result<File>,
    stdout: ChildStdout,
    mut dump_process: Child,
    diagnostics: thread::JoinHandle<String>,
) -> Result<File, DumpError> {
    drop(stdout);

    if copied.is_err() {
        if let Err(e) = dump_process.kill() {
            log::debug!(target: "dump", "Killing the dump process failed: {e}");
        }
    }

    let exit_status = dump_process.wait()?;
    let diagnostic = diagnostics.join().unwrap_or_default();

    let artifact_file =
        copied.map_err(|e| DumpError::DumpFailed(format!("artifact stream broke: {e}")))?;

    if !exit_status.success() {
        log::debug!(target: "dump", "Dump process exited with {exit_status}");
        return Err(DumpError::DumpFailed(diagnostic.trim_end().to_owned()));
    }

    Ok(artifact_file)
}

fn remove_partial_artifact(artifact: &Path) {
    match fs::remove_file(artifact) {
        Ok(()) => {
            log::debug!(target: "dump", "Removed partial artifact {}", artifact.display());
        }
        Err(e) => {
            log::warn!(target: "dump", "Removing partial artifact {} failed: {e}", artifact.display());
        }
    }
}
