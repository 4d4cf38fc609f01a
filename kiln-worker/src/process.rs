//! Process executor
//!
//! Runs a toolchain script to completion with a prepared environment. Both
//! output streams are appended line by line to the run's task log; stdout can
//! additionally be kept in memory for parsing the build result.
//!
//! The call suspends until the script exits. No timeout is enforced here; a
//! supervisor outside the worker owns wall-clock limits.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Split};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::ToolchainCommand;
use crate::environment::JobEnvironment;
use crate::error::{Result, WorkerError};

/// Marker a build script prints to report the produced image
pub const IMAGE_ID_MARKER: &str = "created_image_id";

/// Result of a script that ran to completion
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: i32,
    /// Captured stdout lines (empty unless capture was requested)
    pub stdout: Vec<String>,
    /// Task log the output was written to, if it could be opened
    pub log_path: Option<PathBuf>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Last stdout line carrying the image id marker
pub fn find_marker_line(lines: &[String]) -> Option<&str> {
    lines
        .iter()
        .rev()
        .find(|line| line.contains(IMAGE_ID_MARKER))
        .map(String::as_str)
}

/// Extracts and validates the image id reported by a build
///
/// Only the last marker line counts. Its value must be a UUID in the
/// canonical lowercase hyphenated form, otherwise the build is treated as
/// not having produced an image.
pub fn parse_created_image_id(lines: &[String]) -> Result<String> {
    let line = find_marker_line(lines).ok_or(WorkerError::BuildArtifactMissing)?;

    let value = line.rsplit('=').next().unwrap_or_default().trim();

    match Uuid::try_parse(value) {
        Ok(parsed) if parsed.hyphenated().to_string() == value => Ok(value.to_string()),
        _ => Err(WorkerError::BuildArtifactMissing),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Runs `command` and waits for it to exit
    ///
    /// # Arguments
    /// * `command` - Resolved toolchain invocation
    /// * `env` - The complete environment; nothing else is inherited
    /// * `capture_stdout` - Keep stdout lines in memory
    ///
    /// # Returns
    /// The exit code and captured output, or [`WorkerError::ProcessLaunch`]
    /// when the script could not be started at all
    pub async fn run(
        &self,
        command: &ToolchainCommand,
        env: &JobEnvironment,
        capture_stdout: bool,
    ) -> Result<ProcessOutput> {
        let program = command.program().to_string_lossy().to_string();
        let log_path = env.log_path();

        debug!("Running {}", command);

        let mut child = Command::new(command.program())
            .args(command.args())
            .env_clear()
            .envs(env.vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| WorkerError::ProcessLaunch {
                program: program.clone(),
                source,
            })?;

        let mut log_file = open_log(&log_path).await;
        info!("Task log at {}", log_path.display());

        let mut stdout = child.stdout.take().map(|s| BufReader::new(s).split(b'\n'));
        let mut stderr = child.stderr.take().map(|s| BufReader::new(s).split(b'\n'));
        let mut captured = Vec::new();

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                line = next_line(&mut stdout), if stdout.is_some() => match line {
                    Some(line) => {
                        write_log(&mut log_file, &line).await;
                        if capture_stdout {
                            captured.push(line);
                        }
                    }
                    None => stdout = None,
                },
                line = next_line(&mut stderr), if stderr.is_some() => match line {
                    Some(line) => write_log(&mut log_file, &line).await,
                    None => stderr = None,
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|source| WorkerError::ProcessLaunch {
                program: program.clone(),
                source,
            })?;

        if let Some(file) = log_file.as_mut() {
            if let Err(e) = file.flush().await {
                warn!("Failed to flush task log {}: {}", log_path.display(), e);
            }
        }

        let exit_code = status.code().unwrap_or(-1);
        debug!("{} exited with code {}", program, exit_code);

        Ok(ProcessOutput {
            exit_code,
            stdout: captured,
            log_path: log_file.map(|_| log_path),
        })
    }
}

async fn open_log(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!("Cannot create task log directory {}: {}", parent.display(), e);
            return None;
        }
    }

    match File::create(path).await {
        Ok(file) => Some(file),
        Err(e) => {
            warn!("Cannot open task log {}: {}", path.display(), e);
            None
        }
    }
}

async fn write_log(file: &mut Option<File>, line: &str) {
    if let Some(f) = file.as_mut() {
        let result = async {
            f.write_all(line.as_bytes()).await?;
            f.write_all(b"\n").await
        }
        .await;

        if let Err(e) = result {
            warn!("Task log write failed, further output is not logged: {}", e);
            *file = None;
        }
    }
}

/// Reads one line; `None` at end of stream or on a read error
async fn next_line<R: AsyncRead + Unpin>(stream: &mut Option<Split<BufReader<R>>>) -> Option<String> {
    let stream = stream.as_mut()?;
    match stream.next_segment().await {
        Ok(Some(bytes)) => {
            let line = String::from_utf8_lossy(&bytes);
            Some(line.trim_end_matches('\r').to_string())
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Error reading process output: {}", e);
            None
        }
    }
}
