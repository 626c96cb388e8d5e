//! External process runner
//!
//! Runs one analysis program to completion and returns its stdout. stdout and
//! stderr are drained concurrently into growable buffers, so arbitrarily large
//! JSON payloads are supported. Exit code 0 is the only success.
//!
//! A single attempt per call; see [`crate::utils::retry`] for the optional
//! retry decorator.

use crate::error::StageError;
use crate::utils::duration_ms;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs an external program and returns its standard output
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to exit
    ///
    /// # Errors
    /// - `StageError::Launch` if the program cannot be spawned
    /// - `StageError::Process` on a non-zero exit (stderr captured verbatim)
    /// - `StageError::Timeout` if the time budget elapses (the child is killed)
    /// - `StageError::OutputParse` if stdout is not valid UTF-8
    async fn run(&self, program: &Path, args: &[String]) -> Result<String, StageError>;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner {
    timeout: Option<Duration>,
}

impl SubprocessRunner {
    /// Runner without a time budget
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Runner that kills the child after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<String, StageError> {
        let program_name = program.display().to_string();
        let start_time = Instant::now();

        debug!(
            program = %program_name,
            arg_count = args.len(),
            "Spawning analysis process"
        );

        // kill_on_drop: dropping the wait future on timeout kills the child
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StageError::Launch {
                program: program_name.clone(),
                source: e,
            })?;

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!(
                        program = %program_name,
                        timeout_ms = duration_ms(limit),
                        "Analysis process timed out, killed"
                    );
                    return Err(StageError::Timeout {
                        after_ms: duration_ms(limit),
                    });
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|e| StageError::Io {
            program: program_name.clone(),
            source: e,
        })?;

        let elapsed_ms = duration_ms(start_time.elapsed());

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                program = %program_name,
                exit_code = ?output.status.code(),
                elapsed_ms,
                stderr = %stderr.trim(),
                "Analysis process failed"
            );
            return Err(StageError::Process {
                exit_code: output.status.code(),
                stderr,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            });
        }

        if !output.stderr.is_empty() {
            debug!(
                program = %program_name,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Analysis process wrote to stderr"
            );
        }

        debug!(
            program = %program_name,
            elapsed_ms,
            stdout_bytes = output.stdout.len(),
            "Analysis process completed"
        );

        String::from_utf8(output.stdout).map_err(|e| {
            StageError::OutputParse(format!("process output is not valid UTF-8: {}", e))
        })
    }
}
