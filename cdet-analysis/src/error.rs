//! Error types for cdet-analysis
//!
//! Stage errors never cross the orchestrator boundary. Each stage recovers
//! its `StageError` into a failure record carrying the message and a
//! [`FailureKind`], so callers can branch without matching on message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure raised while running one external analysis stage
#[derive(Debug, Error)]
pub enum StageError {
    /// Program could not be spawned (missing binary, permissions)
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while collecting the output of a running program
    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Program ran but exited unsuccessfully
    ///
    /// `exit_code` is `None` when the process was terminated by a signal.
    #[error("{}", process_failure_message(.exit_code, .stderr, .stdout))]
    Process {
        exit_code: Option<i32>,
        stderr: String,
        stdout: String,
    },

    /// Program did not terminate within the configured budget and was killed
    #[error("process timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// Program succeeded but its output could not be interpreted
    #[error("{0}")]
    OutputParse(String),

    /// Local precondition violated, no process was started
    #[error("{0}")]
    Validation(String),

    /// Program succeeded but reported `success=false` in its payload
    #[error("{0}")]
    Reported(String),
}

impl StageError {
    /// Structured classification of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            StageError::Launch { .. } | StageError::Io { .. } | StageError::Process { .. } => {
                FailureKind::Process
            }
            StageError::Timeout { .. } => FailureKind::Timeout,
            StageError::OutputParse(_) => FailureKind::OutputParse,
            StageError::Validation(_) => FailureKind::Validation,
            StageError::Reported(_) => FailureKind::Reported,
        }
    }

    /// Whether a retry policy may attempt the invocation again
    ///
    /// Only non-zero exits qualify; the other kinds are deterministic or
    /// already consumed the full time budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::Process { .. })
    }
}

/// Structured failure classification exposed on result records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Non-zero exit, launch failure or I/O failure on the process pipes
    Process,
    /// Subprocess exceeded its time budget
    Timeout,
    /// Empty or malformed subprocess output
    OutputParse,
    /// Local precondition check failed
    Validation,
    /// External stage reported its own failure
    Reported,
}

/// Pipeline position at which an analysis failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Request parameters rejected before any stage ran
    Request,
    /// Embedding extraction
    Embedding,
    /// Similarity search
    Search,
}

fn process_failure_message(exit_code: &Option<i32>, stderr: &str, stdout: &str) -> String {
    let status = match exit_code {
        Some(code) => format!("process exited with code {}", code),
        None => "process terminated by signal".to_string(),
    };

    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return format!("{}: {}", status, stderr);
    }

    // The wrapper scripts print a JSON failure object before exiting non-zero
    match reported_error(stdout) {
        Some(reported) => format!("{}: {}", status, reported),
        None => status,
    }
}

/// Extract the `error` string from a JSON object printed on stdout, if any
pub(crate) fn reported_error(stdout: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).ok()?;
    value
        .get("error")
        .and_then(|e| e.as_str())
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}
