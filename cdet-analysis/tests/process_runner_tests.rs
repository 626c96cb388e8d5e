//! Subprocess runner tests against real `/bin/sh` processes

#![cfg(unix)]

use cdet_analysis::services::{ProcessRunner, SubprocessRunner};
use cdet_analysis::{FailureKind, StageError};
use std::path::Path;
use std::time::{Duration, Instant};

const SH: &str = "/bin/sh";

fn sh_args(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

#[tokio::test]
async fn test_stdout_returned_on_success() {
    let runner = SubprocessRunner::new();
    let stdout = runner
        .run(Path::new(SH), &sh_args(r#"echo '{"success": true}'"#))
        .await
        .unwrap();

    assert_eq!(stdout.trim(), r#"{"success": true}"#);
}

#[tokio::test]
async fn test_non_zero_exit_captures_stderr() {
    let runner = SubprocessRunner::new();
    let err = runner
        .run(
            Path::new(SH),
            &sh_args("echo 'ModuleNotFoundError: No module named torch' >&2; exit 3"),
        )
        .await
        .unwrap_err();

    match &err {
        StageError::Process {
            exit_code, stderr, ..
        } => {
            assert_eq!(*exit_code, Some(3));
            assert!(stderr.contains("No module named torch"));
        }
        other => panic!("expected process failure, got {:?}", other),
    }
    assert_eq!(err.kind(), FailureKind::Process);
    assert_eq!(
        err.to_string(),
        "process exited with code 3: ModuleNotFoundError: No module named torch"
    );
}

#[tokio::test]
async fn test_non_zero_exit_uses_reported_json_error() {
    let runner = SubprocessRunner::new();
    let err = runner
        .run(
            Path::new(SH),
            &sh_args(r#"echo '{"success": false, "error": "Audio file not found: /x.wav"}'; exit 1"#),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "process exited with code 1: Audio file not found: /x.wav"
    );
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let runner = SubprocessRunner::with_timeout(Duration::from_millis(200));
    let start = Instant::now();

    let err = runner
        .run(Path::new(SH), &sh_args("sleep 10"))
        .await
        .unwrap_err();

    assert!(matches!(err, StageError::Timeout { after_ms: 200 }));
    assert_eq!(err.kind(), FailureKind::Timeout);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_large_output_is_not_truncated() {
    let runner = SubprocessRunner::with_timeout(Duration::from_secs(30));
    let stdout = runner
        .run(
            Path::new(SH),
            &sh_args("head -c 2000000 /dev/zero | tr '\\000' 'a'; head -c 100000 /dev/zero >&2"),
        )
        .await
        .unwrap();

    assert_eq!(stdout.len(), 2_000_000);
    assert!(stdout.bytes().all(|b| b == b'a'));
}

#[tokio::test]
async fn test_missing_program_is_launch_failure() {
    let runner = SubprocessRunner::new();
    let err = runner
        .run(Path::new("/nonexistent/cdet-embedding-tool"), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, StageError::Launch { .. }));
    assert_eq!(err.kind(), FailureKind::Process);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_invalid_utf8_is_parse_failure() {
    let runner = SubprocessRunner::new();
    let err = runner
        .run(Path::new(SH), &sh_args("printf '\\377\\376'"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::OutputParse);
}
